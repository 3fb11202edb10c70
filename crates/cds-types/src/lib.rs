//! Validated primitive types shared across the decision-support crates.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// Errors that can occur when parsing a compact identifier.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CurieError {
    #[error("CURIE cannot be empty")]
    Empty,
    #[error("CURIE '{0}' is missing a ':' separator")]
    MissingSeparator(String),
    #[error("CURIE '{0}' has an empty prefix")]
    EmptyPrefix(String),
    #[error("CURIE '{0}' has an empty local part")]
    EmptyLocal(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A compact identifier of the form `prefix:local`, e.g. `LOINC:4548-4`.
///
/// Only the first `:` separates prefix from local part, so local parts may themselves
/// contain colons. The prefix is kept as written; namespace lookup decides whether it is
/// known.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Curie {
    raw: String,
    split: usize,
}

impl Curie {
    /// Parses `input` (trimmed) into a `Curie`.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, CurieError> {
        let raw = input.as_ref().trim();
        if raw.is_empty() {
            return Err(CurieError::Empty);
        }
        let split = raw
            .find(':')
            .ok_or_else(|| CurieError::MissingSeparator(raw.to_owned()))?;
        if split == 0 {
            return Err(CurieError::EmptyPrefix(raw.to_owned()));
        }
        if split + 1 == raw.len() {
            return Err(CurieError::EmptyLocal(raw.to_owned()));
        }
        Ok(Self {
            raw: raw.to_owned(),
            split,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.raw[..self.split]
    }

    pub fn local(&self) -> &str {
        &self.raw[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::str::FromStr for Curie {
    type Err = CurieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Curie::parse(s)
    }
}

impl std::fmt::Display for Curie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl serde::Serialize for Curie {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> serde::Deserialize<'de> for Curie {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Curie::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims_and_rejects_blank() {
        let text = NonEmptyText::new("  GLP1_ADA_2026 ").expect("valid text");
        assert_eq!(text.as_str(), "GLP1_ADA_2026");
        assert!(matches!(NonEmptyText::new("   "), Err(TextError::Empty)));
    }

    #[test]
    fn test_curie_splits_on_first_colon() {
        let curie = Curie::parse("LOINC:4548-4").expect("valid curie");
        assert_eq!(curie.prefix(), "LOINC");
        assert_eq!(curie.local(), "4548-4");

        let nested = Curie::parse("ex:a:b").expect("valid curie");
        assert_eq!(nested.prefix(), "ex");
        assert_eq!(nested.local(), "a:b");
    }

    #[test]
    fn test_curie_rejects_malformed_input() {
        assert_eq!(Curie::parse(""), Err(CurieError::Empty));
        assert_eq!(
            Curie::parse("E11.9"),
            Err(CurieError::MissingSeparator("E11.9".into()))
        );
        assert_eq!(
            Curie::parse(":123"),
            Err(CurieError::EmptyPrefix(":123".into()))
        );
        assert_eq!(
            Curie::parse("mondo:"),
            Err(CurieError::EmptyLocal("mondo:".into()))
        );
    }

    #[test]
    fn test_curie_deserialises_from_json_string() {
        let curie: Curie = serde_json::from_str("\"rxnorm:8600\"").expect("deserialise");
        assert_eq!(curie.as_str(), "rxnorm:8600");

        let err = serde_json::from_str::<Curie>("\"insulin\"").expect_err("should reject");
        assert!(err.to_string().contains("separator"));
    }
}
