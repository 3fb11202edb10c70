//! Single-pattern `SELECT` queries over a [`GraphStore`].
//!
//! Rule authors describe concept families with queries such as:
//!
//! ```text
//! SELECT ?rx WHERE { ?rx rdfs:subClassOf+ <rxnorm:8600> . }
//! ```
//!
//! Exactly one triple pattern is supported. One side of the pattern is the selected
//! variable and the other a constant written as `<iri>`, `<prefix:local>` or `prefix:local`.
//! A `+` after the predicate selects the transitive closure (one or more hops).
//! Optional `PREFIX p: <iri>` lines may precede `SELECT`.

use crate::graph::{GraphStore, Term};
use crate::namespace::NamespaceMap;
use crate::vocab::RDF_TYPE;
use crate::{OntologyError, OntologyResult};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Direction {
    /// `?v pred <const>` - select subjects.
    Subjects,
    /// `<const> pred ?v` - select objects.
    Objects,
}

/// A parsed query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectQuery {
    variable: String,
    predicate: String,
    transitive: bool,
    constant: String,
    direction: Direction,
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '<' {
            let mut tok = String::new();
            for c in chars.by_ref() {
                tok.push(c);
                if c == '>' {
                    break;
                }
            }
            tokens.push(tok);
        } else if matches!(c, '{' | '}' | '.') {
            tokens.push(c.to_string());
            chars.next();
        } else {
            let mut tok = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || matches!(c, '{' | '}' | '<') {
                    break;
                }
                if c == '.' {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if !lookahead.peek().is_some_and(|n| n.is_alphanumeric()) {
                        break;
                    }
                }
                tok.push(c);
                chars.next();
            }
            tokens.push(tok);
        }
    }
    tokens
}

fn query_err(message: impl Into<String>) -> OntologyError {
    OntologyError::Query(message.into())
}

fn resolve_term(token: &str, prefixes: &NamespaceMap, defaults: &NamespaceMap) -> OntologyResult<String> {
    let inner = token
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(token);
    if inner.contains("://") {
        return Ok(inner.to_owned());
    }
    if token == "a" {
        return Ok(RDF_TYPE.to_owned());
    }
    let (prefix, local) = inner
        .split_once(':')
        .ok_or_else(|| query_err(format!("'{token}' is neither an IRI nor a prefixed name")))?;
    let ns = prefixes
        .namespace(prefix)
        .or_else(|| defaults.namespace(prefix))
        .ok_or_else(|| OntologyError::UnknownPrefix(prefix.to_owned()))?;
    Ok(format!("{ns}{local}"))
}

impl SelectQuery {
    /// Parses `text`, expanding prefixed names with `namespaces` unless the query declares
    /// its own `PREFIX`.
    pub fn parse(text: &str, namespaces: &NamespaceMap) -> OntologyResult<Self> {
        let tokens = tokenize(text);
        let mut it = tokens.iter().map(String::as_str).peekable();
        let mut prefixes = NamespaceMap::empty();

        while it.peek().is_some_and(|t| t.eq_ignore_ascii_case("prefix")) {
            it.next();
            let name = it.next().ok_or_else(|| query_err("PREFIX without a name"))?;
            let iri = it.next().ok_or_else(|| query_err("PREFIX without an IRI"))?;
            let iri = iri
                .strip_prefix('<')
                .and_then(|i| i.strip_suffix('>'))
                .ok_or_else(|| query_err(format!("PREFIX IRI must be <...>, found '{iri}'")))?;
            prefixes.register(name.trim_end_matches(':'), iri);
        }

        match it.next() {
            Some(t) if t.eq_ignore_ascii_case("select") => {}
            other => return Err(query_err(format!("expected SELECT, found {other:?}"))),
        }
        if it.peek().is_some_and(|t| t.eq_ignore_ascii_case("distinct")) {
            it.next();
        }
        let variable = match it.next() {
            Some(v) if v.starts_with('?') && v.len() > 1 => v.to_owned(),
            other => return Err(query_err(format!("expected ?variable, found {other:?}"))),
        };
        match it.next() {
            Some(t) if t.eq_ignore_ascii_case("where") => {}
            other => return Err(query_err(format!("expected WHERE, found {other:?}"))),
        }
        if it.next() != Some("{") {
            return Err(query_err("expected '{'"));
        }

        let subject = it.next().ok_or_else(|| query_err("missing subject"))?;
        let predicate = it.next().ok_or_else(|| query_err("missing predicate"))?;
        let object = it.next().ok_or_else(|| query_err("missing object"))?;

        if it.peek() == Some(&".") {
            it.next();
        }
        if it.next() != Some("}") {
            return Err(query_err("only a single triple pattern is supported"));
        }
        if let Some(extra) = it.next() {
            return Err(query_err(format!("unexpected trailing token '{extra}'")));
        }

        let (predicate, transitive) = match predicate.strip_suffix('+') {
            Some(p) => (p, true),
            None => (predicate, false),
        };
        let predicate = resolve_term(predicate, &prefixes, namespaces)?;

        let (direction, constant) = if subject == variable {
            (Direction::Subjects, object)
        } else if object == variable {
            (Direction::Objects, subject)
        } else {
            return Err(query_err(format!(
                "selected variable {variable} does not appear in the pattern"
            )));
        };
        if constant.starts_with('?') {
            return Err(query_err("patterns with two variables are not supported"));
        }
        let constant = resolve_term(constant, &prefixes, namespaces)?;

        Ok(Self {
            variable,
            predicate,
            transitive,
            constant,
            direction,
        })
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Runs the query, returning matching node keys in sorted order.
    pub fn execute(&self, store: &dyn GraphStore) -> BTreeSet<String> {
        match (&self.direction, self.transitive) {
            (Direction::Subjects, true) => store.reachable_subjects(&self.constant, &self.predicate),
            (Direction::Objects, true) => store.reachable_objects(&self.constant, &self.predicate),
            (Direction::Subjects, false) => store
                .subjects(&self.predicate, &self.constant)
                .into_iter()
                .map(str::to_owned)
                .collect(),
            (Direction::Objects, false) => store
                .objects(&self.constant, &self.predicate)
                .into_iter()
                .filter_map(Term::node_key)
                .collect(),
        }
    }
}

/// Parses and runs `text` against `store` using the store's namespaces.
pub fn run(store: &dyn GraphStore, text: &str) -> OntologyResult<BTreeSet<String>> {
    let query = SelectQuery::parse(text, store.namespaces())?;
    Ok(query.execute(store))
}
