//! Namespace registration and CURIE expansion.
//!
//! Prefixes are matched case-insensitively so that `LOINC:4548-4` and `loinc:4548-4`
//! expand to the same IRI. Registered prefixes are stored lower-cased.

use crate::{OntologyError, OntologyResult};
use cds_types::Curie;

const DEFAULT_NAMESPACES: &[(&str, &str)] = &[
    ("loinc", "http://loinc.org/rdf/"),
    ("rxnorm", "http://rxnorm.info/rdf/"),
    ("mondo", "http://purl.obolibrary.org/obo/MONDO_"),
    ("snomed", "http://snomed.info/id/"),
    ("icd10cm", "http://purl.bioontology.org/ontology/ICD10CM/"),
    ("ex", "http://example.org/ada#"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

/// Ordered prefix → namespace IRI table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceMap {
    entries: Vec<(String, String)>,
}

impl NamespaceMap {
    /// An empty map with no registered prefixes.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The clinical coding systems plus the RDF/OWL/SKOS vocabularies.
    pub fn with_defaults() -> Self {
        let mut map = Self::empty();
        for (prefix, iri) in DEFAULT_NAMESPACES {
            map.register(prefix, iri);
        }
        map
    }

    /// Registers (or replaces) a prefix.
    pub fn register(&mut self, prefix: &str, iri: &str) {
        let prefix = prefix.to_ascii_lowercase();
        match self.entries.iter_mut().find(|(p, _)| *p == prefix) {
            Some(entry) => entry.1 = iri.to_owned(),
            None => self.entries.push((prefix, iri.to_owned())),
        }
    }

    /// Looks up the namespace IRI for `prefix`.
    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        let prefix = prefix.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, iri)| iri.as_str())
    }

    /// Expands a CURIE into a full IRI.
    ///
    /// # Errors
    ///
    /// Returns `OntologyError::UnknownPrefix` if the CURIE's prefix is not registered.
    pub fn expand(&self, curie: &Curie) -> OntologyResult<String> {
        let ns = self
            .namespace(curie.prefix())
            .ok_or_else(|| OntologyError::UnknownPrefix(curie.prefix().to_owned()))?;
        Ok(format!("{ns}{}", curie.local()))
    }

    /// Expands a raw `prefix:local` string.
    pub fn expand_str(&self, curie: &str) -> OntologyResult<String> {
        let curie = Curie::parse(curie)?;
        self.expand(&curie)
    }

    /// Rewrites `iri` as `prefix:local` using the longest matching namespace.
    pub fn compact(&self, iri: &str) -> Option<String> {
        self.entries
            .iter()
            .filter(|(_, ns)| iri.starts_with(ns.as_str()) && iri.len() > ns.len())
            .max_by_key(|(_, ns)| ns.len())
            .map(|(prefix, ns)| format!("{prefix}:{}", &iri[ns.len()..]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, ns)| (p.as_str(), ns.as_str()))
    }
}

impl Default for NamespaceMap {
    fn default() -> Self {
        Self::with_defaults()
    }
}
