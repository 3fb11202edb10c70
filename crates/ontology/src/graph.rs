//! In-memory triple store.
//!
//! The store is populated once (at start-up) and then shared read-only. All read access goes
//! through [`GraphStore`], which requires `Send + Sync` so a single instance can sit behind an
//! `Arc` and serve concurrent evaluations without locking.

use crate::namespace::NamespaceMap;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// An RDF term in object position.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    /// A full IRI.
    Iri(String),
    /// A blank node label (without the `_:` marker).
    Blank(String),
    /// A literal value with optional language tag or datatype IRI.
    Literal {
        value: String,
        lang: Option<String>,
        datatype: Option<String>,
    },
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            lang: None,
            datatype: None,
        }
    }

    /// The node key used for graph traversal: IRIs as-is, blank nodes as `_:label`.
    /// Literals are never nodes.
    pub fn node_key(&self) -> Option<String> {
        match self {
            Term::Iri(iri) => Some(iri.clone()),
            Term::Blank(label) => Some(format!("_:{label}")),
            Term::Literal { .. } => None,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Term::Literal { value, .. } => Some(value),
            _ => None,
        }
    }

    fn to_ntriples(&self) -> String {
        match self {
            Term::Iri(iri) => format!("<{iri}>"),
            Term::Blank(label) => format!("_:{label}"),
            Term::Literal {
                value,
                lang,
                datatype,
            } => {
                let escaped = value
                    .replace('\\', "\\\\")
                    .replace('"', "\\\"")
                    .replace('\n', "\\n")
                    .replace('\r', "\\r");
                match (lang, datatype) {
                    (Some(lang), _) => format!("\"{escaped}\"@{lang}"),
                    (None, Some(dt)) => format!("\"{escaped}\"^^<{dt}>"),
                    (None, None) => format!("\"{escaped}\""),
                }
            }
        }
    }
}

/// A single statement. Subjects are node keys (IRIs or `_:label`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

/// Read-only access to a semantic graph.
///
/// Implementations must be safe for concurrent reads.
pub trait GraphStore: Send + Sync {
    /// Namespaces used to expand and compact identifiers for this graph.
    fn namespaces(&self) -> &NamespaceMap;

    /// All objects of `(subject, predicate, ?)`.
    fn objects(&self, subject: &str, predicate: &str) -> Vec<&Term>;

    /// All subjects of `(?, predicate, object)` where `object` is a node key.
    fn subjects(&self, predicate: &str, object: &str) -> Vec<&str>;

    /// Number of stored triples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First literal object of `(subject, predicate, ?)`.
    fn literal(&self, subject: &str, predicate: &str) -> Option<&str> {
        self.objects(subject, predicate)
            .into_iter()
            .find_map(Term::as_literal)
    }

    /// Nodes reachable from `start` by following `predicate` forwards one or more times.
    ///
    /// `start` is only included if a cycle leads back to it.
    fn reachable_objects(&self, start: &str, predicate: &str) -> BTreeSet<String> {
        walk(start, |node| {
            self.objects(node, predicate)
                .into_iter()
                .filter_map(Term::node_key)
                .collect()
        })
    }

    /// Nodes from which `start` is reachable by following `predicate` one or more times.
    fn reachable_subjects(&self, start: &str, predicate: &str) -> BTreeSet<String> {
        walk(start, |node| {
            self.subjects(predicate, node)
                .into_iter()
                .map(str::to_owned)
                .collect()
        })
    }
}

fn walk(start: &str, mut next: impl FnMut(&str) -> Vec<String>) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<String> = next(start).into();
    while let Some(node) = queue.pop_front() {
        if seen.insert(node.clone()) {
            queue.extend(next(&node));
        }
    }
    seen
}

/// Hash-indexed triple store.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    namespaces: NamespaceMap,
    triples: BTreeSet<Triple>,
    by_subject: HashMap<String, Vec<(String, Term)>>,
    by_object: HashMap<String, Vec<(String, String)>>,
}

impl Graph {
    pub fn new(namespaces: NamespaceMap) -> Self {
        Self {
            namespaces,
            ..Self::default()
        }
    }

    /// Inserts a triple. Returns `false` if it was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if !self.triples.insert(triple.clone()) {
            return false;
        }
        if let Some(key) = triple.object.node_key() {
            self.by_object
                .entry(key)
                .or_default()
                .push((triple.predicate.clone(), triple.subject.clone()));
        }
        self.by_subject
            .entry(triple.subject)
            .or_default()
            .push((triple.predicate, triple.object));
        true
    }

    /// Inserts every triple, returning how many were new.
    pub fn extend(&mut self, triples: impl IntoIterator<Item = Triple>) -> usize {
        triples
            .into_iter()
            .map(|t| self.insert(t))
            .filter(|inserted| *inserted)
            .count()
    }

    /// Convenience for building graphs in code: adds `subject predicate object` where all
    /// three are CURIEs or IRIs resolved through this graph's namespaces.
    pub fn add_link(&mut self, subject: &str, predicate: &str, object: &str) -> crate::OntologyResult<bool> {
        let subject = self.expand_any(subject)?;
        let predicate = self.expand_any(predicate)?;
        let object = self.expand_any(object)?;
        Ok(self.insert(Triple::new(subject, predicate, Term::Iri(object))))
    }

    /// Adds a plain literal, e.g. an `rdfs:label`.
    pub fn add_literal(&mut self, subject: &str, predicate: &str, value: &str) -> crate::OntologyResult<bool> {
        let subject = self.expand_any(subject)?;
        let predicate = self.expand_any(predicate)?;
        Ok(self.insert(Triple::new(subject, predicate, Term::literal(value))))
    }

    fn expand_any(&self, value: &str) -> crate::OntologyResult<String> {
        if value.contains("://") {
            Ok(value.to_owned())
        } else {
            self.namespaces.expand_str(value)
        }
    }

    pub fn triples(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Renders the store as N-Triples, one statement per line in sorted order.
    pub fn serialize_ntriples(&self) -> String {
        let mut out = String::new();
        for t in &self.triples {
            let subject = match t.subject.strip_prefix("_:") {
                Some(_) => t.subject.clone(),
                None => format!("<{}>", t.subject),
            };
            out.push_str(&format!(
                "{subject} <{}> {} .\n",
                t.predicate,
                t.object.to_ntriples()
            ));
        }
        out
    }
}

impl GraphStore for Graph {
    fn namespaces(&self) -> &NamespaceMap {
        &self.namespaces
    }

    fn objects(&self, subject: &str, predicate: &str) -> Vec<&Term> {
        self.by_subject
            .get(subject)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|(p, _)| p == predicate)
                    .map(|(_, o)| o)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn subjects(&self, predicate: &str, object: &str) -> Vec<&str> {
        self.by_object
            .get(object)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|(p, _)| p == predicate)
                    .map(|(_, s)| s.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.triples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{RDFS_LABEL, RDFS_SUBCLASS_OF};

    fn chain() -> Graph {
        let mut g = Graph::new(NamespaceMap::with_defaults());
        g.add_link("ex:c", "rdfs:subClassOf", "ex:b").expect("link");
        g.add_link("ex:b", "rdfs:subClassOf", "ex:a").expect("link");
        g.add_link("ex:d", "rdfs:subClassOf", "ex:a").expect("link");
        g.add_literal("ex:a", "rdfs:label", "Root").expect("label");
        g
    }

    #[test]
    fn test_duplicate_triples_are_ignored() {
        let mut g = chain();
        assert_eq!(g.len(), 4);
        assert!(!g.add_link("ex:c", "rdfs:subClassOf", "ex:b").expect("link"));
        assert_eq!(g.len(), 4);
    }

    #[test]
    fn test_reachability_is_transitive_and_irreflexive() {
        let g = chain();
        let a = "http://example.org/ada#a";
        let c = "http://example.org/ada#c";

        let up = g.reachable_objects(c, RDFS_SUBCLASS_OF);
        assert!(up.contains(a));
        assert!(!up.contains(c));

        let down = g.reachable_subjects(a, RDFS_SUBCLASS_OF);
        assert_eq!(down.len(), 3);
        assert!(!down.contains(a));
    }

    #[test]
    fn test_cycles_terminate_and_include_start() {
        let mut g = Graph::new(NamespaceMap::with_defaults());
        g.add_link("ex:x", "rdfs:subClassOf", "ex:y").expect("link");
        g.add_link("ex:y", "rdfs:subClassOf", "ex:x").expect("link");
        let up = g.reachable_objects("http://example.org/ada#x", RDFS_SUBCLASS_OF);
        assert!(up.contains("http://example.org/ada#x"));
    }

    #[test]
    fn test_literal_lookup_and_serialisation() {
        let g = chain();
        assert_eq!(g.literal("http://example.org/ada#a", RDFS_LABEL), Some("Root"));
        let nt = g.serialize_ntriples();
        assert_eq!(nt.lines().count(), 4);
        assert!(nt.contains("<http://example.org/ada#a> <http://www.w3.org/2000/01/rdf-schema#label> \"Root\" ."));
    }
}
