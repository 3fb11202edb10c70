//! Concept identity and subsumption over the shared semantic graph.
//!
//! The same clinical concept usually carries several codes (a disease-ontology code, a billing
//! code, a local code). [`ConceptResolver`] collapses them through `owl:sameAs` and
//! `skos:exactMatch` edges and answers "is a kind of" questions through `rdfs:subClassOf`, so
//! a rule naming one code matches any equivalent or more specific code on the patient record.
//!
//! The graph itself is never mutated here; the resolver is a cheap clone around an
//! `Arc<dyn GraphStore>` shared by every evaluation.

use crate::CdsResult;
use cds_ontology::vocab::{
    OWL_EQUIVALENT_CLASS, OWL_SAME_AS, RDFS_LABEL, RDFS_SUBCLASS_OF, SKOS_ALT_LABEL,
    SKOS_EXACT_MATCH,
};
use cds_ontology::{query, GraphStore, Term};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

const EQUIVALENCE_PREDICATES: [&str; 2] = [OWL_SAME_AS, SKOS_EXACT_MATCH];

/// A canonical graph node (full IRI).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ConceptId(String);

impl ConceptId {
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConceptId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Read-only concept lookups backed by a shared graph.
#[derive(Clone)]
pub struct ConceptResolver {
    graph: Arc<dyn GraphStore>,
}

impl ConceptResolver {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &dyn GraphStore {
        self.graph.as_ref()
    }

    /// Expands `curie` to its graph node without following equivalence edges.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPrefix` if the prefix is not registered, or `InvalidCurie` if `curie`
    /// is not of the form `prefix:local`.
    pub fn node(&self, curie: &str) -> CdsResult<ConceptId> {
        let iri = self.graph.namespaces().expand_str(curie.trim())?;
        Ok(ConceptId(iri))
    }

    /// Resolves `curie` to the canonical member of its equivalence set.
    ///
    /// The canonical member is the smallest IRI in the set, so every code of an equivalence
    /// class resolves to the same node regardless of edge direction or load order.
    ///
    /// # Errors
    ///
    /// As for [`ConceptResolver::node`].
    pub fn resolve(&self, curie: &str) -> CdsResult<ConceptId> {
        let node = self.node(curie)?;
        Ok(self
            .equivalents_of(&node)
            .into_iter()
            .next()
            .unwrap_or(node))
    }

    /// The input node plus its direct `sameAs` / `exactMatch` neighbours, in either direction.
    ///
    /// # Errors
    ///
    /// As for [`ConceptResolver::node`].
    pub fn equivalent_set(&self, curie: &str) -> CdsResult<BTreeSet<ConceptId>> {
        let node = self.node(curie)?;
        Ok(self.equivalents_of(&node))
    }

    fn equivalents_of(&self, node: &ConceptId) -> BTreeSet<ConceptId> {
        let mut set = BTreeSet::from([node.clone()]);
        for predicate in EQUIVALENCE_PREDICATES {
            set.extend(
                self.graph
                    .objects(node.as_str(), predicate)
                    .into_iter()
                    .filter_map(Term::node_key)
                    .map(ConceptId),
            );
            set.extend(
                self.graph
                    .subjects(predicate, node.as_str())
                    .into_iter()
                    .map(|s| ConceptId(s.to_owned())),
            );
        }
        set
    }

    /// True if `parent` is reachable from `child` over one or more `rdfs:subClassOf` edges.
    ///
    /// Not reflexive: a node is only its own subclass through an explicit cycle.
    pub fn is_subclass_of(&self, child: &ConceptId, parent: &ConceptId) -> bool {
        self.graph
            .reachable_objects(child.as_str(), RDFS_SUBCLASS_OF)
            .contains(parent.as_str())
    }

    /// Concept-level "is a": `child` equals `parent` or is a subclass of it, comparing every
    /// member of both equivalence sets.
    pub fn is_a(&self, child: &ConceptId, parent: &ConceptId) -> bool {
        let parents = self.equivalents_of(parent);
        self.equivalents_of(child).iter().any(|c| {
            parents.contains(c) || parents.iter().any(|p| self.is_subclass_of(c, p))
        })
    }

    /// Display label: `rdfs:label`, else the compact `prefix:local` form, else the raw IRI.
    pub fn label(&self, node: &ConceptId) -> String {
        if let Some(label) = self.graph.literal(node.as_str(), RDFS_LABEL) {
            return label.to_owned();
        }
        self.graph
            .namespaces()
            .compact(node.as_str())
            .unwrap_or_else(|| node.as_str().to_owned())
    }

    /// Label, alternate labels and the labels of `owl:equivalentClass` members.
    pub fn synonyms(&self, node: &ConceptId) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let literals = |subject: &str, predicate: &str| -> Vec<String> {
            self.graph
                .objects(subject, predicate)
                .into_iter()
                .filter_map(Term::as_literal)
                .map(str::to_owned)
                .collect()
        };
        out.extend(literals(node.as_str(), RDFS_LABEL));
        out.extend(literals(node.as_str(), SKOS_ALT_LABEL));

        let mut classes: BTreeSet<String> = self
            .graph
            .objects(node.as_str(), OWL_EQUIVALENT_CLASS)
            .into_iter()
            .filter_map(Term::node_key)
            .collect();
        classes.extend(
            self.graph
                .subjects(OWL_EQUIVALENT_CLASS, node.as_str())
                .into_iter()
                .map(str::to_owned),
        );
        for class in classes {
            out.extend(literals(&class, RDFS_LABEL));
        }
        out
    }

    /// Every node that is transitively a subclass of the resolved `parent_curie`.
    ///
    /// # Errors
    ///
    /// As for [`ConceptResolver::node`].
    pub fn query_children(&self, parent_curie: &str) -> CdsResult<BTreeSet<ConceptId>> {
        let parent = self.node(parent_curie)?;
        let mut out = BTreeSet::new();
        for member in self.equivalents_of(&parent) {
            out.extend(
                self.graph
                    .reachable_subjects(member.as_str(), RDFS_SUBCLASS_OF)
                    .into_iter()
                    .map(ConceptId),
            );
        }
        Ok(out)
    }

    /// Runs a rule-authored `SELECT` query against the graph.
    ///
    /// # Errors
    ///
    /// Returns an ontology error if the query text is malformed or names an unknown prefix.
    pub fn run_query(&self, text: &str) -> CdsResult<BTreeSet<ConceptId>> {
        let found = query::run(self.graph.as_ref(), text)?;
        Ok(found.into_iter().map(ConceptId).collect())
    }

    /// True if `code` (or any concept equivalent to it) is in `members`.
    ///
    /// Codes that cannot be expanded never match.
    pub fn code_in(&self, code: &str, members: &BTreeSet<ConceptId>) -> bool {
        match self.equivalent_set(code) {
            Ok(set) => set.iter().any(|c| members.contains(c)),
            Err(_) => false,
        }
    }
}
