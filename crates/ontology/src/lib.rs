//! # CDS Ontology
//!
//! Read-only semantic graph support for the decision-support engine.
//!
//! This crate owns the mechanics of getting concept triples into memory:
//! - Namespace registration and CURIE expansion/compaction
//! - An in-memory triple store exposed through the [`GraphStore`] trait
//! - Turtle, N-Triples and RDF/XML loading that logs and skips files it cannot read
//! - A small `SELECT` query language for rule-authored concept-family queries
//!
//! **No clinical meaning**: identity resolution and subsumption semantics live in
//! `cds-core`; this crate only stores and walks edges.

pub mod graph;
pub mod loader;
pub mod namespace;
pub mod query;
pub mod rdf;

pub use graph::{Graph, GraphStore, Term, Triple};
pub use loader::{load_dir, load_file, LoadReport, SkippedSource};
pub use namespace::NamespaceMap;
pub use rdf::RdfFormat;
pub use query::SelectQuery;

/// Well-known predicate and class IRIs.
pub mod vocab {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
    pub const OWL_SAME_AS: &str = "http://www.w3.org/2002/07/owl#sameAs";
    pub const OWL_EQUIVALENT_CLASS: &str = "http://www.w3.org/2002/07/owl#equivalentClass";
    pub const SKOS_EXACT_MATCH: &str = "http://www.w3.org/2004/02/skos/core#exactMatch";
    pub const SKOS_ALT_LABEL: &str = "http://www.w3.org/2004/02/skos/core#altLabel";
}

/// Errors returned by the `cds-ontology` crate.
#[derive(Debug, thiserror::Error)]
pub enum OntologyError {
    #[error("unknown namespace prefix: {0}")]
    UnknownPrefix(String),

    #[error("invalid CURIE: {0}")]
    InvalidCurie(#[from] cds_types::CurieError),

    #[error("{format} parse error: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read ontology source: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid query: {0}")]
    Query(String),
}

pub type OntologyResult<T> = std::result::Result<T, OntologyError>;
