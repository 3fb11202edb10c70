//! RDF source parsing.
//!
//! Turtle, N-Triples and RDF/XML are read with the `rio` parsers and converted into the
//! store's owned [`Triple`]s. Blank node labels are scoped per parse so anonymous nodes from
//! different files never merge in the shared graph.

use crate::graph::{Term, Triple};
use crate::namespace::NamespaceMap;
use crate::{OntologyError, OntologyResult};
use rio_api::model::{Literal, Subject, Term as RioTerm, Triple as RioTriple};
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesParser, TurtleParser};
use rio_xml::RdfXmlParser;
use std::io::{BufReader, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};

static PARSE_SCOPE: AtomicUsize = AtomicUsize::new(0);

/// Serialisations the loader understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RdfFormat {
    Turtle,
    NTriples,
    RdfXml,
}

impl RdfFormat {
    /// Format for a file extension (`ttl`, `nt`, `rdf`, `owl`), case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ttl" => Some(RdfFormat::Turtle),
            "nt" => Some(RdfFormat::NTriples),
            "rdf" | "owl" => Some(RdfFormat::RdfXml),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            RdfFormat::Turtle => "Turtle",
            RdfFormat::NTriples => "N-Triples",
            RdfFormat::RdfXml => "RDF/XML",
        }
    }
}

/// `@prefix` lines for every registered namespace, so Turtle fragments may use `rdfs:`,
/// `mondo:` and friends without declaring them. Declarations in the document still win.
fn prefix_prelude(namespaces: &NamespaceMap) -> Vec<u8> {
    namespaces
        .iter()
        .map(|(prefix, iri)| format!("@prefix {prefix}: <{iri}> .\n"))
        .collect::<String>()
        .into_bytes()
}

fn convert(triple: &RioTriple<'_>, scope: usize) -> Option<Triple> {
    let blank = |id: &str| format!("b{scope}_{id}");
    let subject = match &triple.subject {
        Subject::NamedNode(node) => node.iri.to_owned(),
        Subject::BlankNode(node) => format!("_:{}", blank(node.id)),
        _ => return None,
    };
    let object = match &triple.object {
        RioTerm::NamedNode(node) => Term::Iri(node.iri.to_owned()),
        RioTerm::BlankNode(node) => Term::Blank(blank(node.id)),
        RioTerm::Literal(Literal::Simple { value }) => Term::literal(*value),
        RioTerm::Literal(Literal::LanguageTaggedString { value, language }) => Term::Literal {
            value: (*value).to_owned(),
            lang: Some((*language).to_owned()),
            datatype: None,
        },
        RioTerm::Literal(Literal::Typed { value, datatype }) => Term::Literal {
            value: (*value).to_owned(),
            lang: None,
            datatype: Some(datatype.iri.to_owned()),
        },
        _ => return None,
    };
    Some(Triple::new(subject, triple.predicate.iri, object))
}

fn collect<P: TriplesParser>(mut parser: P, format: RdfFormat) -> OntologyResult<Vec<Triple>> {
    let scope = PARSE_SCOPE.fetch_add(1, Ordering::Relaxed);
    let mut out = Vec::new();
    parser
        .parse_all(&mut |t| -> Result<(), P::Error> {
            if let Some(triple) = convert(&t, scope) {
                out.push(triple);
            }
            Ok(())
        })
        .map_err(|e| OntologyError::Parse {
            format: format.name(),
            message: e.to_string(),
        })?;
    Ok(out)
}

/// Parses `reader` as `format` into owned triples.
///
/// # Errors
///
/// Returns `OntologyError::Parse` on the first syntax error; nothing from a failing source
/// is returned.
pub fn parse(
    reader: impl Read,
    format: RdfFormat,
    namespaces: &NamespaceMap,
) -> OntologyResult<Vec<Triple>> {
    match format {
        RdfFormat::Turtle => {
            let input = Cursor::new(prefix_prelude(namespaces)).chain(reader);
            collect(TurtleParser::new(BufReader::new(input), None), format)
        }
        RdfFormat::NTriples => collect(NTriplesParser::new(BufReader::new(reader)), format),
        RdfFormat::RdfXml => collect(RdfXmlParser::new(BufReader::new(reader), None), format),
    }
}

/// Parses in-memory text; see [`parse`].
pub fn parse_str(
    text: &str,
    format: RdfFormat,
    namespaces: &NamespaceMap,
) -> OntologyResult<Vec<Triple>> {
    parse(text.as_bytes(), format, namespaces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{RDFS_LABEL, RDFS_SUBCLASS_OF};

    const MONDO_T2DM: &str = "http://purl.obolibrary.org/obo/MONDO_0005148";
    const MONDO_DM: &str = "http://purl.obolibrary.org/obo/MONDO_0005015";

    fn turtle(text: &str) -> OntologyResult<Vec<Triple>> {
        parse_str(text, RdfFormat::Turtle, &NamespaceMap::with_defaults())
    }

    #[test]
    fn test_turtle_uses_default_prefixes_and_object_lists() {
        let triples = turtle(
            "mondo:0005148 rdfs:subClassOf mondo:0005015 ;\n    skos:altLabel \"T2DM\", \"type II diabetes\"@en .\n",
        )
        .expect("parse");
        assert_eq!(triples.len(), 3);
        assert!(triples.contains(&Triple::new(
            MONDO_T2DM,
            RDFS_SUBCLASS_OF,
            Term::iri(MONDO_DM)
        )));
        assert!(triples.iter().any(|t| t.object
            == Term::Literal {
                value: "type II diabetes".into(),
                lang: Some("en".into()),
                datatype: None,
            }));
    }

    #[test]
    fn test_document_prefix_overrides_default() {
        let triples = turtle("@prefix ex: <http://other.example/> .\nex:a rdfs:label \"A\" .\n")
            .expect("parse");
        assert_eq!(triples[0].subject, "http://other.example/a");
    }

    #[test]
    fn test_turtle_accepts_anonymous_restrictions() {
        let triples = turtle(
            "ex:Insulin rdfs:subClassOf [ a owl:Restriction ; owl:onProperty ex:treats ] .\n",
        )
        .expect("parse");
        assert_eq!(triples.len(), 3);
        let blank = triples
            .iter()
            .find(|t| t.subject == "http://example.org/ada#Insulin")
            .and_then(|t| t.object.node_key())
            .expect("restriction node");
        assert!(blank.starts_with("_:b"));
    }

    #[test]
    fn test_typed_literals_keep_their_datatype() {
        let triples = turtle("ex:a ex:score \"4.5\"^^xsd:decimal .\n").expect("parse");
        assert_eq!(
            triples[0].object,
            Term::Literal {
                value: "4.5".into(),
                lang: None,
                datatype: Some("http://www.w3.org/2001/XMLSchema#decimal".into()),
            }
        );
    }

    #[test]
    fn test_parses_ntriples() {
        let triples = parse_str(
            &format!("<{MONDO_T2DM}> <{RDFS_LABEL}> \"type 2 diabetes mellitus\" .\n"),
            RdfFormat::NTriples,
            &NamespaceMap::empty(),
        )
        .expect("parse");
        assert_eq!(triples[0].object.as_literal(), Some("type 2 diabetes mellitus"));
    }

    #[test]
    fn test_parses_rdf_xml_classes() {
        let xml = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
         xmlns:owl="http://www.w3.org/2002/07/owl#">
  <owl:Class rdf:about="http://purl.obolibrary.org/obo/MONDO_0005148">
    <rdfs:subClassOf rdf:resource="http://purl.obolibrary.org/obo/MONDO_0005015"/>
    <rdfs:label>type 2 diabetes mellitus</rdfs:label>
  </owl:Class>
</rdf:RDF>"#;
        let triples =
            parse_str(xml, RdfFormat::RdfXml, &NamespaceMap::empty()).expect("parse rdf/xml");
        assert_eq!(triples.len(), 3);
        assert!(triples.contains(&Triple::new(
            MONDO_T2DM,
            RDFS_SUBCLASS_OF,
            Term::iri(MONDO_DM)
        )));
    }

    #[test]
    fn test_syntax_errors_are_reported() {
        let err = turtle("mondo:1 rdfs:label \"unterminated .\n").expect_err("should fail");
        assert!(matches!(err, OntologyError::Parse { format: "Turtle", .. }));
        let err = turtle("nope:1 rdfs:label \"x\" .\n").expect_err("unknown prefix");
        assert!(matches!(err, OntologyError::Parse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(RdfFormat::from_extension("OWL"), Some(RdfFormat::RdfXml));
        assert_eq!(RdfFormat::from_extension("ttl"), Some(RdfFormat::Turtle));
        assert_eq!(RdfFormat::from_extension("md"), None);
    }
}
