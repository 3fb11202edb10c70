//! Bulk loading of ontology sources from disk.
//!
//! A load never fails as a whole: each file that cannot be read or parsed is logged and
//! recorded in the [`LoadReport`], and everything that did parse stays in the graph.

use crate::graph::{Graph, GraphStore};
use crate::rdf::{self, RdfFormat};
use crate::{OntologyError, OntologyResult};
use std::fs::File;
use std::path::{Path, PathBuf};

const MAX_DEPTH: usize = 20;

/// A source file that was not loaded, with the reason.
#[derive(Debug)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub error: OntologyError,
}

/// Outcome of [`load_dir`].
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Files that were parsed, with the number of new triples each contributed.
    pub loaded: Vec<(PathBuf, usize)>,
    pub skipped: Vec<SkippedSource>,
}

impl LoadReport {
    pub fn triples_added(&self) -> usize {
        self.loaded.iter().map(|(_, n)| n).sum()
    }
}

fn source_format(path: &Path) -> Option<RdfFormat> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(RdfFormat::from_extension)
}

/// Parses one file into `graph`, returning the number of new triples.
///
/// The format follows the extension: `.ttl` Turtle, `.nt` N-Triples, `.rdf`/`.owl` RDF/XML.
/// Turtle files may use the graph's registered prefixes without declaring them.
pub fn load_file(graph: &mut Graph, path: &Path) -> OntologyResult<usize> {
    let format = source_format(path).ok_or_else(|| {
        OntologyError::UnsupportedFormat(path.display().to_string())
    })?;
    let file = File::open(path)?;
    let triples = rdf::parse(file, format, graph.namespaces())?;
    Ok(graph.extend(triples))
}

fn collect_sources(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) -> OntologyResult<()> {
    if depth > MAX_DEPTH {
        tracing::warn!("ontology directory nesting exceeds {MAX_DEPTH}: {}", dir.display());
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_sources(&path, depth + 1, out)?;
        } else if source_format(&path).is_some() {
            out.push(path);
        }
    }
    Ok(())
}

/// Recursively loads every ontology source under `base_dir` into `graph`.
///
/// Files are visited in sorted path order so repeated loads produce the same report.
pub fn load_dir(graph: &mut Graph, base_dir: &Path) -> LoadReport {
    let mut report = LoadReport::default();
    let mut sources = Vec::new();
    if let Err(e) = collect_sources(base_dir, 0, &mut sources) {
        tracing::warn!("failed to scan ontology directory {}: {}", base_dir.display(), e);
        report.skipped.push(SkippedSource {
            path: base_dir.to_path_buf(),
            error: e,
        });
        return report;
    }
    sources.sort();

    for path in sources {
        let shown = path.strip_prefix(base_dir).unwrap_or(&path).display().to_string();
        match load_file(graph, &path) {
            Ok(added) => {
                tracing::info!("loaded {} ({} triples)", shown, added);
                report.loaded.push((path, added));
            }
            Err(e) => {
                tracing::warn!("failed to load {}: {}", shown, e);
                report.skipped.push(SkippedSource { path, error: e });
            }
        }
    }
    report
}
