use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use cds_core::{
    build_registry, load_graph, read_rule_file, ConceptResolver, Engine, InMemoryAuditLog,
    Patient, Settings,
};

#[derive(Parser)]
#[command(name = "cds")]
#[command(about = "Clinical decision-support CLI")]
struct Cli {
    /// Directory of ontology sources
    #[arg(long, global = true, default_value = "./ontologies")]
    ontology_dir: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a patient record (JSON) and print the result as JSON
    Evaluate {
        /// Patient record file
        patient: PathBuf,
        /// Configuration file (JSON or YAML) merged over the defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Extension rule file added to the built-in rules
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Evaluation date (YYYY-MM-DD), today if omitted
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Clinician recorded in the audit trail
        #[arg(long)]
        clinician: Option<String>,
    },
    /// Resolve a CURIE to its canonical concept
    Resolve { curie: String },
    /// List every transitive subclass of a concept
    Children { curie: String },
    /// Run a SELECT query against the graph
    Query { text: String },
    /// Show a concept's label and synonyms
    Label { curie: String },
    /// Parse an extension rule file and list its rules
    CheckRules { file: PathBuf },
}

fn resolver(ontology_dir: &Path) -> ConceptResolver {
    ConceptResolver::new(Arc::new(load_graph(ontology_dir)))
}

fn evaluate(
    ontology_dir: &Path,
    patient: &Path,
    config: Option<&Path>,
    rules: Option<&Path>,
    as_of: Option<NaiveDate>,
    clinician: Option<&str>,
) -> Result<String, Box<dyn std::error::Error>> {
    let patient: Patient = serde_json::from_str(&std::fs::read_to_string(patient)?)?;
    let engine = Engine::new(
        Settings::load(config)?,
        Arc::new(load_graph(ontology_dir)),
        Arc::new(build_registry(rules)?),
        Arc::new(InMemoryAuditLog::new()),
    );
    let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
    let output = engine.evaluate(&patient, clinician, as_of);
    Ok(serde_json::to_string_pretty(&output)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("cds_core=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ontology_dir = cli.ontology_dir;

    match cli.command {
        Some(Commands::Evaluate {
            patient,
            config,
            rules,
            as_of,
            clinician,
        }) => match evaluate(
            &ontology_dir,
            &patient,
            config.as_deref(),
            rules.as_deref(),
            as_of,
            clinician.as_deref(),
        ) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error evaluating {}: {}", patient.display(), e),
        },
        Some(Commands::Resolve { curie }) => {
            let resolver = resolver(&ontology_dir);
            match resolver.resolve(&curie) {
                Ok(canonical) => {
                    println!("{}", canonical);
                    if let Ok(equivalents) = resolver.equivalent_set(&curie) {
                        for concept in equivalents.iter().filter(|c| **c != canonical) {
                            println!("  = {}", concept);
                        }
                    }
                }
                Err(e) => eprintln!("Error resolving {}: {}", curie, e),
            }
        }
        Some(Commands::Children { curie }) => match resolver(&ontology_dir).query_children(&curie) {
            Ok(children) if children.is_empty() => println!("No subclasses of {}.", curie),
            Ok(children) => children.iter().for_each(|c| println!("{}", c)),
            Err(e) => eprintln!("Error listing children of {}: {}", curie, e),
        },
        Some(Commands::Query { text }) => match resolver(&ontology_dir).run_query(&text) {
            Ok(rows) => rows.iter().for_each(|c| println!("{}", c)),
            Err(e) => eprintln!("Error running query: {}", e),
        },
        Some(Commands::Label { curie }) => {
            let resolver = resolver(&ontology_dir);
            match resolver.node(&curie) {
                Ok(node) => {
                    println!("{}", resolver.label(&node));
                    for synonym in resolver.synonyms(&node) {
                        println!("  ~ {}", synonym);
                    }
                }
                Err(e) => eprintln!("Error looking up {}: {}", curie, e),
            }
        }
        Some(Commands::CheckRules { file }) => match read_rule_file(&file) {
            Ok(rules) => {
                println!("{} rules in {}", rules.len(), file.display());
                for rule in rules {
                    println!(
                        "ID: {}, Intervention: {}, Conditions: {}",
                        rule.rule_id,
                        rule.intervention,
                        rule.conditions.len()
                    );
                }
            }
            Err(e) => eprintln!("Error reading rules: {}", e),
        },
        None => {
            println!("Use 'cds --help' for commands");
        }
    }

    Ok(())
}
