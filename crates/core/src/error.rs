/// Errors raised while assembling the engine: configuration, rule sets, tenants and direct
/// concept lookups. Rule evaluation itself never produces one of these; evaluation gaps are
/// folded into "unmet" reasons instead.
#[derive(Debug, thiserror::Error)]
pub enum CdsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to read configuration file: {0}")]
    ConfigRead(std::io::Error),
    #[error("failed to parse JSON configuration: {0}")]
    ConfigParse(serde_json::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to read rule file: {0}")]
    RuleFileRead(std::io::Error),
    #[error("failed to parse rule file {path}: {message}")]
    RuleFileParse { path: String, message: String },
    #[error("duplicate rule id: {0}")]
    DuplicateRule(String),
    #[error("ontology error: {0}")]
    Ontology(#[from] cds_ontology::OntologyError),
    #[error("invalid text: {0}")]
    Text(#[from] cds_types::TextError),
}

pub type CdsResult<T> = std::result::Result<T, CdsError>;
