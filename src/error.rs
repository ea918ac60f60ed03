use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CatalogError {
    #[error("no function is registered under id {0}")]
    UnknownId(usize),
    #[error("no function is named '{0}'")]
    UnknownFunction(String),
    #[error("every function was disabled, nothing left to build trees from")]
    Empty,
}

#[derive(Error, Debug, PartialEq)]
pub enum TreeError {
    #[error("node {index} ({function}) has a child in its {slot} slot, which its arity forbids")]
    ArityMismatch {
        index: usize,
        function: &'static str,
        slot: &'static str,
    },
    #[error("node {index} ({function}) carries {found} literals, expected {expected}")]
    ParameterMismatch {
        index: usize,
        function: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("node {index} ({function}) has a {slot} leaf its function does not accept")]
    InvalidLeaf {
        index: usize,
        function: &'static str,
        slot: &'static str,
    },
    #[error("node {index} has no parent")]
    OrphanNode { index: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Error, Debug, PartialEq)]
pub enum RenderError {
    #[error("render was cancelled")]
    Cancelled,
    #[error("render worker panicked")]
    WorkerPanicked,
}
