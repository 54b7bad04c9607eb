use thiserror::Error;

#[derive(Debug, Error)]
pub enum XtabError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("request parse error: {0}")]
    Request(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type XtabResult<T> = Result<T, XtabError>;
