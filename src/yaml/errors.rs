use thiserror::Error;

#[derive(Error, Debug)]
pub enum YamlError {
    #[error("invalid YAML syntax at line {line}: {message}")]
    InvalidYamlSyntax { line: usize, message: String },

    #[error("node not found: {path}")]
    NodeNotFound { path: String },

    #[error("unexpected node shape: {message}")]
    Shape { message: String },

    #[error("duplicate key: {key}")]
    DuplicateKey { key: String },

    #[error("failed to lay out YAML: {message}")]
    Emit { message: String },

    #[error("unsupported YAML construct: {message}")]
    Unsupported { message: String },
}

impl YamlError {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        YamlError::Shape {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        YamlError::NodeNotFound { path: path.into() }
    }

    pub(crate) fn emit(message: impl Into<String>) -> Self {
        YamlError::Emit {
            message: message.into(),
        }
    }
}
