use thiserror::Error;

/// Everything that can stop a manifest from becoming a Python program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("Unsupported opcode '{opcode}'.")]
    UnsupportedOpcode { opcode: String },

    #[error("Unsupported port expression: {shape}.")]
    UnsupportedPortExpression { shape: String },

    #[error("Invalid {enum_name} value '{raw}'.")]
    InvalidEnumValue { enum_name: &'static str, raw: String },

    #[error("No {enum_name} entry at index {index}.")]
    InvalidIndex { enum_name: &'static str, index: String },

    #[error("Internal invariant violated: {0}")]
    InternalInvariantViolation(String),
}

pub type CompileResult<T> = Result<T, CompileError>;

impl CompileError {
    pub fn malformed(message: impl Into<String>) -> Self {
        CompileError::MalformedManifest(message.into())
    }

    pub fn unsupported_opcode(opcode: impl Into<String>) -> Self {
        CompileError::UnsupportedOpcode {
            opcode: opcode.into(),
        }
    }

    pub fn invalid_enum(enum_name: &'static str, raw: impl Into<String>) -> Self {
        CompileError::InvalidEnumValue {
            enum_name,
            raw: raw.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        CompileError::InternalInvariantViolation(message.into())
    }
}
