//! Error taxonomy for codec operations.
//!
//! Only two conditions are fatal for a codec call. A verification mismatch
//! and an unmapped character are ordinary outcomes and never appear here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    /// The lattice source could not supply a usable lattice.
    #[error("Lattice unavailable: {id}: {reason}")]
    LatticeUnavailable { id: String, reason: String },

    /// A decode input violates the structural invariants of an encoded path.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CodecError {
    pub fn unavailable(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LatticeUnavailable {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn is_lattice_unavailable(&self) -> bool {
        matches!(self, Self::LatticeUnavailable { .. })
    }

    pub fn is_malformed_payload(&self) -> bool {
        matches!(self, Self::MalformedPayload(_))
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedPayload(format!("invalid JSON: {}", err))
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
