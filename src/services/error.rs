//! Error taxonomy shared by every stage of the ingestion pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid video id `{0}`")]
    InvalidIdentifier(String),
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("caller does not own video `{0}`")]
    Forbidden(String),
    #[error("video `{0}` not found")]
    NotFound(String),
    #[error("unsupported media type `{0}`")]
    UnsupportedMediaType(String),
    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("local I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),
    #[error("probe failed: {0}")]
    ProbeFailure(String),
    #[error("remux failed: {0}")]
    RemuxFailure(String),
    #[error("publish failed: {0}")]
    PublishFailure(String),
    #[error("could not persist video record: {0}")]
    PersistFailure(#[from] sqlx::Error),
    #[error("could not sign reference: {0}")]
    SigningFailure(String),
    #[error("malformed reference `{0}`")]
    MalformedReference(String),
}

impl UploadError {
    /// Stable machine-readable classification, used in logs and responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "InvalidIdentifier",
            Self::Unauthenticated(_) => "Unauthenticated",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound(_) => "NotFound",
            Self::UnsupportedMediaType(_) => "UnsupportedMediaType",
            Self::PayloadTooLarge { .. } => "PayloadTooLarge",
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::IoFailure(_) => "IOFailure",
            Self::ProbeFailure(_) => "ProbeFailure",
            Self::RemuxFailure(_) => "RemuxFailure",
            Self::PublishFailure(_) => "PublishFailure",
            Self::PersistFailure(_) => "PersistFailure",
            Self::SigningFailure(_) => "SigningFailure",
            Self::MalformedReference(_) => "MalformedReference",
        }
    }
}

pub type UploadResult<T> = Result<T, UploadError>;
