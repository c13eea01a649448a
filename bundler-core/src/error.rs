use thiserror::Error;

use crate::provider::ProviderId;

/// Why a provider could not produce an observation.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} is unreachable: {source}")]
    Unreachable {
        provider: ProviderId,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} request failed with status {status}: {message}")]
    Status { provider: ProviderId, status: u16, message: String },

    #[error("{provider} returned an unexpected payload: {message}")]
    Malformed { provider: ProviderId, message: String },

    #[error("{provider} did not answer within {secs}s")]
    Timeout { provider: ProviderId, secs: u64 },

    #[error("{provider} rejected the credential: {reason}")]
    CredentialInvalid { provider: ProviderId, reason: String },

    #[error("{provider} endpoint URL is invalid: {message}")]
    InvalidUrl { provider: ProviderId, message: String },

    #[error("{provider} does not support {operation}")]
    Unsupported { provider: ProviderId, operation: &'static str },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderId {
        match self {
            ProviderError::Unreachable { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::Malformed { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::CredentialInvalid { provider, .. }
            | ProviderError::InvalidUrl { provider, .. }
            | ProviderError::Unsupported { provider, .. } => *provider,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory '{0}'")]
    Directory(std::path::PathBuf, #[source] std::io::Error),

    #[error("Corrupt stored row: {0}")]
    Corrupt(String),
}
