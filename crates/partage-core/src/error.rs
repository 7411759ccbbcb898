//! Unified error system for Partage core
//!
//! A single, flat error enum instead of a per-crate error hierarchy. Each
//! variant carries a human-readable message; callers that need to branch on
//! kind use `category()` rather than matching on variants directly, so new
//! variants don't become a breaking match everywhere.

use serde::{Deserialize, Serialize};

/// Unified error type for all Partage operations.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum PartageError {
    /// Invalid input or configuration.
    #[error("invalid: {message}")]
    Invalid { message: String },

    /// A referenced identity has not been created on this device yet.
    #[error("identity missing: {message}")]
    IdentityMissing { message: String },

    /// The group does not exist locally.
    #[error("group not found: {message}")]
    GroupNotFound { message: String },

    /// A requested group-key version is not held locally.
    #[error("key not found: {message}")]
    KeyNotFound { message: String },

    /// Key rotation was asked to retain a key version that is missing.
    #[error("missing previous key: {message}")]
    MissingPreviousKey { message: String },

    /// A resource (entry, member, invitation, ...) was not found.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// AEAD authentication failed for every known key version.
    #[error("decryption failed: {message}")]
    DecryptionFailed { message: String },

    /// A cryptographic signature failed verification.
    #[error("signature invalid: {message}")]
    SignatureInvalid { message: String },

    /// A generic cryptographic operation failed.
    #[error("crypto error: {message}")]
    Crypto { message: String },

    /// A member event violated a lifecycle validity rule and was skipped.
    #[error("invalid member event: {message}")]
    InvalidMemberEvent { message: String },

    /// The version chain for an entry contains a cycle or a dangling link.
    #[error("conflicting chain: {message}")]
    ConflictingChain { message: String },

    /// The relay is unreachable; the caller should queue the operation.
    #[error("network unavailable: {message}")]
    NetworkUnavailable { message: String },

    /// The relay rejected a request.
    #[error("relay error: {message}")]
    RelayError { message: String },

    /// Serialization or deserialization failed.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// A persistence operation failed.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Local storage is corrupt beyond recovery; the session must abort.
    #[error("fatal: {message}")]
    Fatal { message: String },

    /// Anything else.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PartageError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
    pub fn identity_missing(message: impl Into<String>) -> Self {
        Self::IdentityMissing { message: message.into() }
    }
    pub fn group_not_found(message: impl Into<String>) -> Self {
        Self::GroupNotFound { message: message.into() }
    }
    pub fn key_not_found(message: impl Into<String>) -> Self {
        Self::KeyNotFound { message: message.into() }
    }
    pub fn missing_previous_key(message: impl Into<String>) -> Self {
        Self::MissingPreviousKey { message: message.into() }
    }
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }
    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::DecryptionFailed { message: message.into() }
    }
    pub fn signature_invalid(message: impl Into<String>) -> Self {
        Self::SignatureInvalid { message: message.into() }
    }
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto { message: message.into() }
    }
    pub fn invalid_member_event(message: impl Into<String>) -> Self {
        Self::InvalidMemberEvent { message: message.into() }
    }
    pub fn conflicting_chain(message: impl Into<String>) -> Self {
        Self::ConflictingChain { message: message.into() }
    }
    pub fn network_unavailable(message: impl Into<String>) -> Self {
        Self::NetworkUnavailable { message: message.into() }
    }
    pub fn relay_error(message: impl Into<String>) -> Self {
        Self::RelayError { message: message.into() }
    }
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal { message: message.into() }
    }
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether the caller should enqueue a pending op and retry rather than
    /// surface the failure, per the propagation policy in the error design.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable { .. } | Self::RelayError { .. } | Self::DecryptionFailed { .. }
        )
    }

    /// Coarse category, stable across new variants being added.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "invalid",
            Self::IdentityMissing { .. } => "identity_missing",
            Self::GroupNotFound { .. } => "group_not_found",
            Self::KeyNotFound { .. } => "key_not_found",
            Self::MissingPreviousKey { .. } => "missing_previous_key",
            Self::NotFound { .. } => "not_found",
            Self::DecryptionFailed { .. } => "decryption_failed",
            Self::SignatureInvalid { .. } => "signature_invalid",
            Self::Crypto { .. } => "crypto",
            Self::InvalidMemberEvent { .. } => "invalid_member_event",
            Self::ConflictingChain { .. } => "conflicting_chain",
            Self::NetworkUnavailable { .. } => "network_unavailable",
            Self::RelayError { .. } => "relay_error",
            Self::Serialization { .. } => "serialization",
            Self::Storage { .. } => "storage",
            Self::Fatal { .. } => "fatal",
            Self::Internal { .. } => "internal",
        }
    }

    /// Exit code for CLI/headless drivers, per the process exit contract:
    /// success=0, user-error=1, crypto/verification failure=2,
    /// network/relay failure=3, storage corruption=4.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Invalid { .. }
            | Self::IdentityMissing { .. }
            | Self::GroupNotFound { .. }
            | Self::NotFound { .. }
            | Self::InvalidMemberEvent { .. }
            | Self::ConflictingChain { .. } => 1,
            Self::SignatureInvalid { .. } | Self::Crypto { .. } | Self::DecryptionFailed { .. } => 2,
            Self::NetworkUnavailable { .. } | Self::RelayError { .. } => 3,
            Self::KeyNotFound { .. } | Self::MissingPreviousKey { .. } | Self::Storage { .. } | Self::Fatal { .. } => 4,
            Self::Serialization { .. } | Self::Internal { .. } => 1,
        }
    }
}

/// Standard result type for Partage operations.
pub type Result<T> = std::result::Result<T, PartageError>;

impl From<serde_json::Error> for PartageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<bincode::Error> for PartageError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for PartageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::storage(err.to_string()),
        }
    }
}
