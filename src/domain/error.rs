use thiserror::Error;

use super::transaction::TransactionError;
use super::auth::TokenError;

/// Coarse error classification exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    Transaction,
    Store,
    Internal,
}

/// Store-level failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl StoreError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }
}

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Carries no detail on purpose: unknown account and wrong password look the same.
    #[error("Authentication failed")]
    Authentication,

    #[error("Forbidden: {message}")]
    Authorization { message: String },

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<DomainError>,
    },

    #[error("{source} (rollback failed: {rollback})")]
    RollbackFailed {
        #[source]
        source: Box<DomainError>,
        rollback: TransactionError,
    },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wrap the error with the label of the stage that produced it
    pub fn at(self, stage: &'static str) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Classify the error, looking through stage labels
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Authentication => ErrorKind::Authentication,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::Transaction(_) => ErrorKind::Transaction,
            Self::Store(StoreError::Transaction(_)) => ErrorKind::Transaction,
            Self::Store(_) => ErrorKind::Store,
            Self::Token(e) if e.is_rejection() => ErrorKind::Authentication,
            Self::Token(_) => ErrorKind::Internal,
            Self::Configuration { .. } | Self::Internal { .. } => ErrorKind::Internal,
            Self::Stage { source, .. } => source.kind(),
            Self::RollbackFailed { .. } => ErrorKind::Transaction,
        }
    }

    /// The innermost error, with all stage labels removed
    pub fn root(&self) -> &DomainError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Extension for attaching a stage label to any error convertible into `DomainError`
pub trait StageExt<T> {
    fn stage(self, stage: &'static str) -> Result<T, DomainError>;
}

impl<T, E: Into<DomainError>> StageExt<T> for Result<T, E> {
    fn stage(self, stage: &'static str) -> Result<T, DomainError> {
        self.map_err(|e| e.into().at(stage))
    }
}
