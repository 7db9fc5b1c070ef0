use std::fmt;

use thiserror::Error;

/// Stable failure codes surfaced to API endpoints, UI and jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionDenied,
    NoSuchEntity,
    CantLoadEntityContent,
    NotItem,
    CantMergeSelf,
    FailedModify,
    FailedSave,
    TargetIsIncompatible,
    TargetNotEmpty,
    TargetIsRedirect,
    CantRedirect,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permissiondenied",
            Self::NoSuchEntity => "no-such-entity",
            Self::CantLoadEntityContent => "cant-load-entity-content",
            Self::NotItem => "not-item",
            Self::CantMergeSelf => "cant-merge-self",
            Self::FailedModify => "failed-modify",
            Self::FailedSave => "failed-save",
            Self::TargetIsIncompatible => "target-is-incompatible",
            Self::TargetNotEmpty => "target-not-empty",
            Self::TargetIsRedirect => "target-is-redirect",
            Self::CantRedirect => "cant-redirect",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a merge or redirect: a kind, a message and, when a
/// collaborator failed, the underlying cause.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxedCause>,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxedCause>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
