use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::ports::PortError;

/// External classification of a [`PackError`], mirrored by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Invalid,
    Conflict,
    NotFound,
    Unprocessable,
    Internal,
}

#[derive(Debug, Error)]
pub enum PackError {
    #[error("url invalid for entry {0:?}")]
    InvalidUrl(String),

    #[error("organization dependency does not exist for id {0:?}")]
    OrgNotFound(Uuid),

    #[error("stack not found for id {0:?}")]
    StackNotFound(Uuid),

    #[error("package failed validation: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("{context}: {source}")]
    Port {
        context: &'static str,
        source: PortError,
    },
}

impl PackError {
    pub(crate) fn port(context: &'static str, source: PortError) -> Self {
        PackError::Port { context, source }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            PackError::InvalidUrl(_) => ErrorCode::Invalid,
            PackError::OrgNotFound(_) => ErrorCode::Conflict,
            PackError::StackNotFound(_) => ErrorCode::NotFound,
            PackError::Validation(_) => ErrorCode::Unprocessable,
            PackError::Apply(err) if err.is_dependency_failure() => ErrorCode::Unprocessable,
            PackError::Apply(_) => ErrorCode::Internal,
            PackError::Port { .. } => ErrorCode::Internal,
        }
    }
}

/// Issues collected while validating a package document. A package with
/// issues can still be dry-run; resources without a resolvable name are
/// skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub issues: Vec<ValidationIssue>,
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Kind label of the offending object, when attributable.
    pub kind: Option<&'static str>,
    /// Package-name of the offending object, when it has one.
    pub name: Option<String>,
    pub msg: String,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub(crate) fn push(&mut self, kind: Option<&'static str>, name: Option<&str>, msg: impl Into<String>) {
        self.issues.push(ValidationIssue {
            kind,
            name: name.map(str::to_string),
            msg: msg.into(),
        });
    }

    pub(crate) fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            if let Some(kind) = issue.kind {
                write!(f, "{kind} ")?;
            }
            if let Some(name) = &issue.name {
                write!(f, "{name:?} ")?;
            }
            f.write_str(&issue.msg)?;
        }
        Ok(())
    }
}

/// Aggregate of per-resource failures from one apply tier (or from reference
/// resolution). One group per resource kind, one entry per failed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyError {
    pub groups: Vec<FailureGroup>,
}

impl std::error::Error for ApplyError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureGroup {
    pub resource_type: String,
    /// What the group was attempting, e.g. "failed to create".
    pub action: String,
    pub failures: Vec<ApplyFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    pub name: String,
    pub msg: String,
}

impl ApplyError {
    pub(crate) fn is_dependency_failure(&self) -> bool {
        self.groups
            .iter()
            .all(|g| g.action == error_strings::FIND_DEPENDENCY)
    }

    /// Total failed resources across all groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.failures.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(
                f,
                "resource_type={:?} err={:?}",
                group.resource_type, group.action
            )?;
            for failure in &group.failures {
                write!(f, "\n\tname={:?} err_msg={:?}", failure.name, failure.msg)?;
            }
        }
        Ok(())
    }
}

pub(crate) mod error_strings {
    pub const FAILED_TO_CREATE: &str = "failed to create";
    pub const FIND_DEPENDENCY: &str = "failed to find dependency";
}
