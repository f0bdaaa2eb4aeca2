use lockfit_domain::LockFormat;
use serde::Serialize;

/// A constraint or marker expression that could not be read.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("[LF205] malformed constraint `{constraint}`: {reason}")]
pub struct MalformedConstraint {
    pub constraint: String,
    pub reason: String,
}

impl MalformedConstraint {
    pub fn new(constraint: &str, reason: impl Into<String>) -> Self {
        Self {
            constraint: constraint.to_string(),
            reason: reason.into(),
        }
    }
}

/// A package for which no artifact suits the target environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncompatiblePackage {
    pub name: String,
    pub version: String,
}

impl std::fmt::Display for IncompatiblePackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("[LF201] no target environment was supplied")]
    MissingEnvironment,
    #[error("[LF202] unsupported {format} lock schema version `{version}`")]
    UnsupportedSchemaVersion { version: String, format: LockFormat },
    #[error("[LF203] lock requires Python `{constraint}` but the target interpreter is {interpreter}")]
    IncompatibleLock {
        constraint: String,
        interpreter: String,
    },
    #[error(
        "[LF204] could not find a distribution for {name}=={version} that is compatible with the target environment"
    )]
    IncompatibleDistribution { name: String, version: String },
    #[error("[LF204] {count} packages have no compatible distribution (first: {first})")]
    IncompatibleDistributions {
        first: IncompatiblePackage,
        count: usize,
    },
    #[error(transparent)]
    MalformedConstraint(#[from] MalformedConstraint),
}

impl ResolveError {
    /// True for outcomes caused by the lock/environment pairing rather than
    /// by a broken input.
    pub fn is_incompatibility(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleLock { .. }
                | Self::IncompatibleDistribution { .. }
                | Self::IncompatibleDistributions { .. }
        )
    }
}
