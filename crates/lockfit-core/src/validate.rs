use lockfit_domain::{Environment, Lock};

use crate::error::ResolveError;
use crate::filter::{self, FilteredPackages};
use crate::observer::{ResolveObserver, TracingObserver};
use crate::predicate::{PythonVersionPredicate, VersionPredicate};

/// A resolution session over one lock.
///
/// The target environment, predicate and observer are attached before
/// [`LockResolver::validate`] is called; the validated lock is the only way
/// into filtering and selection.
pub struct LockResolver<'a> {
    lock: &'a Lock,
    environment: Option<&'a Environment>,
    predicate: &'a dyn VersionPredicate,
    observer: &'a dyn ResolveObserver,
}

impl<'a> LockResolver<'a> {
    pub fn new(lock: &'a Lock) -> Self {
        Self {
            lock,
            environment: None,
            predicate: &PythonVersionPredicate,
            observer: &TracingObserver,
        }
    }

    /// Set the target environment, replacing any earlier one.
    #[must_use]
    pub fn with_environment(mut self, environment: &'a Environment) -> Self {
        if self.environment.is_some() {
            tracing::warn!("target environment was already set and will be replaced");
        }
        self.environment = Some(environment);
        self
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: &'a dyn VersionPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: &'a dyn ResolveObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Check the lock's schema version and its interpreter constraint.
    pub fn validate(&self) -> Result<ValidatedLock<'a>, ResolveError> {
        let environment = self.environment.ok_or(ResolveError::MissingEnvironment)?;
        let metadata = &self.lock.metadata;

        let supported = metadata
            .schema_major()
            .is_some_and(|major| metadata.format.supported_schema_majors().contains(&major));
        if !supported {
            return Err(ResolveError::UnsupportedSchemaVersion {
                version: metadata.schema_version.clone(),
                format: metadata.format,
            });
        }

        if let Some(constraint) = metadata.interpreter_constraint.as_deref() {
            let interpreter = environment.interpreter_version();
            if !self.predicate.admits(constraint, interpreter)? {
                return Err(ResolveError::IncompatibleLock {
                    constraint: constraint.to_string(),
                    interpreter: interpreter.to_string(),
                });
            }
        }

        tracing::debug!(
            format = %metadata.format,
            schema = %metadata.schema_version,
            packages = self.lock.packages.len(),
            "lock validated"
        );
        Ok(ValidatedLock {
            lock: self.lock,
            environment,
            predicate: self.predicate,
            observer: self.observer,
        })
    }
}

/// A lock that passed validation against one environment.
pub struct ValidatedLock<'a> {
    lock: &'a Lock,
    environment: &'a Environment,
    predicate: &'a dyn VersionPredicate,
    observer: &'a dyn ResolveObserver,
}

impl<'a> ValidatedLock<'a> {
    pub fn environment(&self) -> &'a Environment {
        self.environment
    }

    /// Drop the packages whose own interpreter constraint rejects the target.
    pub fn filter(&self) -> Result<FilteredPackages<'a>, ResolveError> {
        filter::filter_packages(self.lock, self.environment, self.predicate, self.observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{env_311, poetry_lock, uv_lock};
    use lockfit_domain::{LockFormat, LockMetadata, Package};

    #[test]
    fn validation_needs_an_environment() {
        let lock = poetry_lock("2.0", Vec::new());
        let err = LockResolver::new(&lock).validate().err();
        assert_eq!(err, Some(ResolveError::MissingEnvironment));
    }

    #[test]
    fn missing_environment_is_reported_before_the_lock_is_read() {
        let mut lock = poetry_lock(
            "1.0",
            vec![Package::new("broken", "1.0").with_interpreter_constraint("not a version")],
        );
        lock.metadata.interpreter_constraint = Some(">>3".into());
        let err = LockResolver::new(&lock).validate().err();
        assert_eq!(err, Some(ResolveError::MissingEnvironment));
    }

    #[test]
    fn unsupported_schema_major_is_rejected() {
        let env = env_311();
        for version in ["1.0", "1.1", "3.0", "two", ""] {
            let lock = poetry_lock(version, vec![Package::new("a", "1.0")]);
            let err = LockResolver::new(&lock).with_environment(&env).validate().err();
            assert_eq!(
                err,
                Some(ResolveError::UnsupportedSchemaVersion {
                    version: version.to_string(),
                    format: LockFormat::Poetry,
                }),
                "{version}"
            );
        }
        for version in ["2.0", "2.1"] {
            let lock = poetry_lock(version, Vec::new());
            assert!(LockResolver::new(&lock).with_environment(&env).validate().is_ok());
        }
    }

    #[test]
    fn uv_locks_use_their_own_schema_family() {
        let env = env_311();
        assert!(LockResolver::new(&uv_lock("1")).with_environment(&env).validate().is_ok());
        assert!(matches!(
            LockResolver::new(&uv_lock("2")).with_environment(&env).validate(),
            Err(ResolveError::UnsupportedSchemaVersion { .. })
        ));
    }

    #[test]
    fn lock_interpreter_constraint_is_checked() {
        let env = env_311();
        let mut lock = poetry_lock("2.0", Vec::new());
        lock.metadata.interpreter_constraint = Some(">=3.12".into());
        let err = LockResolver::new(&lock).with_environment(&env).validate().err();
        assert!(matches!(err, Some(ResolveError::IncompatibleLock { .. })));

        lock.metadata.interpreter_constraint = Some("^3.10".into());
        assert!(LockResolver::new(&lock).with_environment(&env).validate().is_ok());

        lock.metadata.interpreter_constraint = Some("not a version".into());
        let err = LockResolver::new(&lock).with_environment(&env).validate().err();
        assert!(matches!(err, Some(ResolveError::MalformedConstraint(_))));
    }

    #[test]
    fn missing_constraint_admits_any_interpreter() {
        let env = env_311();
        let lock = Lock::new(LockMetadata::new(LockFormat::Poetry, "2.0"), Vec::new());
        let validated = LockResolver::new(&lock).with_environment(&env).validate();
        assert!(validated.is_ok());
    }

    #[test]
    fn last_environment_wins() {
        let first = crate::tests::environment("3.8.10", &["py3-none-any"]);
        let second = env_311();
        let mut lock = poetry_lock("2.0", Vec::new());
        lock.metadata.interpreter_constraint = Some(">=3.11".into());
        let validated = LockResolver::new(&lock)
            .with_environment(&first)
            .with_environment(&second)
            .validate();
        assert!(validated.is_ok());
    }
}
