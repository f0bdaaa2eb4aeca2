use lockfit_domain::{Environment, Lock, Package};

use crate::error::ResolveError;
use crate::observer::ResolveObserver;
use crate::predicate::VersionPredicate;
use crate::select::{self, Selection};

/// Packages of a validated lock that the target interpreter may install, in
/// lock order.
pub struct FilteredPackages<'a> {
    packages: Vec<&'a Package>,
    environment: &'a Environment,
    observer: &'a dyn ResolveObserver,
}

impl<'a> FilteredPackages<'a> {
    pub fn packages(&self) -> &[&'a Package] {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Pick one distribution per package.
    pub fn select(&self) -> Selection {
        select::select_distributions(&self.packages, self.environment, self.observer)
    }
}

pub(crate) fn filter_packages<'a>(
    lock: &'a Lock,
    environment: &'a Environment,
    predicate: &dyn VersionPredicate,
    observer: &'a dyn ResolveObserver,
) -> Result<FilteredPackages<'a>, ResolveError> {
    let interpreter = environment.interpreter_version();
    let mut packages = Vec::with_capacity(lock.packages.len());
    for package in &lock.packages {
        if let Some(constraint) = package.interpreter_constraint.as_deref() {
            if !predicate.admits(constraint, interpreter)? {
                observer.package_excluded(package, constraint);
                continue;
            }
        }
        packages.push(package);
    }
    tracing::debug!(
        kept = packages.len(),
        excluded = lock.packages.len() - packages.len(),
        "filtered lock packages"
    );
    Ok(FilteredPackages {
        packages,
        environment,
        observer,
    })
}
