#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Compatibility validation and distribution selection for locked Python
//! dependencies.
//!
//! A run goes through three typed stages:
//!
//! ```text
//! LockResolver::validate -> ValidatedLock::filter -> FilteredPackages::select
//! ```
//!
//! [`resolve`] runs all of them with the default predicate and observer.

pub mod error;
pub mod filter;
pub mod observer;
pub mod predicate;
pub mod select;
pub mod validate;

use lockfit_domain::{Environment, Lock};

pub use error::{IncompatiblePackage, MalformedConstraint, ResolveError};
pub use filter::FilteredPackages;
pub use observer::{ResolveObserver, TracingObserver};
pub use predicate::{PythonVersionPredicate, VersionPredicate};
pub use select::{ResolvedRequirement, Selection};
pub use validate::{LockResolver, ValidatedLock};

/// Pick one distribution per installable package of `lock` for `environment`.
///
/// Fails on the first validation or constraint error, and when any package
/// has no compatible distribution.
pub fn resolve(
    lock: &Lock,
    environment: &Environment,
) -> Result<Vec<ResolvedRequirement>, ResolveError> {
    LockResolver::new(lock)
        .with_environment(environment)
        .validate()?
        .filter()?
        .select()
        .into_result()
}
