use lockfit_domain::{Distribution, Package};

/// Hooks for the routine outcomes of a resolution run.
///
/// All methods default to doing nothing.
pub trait ResolveObserver {
    /// `package` was dropped because `constraint` rejects the target interpreter.
    fn package_excluded(&self, _package: &Package, _constraint: &str) {}

    /// `distribution` was picked for `package`; `rank` is its tag-table
    /// position, `None` for the source-archive fallback.
    fn distribution_chosen(
        &self,
        _package: &Package,
        _distribution: &Distribution,
        _rank: Option<usize>,
    ) {
    }

    /// No distribution of `package` suits the target.
    fn distribution_missing(&self, _package: &Package) {}
}

/// Reports every event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl ResolveObserver for TracingObserver {
    fn package_excluded(&self, package: &Package, constraint: &str) {
        tracing::debug!(
            package = %package.pin(),
            constraint,
            "package is not compatible with the target interpreter"
        );
    }

    fn distribution_chosen(
        &self,
        package: &Package,
        distribution: &Distribution,
        rank: Option<usize>,
    ) {
        tracing::debug!(
            package = %package.pin(),
            filename = %distribution.filename,
            ?rank,
            "found compatible distribution"
        );
    }

    fn distribution_missing(&self, package: &Package) {
        tracing::debug!(package = %package.pin(), "no compatible distribution");
    }
}
