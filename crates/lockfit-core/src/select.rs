use std::fmt;

use lockfit_domain::{
    is_universal_wheel, Distribution, DistributionKind, Environment, Package, SourceFormat,
    TagTable,
};
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{IncompatiblePackage, ResolveError};
use crate::observer::ResolveObserver;

/// The artifact chosen for one package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedRequirement {
    pub name: String,
    pub version: String,
    pub fingerprint: String,
    /// Index or origin URL of the package; `None` means the default index.
    pub index_url: Option<String>,
    pub filename: String,
    /// Tag-table position of the chosen wheel; `None` for a source archive.
    pub tag_rank: Option<usize>,
}

impl fmt::Display for ResolvedRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// Outcome of selecting distributions for every filtered package.
///
/// Every package is evaluated; failures are kept next to the successes so
/// callers can choose between reporting all of them and failing outright
/// with [`Selection::into_result`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    resolved: Vec<ResolvedRequirement>,
    incompatible: Vec<IncompatiblePackage>,
}

impl Selection {
    pub fn resolved(&self) -> &[ResolvedRequirement] {
        &self.resolved
    }

    pub fn incompatible(&self) -> &[IncompatiblePackage] {
        &self.incompatible
    }

    pub fn is_complete(&self) -> bool {
        self.incompatible.is_empty()
    }

    /// The resolved requirements, or an error naming the first incompatible
    /// package in lock order.
    pub fn into_result(self) -> Result<Vec<ResolvedRequirement>, ResolveError> {
        let count = self.incompatible.len();
        match self.incompatible.into_iter().next() {
            None => Ok(self.resolved),
            Some(first) if count == 1 => Err(ResolveError::IncompatibleDistribution {
                name: first.name,
                version: first.version,
            }),
            Some(first) => Err(ResolveError::IncompatibleDistributions { first, count }),
        }
    }

    /// SHA-256 over the resolved requirements in order; equal selections
    /// always produce the same digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for requirement in &self.resolved {
            for field in [
                requirement.name.as_str(),
                requirement.version.as_str(),
                requirement.fingerprint.as_str(),
                requirement.index_url.as_deref().unwrap_or(""),
                requirement.filename.as_str(),
            ] {
                hasher.update(field.as_bytes());
                hasher.update([0]);
            }
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

struct Choice<'a> {
    distribution: &'a Distribution,
    rank: Option<usize>,
}

pub(crate) fn select_distributions(
    packages: &[&Package],
    environment: &Environment,
    observer: &dyn ResolveObserver,
) -> Selection {
    let tags = environment.tags();
    let choices: Vec<Option<Choice<'_>>> = packages
        .par_iter()
        .map(|package| best_distribution(package, tags))
        .collect();

    let mut selection = Selection::default();
    for (package, choice) in packages.iter().zip(choices) {
        match choice {
            Some(choice) => {
                observer.distribution_chosen(package, choice.distribution, choice.rank);
                selection.resolved.push(ResolvedRequirement {
                    name: package.name.clone(),
                    version: package.version.clone(),
                    fingerprint: choice.distribution.fingerprint.clone(),
                    index_url: package.source_url().map(str::to_string),
                    filename: choice.distribution.filename.clone(),
                    tag_rank: choice.rank,
                });
            }
            None => {
                observer.distribution_missing(package);
                selection.incompatible.push(IncompatiblePackage {
                    name: package.name.clone(),
                    version: package.version.clone(),
                });
            }
        }
    }
    selection
}

/// The most specific wheel the environment can run, else the first `.tar.gz`
/// when the package publishes no platform-specific wheels.
fn best_distribution<'a>(package: &'a Package, tags: &TagTable) -> Option<Choice<'a>> {
    let mut best: Option<Choice<'a>> = None;
    let mut platform_specific = false;
    let mut fallback: Option<&'a Distribution> = None;

    for distribution in &package.distributions {
        match DistributionKind::from_filename(&distribution.filename) {
            DistributionKind::Wheel(wheel) => {
                if !is_universal_wheel(&distribution.filename) {
                    platform_specific = true;
                }
                let Some(rank) = wheel.and_then(|wheel| tags.best_rank(&wheel.tags)) else {
                    tracing::trace!(
                        filename = %distribution.filename,
                        "wheel does not match any tag"
                    );
                    continue;
                };
                tracing::trace!(filename = %distribution.filename, rank, "ranked wheel");
                // Strictly smaller only: ties keep the earlier file.
                if best
                    .as_ref()
                    .and_then(|choice| choice.rank)
                    .is_none_or(|current| rank < current)
                {
                    best = Some(Choice {
                        distribution,
                        rank: Some(rank),
                    });
                }
            }
            DistributionKind::Source(SourceFormat::TarGz) => {
                fallback = fallback.or(Some(distribution));
            }
            DistributionKind::Source(_) | DistributionKind::Other => {}
        }
    }

    best.or_else(|| {
        if platform_specific {
            return None;
        }
        fallback.map(|distribution| Choice {
            distribution,
            rank: None,
        })
    })
}
