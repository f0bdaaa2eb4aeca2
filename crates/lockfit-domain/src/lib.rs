#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod distribution;
pub mod environment;
pub mod lockfile;
pub mod tags;

pub use distribution::{is_universal_wheel, DistributionKind, SourceFormat, WheelFilename};
pub use environment::{
    parse_interpreter_version, presets, Environment, EnvironmentError, EnvironmentSpec,
};
pub use lockfile::{
    canonicalize_package_name, discover_lock, load_lock, parse_poetry_lock, parse_pylock,
    parse_uv_lock, DependencyEdge, Distribution, LoadError, Lock, LockFormat, LockMetadata,
    Package, SourceRef,
};
pub use pep440_rs::Version;
pub use tags::{Implementation, Tag, TagParseError, TagTable};
