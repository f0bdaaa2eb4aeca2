use std::str::FromStr;

use pep440_rs::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::tags::{Implementation, Tag, TagTable};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("invalid interpreter version `{version}`: {reason}")]
    InvalidVersion { version: String, reason: String },
    #[error("interpreter version `{0}` needs at least a major and minor component")]
    IncompleteVersion(String),
    #[error("unknown environment preset `{0}`")]
    UnknownPreset(String),
}

/// The target that will install the resolved artifacts.
///
/// Built once per run and only read afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment {
    interpreter_version: Version,
    tags: TagTable,
}

impl Environment {
    pub fn new(interpreter_version: Version, tags: TagTable) -> Self {
        Self {
            interpreter_version,
            tags,
        }
    }

    /// Environment whose tag table is generated for `implementation` on `platforms`.
    pub fn for_interpreter(
        implementation: Implementation,
        interpreter_version: Version,
        platforms: &[String],
    ) -> Result<Self, EnvironmentError> {
        let python = major_minor(&interpreter_version)?;
        let tags = TagTable::for_interpreter(implementation, python, platforms);
        Ok(Self::new(interpreter_version, tags))
    }

    pub fn interpreter_version(&self) -> &Version {
        &self.interpreter_version
    }

    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    /// Stable digest of the interpreter version and the ordered tag table.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.interpreter_version.to_string().as_bytes());
        hasher.update(b"\n");
        for tag in self.tags.iter() {
            hasher.update(tag.to_string().as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Serialized description of an environment, as read from JSON files.
///
/// When `tags` is present it is used verbatim; otherwise the table is
/// generated from the implementation and platform list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentSpec {
    pub python_version: String,
    #[serde(default)]
    pub implementation: Implementation,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

impl EnvironmentSpec {
    pub fn into_environment(self) -> Result<Environment, EnvironmentError> {
        let version = parse_interpreter_version(&self.python_version)?;
        match self.tags {
            Some(tags) => {
                major_minor(&version)?;
                Ok(Environment::new(version, TagTable::new(tags)))
            }
            None => Environment::for_interpreter(self.implementation, version, &self.platforms),
        }
    }
}

pub fn parse_interpreter_version(raw: &str) -> Result<Version, EnvironmentError> {
    Version::from_str(raw.trim()).map_err(|err| EnvironmentError::InvalidVersion {
        version: raw.to_string(),
        reason: err.to_string(),
    })
}

fn major_minor(version: &Version) -> Result<(u64, u64), EnvironmentError> {
    match version.release() {
        [major, minor, ..] => Ok((*major, *minor)),
        _ => Err(EnvironmentError::IncompleteVersion(version.to_string())),
    }
}

/// Platform lists for common build images.
pub mod presets {
    use super::EnvironmentError;

    /// Platform tags a `manylinux_2_{glibc_minor}` system on `arch` can run,
    /// newest first, with the legacy `manylinux2014`/`2010`/`1` aliases in
    /// their glibc positions and plain `linux_{arch}` last.
    pub fn manylinux(glibc_minor: u32, arch: &str) -> Vec<String> {
        let legacy_aliases: &[(u32, &str)] = match arch {
            "x86_64" | "i686" => &[
                (17, "manylinux2014"),
                (12, "manylinux2010"),
                (5, "manylinux1"),
            ],
            "aarch64" | "armv7l" | "ppc64" | "ppc64le" | "s390x" => &[(17, "manylinux2014")],
            _ => &[],
        };
        let mut platforms = Vec::new();
        for minor in (5..=glibc_minor).rev() {
            platforms.push(format!("manylinux_2_{minor}_{arch}"));
            for (alias_minor, alias) in legacy_aliases {
                if *alias_minor == minor {
                    platforms.push(format!("{alias}_{arch}"));
                }
            }
        }
        platforms.push(format!("linux_{arch}"));
        platforms
    }

    /// Resolve a preset name such as `manylinux_2_36_x86_64`, or `any` for a
    /// pure-Python target.
    pub fn platforms_for(name: &str) -> Result<Vec<String>, EnvironmentError> {
        let unknown = || EnvironmentError::UnknownPreset(name.to_string());
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        if normalized == "any" {
            return Ok(Vec::new());
        }
        let rest = normalized.strip_prefix("manylinux_2_").ok_or_else(unknown)?;
        let (minor, arch) = rest.split_once('_').ok_or_else(unknown)?;
        let minor = minor.parse::<u32>().map_err(|_| unknown())?;
        if arch.is_empty() || minor < 5 {
            return Err(unknown());
        }
        Ok(manylinux(minor, arch))
    }
}
