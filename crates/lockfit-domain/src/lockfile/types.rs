use std::fmt;

use serde::Serialize;

/// The tool that wrote a lock document; each has its own schema family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockFormat {
    Poetry,
    Uv,
    /// PEP 751 `pylock.toml`, optionally named `pylock.<name>.toml`.
    Pylock,
}

impl LockFormat {
    pub const POETRY_FILENAME: &'static str = "poetry.lock";
    pub const UV_FILENAME: &'static str = "uv.lock";
    pub const PYLOCK_FILENAME: &'static str = "pylock.toml";

    /// Schema major versions this crate knows how to read.
    pub fn supported_schema_majors(self) -> &'static [u64] {
        match self {
            Self::Poetry => &[2],
            Self::Uv | Self::Pylock => &[1],
        }
    }

    pub fn from_filename(filename: &str) -> Option<Self> {
        match filename {
            Self::POETRY_FILENAME => Some(Self::Poetry),
            Self::UV_FILENAME => Some(Self::Uv),
            _ if is_named_pylock(filename) => Some(Self::Pylock),
            _ => None,
        }
    }

    pub fn default_filename(self) -> &'static str {
        match self {
            Self::Poetry => Self::POETRY_FILENAME,
            Self::Uv => Self::UV_FILENAME,
            Self::Pylock => Self::PYLOCK_FILENAME,
        }
    }

    /// Shell-style pattern of the filenames this format is discovered under.
    pub fn filename_pattern(self) -> &'static str {
        match self {
            Self::Poetry | Self::Uv => self.default_filename(),
            Self::Pylock => "pylock.*toml",
        }
    }

    /// True when `filename` is a lock of this format.
    pub fn matches_filename(self, filename: &str) -> bool {
        Self::from_filename(filename) == Some(self)
    }
}

/// `pylock.toml` itself or `pylock.<name>.toml` with a non-empty name.
fn is_named_pylock(filename: &str) -> bool {
    if filename == LockFormat::PYLOCK_FILENAME {
        return true;
    }
    filename
        .strip_prefix("pylock.")
        .and_then(|rest| rest.strip_suffix(".toml"))
        .is_some_and(|name| !name.is_empty())
}

impl fmt::Display for LockFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poetry => f.write_str("poetry"),
            Self::Uv => f.write_str("uv"),
            Self::Pylock => f.write_str("pylock"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LockMetadata {
    pub format: LockFormat,
    pub schema_version: String,
    pub interpreter_constraint: Option<String>,
    pub content_hash: Option<String>,
}

impl LockMetadata {
    pub fn new(format: LockFormat, schema_version: impl Into<String>) -> Self {
        Self {
            format,
            schema_version: schema_version.into(),
            interpreter_constraint: None,
            content_hash: None,
        }
    }

    /// Leading numeric component of the schema version, if it has one.
    pub fn schema_major(&self) -> Option<u64> {
        self.schema_version
            .trim()
            .split('.')
            .next()
            .and_then(|major| major.parse().ok())
    }
}

/// One candidate artifact of a package.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Distribution {
    pub filename: String,
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Distribution {
    pub fn new(filename: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            fingerprint: fingerprint.into(),
            url: None,
            size: None,
        }
    }
}

/// Where a package comes from when it is not the default index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    pub kind: String,
    pub url: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    pub name: String,
    pub constraint: Option<String>,
    pub optional: bool,
    pub interpreter_constraint: Option<String>,
    pub marker: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub category: String,
    pub optional: bool,
    pub interpreter_constraint: Option<String>,
    pub distributions: Vec<Distribution>,
    pub source: Option<SourceRef>,
    pub dependencies: Vec<DependencyEdge>,
}

impl Package {
    pub const DEFAULT_CATEGORY: &'static str = "main";

    pub fn new(name: &str, version: impl Into<String>) -> Self {
        Self {
            name: canonicalize_package_name(name),
            version: version.into(),
            category: Self::DEFAULT_CATEGORY.to_string(),
            optional: false,
            interpreter_constraint: None,
            distributions: Vec::new(),
            source: None,
            dependencies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_interpreter_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.interpreter_constraint = Some(constraint.into());
        self
    }

    #[must_use]
    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distributions.push(distribution);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = Some(source);
        self
    }

    /// URL of the package's source override, if any.
    pub fn source_url(&self) -> Option<&str> {
        self.source.as_ref().and_then(|source| source.url.as_deref())
    }

    /// `name==version`, the form used in diagnostics.
    pub fn pin(&self) -> String {
        format!("{}=={}", self.name, self.version)
    }
}

/// A loaded lock document. Packages keep the order of the document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Lock {
    pub metadata: LockMetadata,
    pub packages: Vec<Package>,
}

impl Lock {
    pub fn new(metadata: LockMetadata, packages: Vec<Package>) -> Self {
        Self { metadata, packages }
    }
}

/// PEP 503 normalization: lowercase, runs of `-`, `_` and `.` collapse to `-`.
pub fn canonicalize_package_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_separator = false;
    for ch in name.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            pending_separator = true;
            continue;
        }
        if pending_separator && !normalized.is_empty() {
            normalized.push('-');
        }
        pending_separator = false;
        normalized.push(ch.to_ascii_lowercase());
    }
    normalized
}
