use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Errors raised while reading a compatibility tag.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TagParseError {
    #[error("tag `{0}` must have the form <interpreter>-<abi>-<platform>")]
    Shape(String),
    #[error("tag `{tag}` has an empty {part} component")]
    EmptyComponent { tag: String, part: &'static str },
}

/// One interpreter/ABI/platform triple, e.g. `cp311-cp311-manylinux_2_17_x86_64`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag {
    interpreter: String,
    abi: String,
    platform: String,
}

impl Tag {
    pub fn new(
        interpreter: impl Into<String>,
        abi: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            interpreter: interpreter.into().to_ascii_lowercase(),
            abi: abi.into().to_ascii_lowercase(),
            platform: platform.into().to_ascii_lowercase(),
        }
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn abi(&self) -> &str {
        &self.abi
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.interpreter, self.abi, self.platform)
    }
}

impl FromStr for Tag {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut parts = trimmed.splitn(3, '-');
        let (Some(interpreter), Some(abi), Some(platform)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(TagParseError::Shape(trimmed.to_string()));
        };
        if platform.contains('-') {
            return Err(TagParseError::Shape(trimmed.to_string()));
        }
        for (part, value) in [
            ("interpreter", interpreter),
            ("abi", abi),
            ("platform", platform),
        ] {
            if value.is_empty() {
                return Err(TagParseError::EmptyComponent {
                    tag: trimmed.to_string(),
                    part,
                });
            }
        }
        Ok(Self::new(interpreter, abi, platform))
    }
}

impl TryFrom<String> for Tag {
    type Error = TagParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.to_string()
    }
}

/// Python implementations the tag generator knows how to abbreviate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Implementation {
    #[default]
    CPython,
    PyPy,
    IronPython,
    Jython,
}

impl Implementation {
    pub fn abbreviation(self) -> &'static str {
        match self {
            Self::CPython => "cp",
            Self::PyPy => "pp",
            Self::IronPython => "ip",
            Self::Jython => "jy",
        }
    }
}

/// An environment's runnable tags, most specific first.
///
/// The position of a tag is its rank: lower ranks are preferred when several
/// wheels of one package are compatible. Duplicate tags keep their first
/// position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagTable {
    tags: IndexSet<Tag>,
}

impl TagTable {
    pub fn new(tags: impl IntoIterator<Item = Tag>) -> Self {
        Self {
            tags: tags.into_iter().collect(),
        }
    }

    /// Build the table for an interpreter the way pip and packaging order it:
    /// implementation-specific ABI, `abi3`, `none`, older `abi3` releases, then
    /// the pure-Python `pyXY` tags and finally the `*-none-any` fallbacks.
    ///
    /// `any` is always appended to the platform list.
    pub fn for_interpreter(
        implementation: Implementation,
        python: (u64, u64),
        platforms: &[String],
    ) -> Self {
        let (major, minor) = python;
        let abbr = implementation.abbreviation();
        let interpreter = format!("{abbr}{major}{minor}");
        let mut platforms = platforms
            .iter()
            .map(|platform| platform.to_ascii_lowercase())
            .collect::<Vec<_>>();
        if !platforms.iter().any(|platform| platform == "any") {
            platforms.push("any".to_string());
        }
        let use_abi3 = implementation == Implementation::CPython && (major, minor) >= (3, 2);

        let mut tags = IndexSet::new();
        for platform in &platforms {
            tags.insert(Tag::new(&interpreter, &interpreter, platform));
        }
        if use_abi3 {
            for platform in &platforms {
                tags.insert(Tag::new(&interpreter, "abi3", platform));
            }
        }
        for platform in &platforms {
            tags.insert(Tag::new(&interpreter, "none", platform));
        }
        if use_abi3 {
            for older in (2..minor).rev() {
                let older_interpreter = format!("{abbr}{major}{older}");
                for platform in &platforms {
                    tags.insert(Tag::new(&older_interpreter, "abi3", platform));
                }
            }
        }

        let python_range = python_interpreter_range(major, minor);
        for version in &python_range {
            for platform in &platforms {
                tags.insert(Tag::new(version, "none", platform));
            }
        }
        tags.insert(Tag::new(&interpreter, "none", "any"));
        for version in &python_range {
            tags.insert(Tag::new(version, "none", "any"));
        }

        Self { tags }
    }

    /// Position of `tag` in the table, if the environment can run it.
    pub fn rank(&self, tag: &Tag) -> Option<usize> {
        self.tags.get_index_of(tag)
    }

    /// Smallest rank among `tags`.
    pub fn best_rank<'a>(&self, tags: impl IntoIterator<Item = &'a Tag>) -> Option<usize> {
        tags.into_iter().filter_map(|tag| self.rank(tag)).min()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }
}

impl FromIterator<Tag> for TagTable {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self::new(iter)
    }
}

fn python_interpreter_range(major: u64, minor: u64) -> Vec<String> {
    let mut versions = vec![format!("py{major}{minor}"), format!("py{major}")];
    versions.extend((0..minor).rev().map(|older| format!("py{major}{older}")));
    versions
}
