use crate::tags::Tag;

const WHEEL_SUFFIX: &str = ".whl";
const UNIVERSAL_WHEEL_SUFFIX: &str = "none-any.whl";

/// Source archive layouts recognized in lock files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    TarGz,
    TarBz2,
    Zip,
}

impl SourceFormat {
    fn from_filename(lowered: &str) -> Option<Self> {
        if lowered.ends_with(".tar.gz") {
            Some(Self::TarGz)
        } else if lowered.ends_with(".tar.bz2") {
            Some(Self::TarBz2)
        } else if lowered.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// What a distribution filename says about the artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DistributionKind {
    /// A `.whl` file. `None` when the filename does not follow the wheel naming scheme.
    Wheel(Option<WheelFilename>),
    Source(SourceFormat),
    Other,
}

impl DistributionKind {
    pub fn from_filename(filename: &str) -> Self {
        let lowered = filename.trim().to_ascii_lowercase();
        if lowered.ends_with(WHEEL_SUFFIX) {
            return Self::Wheel(WheelFilename::parse(filename));
        }
        SourceFormat::from_filename(&lowered).map_or(Self::Other, Self::Source)
    }
}

/// The pieces of `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WheelFilename {
    pub name: String,
    pub version: String,
    pub build: Option<String>,
    /// Every tag the wheel declares, with compressed tag sets such as
    /// `py2.py3` expanded.
    pub tags: Vec<Tag>,
}

impl WheelFilename {
    pub fn parse(filename: &str) -> Option<Self> {
        let trimmed = filename.trim();
        let lowered = trimmed.to_ascii_lowercase();
        if !lowered.ends_with(WHEEL_SUFFIX) {
            return None;
        }
        let stem = trimmed.get(..trimmed.len() - WHEEL_SUFFIX.len())?;
        let parts: Vec<&str> = stem.split('-').collect();
        let (name, version, build, python, abi, platform) = match parts.as_slice() {
            [name, version, python, abi, platform] => {
                (*name, *version, None, *python, *abi, *platform)
            }
            [name, version, build, python, abi, platform] => {
                (*name, *version, Some(*build), *python, *abi, *platform)
            }
            _ => return None,
        };
        if [name, version, python, abi, platform]
            .iter()
            .any(|part| part.is_empty())
        {
            return None;
        }

        let mut tags = Vec::new();
        for python in python.split('.') {
            for abi in abi.split('.') {
                for platform in platform.split('.') {
                    tags.push(Tag::new(python, abi, platform));
                }
            }
        }
        Some(Self {
            name: name.to_string(),
            version: version.to_string(),
            build: build.map(str::to_string),
            tags,
        })
    }
}

/// True when the filename carries the fully universal `none-any` tag segment.
pub fn is_universal_wheel(filename: &str) -> bool {
    filename
        .trim()
        .to_ascii_lowercase()
        .ends_with(UNIVERSAL_WHEEL_SUFFIX)
}

/// Last path segment of a URL, which is how `uv.lock` names its artifacts.
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}
