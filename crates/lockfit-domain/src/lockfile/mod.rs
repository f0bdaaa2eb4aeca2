pub(crate) mod io;
pub(crate) mod types;

pub use io::{
    discover_lock, load_lock, parse_poetry_lock, parse_pylock, parse_uv_lock, LoadError,
};
pub use types::{
    canonicalize_package_name, DependencyEdge, Distribution, Lock, LockFormat, LockMetadata,
    Package, SourceRef,
};

#[cfg(test)]
mod tests {
    use super::{io, types};
    use std::fs;
    use tempfile::tempdir;

    const POETRY_LOCK: &str = r#"
[[package]]
name = "Requests"
version = "2.31.0"
description = "Python HTTP for Humans."
optional = false
python-versions = ">=3.7"
files = [
    {file = "requests-2.31.0-py3-none-any.whl", hash = "sha256:aaaa"},
    {file = "requests-2.31.0.tar.gz", hash = "sha256:bbbb"},
]

[package.dependencies]
certifi = ">=2017.4.17"
urllib3 = {version = ">=1.21.1,<3", optional = true, markers = "python_version >= \"3.8\""}

[[package]]
name = "internal_tool"
version = "0.3.0"
description = ""
optional = true
python-versions = "*"
files = [
    {file = "internal_tool-0.3.0.tar.gz", hash = "sha256:cccc"},
]

[package.source]
type = "legacy"
url = "https://pypi.example.org/simple"
reference = "internal"

[metadata]
lock-version = "2.0"
python-versions = "^3.10"
content-hash = "abc123"
"#;

    const UV_LOCK: &str = r#"
version = 1
requires-python = ">=3.11"

[[package]]
name = "numpy"
version = "1.26.0"
source = { registry = "https://pypi.org/simple" }
sdist = { url = "https://files.example/numpy-1.26.0.tar.gz", hash = "sha256:sd", size = 10 }
wheels = [
    { url = "https://files.example/numpy-1.26.0-cp311-cp311-manylinux_2_17_x86_64.whl", hash = "sha256:w1", size = 20 },
]

[[package]]
name = "demo"
version = "0.1.0"
source = { editable = "." }
dependencies = [
    { name = "numpy" },
    { name = "colorama", marker = "sys_platform == 'win32'" },
]
"#;

    #[test]
    fn parses_poetry_lock() -> anyhow::Result<()> {
        let lock = io::parse_poetry_lock(POETRY_LOCK)?;
        assert_eq!(lock.metadata.format, types::LockFormat::Poetry);
        assert_eq!(lock.metadata.schema_version, "2.0");
        assert_eq!(lock.metadata.schema_major(), Some(2));
        assert_eq!(lock.metadata.interpreter_constraint.as_deref(), Some("^3.10"));
        assert_eq!(lock.metadata.content_hash.as_deref(), Some("abc123"));
        assert_eq!(lock.packages.len(), 2);

        let requests = &lock.packages[0];
        assert_eq!(requests.name, "requests");
        assert_eq!(requests.category, "main");
        assert_eq!(requests.distributions.len(), 2);
        assert_eq!(requests.distributions[1].fingerprint, "sha256:bbbb");
        assert_eq!(requests.dependencies.len(), 2);
        let urllib3 = &requests.dependencies[1];
        assert!(urllib3.optional);
        assert_eq!(urllib3.constraint.as_deref(), Some(">=1.21.1,<3"));
        assert!(urllib3.marker.as_deref().is_some_and(|m| m.contains("python_version")));

        let tool = &lock.packages[1];
        assert_eq!(tool.name, "internal-tool");
        assert!(tool.optional);
        assert_eq!(tool.source_url(), Some("https://pypi.example.org/simple"));
        Ok(())
    }

    #[test]
    fn reads_legacy_metadata_files() -> anyhow::Result<()> {
        let contents = r#"
[[package]]
name = "six"
version = "1.16.0"
category = "dev"
optional = false
python-versions = ">=2.7"

[metadata]
lock-version = "1.1"
python-versions = "*"
content-hash = "x"

[metadata.files]
six = [
    {file = "six-1.16.0-py2.py3-none-any.whl", hash = "sha256:1"},
]
"#;
        let lock = io::parse_poetry_lock(contents)?;
        assert_eq!(lock.metadata.schema_major(), Some(1));
        assert_eq!(lock.packages[0].category, "dev");
        assert_eq!(lock.packages[0].distributions.len(), 1);
        Ok(())
    }

    #[test]
    fn parses_uv_lock() -> anyhow::Result<()> {
        let lock = io::parse_uv_lock(UV_LOCK)?;
        assert_eq!(lock.metadata.format, types::LockFormat::Uv);
        assert_eq!(lock.metadata.schema_version, "1");
        assert_eq!(lock.metadata.interpreter_constraint.as_deref(), Some(">=3.11"));

        let numpy = &lock.packages[0];
        assert_eq!(
            numpy
                .distributions
                .iter()
                .map(|dist| dist.filename.as_str())
                .collect::<Vec<_>>(),
            vec![
                "numpy-1.26.0-cp311-cp311-manylinux_2_17_x86_64.whl",
                "numpy-1.26.0.tar.gz"
            ]
        );
        assert_eq!(numpy.distributions[0].size, Some(20));
        assert_eq!(numpy.source_url(), Some("https://pypi.org/simple"));

        assert_eq!(lock.packages.len(), 1, "editable workspace member is skipped");
        Ok(())
    }

    #[test]
    fn rejects_duplicate_filenames() {
        let contents = r#"
[[package]]
name = "dup"
version = "1.0"
python-versions = "*"
files = [
    {file = "dup-1.0.tar.gz", hash = "sha256:1"},
    {file = "dup-1.0.tar.gz", hash = "sha256:2"},
]

[metadata]
lock-version = "2.0"
"#;
        let err = io::parse_poetry_lock(contents).unwrap_err();
        assert!(matches!(err, io::LoadError::DuplicateDistribution { .. }));
    }

    #[test]
    fn missing_metadata_is_reported() {
        let err =
            io::parse_poetry_lock("[[package]]\nname = \"a\"\nversion = \"1\"\n").unwrap_err();
        assert!(matches!(
            err,
            io::LoadError::MissingField {
                field: "metadata",
                ..
            }
        ));
        assert!(matches!(
            io::parse_uv_lock("not = [valid"),
            Err(io::LoadError::Syntax { .. })
        ));
    }

    #[test]
    fn discovers_lock_in_ancestor() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested)?;
        fs::write(dir.path().join("poetry.lock"), POETRY_LOCK)?;

        let found = io::discover_lock(&nested, Some(dir.path()), types::LockFormat::Poetry)?;
        assert_eq!(found, fs::canonicalize(dir.path())?.join("poetry.lock"));

        let lock = io::load_lock(&found, None)?;
        assert_eq!(lock.packages.len(), 2);
        Ok(())
    }

    #[test]
    fn discovery_stops_at_stop_dir() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let project = dir.path().join("project");
        let nested = project.join("src");
        fs::create_dir_all(&nested)?;
        fs::write(dir.path().join("uv.lock"), UV_LOCK)?;

        let err = io::discover_lock(&nested, Some(&project), types::LockFormat::Uv).unwrap_err();
        assert!(matches!(err, io::LoadError::NotFound { .. }));
        Ok(())
    }

    #[test]
    fn unknown_filename_needs_explicit_format() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("deps.lock");
        fs::write(&path, UV_LOCK)?;
        assert!(matches!(
            io::load_lock(&path, None),
            Err(io::LoadError::UnknownFormat(_))
        ));
        let lock = io::load_lock(&path, Some(types::LockFormat::Uv))?;
        assert_eq!(lock.packages[0].name, "numpy");
        Ok(())
    }

    const FORKED_UV_LOCK: &str = r#"
version = 1
requires-python = ">=3.8"
resolution-markers = [
    "python_full_version < '3.9'",
    "python_full_version >= '3.9'",
]

[[package]]
name = "numpy"
version = "1.24.4"
source = { registry = "https://pypi.org/simple" }
resolution-markers = [
    "python_full_version < '3.9'",
]
wheels = [
    { url = "https://files.example/numpy-1.24.4-cp38-cp38-manylinux_2_17_x86_64.whl", hash = "sha256:old" },
]

[[package]]
name = "numpy"
version = "1.26.4"
source = { registry = "https://pypi.org/simple" }
resolution-markers = [
    "python_full_version >= '3.9' and sys_platform == 'linux'",
    "python_version == '3.12' and platform_machine == 'x86_64'",
]
wheels = [
    { url = "https://files.example/numpy-1.26.4-cp311-cp311-manylinux_2_17_x86_64.whl", hash = "sha256:new" },
]

[[package]]
name = "colorama"
version = "0.4.6"
source = { registry = "https://pypi.org/simple" }
resolution-markers = [
    "sys_platform == 'win32'",
]
wheels = [
    { url = "https://files.example/colorama-0.4.6-py2.py3-none-any.whl", hash = "sha256:c" },
]
"#;

    #[test]
    fn uv_forks_carry_their_interpreter_range() -> anyhow::Result<()> {
        let lock = io::parse_uv_lock(FORKED_UV_LOCK)?;
        let constraints = lock
            .packages
            .iter()
            .map(|package| (package.pin(), package.interpreter_constraint.as_deref()))
            .collect::<Vec<_>>();
        assert_eq!(
            constraints,
            vec![
                ("numpy==1.24.4".to_string(), Some("<3.9")),
                ("numpy==1.26.4".to_string(), Some(">=3.9 || ==3.12")),
                ("colorama==0.4.6".to_string(), None),
            ]
        );
        Ok(())
    }

    #[test]
    fn same_pin_twice_is_rejected() {
        let contents = r#"
version = 1

[[package]]
name = "idna"
version = "3.6"
source = { registry = "https://pypi.org/simple" }

[[package]]
name = "IDNA"
version = "3.6"
source = { registry = "https://mirror.example/simple" }
"#;
        let err = io::parse_uv_lock(contents).unwrap_err();
        assert!(matches!(
            err,
            io::LoadError::DuplicatePackage { ref package } if package == "idna==3.6"
        ));
    }

    const PYLOCK: &str = r#"
lock-version = "1.0"
requires-python = ">=3.9"
created-by = "pdm"

[[packages]]
name = "Markupsafe"
version = "2.1.5"
requires-python = ">=3.7"
index = "https://pypi.org/simple"
sdist = { url = "https://files.example/MarkupSafe-2.1.5.tar.gz", hashes = { sha256 = "sd" } }

[[packages.wheels]]
name = "MarkupSafe-2.1.5-cp311-cp311-manylinux_2_17_x86_64.whl"
url = "https://files.example/MarkupSafe-2.1.5-cp311-cp311-manylinux_2_17_x86_64.whl"
size = 28
hashes = { sha512 = "ignored", sha256 = "w1" }

[[packages.wheels]]
url = "https://files.example/MarkupSafe-2.1.5-py3-none-any.whl"
hashes = { blake2b = "b2" }

[[packages]]
name = "app"
directory = { path = ".", editable = true }

[[packages]]
name = "tool"
version = "1.0"
vcs = { type = "git", url = "https://git.example/tool.git", commit-id = "abc" }
"#;

    #[test]
    fn parses_pylock() -> anyhow::Result<()> {
        let lock = io::parse_pylock(PYLOCK)?;
        assert_eq!(lock.metadata.format, types::LockFormat::Pylock);
        assert_eq!(lock.metadata.schema_major(), Some(1));
        assert_eq!(lock.metadata.interpreter_constraint.as_deref(), Some(">=3.9"));
        assert_eq!(lock.packages.len(), 1, "directory and VCS packages are skipped");

        let markupsafe = &lock.packages[0];
        assert_eq!(markupsafe.name, "markupsafe");
        assert_eq!(markupsafe.interpreter_constraint.as_deref(), Some(">=3.7"));
        assert_eq!(markupsafe.source_url(), Some("https://pypi.org/simple"));
        let files = markupsafe
            .distributions
            .iter()
            .map(|dist| (dist.filename.as_str(), dist.fingerprint.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            files,
            vec![
                ("MarkupSafe-2.1.5-cp311-cp311-manylinux_2_17_x86_64.whl", "sha256:w1"),
                ("MarkupSafe-2.1.5-py3-none-any.whl", "blake2b:b2"),
                ("MarkupSafe-2.1.5.tar.gz", "sha256:sd"),
            ]
        );
        assert_eq!(markupsafe.distributions[0].size, Some(28));
        Ok(())
    }

    #[test]
    fn pylock_artifact_needs_hashes() {
        let contents = r#"
lock-version = "1.0"

[[packages]]
name = "six"
version = "1.16.0"
wheels = [{ url = "https://files.example/six-1.16.0-py2.py3-none-any.whl" }]
"#;
        assert!(matches!(
            io::parse_pylock(contents),
            Err(io::LoadError::MissingField { field: "hashes", .. })
        ));
    }

    #[test]
    fn pylock_files_are_recognized_by_name() {
        use types::LockFormat;
        assert_eq!(LockFormat::from_filename("pylock.toml"), Some(LockFormat::Pylock));
        assert_eq!(LockFormat::from_filename("pylock.web.toml"), Some(LockFormat::Pylock));
        assert_eq!(LockFormat::from_filename("pylock..toml"), None);
        assert_eq!(LockFormat::from_filename("pylock.tomlx"), None);
        assert_eq!(LockFormat::Pylock.supported_schema_majors(), &[1]);
    }

    #[test]
    fn discovers_named_pylock_when_default_is_absent() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("src");
        fs::create_dir_all(&nested)?;
        fs::write(dir.path().join("pylock.worker.toml"), PYLOCK)?;
        fs::write(dir.path().join("pylock.api.toml"), PYLOCK)?;

        let found = io::discover_lock(&nested, Some(dir.path()), types::LockFormat::Pylock)?;
        assert_eq!(found.file_name().and_then(|name| name.to_str()), Some("pylock.api.toml"));

        fs::write(dir.path().join("pylock.toml"), PYLOCK)?;
        let found = io::discover_lock(&nested, Some(dir.path()), types::LockFormat::Pylock)?;
        assert_eq!(found.file_name().and_then(|name| name.to_str()), Some("pylock.toml"));

        let lock = io::load_lock(&found, None)?;
        assert_eq!(lock.metadata.format, types::LockFormat::Pylock);
        Ok(())
    }

    #[test]
    fn canonicalizes_names() {
        assert_eq!(types::canonicalize_package_name("Foo__Bar.baz"), "foo-bar-baz");
        assert_eq!(types::canonicalize_package_name("legacy-pkg"), "legacy-pkg");
    }
}
