use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use toml_edit::{DocumentMut, Item, TableLike};

use crate::distribution::filename_from_url;

use super::types::{
    DependencyEdge, Distribution, Lock, LockFormat, LockMetadata, Package, SourceRef,
};

/// Failures of the lock loader. Kept apart from the resolution errors so
/// callers can tell "no usable lock" from "lock rejected for this environment".
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("[LF101] no `{filename}` found between {start} and {stop}")]
    NotFound {
        filename: String,
        start: PathBuf,
        stop: String,
    },
    #[error("[LF102] failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("[LF103] failed to parse {origin}")]
    Syntax {
        origin: String,
        #[source]
        source: toml_edit::TomlError,
    },
    #[error("[LF104] {context} is missing required field `{field}`")]
    MissingField {
        field: &'static str,
        context: String,
    },
    #[error("[LF105] package {package} lists distribution `{filename}` more than once")]
    DuplicateDistribution { package: String, filename: String },
    #[error("[LF106] cannot infer lock format from {0}; pass the format explicitly")]
    UnknownFormat(PathBuf),
    #[error("[LF107] package {package} is locked more than once")]
    DuplicatePackage { package: String },
}

/// Read the lock at `path`, inferring the format from the filename unless one is given.
pub fn load_lock(path: &Path, format: Option<LockFormat>) -> Result<Lock, LoadError> {
    let format = match format {
        Some(format) => format,
        None => path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(LockFormat::from_filename)
            .ok_or_else(|| LoadError::UnknownFormat(path.to_path_buf()))?,
    };
    let contents = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = parse_document(&contents, &path.display().to_string())?;
    let lock = match format {
        LockFormat::Poetry => lock_from_poetry(&doc)?,
        LockFormat::Uv => lock_from_uv(&doc)?,
        LockFormat::Pylock => lock_from_pylock(&doc)?,
    };
    tracing::debug!(
        path = %path.display(),
        %format,
        packages = lock.packages.len(),
        "loaded lock"
    );
    Ok(lock)
}

pub fn parse_poetry_lock(contents: &str) -> Result<Lock, LoadError> {
    let doc = parse_document(contents, LockFormat::POETRY_FILENAME)?;
    lock_from_poetry(&doc)
}

pub fn parse_uv_lock(contents: &str) -> Result<Lock, LoadError> {
    let doc = parse_document(contents, LockFormat::UV_FILENAME)?;
    lock_from_uv(&doc)
}

pub fn parse_pylock(contents: &str) -> Result<Lock, LoadError> {
    let doc = parse_document(contents, LockFormat::PYLOCK_FILENAME)?;
    lock_from_pylock(&doc)
}

/// Walk from `start` towards the filesystem root looking for a lock of `format`.
///
/// The walk stops after checking `stop` when it is given.
pub fn discover_lock(
    start: &Path,
    stop: Option<&Path>,
    format: LockFormat,
) -> Result<PathBuf, LoadError> {
    let start = fs::canonicalize(start).map_err(|source| LoadError::Io {
        path: start.to_path_buf(),
        source,
    })?;
    let stop = stop.map(|dir| fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()));

    let mut current = start.as_path();
    loop {
        if let Some(candidate) = lock_in_dir(current, format) {
            tracing::debug!(path = %candidate.display(), "found lock");
            return Ok(candidate);
        }
        if stop.as_deref() == Some(current) {
            break;
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Err(LoadError::NotFound {
        filename: format.filename_pattern().to_string(),
        start: start.clone(),
        stop: stop.map_or_else(
            || "the filesystem root".to_string(),
            |dir| dir.display().to_string(),
        ),
    })
}

/// The lock of `format` directly inside `dir`. `pylock.toml` is preferred over
/// named `pylock.<name>.toml` files, which are taken in name order.
fn lock_in_dir(dir: &Path, format: LockFormat) -> Option<PathBuf> {
    let default = dir.join(format.default_filename());
    if default.is_file() {
        return Some(default);
    }
    if format != LockFormat::Pylock {
        return None;
    }
    let mut named = fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| format.matches_filename(name))
        })
        .collect::<Vec<_>>();
    named.sort();
    if named.len() > 1 {
        tracing::debug!(dir = %dir.display(), count = named.len(), "several named pylock files");
    }
    named.into_iter().next()
}

fn parse_document(contents: &str, origin: &str) -> Result<DocumentMut, LoadError> {
    contents
        .parse::<DocumentMut>()
        .map_err(|source| LoadError::Syntax {
            origin: origin.to_string(),
            source,
        })
}

fn lock_from_poetry(doc: &DocumentMut) -> Result<Lock, LoadError> {
    let metadata = doc
        .get("metadata")
        .and_then(Item::as_table_like)
        .ok_or(LoadError::MissingField {
            field: "metadata",
            context: "poetry lock".to_string(),
        })?;
    let schema_version = str_field(metadata, "lock-version").ok_or(LoadError::MissingField {
        field: "lock-version",
        context: "poetry lock metadata".to_string(),
    })?;
    let lock_metadata = LockMetadata {
        format: LockFormat::Poetry,
        schema_version,
        interpreter_constraint: str_field(metadata, "python-versions"),
        content_hash: str_field(metadata, "content-hash"),
    };
    // Lock files before 2.0 kept the file lists in `[metadata.files]`.
    let legacy_files = metadata.get("files").and_then(Item::as_table_like);

    let mut packages = Vec::new();
    for table in table_entries(doc.get("package")) {
        let name = required_str(table, "name", "poetry package")?;
        let version = required_str(table, "version", &format!("package {name}"))?;
        let mut package = Package::new(&name, version);
        if let Some(category) = str_field(table, "category") {
            package.category = category;
        }
        package.optional = table
            .get("optional")
            .and_then(Item::as_bool)
            .unwrap_or(false);
        package.interpreter_constraint =
            str_field(table, "python-versions").filter(|value| !value.trim().is_empty());

        let files = table
            .get("files")
            .or_else(|| legacy_files.and_then(|files| files.get(&name)));
        for entry in table_entries(files) {
            let context = format!("file entry of {}", package.pin());
            let filename = required_str(entry, "file", &context)?;
            let fingerprint = required_str(entry, "hash", &context)?;
            package
                .distributions
                .push(Distribution::new(filename, fingerprint));
        }

        package.source = table
            .get("source")
            .and_then(Item::as_table_like)
            .and_then(|source| {
                let kind = str_field(source, "type")?;
                Some(SourceRef {
                    kind,
                    url: str_field(source, "url"),
                    reference: str_field(source, "reference"),
                })
            });

        if let Some(dependencies) = table.get("dependencies").and_then(Item::as_table_like) {
            for (dep_name, spec) in dependencies.iter() {
                package.dependencies.extend(poetry_dependency_edges(dep_name, spec));
            }
        }

        ensure_unique_filenames(&package)?;
        packages.push(package);
    }

    finish_lock(lock_metadata, packages)
}

fn poetry_dependency_edges(name: &str, spec: &Item) -> Vec<DependencyEdge> {
    if let Some(constraint) = spec.as_str() {
        return vec![DependencyEdge {
            name: name.to_string(),
            constraint: Some(constraint.to_string()),
            ..DependencyEdge::default()
        }];
    }
    table_entries(Some(spec))
        .into_iter()
        .chain(spec.as_table_like())
        .map(|table| DependencyEdge {
            name: name.to_string(),
            constraint: str_field(table, "version"),
            optional: table
                .get("optional")
                .and_then(Item::as_bool)
                .unwrap_or(false),
            interpreter_constraint: str_field(table, "python"),
            marker: str_field(table, "markers"),
        })
        .collect()
}

/// `uv.lock` source kinds that point into the project itself.
const UV_LOCAL_SOURCES: [&str; 2] = ["editable", "virtual"];

fn lock_from_uv(doc: &DocumentMut) -> Result<Lock, LoadError> {
    let schema_version = match doc.get("version") {
        Some(item) => item
            .as_integer()
            .map(|version| version.to_string())
            .or_else(|| item.as_str().map(str::to_string)),
        None => None,
    }
    .ok_or(LoadError::MissingField {
        field: "version",
        context: "uv lock".to_string(),
    })?;
    let lock_metadata = LockMetadata {
        format: LockFormat::Uv,
        schema_version,
        interpreter_constraint: doc
            .get("requires-python")
            .and_then(Item::as_str)
            .map(str::to_string),
        content_hash: None,
    };

    let mut packages = Vec::new();
    for table in table_entries(doc.get("package")) {
        let name = required_str(table, "name", "uv package")?;
        let version = required_str(table, "version", &format!("package {name}"))?;
        let mut package = Package::new(&name, version);

        let source = table.get("source").and_then(Item::as_table_like);
        // Workspace members are built from the checkout, never fetched.
        if source.is_some_and(|source| {
            UV_LOCAL_SOURCES
                .iter()
                .any(|kind| source.contains_key(kind))
        }) {
            tracing::debug!(package = %package.pin(), "skipping workspace member");
            continue;
        }

        let markers = table
            .get("resolution-markers")
            .and_then(Item::as_array)
            .map(|markers| {
                markers
                    .iter()
                    .filter_map(|marker| marker.as_str())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        package.interpreter_constraint = constraint_from_resolution_markers(&markers);

        let context = format!("artifact of {}", package.pin());
        for wheel in table_entries(table.get("wheels")) {
            package.distributions.push(uv_distribution(wheel, &context)?);
        }
        if let Some(sdist) = table.get("sdist").and_then(Item::as_table_like) {
            package.distributions.push(uv_distribution(sdist, &context)?);
        }

        package.source = source.and_then(|source| {
            let (kind, url) = source.iter().next()?;
            Some(SourceRef {
                kind: kind.to_string(),
                url: url.as_str().map(str::to_string),
                reference: None,
            })
        });

        for dependency in table_entries(table.get("dependencies")) {
            let Some(dep_name) = str_field(dependency, "name") else {
                continue;
            };
            package.dependencies.push(DependencyEdge {
                name: dep_name,
                constraint: str_field(dependency, "version"),
                optional: false,
                interpreter_constraint: None,
                marker: str_field(dependency, "marker"),
            });
        }

        ensure_unique_filenames(&package)?;
        packages.push(package);
    }

    finish_lock(lock_metadata, packages)
}

/// Interpreter constraint implied by a forked package's `resolution-markers`.
///
/// Each marker is one alternative: its `python_version` and
/// `python_full_version` comparisons are joined with `,` and the alternatives
/// with `||`. Other marker variables are not evaluated. `None` when some
/// alternative does not restrict the interpreter or uses `or`/parentheses.
fn constraint_from_resolution_markers(markers: &[&str]) -> Option<String> {
    if markers.is_empty() {
        return None;
    }
    let mut alternatives = Vec::with_capacity(markers.len());
    for marker in markers {
        if marker.contains(['(', ')']) || marker.contains(" or ") {
            tracing::debug!(%marker, "resolution marker left unevaluated");
            return None;
        }
        let clauses = marker
            .split(" and ")
            .filter_map(python_marker_clause)
            .collect::<Vec<_>>();
        if clauses.is_empty() {
            return None;
        }
        alternatives.push(clauses.join(","));
    }
    Some(alternatives.join(" || "))
}

/// `python_full_version >= '3.9'` → `>=3.9`.
fn python_marker_clause(expression: &str) -> Option<String> {
    let expression = expression.trim();
    let rest = expression
        .strip_prefix("python_full_version")
        .or_else(|| expression.strip_prefix("python_version"))?
        .trim_start();
    let operator_len = rest
        .find(|ch: char| !matches!(ch, '<' | '>' | '=' | '!' | '~'))
        .unwrap_or(rest.len());
    let (operator, value) = rest.split_at(operator_len);
    let value = value.trim().trim_matches(['\'', '"']);
    if operator.is_empty() || value.is_empty() {
        return None;
    }
    Some(format!("{operator}{value}"))
}

fn lock_from_pylock(doc: &DocumentMut) -> Result<Lock, LoadError> {
    let root = doc.as_table();
    let lock_metadata = LockMetadata {
        format: LockFormat::Pylock,
        schema_version: required_str(root, "lock-version", "pylock")?,
        interpreter_constraint: str_field(root, "requires-python"),
        content_hash: None,
    };

    let mut packages = Vec::new();
    for table in table_entries(doc.get("packages")) {
        let name = required_str(table, "name", "pylock package")?;
        // Source trees and checkouts have no artifact to pick.
        if table.contains_key("vcs") || table.contains_key("directory") {
            tracing::debug!(package = %name, "skipping local or VCS package");
            continue;
        }
        let version = required_str(table, "version", &format!("package {name}"))?;
        let mut package = Package::new(&name, version);
        package.interpreter_constraint = str_field(table, "requires-python");

        let context = format!("artifact of {}", package.pin());
        for wheel in table_entries(table.get("wheels")) {
            package
                .distributions
                .push(pylock_distribution(wheel, &context)?);
        }
        for key in ["sdist", "archive"] {
            for artifact in table_or_entries(table.get(key)) {
                package
                    .distributions
                    .push(pylock_distribution(artifact, &context)?);
            }
        }

        package.source = str_field(table, "index").map(|index| SourceRef {
            kind: "index".to_string(),
            url: Some(index),
            reference: None,
        });

        for dependency in table_entries(table.get("dependencies")) {
            let Some(dep_name) = str_field(dependency, "name") else {
                continue;
            };
            package.dependencies.push(DependencyEdge {
                name: dep_name,
                constraint: str_field(dependency, "version").map(|version| format!("=={version}")),
                ..DependencyEdge::default()
            });
        }

        ensure_unique_filenames(&package)?;
        packages.push(package);
    }

    finish_lock(lock_metadata, packages)
}

/// A pylock wheel, sdist or archive. The filename is `name` when present,
/// else the last segment of `url` or `path`; the fingerprint prefers sha256.
fn pylock_distribution(table: &dyn TableLike, context: &str) -> Result<Distribution, LoadError> {
    let location = str_field(table, "url").or_else(|| str_field(table, "path"));
    let filename = str_field(table, "name")
        .or_else(|| location.as_deref().map(|url| filename_from_url(url).to_string()))
        .ok_or_else(|| LoadError::MissingField {
            field: "url",
            context: context.to_string(),
        })?;
    let hashes = table
        .get("hashes")
        .and_then(Item::as_table_like)
        .ok_or_else(|| LoadError::MissingField {
            field: "hashes",
            context: context.to_string(),
        })?;
    let (algorithm, digest) = hashes
        .get("sha256")
        .and_then(Item::as_str)
        .map(|digest| ("sha256", digest))
        .or_else(|| {
            hashes
                .iter()
                .find_map(|(algorithm, digest)| Some((algorithm, digest.as_str()?)))
        })
        .ok_or_else(|| LoadError::MissingField {
            field: "hashes",
            context: context.to_string(),
        })?;
    Ok(Distribution {
        filename,
        fingerprint: format!("{algorithm}:{digest}"),
        size: table
            .get("size")
            .and_then(Item::as_integer)
            .and_then(|size| u64::try_from(size).ok()),
        url: location,
    })
}

/// Packages are keyed by name and version; forks of one name may coexist.
fn finish_lock(metadata: LockMetadata, packages: Vec<Package>) -> Result<Lock, LoadError> {
    let mut seen = IndexSet::new();
    for package in &packages {
        if !seen.insert((package.name.as_str(), package.version.as_str())) {
            return Err(LoadError::DuplicatePackage {
                package: package.pin(),
            });
        }
    }
    Ok(Lock::new(metadata, packages))
}

fn uv_distribution(table: &dyn TableLike, context: &str) -> Result<Distribution, LoadError> {
    let url = required_str(table, "url", context)
        .or_else(|_| required_str(table, "path", context))?;
    let fingerprint = required_str(table, "hash", context)?;
    Ok(Distribution {
        filename: filename_from_url(&url).to_string(),
        fingerprint,
        size: table
            .get("size")
            .and_then(Item::as_integer)
            .and_then(|size| u64::try_from(size).ok()),
        url: Some(url),
    })
}

fn ensure_unique_filenames(package: &Package) -> Result<(), LoadError> {
    let mut seen = IndexSet::new();
    for distribution in &package.distributions {
        if !seen.insert(distribution.filename.as_str()) {
            return Err(LoadError::DuplicateDistribution {
                package: package.pin(),
                filename: distribution.filename.clone(),
            });
        }
    }
    Ok(())
}

/// Tables reachable from `item`, whether written as `[[array]]` tables or as
/// an inline array of `{ ... }` tables.
fn table_entries(item: Option<&Item>) -> Vec<&dyn TableLike> {
    let Some(item) = item else {
        return Vec::new();
    };
    if let Some(tables) = item.as_array_of_tables() {
        return tables.iter().map(|table| table as &dyn TableLike).collect();
    }
    if let Some(array) = item.as_array() {
        return array
            .iter()
            .filter_map(|value| value.as_inline_table())
            .map(|table| table as &dyn TableLike)
            .collect();
    }
    Vec::new()
}

/// A single inline/standard table, or the entries of an array of tables.
fn table_or_entries(item: Option<&Item>) -> Vec<&dyn TableLike> {
    match item.and_then(Item::as_table_like) {
        Some(table) => vec![table],
        None => table_entries(item),
    }
}

fn str_field(table: &dyn TableLike, key: &str) -> Option<String> {
    table
        .get(key)
        .and_then(Item::as_str)
        .map(std::string::ToString::to_string)
}

fn required_str(
    table: &dyn TableLike,
    field: &'static str,
    context: &str,
) -> Result<String, LoadError> {
    str_field(table, field).ok_or_else(|| LoadError::MissingField {
        field,
        context: context.to_string(),
    })
}
