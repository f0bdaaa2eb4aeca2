use std::cell::RefCell;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use lockfit_core::{LockResolver, ResolveError, ResolveObserver, Selection, TracingObserver};
use lockfit_domain::{
    discover_lock, load_lock, parse_interpreter_version, presets, Distribution, Environment,
    EnvironmentError, EnvironmentSpec, LoadError, Lock, LockFormat, Package,
};
use serde_json::{json, Value};

use crate::cli::{EnvironmentArgs, LockArgs, ResolveArgs};
use crate::outcome::ExecutionOutcome;

type Step<T> = Result<T, ExecutionOutcome>;

pub fn resolve(args: &ResolveArgs) -> ExecutionOutcome {
    match run_resolve(args) {
        Ok(outcome) | Err(outcome) => outcome,
    }
}

pub fn tags(args: &EnvironmentArgs) -> ExecutionOutcome {
    let environment = match load_environment(args) {
        Ok(Some(environment)) => environment,
        Ok(None) => return resolve_error_outcome(&ResolveError::MissingEnvironment),
        Err(outcome) => return outcome,
    };
    let tags = environment
        .tags()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    ExecutionOutcome::success(
        format!(
            "{} tags for Python {}",
            tags.len(),
            environment.interpreter_version()
        ),
        json!({
            "environment": environment_summary(&environment),
            "tags": tags,
        }),
    )
}

fn run_resolve(args: &ResolveArgs) -> Step<ExecutionOutcome> {
    let environment = load_environment(&args.environment)?;
    let path = locate_lock(&args.lock)?;
    let lock =
        load_lock(&path, args.lock.format.map(LockFormat::from)).map_err(load_error_outcome)?;

    let observer = ReportingObserver::default();
    let mut resolver = LockResolver::new(&lock).with_observer(&observer);
    if let Some(environment) = environment.as_ref() {
        resolver = resolver.with_environment(environment);
    }
    let validated = resolver.validate().map_err(|err| resolve_error_outcome(&err))?;
    let selection = validated
        .filter()
        .map_err(|err| resolve_error_outcome(&err))?
        .select();

    let details = resolution_details(&path, &lock, validated.environment(), &observer, &selection);
    if selection.is_complete() {
        return Ok(ExecutionOutcome::success(
            format!(
                "resolved {} of {} locked packages for Python {}",
                selection.resolved().len(),
                lock.packages.len(),
                validated.environment().interpreter_version()
            ),
            details,
        ));
    }

    let missing = selection.incompatible().len();
    if !args.keep_going {
        if let Err(err) = selection.into_result() {
            let mut outcome = resolve_error_outcome(&err);
            outcome.details["incompatible"] = details["incompatible"].clone();
            return Err(outcome);
        }
    }
    let mut details = details;
    details["reason"] = json!("incompatible_distribution");
    details["hint"] = json!(INCOMPATIBLE_HINT);
    Ok(ExecutionOutcome::user_error(
        format!(
            "{missing} of {} locked packages have no compatible distribution",
            lock.packages.len()
        ),
        details,
    ))
}

fn resolution_details(
    path: &Path,
    lock: &Lock,
    environment: &Environment,
    observer: &ReportingObserver,
    selection: &Selection,
) -> Value {
    json!({
        "lock": path.display().to_string(),
        "format": lock.metadata.format,
        "schema_version": lock.metadata.schema_version,
        "environment": environment_summary(environment),
        "excluded": observer.excluded(),
        "resolved": selection.resolved(),
        "incompatible": selection.incompatible(),
        "digest": selection.digest(),
    })
}

fn environment_summary(environment: &Environment) -> Value {
    json!({
        "python": environment.interpreter_version().to_string(),
        "fingerprint": environment.fingerprint(),
        "tag_count": environment.tags().len(),
    })
}

/// `Ok(None)` when nothing describes the target; the resolver reports that.
fn load_environment(args: &EnvironmentArgs) -> Step<Option<Environment>> {
    if let Some(path) = args.env_file.as_deref() {
        if args.python.is_some() {
            tracing::debug!(
                path = %path.display(),
                "environment file takes precedence over --python"
            );
        }
        let spec = read_environment_file(path).map_err(|err| {
            ExecutionOutcome::failure(
                format!("{err:#}"),
                json!({ "reason": "environment_file", "path": path.display().to_string() }),
            )
        })?;
        return spec
            .into_environment()
            .map(Some)
            .map_err(|err| environment_error_outcome(&err));
    }

    let Some(python) = args.python.as_deref() else {
        return Ok(None);
    };
    let version = parse_interpreter_version(python).map_err(|err| environment_error_outcome(&err))?;
    let platforms = match args.preset.as_deref() {
        Some(preset) => {
            presets::platforms_for(preset).map_err(|err| environment_error_outcome(&err))?
        }
        None => args.platforms.clone(),
    };
    Environment::for_interpreter(args.implementation.into(), version, &platforms)
        .map(Some)
        .map_err(|err| environment_error_outcome(&err))
}

fn read_environment_file(path: &Path) -> anyhow::Result<EnvironmentSpec> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read environment file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("invalid environment file {}", path.display()))
}

fn locate_lock(args: &LockArgs) -> Step<PathBuf> {
    if let Some(path) = &args.lock {
        return Ok(path.clone());
    }
    let start = match &args.dir {
        Some(dir) => dir.clone(),
        None => env::current_dir().map_err(|err| {
            ExecutionOutcome::failure(
                format!("failed to read the current directory: {err}"),
                json!({ "reason": "io" }),
            )
        })?,
    };
    let formats = match args.format {
        Some(format) => vec![LockFormat::from(format)],
        None => vec![LockFormat::Poetry, LockFormat::Uv, LockFormat::Pylock],
    };

    let mut found: Option<PathBuf> = None;
    let mut not_found = None;
    for format in formats {
        match discover_lock(&start, args.stop.as_deref(), format) {
            // The lock closest to the start directory wins; ties keep the earlier format.
            Ok(path) => {
                if found
                    .as_ref()
                    .is_none_or(|current| path.components().count() > current.components().count())
                {
                    found = Some(path);
                }
            }
            Err(err @ LoadError::NotFound { .. }) => not_found = Some(err),
            Err(err) => return Err(load_error_outcome(err)),
        }
    }
    match (found, not_found) {
        (Some(path), _) => Ok(path),
        (None, Some(err)) => Err(load_error_outcome(err)),
        (None, None) => Err(ExecutionOutcome::user_error(
            "no lock file to read",
            json!({ "reason": "lock_not_found" }),
        )),
    }
}

const INCOMPATIBLE_HINT: &str =
    "the lock has no artifact for this interpreter/platform; check --python and --platform";

fn resolve_error_outcome(err: &ResolveError) -> ExecutionOutcome {
    let (reason, hint) = match err {
        ResolveError::MissingEnvironment => (
            "missing_environment",
            "pass --python (or set LOCKFIT_PYTHON) or --env with an environment file",
        ),
        ResolveError::UnsupportedSchemaVersion { .. } => (
            "unsupported_schema_version",
            "regenerate the lock with a supported version of its tool",
        ),
        ResolveError::IncompatibleLock { .. } => (
            "incompatible_lock",
            "target an interpreter version the lock allows",
        ),
        ResolveError::IncompatibleDistribution { .. }
        | ResolveError::IncompatibleDistributions { .. } => {
            ("incompatible_distribution", INCOMPATIBLE_HINT)
        }
        ResolveError::MalformedConstraint(_) => (
            "malformed_constraint",
            "fix the interpreter constraint in the lock file",
        ),
    };
    let mut details = json!({ "reason": reason, "hint": hint });
    match err {
        ResolveError::IncompatibleDistribution { name, version } => {
            details["incompatible"] = json!([{ "name": name, "version": version }]);
        }
        ResolveError::IncompatibleDistributions { first, count } => {
            details["first"] = json!(first);
            details["count"] = json!(count);
        }
        ResolveError::MalformedConstraint(malformed) => {
            details["constraint"] = json!(malformed.constraint);
        }
        _ => {}
    }
    ExecutionOutcome::user_error(err.to_string(), details)
}

fn environment_error_outcome(err: &EnvironmentError) -> ExecutionOutcome {
    let hint = match err {
        EnvironmentError::UnknownPreset(_) => "presets look like manylinux_2_36_x86_64, or any",
        EnvironmentError::InvalidVersion { .. } | EnvironmentError::IncompleteVersion(_) => {
            "pass an interpreter version such as 3.11 or 3.11.4"
        }
    };
    ExecutionOutcome::user_error(
        err.to_string(),
        json!({ "reason": "invalid_environment", "hint": hint }),
    )
}

fn load_error_outcome(err: LoadError) -> ExecutionOutcome {
    let (reason, user_error) = match &err {
        LoadError::NotFound { .. } => ("lock_not_found", true),
        LoadError::UnknownFormat(_) => ("unknown_lock_format", true),
        LoadError::Io { .. } => ("lock_unreadable", false),
        LoadError::Syntax { .. }
        | LoadError::MissingField { .. }
        | LoadError::DuplicateDistribution { .. }
        | LoadError::DuplicatePackage { .. } => ("invalid_lock", false),
    };
    let details = json!({ "reason": reason });
    let message = format!("{:#}", anyhow::Error::new(err));
    if user_error {
        ExecutionOutcome::user_error(message, details)
    } else {
        ExecutionOutcome::failure(message, details)
    }
}

/// Logs through [`TracingObserver`] and keeps the exclusions for the report.
#[derive(Default)]
struct ReportingObserver {
    excluded: RefCell<Vec<Value>>,
}

impl ReportingObserver {
    fn excluded(&self) -> Vec<Value> {
        self.excluded.borrow().clone()
    }
}

impl ResolveObserver for ReportingObserver {
    fn package_excluded(&self, package: &Package, constraint: &str) {
        TracingObserver.package_excluded(package, constraint);
        self.excluded.borrow_mut().push(json!({
            "name": package.name,
            "version": package.version,
            "constraint": constraint,
        }));
    }

    fn distribution_chosen(
        &self,
        package: &Package,
        distribution: &Distribution,
        rank: Option<usize>,
    ) {
        TracingObserver.distribution_chosen(package, distribution, rank);
    }

    fn distribution_missing(&self, package: &Package) {
        TracingObserver.distribution_missing(package);
    }
}
