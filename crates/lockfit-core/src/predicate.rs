//! Interpreter-version constraints as written by Poetry and uv.
//!
//! Besides plain PEP 440 specifiers this understands the Poetry operators
//! `^`, `~`, `*` and `||`, and the `python_version` convention that a clause
//! naming only `major.minor` is compared against the interpreter's
//! `major.minor`.

use std::str::FromStr;

use pep440_rs::{Version, VersionSpecifier};

use crate::error::MalformedConstraint;

/// Answers "does `constraint` admit `version`?".
pub trait VersionPredicate: Send + Sync {
    fn admits(&self, constraint: &str, version: &Version) -> Result<bool, MalformedConstraint>;
}

/// The default predicate for `python-versions` / `requires-python` values.
#[derive(Clone, Copy, Debug, Default)]
pub struct PythonVersionPredicate;

impl VersionPredicate for PythonVersionPredicate {
    fn admits(&self, constraint: &str, version: &Version) -> Result<bool, MalformedConstraint> {
        let groups = parse_constraint(constraint)?;
        let mut admitted = false;
        // Every clause is evaluated so an ambiguous one is reported even when
        // an earlier group already matched.
        for group in &groups {
            let mut group_admits = true;
            for clause in group {
                if !clause.admits(constraint, version)? {
                    group_admits = false;
                }
            }
            admitted |= group_admits;
        }
        Ok(admitted)
    }
}

#[derive(Debug)]
enum Clause {
    Any,
    Specifier {
        specifier: VersionSpecifier,
        /// Compare against `major.minor` of the interpreter only.
        major_minor: bool,
    },
    /// `>X.Y.*` / `<X.Y.*`: well defined only when the minor versions differ.
    StrictWildcard {
        specifier: VersionSpecifier,
        major: u64,
        minor: u64,
    },
}

impl Clause {
    fn admits(&self, constraint: &str, version: &Version) -> Result<bool, MalformedConstraint> {
        match self {
            Self::Any => Ok(true),
            Self::Specifier {
                specifier,
                major_minor,
            } => {
                if *major_minor {
                    Ok(specifier.contains(&truncate(version)))
                } else {
                    Ok(specifier.contains(version))
                }
            }
            Self::StrictWildcard {
                specifier,
                major,
                minor,
            } => {
                let (env_major, env_minor) = major_minor_of(version);
                if (env_major, env_minor) == (*major, *minor) {
                    return Err(MalformedConstraint::new(
                        constraint,
                        format!(
                            "`{specifier}.*` cannot be compared with {version}; use `>=`/`<=` or a full version"
                        ),
                    ));
                }
                Ok(specifier.contains(&truncate(version)))
            }
        }
    }
}

fn parse_constraint(constraint: &str) -> Result<Vec<Vec<Clause>>, MalformedConstraint> {
    let trimmed = constraint.trim();
    if trimmed.is_empty() {
        return Ok(vec![vec![Clause::Any]]);
    }
    let mut groups = Vec::new();
    for group in trimmed.split("||") {
        let mut clauses = Vec::new();
        for token in clause_tokens(constraint, group)? {
            clauses.extend(parse_clause(constraint, &token)?);
        }
        groups.push(clauses);
    }
    Ok(groups)
}

/// Split one `||` group into clause strings. Clauses are separated by commas
/// or whitespace, and an operator may be separated from its version by spaces.
fn clause_tokens(constraint: &str, group: &str) -> Result<Vec<String>, MalformedConstraint> {
    let mut tokens = Vec::new();
    for piece in group.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            return Err(MalformedConstraint::new(constraint, "empty clause"));
        }
        let mut pending_operator: Option<&str> = None;
        for word in piece.split_whitespace() {
            if word.chars().all(|ch| matches!(ch, '<' | '>' | '=' | '!' | '~' | '^')) {
                if pending_operator.is_some() {
                    return Err(MalformedConstraint::new(constraint, "operator without a version"));
                }
                pending_operator = Some(word);
                continue;
            }
            match pending_operator.take() {
                Some(operator) => tokens.push(format!("{operator}{word}")),
                None => tokens.push(word.to_string()),
            }
        }
        if pending_operator.is_some() {
            return Err(MalformedConstraint::new(constraint, "operator without a version"));
        }
    }
    Ok(tokens)
}

fn parse_clause(constraint: &str, token: &str) -> Result<Vec<Clause>, MalformedConstraint> {
    if token == "*" {
        return Ok(vec![Clause::Any]);
    }
    if let Some(rest) = token.strip_prefix('^') {
        let release = parse_release(constraint, rest)?;
        let upper = caret_upper_bound(&release);
        return Ok(vec![
            specifier_clause(constraint, ">=", &join_release(&release))?,
            specifier_clause(constraint, "<", &join_release(&upper))?,
        ]);
    }
    if let Some(rest) = token.strip_prefix('~').filter(|rest| !rest.starts_with('=')) {
        let release = parse_release(constraint, rest)?;
        let upper = tilde_upper_bound(&release);
        return Ok(vec![
            specifier_clause(constraint, ">=", &join_release(&release))?,
            specifier_clause(constraint, "<", &join_release(&upper))?,
        ]);
    }

    let operator_len = token
        .find(|ch: char| !matches!(ch, '<' | '>' | '=' | '!' | '~'))
        .unwrap_or(token.len());
    let (operator, version) = token.split_at(operator_len);
    let operator = if operator.is_empty() { "==" } else { operator };
    if version.is_empty() {
        return Err(MalformedConstraint::new(constraint, format!("`{token}` has no version")));
    }

    if let Some(base) = version.strip_suffix(".*") {
        return match operator {
            "==" | "!=" => {
                let specifier = parse_specifier(constraint, operator, version)?;
                Ok(vec![Clause::Specifier {
                    specifier,
                    major_minor: false,
                }])
            }
            ">=" | "<=" => Ok(vec![Clause::Specifier {
                specifier: parse_specifier(constraint, operator, base)?,
                major_minor: true,
            }]),
            ">" | "<" => {
                let release = parse_release(constraint, base)?;
                let &[major, minor, ..] = release.as_slice() else {
                    return Err(MalformedConstraint::new(
                        constraint,
                        format!("`{operator}{version}` needs a major.minor wildcard"),
                    ));
                };
                Ok(vec![Clause::StrictWildcard {
                    specifier: parse_specifier(constraint, operator, base)?,
                    major,
                    minor,
                }])
            }
            _ => Err(MalformedConstraint::new(
                constraint,
                format!("`{operator}` cannot be used with a wildcard version"),
            )),
        };
    }

    let specifier = parse_specifier(constraint, operator, version)?;
    let major_minor = operator != "===" && specifier.version().release().len() <= 2;
    Ok(vec![Clause::Specifier {
        specifier,
        major_minor,
    }])
}

fn specifier_clause(
    constraint: &str,
    operator: &str,
    version: &str,
) -> Result<Clause, MalformedConstraint> {
    let specifier = parse_specifier(constraint, operator, version)?;
    let major_minor = specifier.version().release().len() <= 2;
    Ok(Clause::Specifier {
        specifier,
        major_minor,
    })
}

fn parse_specifier(
    constraint: &str,
    operator: &str,
    version: &str,
) -> Result<VersionSpecifier, MalformedConstraint> {
    VersionSpecifier::from_str(&format!("{operator}{version}"))
        .map_err(|err| MalformedConstraint::new(constraint, err.to_string()))
}

fn parse_release(constraint: &str, raw: &str) -> Result<Vec<u64>, MalformedConstraint> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(MalformedConstraint::new(constraint, "missing version"));
    }
    raw.split('.')
        .map(|part| {
            part.parse::<u64>().map_err(|_| {
                MalformedConstraint::new(constraint, format!("`{raw}` is not a release version"))
            })
        })
        .collect()
}

/// `^1.2.3` → `<2`, `^0.2.3` → `<0.3`, `^0.0.3` → `<0.0.4`, `^0` → `<1`.
fn caret_upper_bound(release: &[u64]) -> Vec<u64> {
    let bump = release
        .iter()
        .position(|part| *part != 0)
        .unwrap_or(release.len() - 1);
    let mut upper = release[..=bump].to_vec();
    upper[bump] += 1;
    upper
}

/// `~1.2.3` → `<1.3`, `~1.2` → `<1.3`, `~1` → `<2`.
fn tilde_upper_bound(release: &[u64]) -> Vec<u64> {
    let bump = if release.len() > 1 { 1 } else { 0 };
    let mut upper = release[..=bump].to_vec();
    upper[bump] += 1;
    upper
}

fn join_release(release: &[u64]) -> String {
    release
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

fn major_minor_of(version: &Version) -> (u64, u64) {
    let release = version.release();
    (
        release.first().copied().unwrap_or(0),
        release.get(1).copied().unwrap_or(0),
    )
}

fn truncate(version: &Version) -> Version {
    let (major, minor) = major_minor_of(version);
    Version::new([major, minor])
}
