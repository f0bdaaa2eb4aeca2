use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use lockfit_domain::{Implementation, LockFormat};

#[derive(Parser, Debug)]
#[command(
    name = "lockfit",
    author,
    version,
    about = "Pick the installable artifact of every locked package for a target Python environment"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct LockfitCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(long, help = "Emit {status,message,details} JSON envelopes", global = true)]
    pub json: bool,
    #[arg(long, help = "Disable colored output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandCli {
    #[command(about = "Select one distribution per locked package for the target environment")]
    Resolve(ResolveArgs),
    #[command(about = "Print the target environment's tag table, most specific first")]
    Tags(EnvironmentArgs),
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub lock: LockArgs,
    #[command(flatten)]
    pub environment: EnvironmentArgs,
    #[arg(
        long,
        help = "Report every package without a compatible distribution instead of stopping at the verdict"
    )]
    pub keep_going: bool,
}

#[derive(Args, Debug)]
pub struct LockArgs {
    #[arg(
        long,
        env = "LOCKFIT_LOCK",
        help = "Lock file to read (discovered from --dir when omitted)"
    )]
    pub lock: Option<PathBuf>,
    #[arg(long, value_enum, help = "Lock format when the filename does not tell")]
    pub format: Option<LockFormatArg>,
    #[arg(long, help = "Directory to start lock discovery from [default: current directory]")]
    pub dir: Option<PathBuf>,
    #[arg(long, help = "Last directory lock discovery may look in")]
    pub stop: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EnvironmentArgs {
    #[arg(
        long = "env",
        env = "LOCKFIT_ENV",
        value_name = "FILE",
        help = "JSON environment description; takes precedence over --python"
    )]
    pub env_file: Option<PathBuf>,
    #[arg(long, env = "LOCKFIT_PYTHON", help = "Target interpreter version, e.g. 3.11.4")]
    pub python: Option<String>,
    #[arg(long, value_enum, default_value_t = ImplementationArg::Cpython)]
    pub implementation: ImplementationArg,
    #[arg(
        long = "platform",
        value_name = "PLATFORM",
        help = "Supported platform tag, most specific first (repeatable)"
    )]
    pub platforms: Vec<String>,
    #[arg(
        long,
        conflicts_with = "platforms",
        help = "Named platform list such as manylinux_2_36_x86_64 or any"
    )]
    pub preset: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LockFormatArg {
    Poetry,
    Uv,
    Pylock,
}

impl From<LockFormatArg> for LockFormat {
    fn from(value: LockFormatArg) -> Self {
        match value {
            LockFormatArg::Poetry => LockFormat::Poetry,
            LockFormatArg::Uv => LockFormat::Uv,
            LockFormatArg::Pylock => LockFormat::Pylock,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ImplementationArg {
    Cpython,
    Pypy,
    Ironpython,
    Jython,
}

impl From<ImplementationArg> for Implementation {
    fn from(value: ImplementationArg) -> Self {
        match value {
            ImplementationArg::Cpython => Implementation::CPython,
            ImplementationArg::Pypy => Implementation::PyPy,
            ImplementationArg::Ironpython => Implementation::IronPython,
            ImplementationArg::Jython => Implementation::Jython,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
    pub no_color: bool,
}

impl From<&LockfitCli> for GlobalOptions {
    fn from(cli: &LockfitCli) -> Self {
        Self {
            quiet: cli.quiet,
            verbose: cli.verbose,
            trace: cli.trace,
            json: cli.json,
            no_color: cli.no_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        LockfitCli::command().debug_assert();
    }

    #[test]
    fn preset_conflicts_with_platforms() {
        let parsed = LockfitCli::try_parse_from([
            "lockfit",
            "tags",
            "--python",
            "3.11",
            "--preset",
            "any",
            "--platform",
            "linux_x86_64",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = LockfitCli::try_parse_from([
            "lockfit",
            "resolve",
            "--lock",
            "poetry.lock",
            "--python",
            "3.12",
            "--json",
            "-vv",
            "--keep-going",
        ])
        .unwrap();
        let global = GlobalOptions::from(&cli);
        assert!(global.json);
        assert_eq!(global.verbose, 2);
        match cli.command {
            CommandCli::Resolve(args) => {
                assert!(args.keep_going);
                assert_eq!(args.environment.python.as_deref(), Some("3.12"));
                assert_eq!(args.lock.lock, Some(PathBuf::from("poetry.lock")));
            }
            CommandCli::Tags(_) => panic!("expected resolve"),
        }
    }
}
