#![deny(clippy::all, warnings)]

use atty::Stream;
use clap::Parser;
use color_eyre::Result;
use serde_json::Value;

mod cli;
mod commands;
mod outcome;
mod style;

use cli::{CommandCli, GlobalOptions, LockfitCli};
use outcome::{CommandStatus, ExecutionOutcome};
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = LockfitCli::parse();
    let global = GlobalOptions::from(&cli);
    init_tracing(global.trace, global.verbose);

    let (name, outcome) = match &cli.command {
        CommandCli::Resolve(args) => ("resolve", commands::resolve(args)),
        CommandCli::Tags(args) => ("tags", commands::tags(args)),
    };
    let code = emit_output(&global, name, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("lockfit={level},lockfit_core={level},lockfit_domain={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(global: &GlobalOptions, command: &str, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.status.exit_code();

    if global.json {
        let payload = outcome::to_json_response(command, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    let style = Style::new(global.no_color, atty::is(Stream::Stdout));
    let message = outcome::format_status_message(command, &outcome.message);
    if global.quiet {
        if outcome.status != CommandStatus::Ok {
            eprintln!("{message}");
        }
        return Ok(code);
    }

    println!("{}", style.status(outcome.status, &message));
    if let Some(table) = render_resolution_table(&style, &outcome.details) {
        println!("{table}");
    }
    for line in incompatible_lines(&outcome.details) {
        println!("{}", style.warning(&line));
    }
    if let Some(excluded) = excluded_line(&outcome.details) {
        println!("{}", style.info(&excluded));
    }
    if let Some(tags) = outcome.details.get("tags").and_then(Value::as_array) {
        for tag in tags.iter().filter_map(Value::as_str) {
            println!("  {tag}");
        }
    }
    if let Some(hint) = outcome.hint() {
        println!("{}", style.info(&format!("Hint: {hint}")));
    }

    Ok(code)
}

struct RequirementRow {
    name: String,
    version: String,
    filename: String,
    source: String,
}

fn render_resolution_table(style: &Style, details: &Value) -> Option<String> {
    let resolved = details.get("resolved")?.as_array()?;
    if resolved.is_empty() {
        return None;
    }
    let mut rows = Vec::new();
    for requirement in resolved {
        let obj = requirement.as_object()?;
        rows.push(RequirementRow {
            name: obj.get("name")?.as_str()?.to_string(),
            version: obj.get("version")?.as_str()?.to_string(),
            filename: obj.get("filename")?.as_str()?.to_string(),
            source: obj
                .get("index_url")
                .and_then(Value::as_str)
                .unwrap_or("default index")
                .to_string(),
        });
    }
    Some(format_requirement_table(style, &rows))
}

fn format_requirement_table(style: &Style, rows: &[RequirementRow]) -> String {
    let headers = ["Package", "Version", "Distribution", "Source"];
    let mut widths = headers.map(str::len);
    for row in rows {
        widths[0] = widths[0].max(row.name.len());
        widths[1] = widths[1].max(row.version.len());
        widths[2] = widths[2].max(row.filename.len());
        widths[3] = widths[3].max(row.source.len());
    }

    let line = |cells: [&str; 4]| {
        format!(
            "{:<w0$}  {:<w1$}  {:<w2$}  {}",
            cells[0],
            cells[1],
            cells[2],
            cells[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        )
    };

    let mut lines = vec![
        style.table_header(line(headers).trim_end()),
        format!(
            "{:-<w0$}  {:-<w1$}  {:-<w2$}  {:-<w3$}",
            "",
            "",
            "",
            "",
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        ),
    ];
    for row in rows {
        lines.push(line([
            row.name.as_str(),
            row.version.as_str(),
            row.filename.as_str(),
            row.source.as_str(),
        ]));
    }
    lines.join("\n")
}

fn incompatible_lines(details: &Value) -> Vec<String> {
    details
        .get("incompatible")
        .and_then(Value::as_array)
        .map(|packages| {
            packages
                .iter()
                .filter_map(|package| {
                    let name = package.get("name")?.as_str()?;
                    let version = package.get("version")?.as_str()?;
                    Some(format!("  no compatible distribution: {name}=={version}"))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn excluded_line(details: &Value) -> Option<String> {
    let excluded = details.get("excluded")?.as_array()?;
    if excluded.is_empty() {
        return None;
    }
    let names = excluded
        .iter()
        .filter_map(|package| package.get("name").and_then(Value::as_str))
        .collect::<Vec<_>>();
    Some(format!(
        "skipped {} package(s) not meant for this interpreter: {}",
        names.len(),
        names.join(", ")
    ))
}
