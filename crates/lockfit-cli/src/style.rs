use std::env;

use color_eyre::owo_colors::{OwoColorize, Style as Paint};

use crate::outcome::CommandStatus;

/// Terminal styling for the text renderer. Everything renders as plain text
/// when color is off.
pub struct Style {
    enabled: bool,
}

impl Style {
    pub fn new(force_no_color: bool, is_tty: bool) -> Self {
        let env_no_color = env::var_os("NO_COLOR").is_some();
        Self {
            enabled: !(force_no_color || env_no_color) && is_tty,
        }
    }

    /// The one-line verdict that opens every report.
    pub fn status(&self, status: CommandStatus, text: &str) -> String {
        let (symbol, paint) = match status {
            CommandStatus::Ok => ("✔", Paint::new().green().bold()),
            CommandStatus::UserError => ("✗", Paint::new().yellow().bold()),
            CommandStatus::Failure => ("✖", Paint::new().red().bold()),
        };
        self.paint(&format!("{symbol} {text}"), paint)
    }

    pub fn info(&self, text: &str) -> String {
        self.paint(text, Paint::new().cyan())
    }

    pub fn warning(&self, text: &str) -> String {
        self.paint(text, Paint::new().yellow())
    }

    pub fn table_header(&self, text: &str) -> String {
        self.paint(text, Paint::new().bold())
    }

    fn paint(&self, text: &str, paint: Paint) -> String {
        if self.enabled {
            text.style(paint).to_string()
        } else {
            text.to_string()
        }
    }
}
