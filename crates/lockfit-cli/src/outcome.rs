use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    UserError,
    Failure,
}

impl CommandStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::UserError => 1,
            Self::Failure => 2,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::UserError => "user-error",
            Self::Failure => "error",
        }
    }
}

/// What a command produced: a one-line message plus structured details that
/// both renderers read.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub status: CommandStatus,
    pub message: String,
    pub details: Value,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Ok,
            message: message.into(),
            details,
        }
    }

    pub fn failure(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Failure,
            message: message.into(),
            details,
        }
    }

    pub fn user_error(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::UserError,
            message: message.into(),
            details,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        self.details.get("hint").and_then(Value::as_str)
    }
}

pub fn format_status_message(command: &str, message: &str) -> String {
    let prefix = format!("lockfit {command}");
    if message.is_empty() {
        prefix
    } else {
        format!("{prefix}: {message}")
    }
}

pub fn to_json_response(command: &str, outcome: &ExecutionOutcome) -> Value {
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": outcome.status.as_str(),
        "message": format_status_message(command, &outcome.message),
        "details": details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_envelope_wraps_scalar_details() {
        let outcome = ExecutionOutcome::user_error("nope", json!("why"));
        let payload = to_json_response("resolve", &outcome);
        assert_eq!(payload["status"], "user-error");
        assert_eq!(payload["message"], "lockfit resolve: nope");
        assert_eq!(payload["details"]["value"], "why");
        assert_eq!(outcome.status.exit_code(), 1);
    }

    #[test]
    fn hint_comes_from_details() {
        let outcome = ExecutionOutcome::failure("broken", json!({ "hint": "retry" }));
        assert_eq!(outcome.hint(), Some("retry"));
        assert_eq!(ExecutionOutcome::success("", Value::Null).hint(), None);
    }
}
