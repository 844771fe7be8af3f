//! Output envelopes for stm CLI commands.
//!
//! Every command reports through [`emit_success`] or [`emit_error`]. With
//! `--json` the payload is wrapped in a versioned envelope on stdout;
//! otherwise a short human report goes to stdout and warnings/errors go to
//! stderr.

use serde::Serialize;

use crate::error::{Error, Result};

pub const SCHEMA_VERSION: &str = "stm.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Human-readable report: a header line, `key: value` facts, free-form
/// lines, and warnings.
#[derive(Debug, Clone, Default)]
pub struct HumanOutput {
    header: String,
    facts: Vec<(String, String)>,
    lines: Vec<String>,
    warnings: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.facts.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Render the stdout part of the report. Warnings are not included.
    pub fn render(&self) -> String {
        let mut out = self.header.clone();
        for (key, value) in &self.facts {
            out.push_str(&format!("\n  {key}: {value}"));
        }
        if !self.lines.is_empty() {
            out.push('\n');
            for line in &self.lines {
                out.push_str(&format!("\n  {line}"));
            }
        }
        out
    }
}

#[derive(Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    data: &'a T,
    #[serde(skip_serializing_if = "no_warnings")]
    warnings: &'a [String],
}

fn no_warnings(warnings: &&[String]) -> bool {
    warnings.is_empty()
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    let warnings: &[String] = human.map(|h| h.warnings.as_slice()).unwrap_or_default();

    if options.json {
        let payload = SuccessEnvelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    // Warnings survive --quiet.
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
    if options.quiet {
        return Ok(());
    }
    if let Some(human) = human {
        println!("{}", human.render());
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let hint = error_hint(err);

    if json {
        let payload = ErrorEnvelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: err.to_string(),
                code: err.exit_code(),
                kind: error_kind(err),
                details: err.details(),
                hint,
            },
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

/// Best-effort command name ("list", "subtasks set") for error envelopes,
/// computed before clap parsing so it is available when parsing fails.
pub fn infer_command_name_from_args() -> String {
    command_name_from(std::env::args().skip(1))
}

fn command_name_from(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    let mut command: Option<String> = None;
    while let Some(arg) = args.next() {
        if arg == "--dir" {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        match command.take() {
            None if arg == "subtasks" => command = Some(arg),
            None => return arg,
            Some(parent) => return format!("{parent} {arg}"),
        }
    }
    command.unwrap_or_else(|| "stm".to_string())
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        crate::error::exit_codes::USER_ERROR => "user_error",
        _ => "operation_failed",
    }
}

fn error_hint(err: &Error) -> Option<String> {
    let hint = match err {
        Error::TaskNotFound(_) => "stm list".to_string(),
        Error::AmbiguousTaskId { .. } => "use a longer id prefix (stm list)".to_string(),
        Error::MissingCredential(var) => format!("export {var}=<api key>"),
        Error::InvalidConfig(_) => "fix config.toml then retry".to_string(),
        Error::LockFailed(_) => "retry; another stm process holds the store".to_string(),
        _ => return None,
    };
    Some(hint)
}
