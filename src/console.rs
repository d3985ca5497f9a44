//! Operator console commands
//!
//! The `uroflow` binary reads one command per line from stdin. Arguments are
//! whitespace-separated; double quotes group words, so
//! `save first=Budi hospital="RS Harapan"` is two key/value pairs.

use crate::error::{Result, UroflowError};
use crate::session::PatientMetadata;

/// Help text printed by the `help` command
pub const HELP: &str = "\
Commands:
  start                      start (or restart) a measurement
  stop                       stop the measurement, keeping its data
  clear                      clear the chart and samples
  status                     show session and link status
  save key=value ...         save the measurement and render its report
                             keys: first last age id gender doctor_first
                                   doctor_last hospital address
  history                    list saved measurements
  report <patient_id>        show the report path of a patient
  delete <patient_id>        delete a patient's records and reports
  reconnect                  reopen the serial port
  ports                      list serial ports
  help                       show this help
  quit                       exit";

/// A parsed console command
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Clear,
    Status,
    Save(PatientMetadata),
    History,
    Report(String),
    Delete(String),
    Reconnect,
    Ports,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let tokens = tokenize(line)?;
        let Some((name, args)) = tokens.split_first() else {
            return Ok(None);
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "start" => no_args(ConsoleCommand::Start, name, args)?,
            "stop" => no_args(ConsoleCommand::Stop, name, args)?,
            "clear" => no_args(ConsoleCommand::Clear, name, args)?,
            "status" => no_args(ConsoleCommand::Status, name, args)?,
            "history" => no_args(ConsoleCommand::History, name, args)?,
            "reconnect" => no_args(ConsoleCommand::Reconnect, name, args)?,
            "ports" => no_args(ConsoleCommand::Ports, name, args)?,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            "save" => ConsoleCommand::Save(parse_metadata(args)?),
            "report" => ConsoleCommand::Report(one_arg(name, args)?),
            "delete" => ConsoleCommand::Delete(one_arg(name, args)?),
            other => {
                return Err(UroflowError::Command(format!(
                    "unknown command '{}', type 'help'",
                    other
                )))
            }
        };
        Ok(Some(command))
    }
}

fn no_args(command: ConsoleCommand, name: &str, args: &[String]) -> Result<ConsoleCommand> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(UroflowError::Command(format!("'{}' takes no arguments", name)))
    }
}

fn one_arg(name: &str, args: &[String]) -> Result<String> {
    match args {
        [arg] => Ok(arg.clone()),
        _ => Err(UroflowError::Command(format!(
            "'{}' takes exactly one argument",
            name
        ))),
    }
}

/// Split a line into words, honouring double quotes
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_quotes {
        return Err(UroflowError::Command("unterminated quote".into()));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Build patient details from `key=value` arguments
///
/// Omitted fields stay blank; the export step reports them as missing.
pub fn parse_metadata(args: &[String]) -> Result<PatientMetadata> {
    let mut metadata = PatientMetadata::default();

    for arg in args {
        let (key, value) = arg.split_once('=').ok_or_else(|| {
            UroflowError::Command(format!("expected key=value, got '{}'", arg))
        })?;
        let value = value.trim().to_string();

        match key.trim().to_ascii_lowercase().as_str() {
            "first" => metadata.first_name = value,
            "last" => metadata.last_name = value,
            "id" => metadata.patient_id = value,
            "doctor_first" => metadata.doctor_first_name = value,
            "doctor_last" => metadata.doctor_last_name = value,
            "hospital" => metadata.hospital_name = value,
            "address" => metadata.hospital_address = value,
            "age" => {
                metadata.age = value.parse().map_err(|_| {
                    UroflowError::Command(format!("age must be a whole number, got '{}'", value))
                })?
            }
            "gender" => metadata.gender = value.parse()?,
            other => {
                return Err(UroflowError::Command(format!(
                    "unknown field '{}'",
                    other
                )))
            }
        }
    }

    Ok(metadata)
}
