//! AT command set
//!
//! Commands are descriptors in a table, so the tracker commands sit next to
//! any generic ones the host adds. Supported forms:
//!
//! - `AT?` lists every command with its help text
//! - `AT+CMD?` prints the help text of one command
//! - `AT+CMD=?` queries the current value
//! - `AT+CMD=<value>` sets a new value

use std::fmt;
use tracing::debug;

use crate::drivers::DetectedModules;
use crate::storage::TrackerSettings;

/// Failure of an AT command, printed verbatim on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtError {
    /// Unknown command or unsupported form
    Error,
    /// Bad parameter value
    ParamError,
}

impl fmt::Display for AtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtError::Error => write!(f, "AT_ERROR"),
            AtError::ParamError => write!(f, "AT_PARAM_ERROR"),
        }
    }
}

/// State a command may read or change
pub struct AtContext<'a> {
    pub settings: &'a mut TrackerSettings,
    pub modules: &'a DetectedModules,
}

pub type QueryFn = fn(&AtContext<'_>) -> String;
pub type SetFn = fn(&mut AtContext<'_>, &str) -> Result<(), AtError>;

/// One AT command descriptor
#[derive(Clone)]
pub struct AtCommand {
    /// Command name including the `+`, e.g. `+GNSS`
    pub name: &'static str,
    pub help: &'static str,
    pub query: Option<QueryFn>,
    pub set: Option<SetFn>,
}

impl fmt::Debug for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtCommand")
            .field("name", &self.name)
            .field("help", &self.help)
            .finish_non_exhaustive()
    }
}

/// Lines printed in answer to one command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtReply {
    pub lines: Vec<String>,
}

impl AtReply {
    fn ok(mut lines: Vec<String>) -> Self {
        lines.push("OK".to_string());
        Self { lines }
    }

    fn error(error: AtError) -> Self {
        Self { lines: vec![error.to_string()] }
    }

    pub fn is_ok(&self) -> bool {
        self.lines.last().is_some_and(|l| l == "OK")
    }
}

/// Registered AT commands
#[derive(Debug, Clone, Default)]
pub struct AtCommandSet {
    commands: Vec<AtCommand>,
}

impl AtCommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tracker commands: `+GNSS`, `+BATCHK` and `+MOD`
    pub fn tracker() -> Self {
        let mut set = Self::new();
        set.register(AtCommand {
            name: "+GNSS",
            help: "Set GNSS precision and format 0 = 4 digit, 1 = 6 digit, 2 = Helium Mapper",
            query: Some(query_gnss),
            set: Some(set_gnss),
        });
        set.register(AtCommand {
            name: "+BATCHK",
            help: "Enable/Disable the battery charge check 0 = off, 1 = on",
            query: Some(query_battery_check),
            set: Some(set_battery_check),
        });
        set.register(AtCommand {
            name: "+MOD",
            help: "List detected modules",
            query: Some(query_modules),
            set: None,
        });
        set
    }

    /// Add a command, replacing one with the same name
    pub fn register(&mut self, command: AtCommand) {
        self.commands.retain(|c| !c.name.eq_ignore_ascii_case(command.name));
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[AtCommand] {
        &self.commands
    }

    fn find(&self, name: &str) -> Option<&AtCommand> {
        self.commands.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Execute one console line
    pub fn handle_line(&self, line: &str, ctx: &mut AtContext<'_>) -> AtReply {
        let line = line.trim();
        debug!("AT command: {}", line);

        let Some(body) = strip_at_prefix(line) else {
            return AtReply::error(AtError::Error);
        };

        if body == "?" {
            let lines = self
                .commands
                .iter()
                .map(|c| format!("AT{}: {}", c.name, c.help))
                .collect();
            return AtReply::ok(lines);
        }
        if body.is_empty() {
            return AtReply::ok(Vec::new());
        }

        let (name, form) = match body.find(['=', '?']) {
            Some(pos) => (&body[..pos], &body[pos..]),
            None => (body, ""),
        };
        let Some(command) = self.find(name) else {
            return AtReply::error(AtError::Error);
        };

        match form {
            "?" => AtReply::ok(vec![format!("AT{}: {}", command.name, command.help)]),
            "=?" => match command.query {
                Some(query) => AtReply::ok(vec![format!("AT{}={}", command.name, query(ctx))]),
                None => AtReply::error(AtError::Error),
            },
            _ => match (form.strip_prefix('='), command.set) {
                (Some(value), Some(set)) => match set(ctx, value.trim()) {
                    Ok(()) => AtReply::ok(Vec::new()),
                    Err(e) => AtReply::error(e),
                },
                _ => AtReply::error(AtError::Error),
            },
        }
    }
}

fn strip_at_prefix(line: &str) -> Option<&str> {
    let prefix = line.get(..2)?;
    if prefix.eq_ignore_ascii_case("AT") {
        Some(&line[2..])
    } else {
        None
    }
}

fn parse_digit(value: &str, max: u8) -> Result<u8, AtError> {
    match value.parse::<u8>() {
        Ok(v) if v <= max && value.len() == 1 => Ok(v),
        _ => Err(AtError::ParamError),
    }
}

fn query_gnss(ctx: &AtContext<'_>) -> String {
    let mode = if ctx.settings.mapper_format {
        2
    } else if ctx.settings.high_precision {
        1
    } else {
        0
    };
    format!("GPS precision: {}", mode)
}

fn set_gnss(ctx: &mut AtContext<'_>, value: &str) -> Result<(), AtError> {
    match parse_digit(value, 2)? {
        0 => {
            ctx.settings.high_precision = false;
            ctx.settings.mapper_format = false;
        }
        1 => {
            ctx.settings.high_precision = true;
            ctx.settings.mapper_format = false;
        }
        _ => ctx.settings.mapper_format = true,
    }
    Ok(())
}

fn query_battery_check(ctx: &AtContext<'_>) -> String {
    format!("Battery check: {}", u8::from(ctx.settings.battery_check))
}

fn set_battery_check(ctx: &mut AtContext<'_>, value: &str) -> Result<(), AtError> {
    ctx.settings.battery_check = parse_digit(value, 1)? == 1;
    Ok(())
}

fn query_modules(ctx: &AtContext<'_>) -> String {
    let names = ctx.modules.names();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
