// ABOUTME: Command message parsing and typed argument binding
// ABOUTME: Recognizes !command messages and converts raw args to a command's parameter schema

use crate::error::CommandError;
use std::collections::HashMap;

/// A command recognized in a chat message, before its arguments are typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// The command name (without prefix), lowercased
    pub name: String,
    /// Parsed arguments (handles quoted strings)
    pub args: Vec<String>,
    /// The raw argument string after the command name
    pub raw_args: String,
}

impl ParsedCommand {
    pub fn new(name: impl Into<String>, args: Vec<String>, raw_args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args,
            raw_args: raw_args.into(),
        }
    }

    /// Get the first argument if present
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(|s| s.as_str())
    }
}

/// Result of parsing a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// A command was recognized
    Command(ParsedCommand),
    /// A regular message (not a command)
    Message(String),
    /// Message should be ignored (empty, escape sequence, etc.)
    Ignore,
}

impl ParseResult {
    pub fn is_command(&self) -> bool {
        matches!(self, ParseResult::Command(_))
    }

    pub fn as_command(&self) -> Option<&ParsedCommand> {
        match self {
            ParseResult::Command(cmd) => Some(cmd),
            _ => None,
        }
    }
}

/// Parse arguments from a string, respecting quoted strings
fn parse_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = '"';

    for c in input.chars() {
        match c {
            '"' | '\'' if !in_quotes => {
                in_quotes = true;
                quote_char = c;
            }
            c if c == quote_char && in_quotes => {
                in_quotes = false;
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// Parse a chat message to determine if it's a command
///
/// Recognizes `!command args` and `{bot_prefix} command args`. Messages
/// starting with `!!` are escaped into plain messages; empty messages are
/// ignored.
pub fn parse_message(body: &str, bot_prefix: &str) -> ParseResult {
    let trimmed = body.trim();

    if trimmed.is_empty() {
        return ParseResult::Ignore;
    }

    if let Some(escaped) = trimmed.strip_prefix("!!") {
        let escaped = escaped.trim();
        if escaped.is_empty() {
            return ParseResult::Ignore;
        }
        return ParseResult::Message(escaped.to_string());
    }

    let bot_prefix_lower = bot_prefix.to_lowercase();
    let trimmed_lower = trimmed.to_lowercase();

    if !bot_prefix.is_empty() && trimmed_lower == bot_prefix_lower {
        return ParseResult::Command(ParsedCommand::new("", Vec::new(), ""));
    }

    if !bot_prefix.is_empty()
        && trimmed_lower.starts_with(&bot_prefix_lower)
        && trimmed.len() > bot_prefix.len()
        && trimmed
            .chars()
            .nth(bot_prefix.chars().count())
            .is_some_and(|c| c.is_whitespace())
    {
        let remainder = trimmed[bot_prefix.len()..].trim();
        return parse_command_from_text(remainder);
    }

    if let Some(after_bang) = trimmed.strip_prefix('!') {
        if after_bang.chars().next().is_some_and(|c| c.is_alphabetic()) {
            return parse_command_from_text(after_bang);
        }
    }

    ParseResult::Message(trimmed.to_string())
}

/// Parse command name and arguments from text (without the prefix)
fn parse_command_from_text(text: &str) -> ParseResult {
    let text = text.trim();
    if text.is_empty() {
        return ParseResult::Command(ParsedCommand::new("", Vec::new(), ""));
    }

    let mut parts = text.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_lowercase();
    let raw_args = parts.next().map(str::trim).unwrap_or("").to_string();
    let args = parse_args(&raw_args);

    ParseResult::Command(ParsedCommand::new(name, args, raw_args))
}

// =============================================================================
// Parameter schema
// =============================================================================

/// Declared type of a command parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    Text,
    Boolean,
}

impl ParamKind {
    fn expected(self) -> &'static str {
        match self {
            ParamKind::Integer => "an integer",
            ParamKind::Text => "text",
            ParamKind::Boolean => "true or false",
        }
    }
}

/// One declared parameter of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParam {
    pub name: String,
    pub description: String,
    pub kind: ParamKind,
    pub required: bool,
}

impl CommandParam {
    pub fn required(name: impl Into<String>, description: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, description, kind)
        }
    }
}

/// A typed argument value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Integer(i64),
    Text(String),
    Boolean(bool),
}

/// Arguments bound to a command's parameter schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    values: HashMap<String, ArgValue>,
}

impl CommandArgs {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Bind raw arguments to a parameter schema.
///
/// Arguments are positional; `name:value` or `name=value` addresses a
/// parameter by name instead. The last text parameter absorbs any trailing
/// words.
pub fn bind_args(params: &[CommandParam], raw: &[String]) -> Result<CommandArgs, CommandError> {
    let mut values = HashMap::new();
    let mut positional = Vec::new();

    for arg in raw {
        match split_named(params, arg) {
            Some((param, value)) => {
                values.insert(param.name.clone(), convert(param, value)?);
            }
            None => positional.push(arg.as_str()),
        }
    }

    let free: Vec<&CommandParam> = params
        .iter()
        .filter(|p| !values.contains_key(&p.name))
        .collect();

    let mut rest = positional.into_iter();
    for (i, param) in free.iter().enumerate() {
        let is_last = i + 1 == free.len();
        let value = if is_last && param.kind == ParamKind::Text {
            let tail: Vec<&str> = rest.by_ref().collect();
            (!tail.is_empty()).then(|| tail.join(" "))
        } else {
            rest.next().map(str::to_string)
        };
        if let Some(value) = value {
            values.insert(param.name.clone(), convert(param, &value)?);
        }
    }

    if rest.next().is_some() {
        return Err(CommandError::TooManyArguments(params.len()));
    }

    if let Some(missing) = params
        .iter()
        .find(|p| p.required && !values.contains_key(&p.name))
    {
        return Err(CommandError::MissingArgument(missing.name.clone()));
    }

    Ok(CommandArgs { values })
}

fn split_named<'a>(params: &'a [CommandParam], arg: &'a str) -> Option<(&'a CommandParam, &'a str)> {
    let (name, value) = arg.split_once([':', '='])?;
    params
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .map(|p| (p, value))
}

fn convert(param: &CommandParam, value: &str) -> Result<ArgValue, CommandError> {
    let invalid = || CommandError::InvalidArgument {
        name: param.name.clone(),
        expected: param.kind.expected(),
        value: value.to_string(),
    };
    match param.kind {
        ParamKind::Integer => value.parse().map(ArgValue::Integer).map_err(|_| invalid()),
        ParamKind::Text => Ok(ArgValue::Text(value.to_string())),
        ParamKind::Boolean => match value.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(ArgValue::Boolean(true)),
            "false" | "no" | "off" | "0" => Ok(ArgValue::Boolean(false)),
            _ => Err(invalid()),
        },
    }
}
