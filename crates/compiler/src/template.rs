//! Command template parsing
//!
//! A template is a list of commands separated by `|`. Every `|` separates,
//! quoted or not. Each command is split into arguments on whitespace, with
//! single quotes, double quotes and backslash escapes honored.

use crate::CompileError;

/// Stage separator in a command template
pub const SEPARATOR: char = '|';

/// Split a template into trimmed commands
///
/// # Errors
/// - empty template or empty command between separators
/// - more than `max_stages` commands
/// - `marker` present outside the first command
pub fn split(
    template: &str,
    marker: &str,
    max_stages: usize,
) -> Result<Vec<String>, CompileError> {
    let commands: Vec<String> = template
        .split(SEPARATOR)
        .map(|command| command.trim().to_string())
        .collect();

    if let Some(position) = commands.iter().position(String::is_empty) {
        return Err(CompileError::template(if commands.len() == 1 {
            "template contains no command".to_string()
        } else {
            format!("command {position} is empty")
        }));
    }

    if commands.len() > max_stages {
        return Err(CompileError::template(format!(
            "{} commands exceed the limit of {max_stages}",
            commands.len()
        )));
    }

    if let Some(position) = commands
        .iter()
        .skip(1)
        .position(|command| command.contains(marker))
    {
        return Err(CompileError::template(format!(
            "named pipe marker '{marker}' is only allowed in the first command, found in command {}",
            position + 1
        )));
    }

    Ok(commands)
}

/// Split one command into program and arguments
pub fn tokenize(command: &str) -> Result<Vec<String>, CompileError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Quote::None, c) if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (Quote::None, '\'') => {
                quote = Quote::Single;
                in_word = true;
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                in_word = true;
            }
            (Quote::None, '\\') => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| CompileError::template("trailing backslash in command"))?;
                current.push(escaped);
                in_word = true;
            }
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::Double, '\\') => match chars.next() {
                Some(escaped @ ('"' | '\\')) => current.push(escaped),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => return Err(CompileError::template("trailing backslash in command")),
            },
            (_, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote != Quote::None {
        return Err(CompileError::template(format!(
            "unterminated quote in command: {command}"
        )));
    }
    if in_word {
        args.push(current);
    }
    if args.is_empty() {
        return Err(CompileError::template("command has no program"));
    }
    Ok(args)
}
