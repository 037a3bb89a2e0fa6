//! REPL command parsing and definitions
//!
//! Handles parsing of dot-commands (.help, .quit, .load, .decompile, ...)
//! and the `name/arity` shorthand for selective decompilation.

use anyhow::{anyhow, Result};

/// Available REPL commands
#[derive(Debug, Clone)]
pub enum ReplCommand {
    /// Show help information
    Help,
    /// Exit the REPL
    Quit,
    /// Clear the screen
    Clear,
    /// Toggle quiet mode
    Quiet,
    /// Toggle debug mode
    Debug,
    /// Show session statistics
    Stats,
    /// Load a `.beam` file
    Load(String),
    /// Show loaded-module information
    Info,
    /// List the loaded module's chunks
    Chunks,
    /// Decompile the module, or only the named definitions
    Decompile(Option<String>),
    /// Print assembly for the module, or one `name/arity`
    Asm(Option<String>),
}

/// Parse a command string into a ReplCommand
pub fn parse_command(input: &str) -> Result<ReplCommand> {
    let trimmed = input.trim();

    if !trimmed.starts_with('.') {
        return Err(anyhow!("Commands must start with '.'"));
    }

    let parts: Vec<&str> = trimmed[1..].split_whitespace().collect();

    if parts.is_empty() {
        return Err(anyhow!("Empty command"));
    }

    match parts[0] {
        "help" | "h" => Ok(ReplCommand::Help),
        "quit" | "q" | "exit" => Ok(ReplCommand::Quit),
        "clear" | "cls" => Ok(ReplCommand::Clear),
        "quiet" => Ok(ReplCommand::Quiet),
        "debug" => Ok(ReplCommand::Debug),
        "stats" | "statistics" => Ok(ReplCommand::Stats),
        "load" | "l" => {
            if parts.len() != 2 {
                return Err(anyhow!("Usage: .load <file.beam>"));
            }
            Ok(ReplCommand::Load(parts[1].to_string()))
        }
        "info" | "i" => Ok(ReplCommand::Info),
        "chunks" => Ok(ReplCommand::Chunks),
        "decompile" | "d" => match parts.len() {
            1 => Ok(ReplCommand::Decompile(None)),
            2 => Ok(ReplCommand::Decompile(Some(parts[1].to_string()))),
            _ => Err(anyhow!("Usage: .decompile [name[/arity]]")),
        },
        "asm" | "a" => match parts.len() {
            1 => Ok(ReplCommand::Asm(None)),
            2 => Ok(ReplCommand::Asm(Some(parts[1].to_string()))),
            _ => Err(anyhow!("Usage: .asm [name/arity]")),
        },
        _ => Err(anyhow!("Unknown command: .{}", parts[0])),
    }
}

/// Split a `name/arity` target; a bare name selects every arity.
pub fn parse_target(target: &str) -> Result<(String, Option<i64>)> {
    match target.rsplit_once('/') {
        Some((name, arity)) => {
            let arity = arity
                .parse::<i64>()
                .map_err(|_| anyhow!("Invalid arity in target '{}'", target))?;
            if name.is_empty() {
                return Err(anyhow!("Invalid target '{}'", target));
            }
            Ok((name.to_string(), Some(arity)))
        }
        None => Ok((target.to_string(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_help() {
        assert!(matches!(parse_command(".help").unwrap(), ReplCommand::Help));
        assert!(matches!(parse_command(".h").unwrap(), ReplCommand::Help));
    }

    #[test]
    fn test_parse_quit() {
        assert!(matches!(parse_command(".quit").unwrap(), ReplCommand::Quit));
        assert!(matches!(parse_command(".q").unwrap(), ReplCommand::Quit));
        assert!(matches!(parse_command(".exit").unwrap(), ReplCommand::Quit));
    }

    #[test]
    fn test_parse_load() {
        match parse_command(".load sample.beam").unwrap() {
            ReplCommand::Load(path) => assert_eq!(path, "sample.beam"),
            _ => panic!("Expected Load command"),
        }
        assert!(parse_command(".load").is_err());
    }

    #[test]
    fn test_parse_decompile_with_and_without_target() {
        assert!(matches!(
            parse_command(".decompile").unwrap(),
            ReplCommand::Decompile(None)
        ));
        match parse_command(".decompile run/2").unwrap() {
            ReplCommand::Decompile(Some(target)) => assert_eq!(target, "run/2"),
            _ => panic!("Expected Decompile command"),
        }
    }

    #[test]
    fn test_parse_asm() {
        assert!(matches!(parse_command(".asm").unwrap(), ReplCommand::Asm(None)));
        match parse_command(".a init/1").unwrap() {
            ReplCommand::Asm(Some(target)) => assert_eq!(target, "init/1"),
            _ => panic!("Expected Asm command"),
        }
    }

    #[test]
    fn test_parse_invalid_command() {
        assert!(parse_command(".invalid").is_err());
        assert!(parse_command("help").is_err()); // Missing dot
        assert!(parse_command(".").is_err()); // Empty command
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("run").unwrap(), ("run".to_string(), None));
        assert_eq!(parse_target("run/2").unwrap(), ("run".to_string(), Some(2)));
        assert_eq!(
            parse_target("zero?/1").unwrap(),
            ("zero?".to_string(), Some(1))
        );
        assert!(parse_target("run/two").is_err());
        assert!(parse_target("/2").is_err());
    }
}
