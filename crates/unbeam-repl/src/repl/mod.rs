//! Interactive inspection session for compiled BEAM modules
//!
//! Wraps `unbeam-core` with user-facing features:
//! - Command history and editing
//! - REPL dot-commands (.help, .load, .decompile, ...)
//! - The `name/arity` shorthand for selective decompilation
//! - Output formatting and notifications

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::debug;
use unbeam_core::beam::code::{Options, ResolveContext};
use unbeam_core::beam::BeamFile;
use unbeam_core::{decompiler, DebugInfo};

pub mod commands;
pub mod notifier;

pub use commands::ReplCommand;
pub use notifier::{DefaultNotifier, ReplNotifier};

/// A loaded module: the parsed container plus its unpacked debug info when
/// the backend is one we understand.
struct LoadedModule {
    path: String,
    beam: BeamFile,
    info: Option<DebugInfo>,
}

/// Serializable module summary for `.info` and `--info --json`.
#[derive(Debug, Serialize)]
pub struct ModuleInfo {
    pub path: String,
    pub module: Option<String>,
    pub source_file: Option<String>,
    pub definitions: Vec<String>,
    pub chunks: Vec<unbeam_core::beam::ChunkInfo>,
}

/// Interactive inspector for compiled BEAM modules
pub struct Repl {
    /// Currently loaded module, if any
    loaded: Option<LoadedModule>,
    /// Current notifier for output
    notifier: Box<dyn ReplNotifier>,
    /// Whether the REPL is running
    running: bool,
    /// Quiet mode (suppress timing info)
    quiet: bool,
    /// Debug mode (resolve every assembly operand)
    debug: bool,
    /// Commands handled this session
    commands_run: u64,
    /// Modules loaded this session
    modules_loaded: u64,
}

impl Repl {
    pub fn new() -> Self {
        Self {
            loaded: None,
            notifier: Box::new(DefaultNotifier::new()),
            running: true,
            quiet: false,
            debug: false,
            commands_run: 0,
            modules_loaded: 0,
        }
    }

    /// Set the notifier for this REPL
    pub fn set_notifier(&mut self, notifier: Box<dyn ReplNotifier>) {
        self.notifier = notifier;
    }

    /// Get a reference to the current notifier
    pub fn notifier(&self) -> &dyn ReplNotifier {
        self.notifier.as_ref()
    }

    /// Check if the REPL is still running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Set quiet mode
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    /// Set debug mode
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Parse REPL input into a command
    pub fn parse_input(&self, input: &str) -> Result<ReplCommand> {
        commands::parse_command(input)
    }

    /// Handle a REPL command
    pub fn handle_command(&mut self, command: ReplCommand) -> Result<String> {
        self.commands_run += 1;

        match command {
            ReplCommand::Help => Ok(self.get_help_text()),
            ReplCommand::Quit => {
                self.running = false;
                Ok("Goodbye!".to_string())
            }
            ReplCommand::Clear => {
                print!("\x1B[2J\x1B[1;1H");
                Ok("Screen cleared.".to_string())
            }
            ReplCommand::Quiet => {
                self.quiet = !self.quiet;
                Ok(format!(
                    "Quiet mode: {}",
                    if self.quiet { "on" } else { "off" }
                ))
            }
            ReplCommand::Debug => {
                self.debug = !self.debug;
                Ok(format!(
                    "Debug mode: {}",
                    if self.debug { "on" } else { "off" }
                ))
            }
            ReplCommand::Stats => Ok(self.stats_text()),
            ReplCommand::Load(path) => self.load(&path),
            ReplCommand::Info => self.info_text(),
            ReplCommand::Chunks => self.chunks_text(),
            ReplCommand::Decompile(target) => self.decompile(target.as_deref()),
            ReplCommand::Asm(target) => self.asm(target.as_deref()),
        }
    }

    /// Load a `.beam` file from disk
    pub fn load(&mut self, path: &str) -> Result<String> {
        let beam = BeamFile::read(Path::new(path))?;
        let module_name = beam.module_name().unwrap_or_else(|_| "?".to_string());

        // a foreign debug-info backend still permits chunk and asm inspection
        let info = match beam.debug_info_term() {
            Ok(term) => match DebugInfo::from_term(&term) {
                Ok(info) => Some(info),
                Err(error) => {
                    debug!(%error, "debug info unavailable");
                    None
                }
            },
            Err(error) => {
                debug!(%error, "no Dbgi chunk");
                None
            }
        };

        let definitions = info
            .as_ref()
            .map(|info| info.definitions.len())
            .unwrap_or(0);

        self.loaded = Some(LoadedModule {
            path: path.to_string(),
            beam,
            info,
        });
        self.modules_loaded += 1;

        Ok(format!(
            "Loaded {module_name} from {path} ({definitions} definitions)"
        ))
    }

    /// The loaded-module summary
    pub fn module_info(&self) -> Result<ModuleInfo> {
        let loaded = self.loaded()?;

        Ok(ModuleInfo {
            path: loaded.path.clone(),
            module: loaded.beam.module_name().ok(),
            source_file: loaded
                .info
                .as_ref()
                .and_then(|info| info.file.clone()),
            definitions: loaded
                .info
                .as_ref()
                .map(|info| {
                    info.definitions
                        .iter()
                        .map(|definition| {
                            format!(
                                "{} {}/{}",
                                definition.kind.keyword(),
                                definition.name,
                                definition.arity
                            )
                        })
                        .collect()
                })
                .unwrap_or_default(),
            chunks: loaded.beam.chunk_inventory(),
        })
    }

    /// `.info` as JSON
    pub fn info_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.module_info()?)?)
    }

    fn info_text(&self) -> Result<String> {
        let info = self.module_info()?;

        let mut text = format!(
            "Module: {}\nFile: {}\nSource: {}",
            info.module.as_deref().unwrap_or("?"),
            info.path,
            info.source_file.as_deref().unwrap_or("unknown"),
        );
        if info.definitions.is_empty() {
            text.push_str("\nDefinitions: none (no Elixir debug info)");
        } else {
            text.push_str("\nDefinitions:");
            for definition in &info.definitions {
                text.push_str("\n  ");
                text.push_str(definition);
            }
        }

        Ok(text)
    }

    fn chunks_text(&self) -> Result<String> {
        let loaded = self.loaded()?;

        let lines = loaded
            .beam
            .chunk_inventory()
            .iter()
            .map(|chunk| {
                format!(
                    "  {:<4}  offset {:>6}  {:>7} bytes",
                    chunk.name, chunk.offset, chunk.length
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!("Chunks:\n{lines}"))
    }

    /// Decompile the loaded module, or only the definitions matching a
    /// `name[/arity]` target.
    pub fn decompile(&self, target: Option<&str>) -> Result<String> {
        let loaded = self.loaded()?;
        let info = loaded
            .info
            .as_ref()
            .ok_or_else(|| anyhow!("Loaded module carries no Elixir debug info"))?;

        match target {
            None => Ok(decompiler::decompile_debug_info(info)?),
            Some(target) => {
                let (name, arity) = commands::parse_target(target)?;
                let matching = decompiler::matching_definitions(info, &name, arity);
                if matching.is_empty() {
                    return Err(anyhow!("No definition matches '{}'", target));
                }

                let blocks = matching
                    .into_iter()
                    .map(decompiler::definition_source)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(blocks.join("\n\n"))
            }
        }
    }

    /// Assembly for the loaded module, or one `name/arity`.
    pub fn asm(&self, target: Option<&str>) -> Result<String> {
        let loaded = self.loaded()?;
        let code = loaded.beam.code()?;

        let context = ResolveContext {
            atoms: loaded.beam.atoms().unwrap_or_default(),
            imports: loaded.beam.imports().unwrap_or_default(),
            literals: loaded.beam.literals().unwrap_or_default(),
        };
        let options = if self.debug {
            Options::RESOLVED
        } else {
            Options::UNAMBIGUOUS
        };

        match target {
            None => Ok(code.assembly(&context, &options)),
            Some(target) => {
                let (name, arity) = commands::parse_target(target)?;
                let arity = arity.ok_or_else(|| anyhow!("Usage: .asm name/arity"))?;
                let arity =
                    u64::try_from(arity).map_err(|_| anyhow!("Invalid arity {}", arity))?;

                code.assembly_for(&context, &options, &name, arity)
                    .ok_or_else(|| anyhow!("No function {}/{} in code chunk", name, arity))
            }
        }
    }

    fn loaded(&self) -> Result<&LoadedModule> {
        self.loaded
            .as_ref()
            .ok_or_else(|| anyhow!("No module loaded; use .load <file.beam>"))
    }

    /// Get help text
    fn get_help_text(&self) -> String {
        r#"Unbeam REPL Commands:
  .help               - Show this help message
  .quit               - Exit the REPL
  .clear              - Clear the screen
  .quiet              - Toggle quiet mode (hide timing info)
  .debug              - Toggle debug mode (resolve all assembly operands)
  .stats              - Show session statistics

Module Commands:
  .load <file.beam>   - Load a compiled module
  .info               - Show loaded-module information
  .chunks             - List the module's chunks
  .decompile [target] - Decompile the module, or one name[/arity]
  .asm [name/arity]   - Print BEAM assembly

A bare `name` or `name/arity` line decompiles the matching definitions."#
            .to_string()
    }

    fn stats_text(&self) -> String {
        format!(
            "Session statistics:\n  Commands run: {}\n  Modules loaded: {}\n  Debug mode: {}\n  Quiet mode: {}",
            self.commands_run, self.modules_loaded, self.debug, self.quiet
        )
    }

    /// Show exit statistics
    pub fn show_exit_stats(&self) {
        if !self.quiet {
            println!("\n{}", self.stats_text());
        }
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_update_session_state() {
        let mut repl = Repl::new();
        assert!(repl.is_running());

        let output = repl.handle_command(ReplCommand::Quiet).unwrap();
        assert_eq!(output, "Quiet mode: on");
        assert!(repl.is_quiet());

        repl.handle_command(ReplCommand::Quit).unwrap();
        assert!(!repl.is_running());
    }

    #[test]
    fn module_commands_require_a_loaded_module() {
        let repl = Repl::new();

        assert!(repl.decompile(None).is_err());
        assert!(repl.asm(None).is_err());
        assert!(repl.module_info().is_err());
    }

    #[test]
    fn stats_count_commands() {
        let mut repl = Repl::new();
        repl.handle_command(ReplCommand::Help).unwrap();
        repl.handle_command(ReplCommand::Debug).unwrap();

        let stats = repl.handle_command(ReplCommand::Stats).unwrap();
        assert!(stats.contains("Commands run: 3"));
    }
}
