use std::time::Instant;

use anyhow::Result;
use clap::{Arg, Command};
use unbeam_core::init_tracing;
use unbeam_repl::{Repl, ReplCommand};

fn main() -> Result<()> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let matches = Command::new("unbeam-repl")
        .version(unbeam_core::VERSION)
        .about("Interactive decompiler for compiled Elixir modules")
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Load this .beam file on startup")
                .index(1),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug mode")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("decompile")
                .long("decompile")
                .help("Decompile FILE and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("asm")
                .long("asm")
                .help("Print FILE's assembly and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("chunks")
                .long("chunks")
                .help("List FILE's chunks and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("info")
                .long("info")
                .help("Print FILE's module information and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit --info output as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let input_file = matches.get_one::<String>("file").cloned();
    let debug = matches.get_flag("debug");
    let json = matches.get_flag("json");

    let mut repl = Repl::new();
    repl.set_debug(debug);

    // One-shot modes print a single result and exit without the prompt
    let one_shot = [
        ("decompile", ReplCommand::Decompile(None)),
        ("asm", ReplCommand::Asm(None)),
        ("chunks", ReplCommand::Chunks),
        ("info", ReplCommand::Info),
    ]
    .into_iter()
    .find(|(flag, _)| matches.get_flag(flag));

    if let Some((flag, command)) = one_shot {
        let file = input_file
            .ok_or_else(|| anyhow::anyhow!("--{flag} requires a FILE argument"))?;
        repl.set_quiet(true);
        repl.load(&file)?;

        let output = if json && flag == "info" {
            repl.info_json()?
        } else {
            repl.handle_command(command)?
        };
        println!("{output}");
        return Ok(());
    }

    println!("Unbeam REPL v{}", unbeam_core::VERSION);
    if debug {
        println!("Debug mode: enabled");
    }
    println!("Type .help for help, .quit to exit");
    println!();

    if let Some(file) = input_file {
        match repl.load(&file) {
            Ok(msg) => repl.notifier().on_output(&msg),
            Err(e) => repl.notifier().on_error(&format!("Error: {e}")),
        }
    }

    run_repl(&mut repl)
}

fn run_repl(repl: &mut Repl) -> Result<()> {
    use rustyline::{error::ReadlineError, DefaultEditor};

    let mut rl = DefaultEditor::new()?;

    while repl.is_running() {
        match rl.readline("unbeam> ") {
            Ok(line) => {
                let trimmed = line.trim();

                // Handle empty input
                if trimmed.is_empty() {
                    continue;
                }

                rl.add_history_entry(&line)?;

                // Check if it's a REPL command
                if trimmed.starts_with('.') {
                    match repl.parse_input(trimmed) {
                        Ok(command) => match repl.handle_command(command) {
                            Ok(output) => repl.notifier().on_output(&output),
                            Err(e) => repl.notifier().on_error(&format!("Error: {e}")),
                        },
                        Err(e) => repl.notifier().on_error(&format!("Error: {e}")),
                    }
                } else {
                    // A bare line is a name[/arity] decompilation target
                    let start = Instant::now();
                    match repl.decompile(Some(trimmed)) {
                        Ok(output) => {
                            let duration = start.elapsed().as_millis() as u64;
                            repl.notifier().on_result(&output, duration, repl.is_quiet());
                        }
                        Err(e) => repl.notifier().on_error(&format!("Error: {e}")),
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Use .quit to exit");
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    // Show exit statistics
    repl.show_exit_stats();

    Ok(())
}
