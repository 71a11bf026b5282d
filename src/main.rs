use std::fs;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command, crate_version};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use tinylisp::ast::Term;
use tinylisp::driver::{self, Config, ErrorPolicy};
use tinylisp::evaluator::{self, Environment};
use tinylisp::reader::Reader;

fn cli() -> Command {
    Command::new("tinylisp")
        .version(crate_version!())
        .about("Evaluate Lisp source files, standard input, or an interactive session")
        .arg(
            Arg::new("FILE")
                .help("Source files to evaluate in order ('-' reads standard input)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("keep-going")
                .long("keep-going")
                .short('k')
                .help("Report errors and continue with the next top-level expression")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Do not print the value of each top-level expression")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("repl")
                .long("repl")
                .help("Start an interactive session")
                .action(ArgAction::SetTrue),
        )
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    let files: Vec<String> = matches
        .get_many::<String>("FILE")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    if matches.get_flag("repl") || (files.is_empty() && io::stdin().is_terminal()) {
        return match run_repl() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error: {err}");
                ExitCode::FAILURE
            }
        };
    }

    run_batch(&matches, &files)
}

fn run_batch(matches: &ArgMatches, files: &[String]) -> ExitCode {
    let config = Config {
        policy: if matches.get_flag("keep-going") {
            ErrorPolicy::Continue
        } else {
            ErrorPolicy::Stop
        },
        quiet: matches.get_flag("quiet"),
    };

    let sources: Vec<&str> = if files.is_empty() {
        vec!["-"]
    } else {
        files.iter().map(String::as_str).collect()
    };

    let mut env = evaluator::create_global_env();
    let mut failed = false;

    for path in sources {
        let source = match path {
            "-" => io::read_to_string(io::stdin()),
            _ => fs::read_to_string(path),
        };
        let source = match source {
            Ok(source) => source,
            Err(e) => {
                eprintln!("Error: cannot read {path}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let mut stdout = io::stdout().lock();
        match driver::run(&source, &mut env, &config, &mut stdout, &mut io::stderr()) {
            Ok(summary) => failed |= summary.failed > 0,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run_repl() -> Result<(), ReadlineError> {
    println!("tinylisp {}", crate_version!());
    println!("Enter S-expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let mut env = evaluator::create_global_env();
    // Text of a term that is still waiting for its closing lines
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() {
            "tinylisp> "
        } else {
            "       .. "
        };
        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match trimmed {
                        ":help" => {
                            let _ = rl.add_history_entry(trimmed);
                            print_help();
                            continue;
                        }
                        ":env" => {
                            let _ = rl.add_history_entry(trimmed);
                            print_environment(&env);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                pending.push_str(&line);
                pending.push('\n');
                pending = eval_available(&pending, &mut env);
                if pending.is_empty() {
                    let _ = rl.add_history_entry(line.trim());
                }
            }

            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                // abandon the unfinished term only
                pending.clear();
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

/// Evaluate every complete term of `input` and print its value. Returns the
/// text of a trailing unfinished term, or an empty string.
fn eval_available(input: &str, env: &mut Environment<'_>) -> String {
    let mut reader = Reader::new(input);
    loop {
        let before = reader.remaining();
        match reader.next() {
            None => return String::new(),
            Some(Ok(term)) => match evaluator::eval(&term, env) {
                Ok(value) => println!("{value}"),
                Err(e) => println!("Error: {e}"),
            },
            Some(Err(e)) if e.is_incomplete_input() => return before.to_owned(),
            Some(Err(e)) => {
                println!("Error: {e}");
                return String::new();
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+D     - Exit the interpreter");
    println!("  Ctrl+C     - Discard an unfinished expression, or exit");
    println!();
    println!("Terms:");
    println!("  Integers: 42, -5");
    println!("  Symbols: foo, <=, \"quoted symbol\"");
    println!("  Lists: (1 2 3), '(a b)");
    println!("  Atoms: True, Nil (also the empty list and false)");
    println!();
    println!("Primitives:");
    println!("  Arithmetic: +, -, *");
    println!("  Comparison: =, <, >, eq");
    println!("  Lists: car, cdr, cons, setcar");
    println!("  Control: if, while, and, or, progn");
    println!("  Definitions: define, defun, lambda, quote");
    println!("  Output: println");
    println!();
    println!("Examples:");
    println!("  (defun square (x) (* x x))");
    println!("  (square 12)");
    println!("  (if (> 3 2) 'yes 'no)");
    println!();
}

fn print_environment(env: &Environment<'_>) {
    let bindings = env.get_all_bindings();

    let mut primitives = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Term::Primitive(_) => primitives.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !primitives.is_empty() {
        println!("Primitives ({}):", primitives.len());
        // Print in columns for readability
        let mut col = 0;
        for name in primitives {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    println!("Values ({}):", user_defined.len());
    for (name, value) in user_defined {
        println!("  {name} = {value}");
    }
}
