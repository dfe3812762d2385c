use nexis::reader::parse;
use nexis::{BindingKind, Environment, Error, ParseError, ParseErrorKind, create_global_env, eval};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

/// Definitions loaded into every session
const PRELUDE: &str = r"
[def square [fn [x] [* x x]]]
[def factorial [fn [n] [if [<= n 1] 1 [* n [factorial [- n 1]]]]]]
[def fib [fn [n] [if [< n 2] n [+ [fib [- n 1]] [fib [- n 2]]]]]]
[macro when [test & body] [q [if ~test [do ~@body] null]]]
[macro unless [test & body] [q [if ~test null [do ~@body]]]]
";

fn main() {
    init_tracing();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Structured logs go to stderr, and only when RUST_LOG is set
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn run_repl() {
    println!("Nexis interpreter");
    println!("Enter expressions like: [+ 1 2]");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            return;
        }
    };

    let env = create_global_env();
    if let Err(e) = parse(PRELUDE).and_then(|prelude| eval(&prelude, &env)) {
        eprintln!("Error loading prelude: {e}");
    }

    // Lines of an expression whose brackets are not closed yet
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "nexis> " } else { "  ...> " };
        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    match trimmed {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&env);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                } else {
                    let _ = rl.add_history_entry(line.trim());
                }

                pending.push_str(&line);
                pending.push('\n');

                let expr = match parse(&pending) {
                    Ok(expr) => expr,
                    Err(Error::ParseError(ParseError {
                        kind: ParseErrorKind::Incomplete,
                        ..
                    })) => continue,
                    Err(e) => {
                        println!("Error: {e}");
                        pending.clear();
                        continue;
                    }
                };
                pending.clear();

                match eval(&expr, &env) {
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                pending.clear();
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
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
    println!("  Ctrl+C     - Cancel the current multi-line input");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Syntax:");
    println!("  Lists: [f a b], quote: 'x, comments: ; to end of line");
    println!("  Literals: 42, -1.5, \"text\", true, false, null");
    println!();
    println!("Special forms:");
    println!("  quote q def set fn if cond do let while macro");
    println!();
    println!("Examples:");
    println!("  [def square [fn [x] [* x x]]]");
    println!("  [let [[a 1] [b [+ a 1]]] [list a b]]");
    println!("  [macro when [test & body] [q [if ~test [do ~@body] null]]]");
    println!("  [when [> 3 1] [print \"yes\"] 3]");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    let mut builtins = Vec::new();
    let mut macros = Vec::new();
    let mut user_defined = Vec::new();

    for binding in bindings {
        match binding.kind {
            BindingKind::NativeFunction => builtins.push(binding.name),
            BindingKind::Macro => macros.push(binding.name),
            BindingKind::Other => user_defined.push((binding.name, binding.value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
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

    if !macros.is_empty() {
        println!("Macros ({}):", macros.len());
        println!("  {}", macros.join(" "));
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
