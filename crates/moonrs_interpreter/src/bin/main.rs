// moon - command line driver for the moonrs Lua runtime
// usage: moon run [-v] <file>|-   execute a file (or stdin with '-')
//        moon repl                interactive session
//        moon --help

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use moonrs::{FileSystemResolver, LuaHost, LuaHostOptions, LuaValue};

const VERSION: &str = "moonrs 0.1 (Lua 5.4)";

fn print_usage() {
    eprintln!("usage: moon <command> [options]");
    eprintln!("Commands:");
    eprintln!("  run [-v] <file>|-   execute a Lua file, or stdin with '-'");
    eprintln!("  repl                enter interactive mode");
    eprintln!("  --help              print this message");
}

#[derive(Default)]
struct Options {
    verbose: bool,
    script: Option<String>,
}

fn parse_run_args(args: &[String]) -> Result<Options, String> {
    let mut opts = Options::default();
    for arg in args {
        match arg.as_str() {
            "-v" => opts.verbose = true,
            other if opts.script.is_none() => opts.script = Some(other.to_string()),
            other => return Err(format!("unexpected argument '{}'", other)),
        }
    }
    if opts.script.is_none() {
        return Err("'run' needs a script file or '-'".to_string());
    }
    Ok(opts)
}

fn make_host() -> LuaHost {
    // The CLI runs at full trust with module resolution rooted in the
    // current directory.
    let resolver = Arc::new(FileSystemResolver::single_root(PathBuf::from(".")));
    LuaHost::new(LuaHostOptions::full_trust().resolver(resolver))
}

fn run(args: &[String]) -> i32 {
    let opts = match parse_run_args(args) {
        Ok(opts) => opts,
        Err(message) => {
            eprintln!("moon: {}", message);
            print_usage();
            return 1;
        }
    };
    let script = opts.script.expect("checked in parse_run_args");

    let source = if script == "-" {
        let mut buffer = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut buffer) {
            eprintln!("moon: cannot read stdin: {}", e);
            return 1;
        }
        buffer
    } else {
        match std::fs::read_to_string(&script) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("moon: cannot open {}: {}", script, e);
                return 1;
            }
        }
    };

    if opts.verbose {
        eprintln!("{}", VERSION);
    }

    let host = make_host();
    let diagnostics = host.validate(&source);
    if diagnostics
        .iter()
        .any(|d| d.severity == moonrs::Severity::Error)
    {
        for diagnostic in &diagnostics {
            eprintln!("{}", diagnostic);
        }
        return 1;
    }

    match host.execute(&source) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("moon: {}", err);
            1
        }
    }
}

fn print_values(values: &[LuaValue]) {
    if values.is_empty() {
        return;
    }
    let rendered: Vec<String> = values.iter().map(|v| v.to_display_string()).collect();
    println!("{}", rendered.join("\t"));
}

fn repl() -> i32 {
    println!("{}", VERSION);
    let host = make_host();

    let mut editor = match rustyline::DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("moon: cannot start line editor: {}", e);
            return 1;
        }
    };

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => continue,
            Err(rustyline::error::ReadlineError::Eof) => return 0,
            Err(e) => {
                eprintln!("moon: {}", e);
                return 1;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(&line);

        // Try the line as an expression first, then as a statement
        let as_expression = format!("return {}", line);
        let source = if host
            .validate(&as_expression)
            .iter()
            .all(|d| d.severity != moonrs::Severity::Error)
        {
            as_expression
        } else {
            line.clone()
        };

        match host.execute(&source) {
            Ok(values) => print_values(&values),
            Err(err) => eprintln!("moon: {}", err),
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let code = match args.get(1).map(String::as_str) {
        Some("run") => run(&args[2..]),
        Some("repl") => repl(),
        Some("--help") | Some("-h") => {
            print_usage();
            0
        }
        Some(other) => {
            eprintln!("moon: unknown command '{}'", other);
            print_usage();
            1
        }
        None => {
            print_usage();
            1
        }
    };
    std::process::exit(code);
}
