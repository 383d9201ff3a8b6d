//! Command-line interface for stencil
//! This binary translates shorthand template sources into canonical
//! directive syntax for a downstream execution engine.
//!
//! Usage:
//!   stencil translate `<path>` [--open `<tok>`] [--close `<tok>`] [--marker `<tok>`]
//!   stencil check `<path>` [--json]

use clap::{Arg, ArgAction, Command};

use stencil::{DelimiterSet, Translator};

fn main() {
    let matches = Command::new("stencil")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A tool for translating shorthand template sources")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("translate")
                .about("Translate a shorthand source to canonical directive syntax")
                .arg(
                    Arg::new("path")
                        .help("Path to the shorthand source file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("open")
                        .long("open")
                        .help("Directive-open token")
                        .default_value("{{"),
                )
                .arg(
                    Arg::new("close")
                        .long("close")
                        .help("Directive-close token")
                        .default_value("}}"),
                )
                .arg(
                    Arg::new("marker")
                        .long("marker")
                        .help("Shorthand marker character")
                        .default_value("@"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Report whether a source contains shorthand syntax")
                .arg(
                    Arg::new("path")
                        .help("Path to the shorthand source file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Emit the result as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("translate", translate_matches)) => {
            let path = translate_matches.get_one::<String>("path").unwrap();
            let delimiters = DelimiterSet::new(
                translate_matches.get_one::<String>("open").unwrap(),
                translate_matches.get_one::<String>("close").unwrap(),
                translate_matches.get_one::<String>("marker").unwrap(),
            );
            handle_translate_command(path, delimiters);
        }
        Some(("check", check_matches)) => {
            let path = check_matches.get_one::<String>("path").unwrap();
            let json = check_matches.get_flag("json");
            handle_check_command(path, json);
        }
        _ => unreachable!(),
    }
}

/// Handle the translate command
fn handle_translate_command(path: &str, delimiters: DelimiterSet) {
    let source = read_source(path);
    let translator = Translator::new(delimiters);
    match translator.translate(&source) {
        Ok((output, _changed)) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle the check command
fn handle_check_command(path: &str, json: bool) {
    let source = read_source(path);
    let translator = Translator::default();
    match translator.translate(&source) {
        Ok((_, changed)) => {
            if json {
                println!("{}", serde_json::json!({ "path": path, "changed": changed }));
            } else if changed {
                println!("{}: contains shorthand syntax", path);
            } else {
                println!("{}: plain directive source", path);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn read_source(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file: {}", e);
        std::process::exit(1);
    })
}
