/// Preview — interactive expansion shell for testing grammars and markup.
///
/// Usage: preview [--rules <path>] [--seed <n>]
///
/// Commands:
///   <markup>         — evaluate markup against the loaded rules
///   expand [symbol]  — expand a symbol (default: start)
///   bulk <n> [sym]   — expand n times with variety stats
///   seed <n>         — set RNG seed (resets sequences)
///   rules            — list loaded rules
///   trace            — toggle per-pass tracing
///   help             — list commands
///   quit             — exit

use resolvent::{Engine, EvalOptions, ExpandOptions, Grammar, RuleSet};
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::Path;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        print_usage();
        return;
    }

    let mut rules_path = None;
    let mut seed: u64 = 42;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--rules" if i + 1 < args.len() => {
                i += 1;
                rules_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let rules = match rules_path {
        Some(ref path) => match RuleSet::load(Path::new(path)) {
            Ok(set) => set,
            Err(e) => {
                eprintln!("ERROR: Failed to load rules: {}", e);
                std::process::exit(1);
            }
        },
        None => RuleSet::new(),
    };

    println!("Loaded {} rules", rules.len());
    println!("Seed: {}", seed);
    println!("Type 'help' for commands.\n");

    let mut grammar = Grammar::with_engine(rules, Engine::with_seed(seed));
    let mut opts = ExpandOptions::default();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "expand" => {
                let result = match parts.get(1) {
                    Some(symbol) => grammar.expand_from_with(symbol, &opts),
                    None => grammar.expand_with(None, &opts),
                };
                match result {
                    Ok(text) => println!("{}", text),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "bulk" => {
                let count: usize = match parts.get(1).map(|s| s.parse()) {
                    Some(Ok(n)) if n > 0 => n,
                    _ => {
                        println!("Usage: bulk <n> [symbol]");
                        continue;
                    }
                };
                let symbol = parts.get(2).copied();
                run_bulk(&mut grammar, count, symbol);
            }
            "seed" => {
                if parts.len() < 2 {
                    println!("Usage: seed <n>");
                    continue;
                }
                match parts[1].parse::<u64>() {
                    Ok(n) => {
                        grammar.engine_mut().reseed(n);
                        println!("Seed set to {}", n);
                    }
                    Err(_) => {
                        println!("Invalid seed: {}", parts[1]);
                    }
                }
            }
            "rules" => {
                if grammar.rules().is_empty() {
                    println!("No rules loaded.");
                }
                for rule in grammar.rules().iter() {
                    let body: Vec<String> = rule
                        .alternatives
                        .iter()
                        .map(|a| {
                            if a.weight == 1.0 {
                                a.text.clone()
                            } else {
                                format!("{} [{}]", a.text, a.weight)
                            }
                        })
                        .collect();
                    println!("  ${} -> {}", rule.name, body.join(" | "));
                }
            }
            "trace" => {
                opts.eval.trace = !opts.eval.trace;
                println!("Trace {}", if opts.eval.trace { "on" } else { "off" });
            }
            _ => match grammar.expand_with(Some(line), &opts) {
                Ok(text) => println!("{}", text),
                Err(e) => println!("Error: {}", e),
            },
        }
    }
}

fn run_bulk(grammar: &mut Grammar, count: usize, symbol: Option<&str>) {
    let quiet = ExpandOptions::from(EvalOptions::silent());
    let mut outputs = Vec::new();
    let mut errors = 0;

    for _ in 0..count {
        let result = match symbol {
            Some(s) => grammar.expand_from_with(s, &quiet),
            None => grammar.expand_with(None, &quiet),
        };
        match result {
            Ok(text) => outputs.push(text),
            Err(_) => errors += 1,
        }
    }

    println!(
        "\n=== Bulk Expansion: {} outputs ({} errors) ===\n",
        outputs.len(),
        errors
    );

    let unique: HashSet<&String> = outputs.iter().collect();
    println!("Unique outputs: {} / {}", unique.len(), outputs.len());

    let avg_len: f64 = if outputs.is_empty() {
        0.0
    } else {
        outputs.iter().map(|o| o.len() as f64).sum::<f64>() / outputs.len() as f64
    };
    println!("Average length: {:.0} chars", avg_len);

    for text in outputs.iter().take(5) {
        println!("  {}", text);
    }
    println!();
}

fn print_usage() {
    println!("Usage: preview [--rules <path>] [--seed <n>]");
}

fn print_help() {
    println!("Commands:");
    println!("  <markup>         evaluate markup, e.g. (cat | dog).uc()");
    println!("  expand [symbol]  expand a symbol (default: start)");
    println!("  bulk <n> [sym]   expand n times and print variety stats");
    println!("  seed <n>         set RNG seed and reset sequences");
    println!("  rules            list loaded rules");
    println!("  trace            toggle per-pass tracing");
    println!("  quit             exit");
}
