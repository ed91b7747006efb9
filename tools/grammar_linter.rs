/// Grammar Linter — validates rule files for missing symbols and dead ends.
///
/// Usage: grammar_linter <rules_path> [--start <symbol>] [--min-alternatives <n>]

use resolvent::{Rule, RuleSet};
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: grammar_linter <rules_path> [--start <symbol>] [--min-alternatives <n>]");
        process::exit(0);
    }

    let rules_path = &args[1];
    let mut start = None;
    let mut min_alternatives = 2;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--start" if i + 1 < args.len() => {
                i += 1;
                start = Some(args[i].trim_start_matches('$').to_string());
            }
            "--min-alternatives" if i + 1 < args.len() => {
                i += 1;
                min_alternatives = args[i].parse().unwrap_or(2);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut rules = RuleSet::new();
    let path = Path::new(rules_path);

    if path.is_file() {
        match RuleSet::load(path) {
            Ok(set) => rules.merge(set),
            Err(e) => {
                eprintln!("ERROR: Failed to load rule file: {}", e);
                process::exit(1);
            }
        }
    } else if path.is_dir() {
        load_rules_recursive(path, &mut rules);
    } else {
        eprintln!("ERROR: Path '{}' does not exist", rules_path);
        process::exit(1);
    }

    println!("Loaded {} rules", rules.len());

    let (errors, warnings) = lint_rules(&rules, start.as_deref(), min_alternatives);

    println!("\n=== Grammar Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load_rules_recursive(dir: &Path, rules: &mut RuleSet) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        let mut paths: Vec<_> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();
        for path in paths {
            if path.is_dir() {
                load_rules_recursive(&path, rules);
                continue;
            }
            let ext = path.extension().and_then(|s| s.to_str());
            if !matches!(ext, Some("json") | Some("ron")) {
                continue;
            }
            match RuleSet::load(&path) {
                Ok(set) => {
                    println!("  Loaded: {}", path.display());
                    rules.merge(set);
                }
                Err(e) => {
                    eprintln!("  ERROR loading {}: {}", path.display(), e);
                }
            }
        }
    }
}

fn lint_rules(
    rules: &RuleSet,
    start: Option<&str>,
    min_alternatives: usize,
) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match start {
        Some(name) if !rules.contains(name) => {
            errors.push(format!("Start symbol '{}' has no rule", name));
        }
        None if !rules.contains("start") => {
            warnings.push("No 'start' rule; expand() will fail without a symbol".to_string());
        }
        _ => {}
    }

    for (rule, missing) in rules.undefined_references() {
        errors.push(format!(
            "Rule '{}' references non-existent rule '{}'",
            rule, missing
        ));
    }

    for rule in rules.iter() {
        if rule.alternatives.is_empty() {
            errors.push(format!("Rule '{}' has no alternatives", rule.name));
            continue;
        }

        if rule.alternatives.iter().all(|a| a.weight <= 0.0) {
            errors.push(format!(
                "Rule '{}' has only zero weights (selection falls back to uniform)",
                rule.name
            ));
        }

        if is_self_trapped(rule) {
            errors.push(format!(
                "Rule '{}' has no non-recursive alternative (infinite recursion)",
                rule.name
            ));
        }

        // Single-alternative rules are plain substitutions, not a variety issue.
        let n = rule.alternatives.len();
        if n > 1 && n < min_alternatives {
            warnings.push(format!(
                "Rule '{}' has only {} alternatives (minimum {} recommended)",
                rule.name, n, min_alternatives
            ));
        }

        let mut texts: Vec<&str> = rule.alternatives.iter().map(|a| a.text.as_str()).collect();
        texts.sort_unstable();
        texts.dedup();
        if n > 1 && texts.len() == 1 {
            warnings.push(format!(
                "Rule '{}' repeats the same alternative {} times",
                rule.name, n
            ));
        }
    }

    (errors, warnings)
}

/// Every alternative refers back to the rule itself.
fn is_self_trapped(rule: &Rule) -> bool {
    let token = format!("${}", rule.name);
    rule.alternatives.iter().all(|alt| {
        alt.text.match_indices(&token).any(|(i, _)| {
            let next = alt.text[i + token.len()..].chars().next();
            !matches!(next, Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
    })
}
