/// Rule store and expansion — symbols, weighted alternatives, loading, `expand`.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::context::Context;
use crate::core::engine::{Engine, EvalOptions, ResolveError};

/// Symbol expanded by `expand()` when no start symbol is given.
pub const START_SYMBOL: &str = "start";

static TRAILING_WEIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*([0-9]*\.?[0-9]+)\s*\]\s*$").unwrap());

static SYMBOL_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z0-9_][A-Za-z0-9_-]*)").unwrap());

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_-]*$").unwrap());

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("no rule defined for symbol '{0}'")]
    UndefinedSymbol(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported rule file '{}': expected .json or .ron", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// A weighted text alternative within a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub text: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Alternative {
    pub fn new(text: impl Into<String>, weight: f64) -> Self {
        Self {
            text: text.into(),
            weight,
        }
    }

    /// Parse one alternative, honoring a trailing `[n]` weight annotation.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if let Some(caps) = TRAILING_WEIGHT.captures(trimmed) {
            if let (Some(whole), Ok(weight)) = (caps.get(0), caps[1].parse::<f64>()) {
                return Self::new(trimmed[..whole.start()].trim_end(), weight);
            }
        }
        Self::new(trimmed, 1.0)
    }
}

/// A named rule: an ordered set of weighted alternatives.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub alternatives: Vec<Alternative>,
}

impl Rule {
    pub fn new(name: &str, alternatives: Vec<Alternative>) -> Self {
        Self {
            name: symbol_name(name).to_string(),
            alternatives,
        }
    }

    /// Build a rule from markup; top-level `|` separates alternatives.
    pub fn parse(name: &str, body: &str) -> Self {
        Self::new(name, split_alternatives(body))
    }

    pub fn weights(&self) -> Vec<f64> {
        self.alternatives.iter().map(|a| a.weight).collect()
    }

    /// Names of the symbols referenced by any alternative, in first-seen order.
    pub fn references(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for alt in &self.alternatives {
            for caps in SYMBOL_REF.captures_iter(&alt.text) {
                let name = &caps[1];
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    fn to_body(&self) -> RuleBody {
        match self.alternatives.as_slice() {
            [only] if only.weight == 1.0 => RuleBody::Text(only.text.clone()),
            alts => RuleBody::List(
                alts.iter()
                    .map(|a| {
                        if a.weight == 1.0 {
                            AlternativeSource::Text(a.text.clone())
                        } else {
                            AlternativeSource::Weighted(a.clone())
                        }
                    })
                    .collect(),
            ),
        }
    }
}

/// Serialized form of a rule body: a markup string (with optional `|`
/// alternatives) or a list of alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleBody {
    Text(String),
    List(Vec<AlternativeSource>),
}

/// One list entry: plain text or `{ text, weight }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlternativeSource {
    Text(String),
    Weighted(Alternative),
}

impl RuleBody {
    fn into_alternatives(self) -> Vec<Alternative> {
        match self {
            RuleBody::Text(text) => split_alternatives(&text),
            RuleBody::List(items) => items
                .into_iter()
                .map(|item| match item {
                    AlternativeSource::Text(text) => Alternative::parse(&text),
                    AlternativeSource::Weighted(alt) => alt,
                })
                .collect(),
        }
    }
}

impl From<&str> for RuleBody {
    fn from(text: &str) -> Self {
        RuleBody::Text(text.to_string())
    }
}

impl From<String> for RuleBody {
    fn from(text: String) -> Self {
        RuleBody::Text(text)
    }
}

impl From<Vec<&str>> for RuleBody {
    fn from(items: Vec<&str>) -> Self {
        RuleBody::List(
            items
                .into_iter()
                .map(|s| AlternativeSource::Text(s.to_string()))
                .collect(),
        )
    }
}

/// A set of named rules. Names are stored without the `$` sigil.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: FxHashMap<String, Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(symbol, body)` pairs; a leading `$` on a symbol is optional.
    pub fn from_bodies<I, K, V>(bodies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<RuleBody>,
    {
        let mut set = Self::new();
        for (name, body) in bodies {
            let name = symbol_name(name.as_ref());
            set.insert(Rule::new(name, body.into().into_alternatives()));
        }
        set
    }

    /// Parse a rule set from JSON text: `{ "$symbol": "a | b", "other": ["x", "y"] }`.
    pub fn parse_json(input: &str) -> Result<RuleSet, GrammarError> {
        let raw: BTreeMap<String, RuleBody> = serde_json::from_str(input)?;
        Ok(Self::from_bodies(raw))
    }

    /// Parse a rule set from RON text with the same shape as the JSON form.
    pub fn parse_ron(input: &str) -> Result<RuleSet, GrammarError> {
        let raw: BTreeMap<String, RuleBody> = ron::from_str(input)?;
        Ok(Self::from_bodies(raw))
    }

    /// Parse JSON, falling back to RON.
    pub fn parse_str(input: &str) -> Result<RuleSet, GrammarError> {
        match Self::parse_json(input) {
            Ok(set) => Ok(set),
            Err(json_err) => Self::parse_ron(input).map_err(|_| json_err),
        }
    }

    /// Load a rule set from a `.json` or `.ron` file.
    pub fn load(path: &Path) -> Result<RuleSet, GrammarError> {
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Self::parse_json(&contents),
            Some("ron") => Self::parse_ron(&contents),
            _ => Err(GrammarError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(symbol_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(symbol_name(name))
    }

    pub fn insert(&mut self, rule: Rule) -> Option<Rule> {
        self.rules.insert(rule.name.clone(), rule)
    }

    pub fn remove(&mut self, name: &str) -> Option<Rule> {
        self.rules.remove(symbol_name(name))
    }

    /// Rule names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Rules sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        let mut rules: Vec<&Rule> = self.rules.values().collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        rules.into_iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Merge another rule set into this one. Rules from `other`
    /// override rules in `self` with the same name.
    pub fn merge(&mut self, other: RuleSet) {
        for (name, rule) in other.rules {
            self.rules.insert(name, rule);
        }
    }

    /// `(rule, referenced symbol)` pairs whose symbol has no rule, sorted.
    pub fn undefined_references(&self) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for rule in self.iter() {
            for name in rule.references() {
                if !self.contains(&name) {
                    missing.push((rule.name.clone(), name));
                }
            }
        }
        missing
    }

    fn to_bodies(&self) -> BTreeMap<String, RuleBody> {
        self.rules
            .iter()
            .map(|(name, rule)| (format!("${}", name), rule.to_body()))
            .collect()
    }
}

/// Per-call options for `Grammar` expansion.
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    pub eval: EvalOptions,
    /// Extra bindings and transforms for this call only.
    pub context: Option<Context>,
}

impl ExpandOptions {
    pub fn with_context(context: Context) -> Self {
        Self {
            context: Some(context),
            ..Self::default()
        }
    }
}

impl From<EvalOptions> for ExpandOptions {
    fn from(eval: EvalOptions) -> Self {
        Self {
            eval,
            context: None,
        }
    }
}

/// A grammar: a rule store plus the engine that expands it.
///
/// Sequencing state (`.seq()`, `.rseq()`, `.norep()`) lives in the engine,
/// so it persists across `expand` calls on the same grammar.
#[derive(Debug)]
pub struct Grammar {
    rules: RuleSet,
    engine: Engine,
    context: Context,
}

impl Grammar {
    /// An empty grammar with an entropy-seeded engine.
    pub fn new() -> Self {
        Self::with_engine(RuleSet::new(), Engine::new())
    }

    pub fn with_engine(rules: RuleSet, engine: Engine) -> Self {
        Self {
            rules,
            engine,
            context: Context::new(),
        }
    }

    /// Build from `(symbol, body)` pairs.
    pub fn from_rules<I, K, V>(bodies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<RuleBody>,
    {
        Self::with_engine(RuleSet::from_bodies(bodies), Engine::new())
    }

    pub fn from_json(input: &str) -> Result<Self, GrammarError> {
        Ok(Self::with_engine(RuleSet::parse_json(input)?, Engine::new()))
    }

    pub fn from_ron(input: &str) -> Result<Self, GrammarError> {
        Ok(Self::with_engine(RuleSet::parse_ron(input)?, Engine::new()))
    }

    pub fn load(path: &Path) -> Result<Self, GrammarError> {
        Ok(Self::with_engine(RuleSet::load(path)?, Engine::new()))
    }

    /// Companion context whose transforms (and bindings) are available to
    /// every expansion of this grammar.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Re-seed the engine for reproducible output.
    pub fn seeded(mut self, seed: u64) -> Self {
        self.engine.reseed(seed);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn add_transform<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.engine.add_transform(name, f);
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rule(&self, symbol: &str) -> Option<&Rule> {
        self.rules.get(symbol)
    }

    pub fn has_rule(&self, symbol: &str) -> bool {
        self.rules.contains(symbol)
    }

    /// Replace the whole rule store.
    pub fn set_rules(&mut self, rules: RuleSet) -> &mut Self {
        self.rules = rules;
        self
    }

    /// Replace the rule store from JSON (or RON) text.
    pub fn set_rules_str(&mut self, input: &str) -> Result<&mut Self, GrammarError> {
        self.rules = RuleSet::parse_str(input)?;
        Ok(self)
    }

    /// Append alternatives to `symbol`, creating the rule if needed. Repeated
    /// bodies stack up as separate alternatives. With an explicit weight, an
    /// alternative whose text is already present is re-weighted in place.
    pub fn add_rule(&mut self, symbol: &str, body: &str, weight: Option<f64>) -> &mut Self {
        let mut incoming = split_alternatives(body);
        if let (Some(weight), [only]) = (weight, incoming.as_mut_slice()) {
            only.weight = weight;
        }
        match self.rules.rules.get_mut(symbol_name(symbol)) {
            Some(rule) => {
                for alt in incoming {
                    let existing = weight
                        .and_then(|_| rule.alternatives.iter_mut().find(|a| a.text == alt.text));
                    match existing {
                        Some(existing) => existing.weight = alt.weight,
                        None => rule.alternatives.push(alt),
                    }
                }
            }
            None => {
                self.rules.insert(Rule::new(symbol, incoming));
            }
        }
        self
    }

    /// Remove a rule. Missing or empty names are ignored.
    pub fn remove_rule(&mut self, symbol: &str) -> &mut Self {
        if !symbol_name(symbol).is_empty() {
            self.rules.remove(symbol);
        }
        self
    }

    /// Merge another grammar's rules; its rules win on name clashes.
    pub fn merge(&mut self, other: RuleSet) -> &mut Self {
        self.rules.merge(other);
        self
    }

    /// Expand the `start` symbol.
    pub fn expand(&mut self) -> Result<String, GrammarError> {
        self.expand_with(None, &ExpandOptions::default())
    }

    /// Expand `target`: a symbol name (with or without `$`) that must have a
    /// rule, or otherwise a markup string evaluated against the rules. With
    /// no target the `start` symbol is expanded.
    pub fn expand_with(
        &mut self,
        target: Option<&str>,
        opts: &ExpandOptions,
    ) -> Result<String, GrammarError> {
        let markup = match target.map(str::trim) {
            None => self.symbol_markup(START_SYMBOL)?,
            Some(t) if IDENTIFIER.is_match(symbol_name(t)) => self.symbol_markup(t)?,
            Some(t) => t.to_string(),
        };
        self.run(&markup, opts)
    }

    /// Expand an existing symbol.
    pub fn expand_from(&mut self, symbol: &str) -> Result<String, GrammarError> {
        self.expand_from_with(symbol, &ExpandOptions::default())
    }

    pub fn expand_from_with(
        &mut self,
        symbol: &str,
        opts: &ExpandOptions,
    ) -> Result<String, GrammarError> {
        let markup = self.symbol_markup(symbol)?;
        self.run(&markup, opts)
    }

    fn symbol_markup(&self, symbol: &str) -> Result<String, GrammarError> {
        let name = symbol_name(symbol.trim());
        if !IDENTIFIER.is_match(name) || !self.rules.contains(name) {
            return Err(GrammarError::UndefinedSymbol(name.to_string()));
        }
        Ok(format!("${}", name))
    }

    fn run(&mut self, markup: &str, opts: &ExpandOptions) -> Result<String, GrammarError> {
        let mut ctx = self.context.clone();
        if let Some(extra) = &opts.context {
            ctx.extend(extra);
        }
        let result = self
            .engine
            .evaluate_with_rules(markup, &mut ctx, &opts.eval, Some(&self.rules))?;
        Ok(result)
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders the rule set as pretty JSON, sorted by symbol.
impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(&self.rules.to_bodies()).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Strip the optional `$` sigil.
fn symbol_name(symbol: &str) -> &str {
    symbol.strip_prefix('$').unwrap_or(symbol)
}

/// Split on `|` outside any bracket pair and parse each piece.
fn split_alternatives(body: &str) -> Vec<Alternative> {
    let mut pieces = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '|' if depth <= 0 => {
                pieces.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&body[start..]);
    pieces.into_iter().map(Alternative::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternative_weight_annotation() {
        assert_eq!(Alternative::parse("$bird [9]"), Alternative::new("$bird", 9.0));
        assert_eq!(Alternative::parse(" dog "), Alternative::new("dog", 1.0));
        assert_eq!(Alternative::parse("x [0.5]"), Alternative::new("x", 0.5));
        assert_eq!(Alternative::parse("see [note]"), Alternative::new("see [note]", 1.0));
    }

    #[test]
    fn split_respects_brackets() {
        let rule = Rule::parse("$vp", "$verb | $verb $np");
        assert_eq!(rule.name, "vp");
        assert_eq!(rule.alternatives.len(), 2);

        let grouped = Rule::parse("vp", "($verb | $verb $np)");
        assert_eq!(grouped.alternatives.len(), 1);
        assert_eq!(grouped.alternatives[0].text, "($verb | $verb $np)");
    }

    #[test]
    fn references_are_deduplicated() {
        let rule = Rule::parse("np", "$det $noun | $det $adj $noun");
        assert_eq!(rule.references(), vec!["det", "noun", "adj"]);
    }

    #[test]
    fn parse_json_forms() {
        let set = RuleSet::parse_json(
            r#"{
                "$start": "$np $vp.",
                "np": "$det $noun",
                "det": ["a", "the"],
                "noun": [{"text": "woman", "weight": 3}, "man"]
            }"#,
        )
        .unwrap();
        assert_eq!(set.len(), 4);
        assert!(set.contains("start"));
        assert!(set.contains("$start"));
        assert_eq!(set.get("det").unwrap().alternatives.len(), 2);
        assert_eq!(set.get("noun").unwrap().weights(), vec![3.0, 1.0]);
    }

    #[test]
    fn parse_ron_form() {
        let set = RuleSet::parse_ron(
            r#"{
                "start": "$pet",
                "pet": ["dog", "cat [2]"],
            }"#,
        )
        .unwrap();
        assert_eq!(set.get("pet").unwrap().weights(), vec![1.0, 2.0]);
    }

    #[test]
    fn parse_str_falls_back_to_ron() {
        let set = RuleSet::parse_str(r#"{ "start": "hi", }"#).unwrap();
        assert!(set.contains("start"));
        assert!(matches!(
            RuleSet::parse_str("not a grammar"),
            Err(GrammarError::Json(_))
        ));
    }

    #[test]
    fn merge_precedence() {
        let mut base = RuleSet::from_bodies([("shared", "base version"), ("base_only", "x")]);
        let other = RuleSet::from_bodies([("shared", "override version")]);
        base.merge(other);
        assert_eq!(base.get("shared").unwrap().alternatives[0].text, "override version");
        assert!(base.contains("base_only"));
    }

    #[test]
    fn add_rule_appends_and_reweights() {
        let mut g = Grammar::new();
        g.add_rule("$start", "$pet", None);
        g.add_rule("$start", "$dog", Some(0.3));
        assert_eq!(g.rule("start").unwrap().weights(), vec![1.0, 0.3]);
        g.add_rule("start", "$pet", Some(5.0));
        assert_eq!(g.rule("start").unwrap().weights(), vec![5.0, 0.3]);
        g.add_rule("start", "$pet", None);
        assert_eq!(g.rule("start").unwrap().weights(), vec![5.0, 0.3, 1.0]);
    }

    #[test]
    fn remove_rule_ignores_missing() {
        let mut g = Grammar::from_rules([("start", "x"), ("np", "y")]);
        g.remove_rule("$np");
        assert!(!g.has_rule("np"));
        g.remove_rule("").remove_rule("$").remove_rule("bad-name");
        assert!(g.has_rule("start"));
    }

    #[test]
    fn undefined_references_listed() {
        let set = RuleSet::from_bodies([("start", "$a $b"), ("a", "x")]);
        assert_eq!(
            set.undefined_references(),
            vec![("start".to_string(), "b".to_string())]
        );
    }

    #[test]
    fn display_round_trips_through_json() {
        let g = Grammar::from_rules([("start", "$pet"), ("pet", "dog [2] | cat")]);
        let again = RuleSet::parse_json(&g.to_string()).unwrap();
        assert_eq!(&again, g.rules());
    }

    #[test]
    fn load_requires_known_extension() {
        let err = RuleSet::load(Path::new("tests/fixtures/sentences.txt")).unwrap_err();
        assert!(matches!(err, GrammarError::Io(_) | GrammarError::UnsupportedFormat(_)));
    }
}
