//! The lint engine: an ordered registry of named rules, grouped into named
//! bundles, evaluated over the AST and (for cross-file rules) the compiled
//! descriptor set.

mod rules;

pub use rules::render_header;

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use prost_types::FileDescriptorSet;

use prototool_config::{Error, Failure, LintSettings, DEFAULT_LINT_GROUP};
use prototool_parse::Ast;

/// The named rule bundles, weakest first. Each group is a superset of the
/// one before it.
pub const GROUPS: &[&str] = &["google", "uber1", "uber2"];

/// How a rule inspects a file.
pub enum Check {
    /// Runs over the parsed AST of a single file, with the governing lint
    /// settings as file context.
    Ast(fn(&Ast, &LintSettings, &mut Vec<Failure>)),
    /// Runs over the compiled descriptor set; `targets` is the set of file
    /// names under lint (imports are excluded).
    DescriptorSet(fn(&FileDescriptorSet, &BTreeSet<String>, &mut Vec<Failure>)),
}

/// A replacement of a byte span with new text, produced by autofix rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
    pub replacement: String,
    pub rule_id: &'static str,
}

/// A named lint rule.
pub struct Rule {
    /// Uppercase-underscore, unique across the registry.
    pub id: &'static str,
    /// One-line purpose, shown by the list commands.
    pub purpose: &'static str,
    /// Bundles the rule belongs to.
    pub groups: &'static [&'static str],
    pub check: Check,
    /// Present when the rule can repair the file itself.
    pub fix: Option<fn(&Ast, &LintSettings) -> Vec<Edit>>,
}

static REGISTRY: Lazy<Vec<Rule>> = Lazy::new(rules::all);

/// Every known rule, in registry order.
pub fn all_rules() -> impl Iterator<Item = &'static Rule> {
    REGISTRY.iter()
}

pub fn rule_by_id(id: &str) -> Option<&'static Rule> {
    REGISTRY.iter().find(|rule| rule.id == id)
}

/// The rules belonging to a named group, in registry order.
pub fn group_rules(group: &str) -> Result<Vec<&'static Rule>, Error> {
    if !GROUPS.contains(&group) {
        return Err(Error::config_invalid(format!("unknown lint group {group:?}")));
    }
    Ok(REGISTRY
        .iter()
        .filter(|rule| rule.groups.contains(&group))
        .collect())
}

/// Computes the effective rule set for a config:
///
/// 1. `lint.group` selects that group's rules (`no_default` is ignored);
/// 2. else `no_default` starts empty;
/// 3. else the default group applies;
/// 4. `rules.add` extends and `rules.remove` trims the set.
///
/// Unknown ids anywhere are `config-invalid`. The result is a pure function
/// of the settings tuple, in registry order.
pub fn effective_rules(settings: &LintSettings) -> Result<Vec<&'static Rule>, Error> {
    for id in settings.add.iter().chain(settings.remove.iter()) {
        if rule_by_id(id).is_none() {
            return Err(Error::config_invalid(format!("unknown lint rule {id:?}")));
        }
    }
    if let Some(id) = settings.ignores.keys().find(|id| rule_by_id(id).is_none()) {
        return Err(Error::config_invalid(format!("unknown lint rule {id:?}")));
    }

    let mut selected: BTreeSet<&'static str> = match &settings.group {
        Some(group) => group_rules(group)?.iter().map(|rule| rule.id).collect(),
        None if settings.no_default => BTreeSet::new(),
        None => group_rules(DEFAULT_LINT_GROUP)?
            .iter()
            .map(|rule| rule.id)
            .collect(),
    };
    for id in &settings.add {
        let rule = rule_by_id(id).expect("validated above");
        selected.insert(rule.id);
    }
    for id in &settings.remove {
        selected.remove(id.as_str());
    }

    Ok(REGISTRY
        .iter()
        .filter(|rule| selected.contains(rule.id))
        .collect())
}

/// Whether `rule` is suppressed for `path` by the config's ignores. Configs
/// store absolute paths while diagnostics usually carry working-directory
/// relative ones, so equality and component-suffix matches both count.
fn is_ignored(settings: &LintSettings, rule: &Rule, path: &str) -> bool {
    let path = std::path::Path::new(path);
    settings
        .ignores
        .get(rule.id)
        .is_some_and(|files| files.iter().any(|file| file == path || file.ends_with(path)))
}

/// Lints one file's AST, plus descriptor-set rules when descriptors are
/// available. Failures come back sorted.
pub fn lint_file(
    ast: &Ast,
    settings: &LintSettings,
    descriptors: Option<&FileDescriptorSet>,
    targets: &BTreeSet<String>,
) -> Result<Vec<Failure>, Error> {
    let rules = effective_rules(settings)?;
    let mut failures = Vec::new();
    for rule in rules {
        if is_ignored(settings, rule, &ast.path) {
            continue;
        }
        let before = failures.len();
        match rule.check {
            Check::Ast(check) => check(ast, settings, &mut failures),
            Check::DescriptorSet(check) => {
                if let Some(descriptors) = descriptors {
                    check(descriptors, targets, &mut failures);
                }
            }
        }
        for failure in &mut failures[before..] {
            failure.rule_id = Some(rule.id.to_string());
        }
    }
    Failure::sort(&mut failures);
    Ok(failures)
}

/// Collects fixes from autofix-capable rules in the effective set and applies
/// them to `source`. Overlapping edits are a conflict: the later edit is
/// dropped and reported as a `FIX_CONFLICT` failure.
pub fn apply_fixes(
    ast: &Ast,
    settings: &LintSettings,
    source: &str,
) -> Result<(String, Vec<Failure>), Error> {
    let rules = effective_rules(settings)?;
    let mut edits: Vec<Edit> = Vec::new();
    for rule in rules {
        if is_ignored(settings, rule, &ast.path) {
            continue;
        }
        if let Some(fix) = rule.fix {
            edits.extend(fix(ast, settings));
        }
    }
    Ok(apply_edits(&ast.path, source, edits))
}

/// Applies span edits to `source`. Overlapping edits conflict: the later one
/// is dropped and reported.
pub fn apply_edits(path: &str, source: &str, mut edits: Vec<Edit>) -> (String, Vec<Failure>) {
    edits.sort_by_key(|edit| (edit.start, edit.end));

    let mut failures = Vec::new();
    let mut applied: Vec<Edit> = Vec::new();
    let mut high_water = 0usize;
    for edit in edits {
        if edit.start < high_water {
            failures.push(
                Failure::new(
                    path,
                    1,
                    1,
                    format!("fix from {} overlaps an earlier fix; dropped", edit.rule_id),
                )
                .with_rule("FIX_CONFLICT"),
            );
            continue;
        }
        high_water = edit.end.max(high_water);
        applied.push(edit);
    }

    let mut fixed = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for edit in applied {
        fixed.push_str(&source[cursor..edit.start]);
        fixed.push_str(&edit.replacement);
        cursor = edit.end;
    }
    fixed.push_str(&source[cursor..]);
    (fixed, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prototool_parse::parse_source;

    fn settings_with(group: Option<&str>) -> LintSettings {
        LintSettings {
            group: group.map(str::to_string),
            ..LintSettings::default()
        }
    }

    #[test]
    fn registry_ids_are_unique_and_upper_snake() {
        let mut seen = BTreeSet::new();
        for rule in all_rules() {
            assert!(seen.insert(rule.id), "duplicate rule id {}", rule.id);
            assert!(
                rule.id
                    .chars()
                    .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_'),
                "rule id {} is not UPPER_SNAKE",
                rule.id
            );
            assert!(!rule.purpose.is_empty());
        }
    }

    #[test]
    fn groups_nest() {
        let google: BTreeSet<&str> = group_rules("google")
            .unwrap()
            .iter()
            .map(|rule| rule.id)
            .collect();
        let uber1: BTreeSet<&str> = group_rules("uber1")
            .unwrap()
            .iter()
            .map(|rule| rule.id)
            .collect();
        let uber2: BTreeSet<&str> = group_rules("uber2")
            .unwrap()
            .iter()
            .map(|rule| rule.id)
            .collect();
        assert!(google.is_subset(&uber1));
        assert!(uber1.is_subset(&uber2));
    }

    #[test]
    fn unknown_group_is_config_invalid() {
        assert!(matches!(
            group_rules("uber3"),
            Err(Error::ConfigInvalid(_))
        ));
    }

    #[test]
    fn effective_set_is_deterministic() {
        let mut settings = settings_with(None);
        settings.add = vec!["SERVICE_NAMES_END_IN_SERVICE".to_string()];
        settings.remove = vec!["SYNTAX_PROTO3".to_string()];
        let first: Vec<&str> = effective_rules(&settings)
            .unwrap()
            .iter()
            .map(|rule| rule.id)
            .collect();
        let second: Vec<&str> = effective_rules(&settings)
            .unwrap()
            .iter()
            .map(|rule| rule.id)
            .collect();
        assert_eq!(first, second);
        assert!(first.contains(&"SERVICE_NAMES_END_IN_SERVICE"));
        assert!(!first.contains(&"SYNTAX_PROTO3"));
    }

    #[test]
    fn no_default_starts_empty() {
        let mut settings = settings_with(None);
        settings.no_default = true;
        settings.add = vec!["ENUM_NAMES_CAPITALIZED".to_string()];
        let ids: Vec<&str> = effective_rules(&settings)
            .unwrap()
            .iter()
            .map(|rule| rule.id)
            .collect();
        assert_eq!(ids, vec!["ENUM_NAMES_CAPITALIZED"]);
    }

    #[test]
    fn group_overrides_no_default() {
        let mut settings = settings_with(Some("google"));
        settings.no_default = true;
        assert!(!effective_rules(&settings).unwrap().is_empty());
    }

    #[test]
    fn unknown_added_rule_is_config_invalid() {
        let mut settings = settings_with(None);
        settings.add = vec!["NO_SUCH_RULE".to_string()];
        assert!(matches!(
            effective_rules(&settings),
            Err(Error::ConfigInvalid(_))
        ));
    }

    #[test]
    fn lowercase_enum_fails_under_uber1() {
        let ast = parse_source(
            "idl/foo.proto",
            "syntax = \"proto3\";\npackage foo.v1;\nenum foo { FOO_INVALID = 0; }\n",
        )
        .unwrap();
        let failures = lint_file(
            &ast,
            &settings_with(Some("uber1")),
            None,
            &BTreeSet::new(),
        )
        .unwrap();
        let enum_failure = failures
            .iter()
            .find(|failure| failure.rule_id.as_deref() == Some("ENUM_NAMES_CAPITALIZED"))
            .expect("expected ENUM_NAMES_CAPITALIZED");
        assert_eq!(enum_failure.line, 3);
        assert_eq!(enum_failure.column, 6);
    }

    #[test]
    fn single_line_enum_failure_location() {
        // The end-to-end shape: file starts with the enum on line 1.
        let ast = parse_source("idl/foo.proto", "enum foo { A = 0; }\n").unwrap();
        let failures = lint_file(
            &ast,
            &settings_with(Some("uber1")),
            None,
            &BTreeSet::new(),
        )
        .unwrap();
        let failure = failures
            .iter()
            .find(|failure| failure.rule_id.as_deref() == Some("ENUM_NAMES_CAPITALIZED"))
            .unwrap();
        assert_eq!((failure.line, failure.column), (1, 6));
    }

    #[test]
    fn ignores_suppress_per_file() {
        let ast = parse_source("/work/idl/foo.proto", "enum foo { A = 0; }\n").unwrap();
        let mut settings = settings_with(Some("uber1"));
        settings.ignores.insert(
            "ENUM_NAMES_CAPITALIZED".to_string(),
            vec![std::path::PathBuf::from("/work/idl/foo.proto")],
        );
        let failures = lint_file(&ast, &settings, None, &BTreeSet::new()).unwrap();
        assert!(!failures
            .iter()
            .any(|failure| failure.rule_id.as_deref() == Some("ENUM_NAMES_CAPITALIZED")));
    }
}
