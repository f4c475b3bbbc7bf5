use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use prototool_check::{format as fmt, lint};
use prototool_config::{Error, Failure, FileGroup};
use prototool_parse::parse_source;

use crate::output::{print_failures, Outcome};

use super::{compile_groups, group_targets, Compiled, Context};

/// `compile`: run protoc over every group and report diagnostics.
pub fn compile(context: &Context, input: Option<&Path>, dry_run: bool) -> Result<Outcome, Error> {
    let groups = context.groups(input)?;
    if dry_run {
        return print_invocations(context, &groups, false);
    }
    let (_, failures) = compile_groups(context, groups)?;
    Ok(print_failures(&failures, context.json()))
}

/// `generate`: run the configured plugins over every group.
pub fn generate(context: &Context, input: Option<&Path>, dry_run: bool) -> Result<Outcome, Error> {
    let groups = context.groups(input)?;
    if dry_run {
        return print_invocations(context, &groups, true);
    }
    let mut failures = Vec::new();
    for group in &groups {
        let runner = context.runner(&group.settings)?;
        failures.extend(runner.generate(group)?);
    }
    Failure::sort(&mut failures);
    Ok(print_failures(&failures, context.json()))
}

fn print_invocations(
    context: &Context,
    groups: &[FileGroup],
    generate_mode: bool,
) -> Result<Outcome, Error> {
    for group in groups {
        let runner = context.runner(&group.settings)?;
        let argv = if generate_mode {
            runner.generate_argv(group)?
        } else {
            runner.compile_argv(group, Path::new("descriptor_set.bin"))
        };
        let rendered: Vec<String> = argv
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        println!("protoc {}", rendered.join(" "));
    }
    Ok(Outcome::Clean)
}

pub struct LintLists {
    pub list_all_linters: bool,
    pub list_linters: bool,
    pub list_all_lint_groups: bool,
    pub list_lint_group: Option<String>,
    pub diff_lint_groups: Option<String>,
}

impl LintLists {
    fn any(&self) -> bool {
        self.list_all_linters
            || self.list_linters
            || self.list_all_lint_groups
            || self.list_lint_group.is_some()
            || self.diff_lint_groups.is_some()
    }
}

/// `lint`: compile for validity, then evaluate the effective rule set.
pub fn lint(context: &Context, input: Option<&Path>, lists: LintLists) -> Result<Outcome, Error> {
    if lists.any() {
        return run_lists(context, input, &lists);
    }

    let groups = context.groups(input)?;
    let (compiled, mut failures) = compile_groups(context, groups)?;
    failures.extend(lint_compiled(context, &compiled)?);
    Failure::sort(&mut failures);
    Ok(print_failures(&failures, context.json()))
}

/// The shared lint pass over compiled groups, used by `lint` and `all`.
pub(super) fn lint_compiled(
    context: &Context,
    compiled: &[Compiled],
) -> Result<Vec<Failure>, Error> {
    let mut failures = Vec::new();
    for entry in compiled {
        let targets = group_targets(&entry.group);
        for file in &entry.group.files {
            let source = fs::read_to_string(file)?;
            let display = context.display_path(file);
            let ast = match parse_source(&display, &source) {
                Ok(ast) => ast,
                Err(failure) => {
                    failures.push(failure);
                    continue;
                }
            };
            failures.extend(lint::lint_file(
                &ast,
                &entry.group.settings.lint,
                entry.descriptors.as_ref(),
                &targets,
            )?);
        }
    }
    Ok(failures)
}

fn run_lists(
    context: &Context,
    input: Option<&Path>,
    lists: &LintLists,
) -> Result<Outcome, Error> {
    if lists.list_all_linters {
        for rule in lint::all_rules() {
            println!("{}\t{}", rule.id, rule.purpose);
        }
        return Ok(Outcome::Clean);
    }
    if lists.list_all_lint_groups {
        for group in lint::GROUPS {
            println!("{group}");
        }
        return Ok(Outcome::Clean);
    }
    if let Some(group) = &lists.list_lint_group {
        for rule in lint::group_rules(group)? {
            println!("{}\t{}", rule.id, rule.purpose);
        }
        return Ok(Outcome::Clean);
    }
    if let Some(spec) = &lists.diff_lint_groups {
        let (left, right) = spec.split_once(',').ok_or_else(|| {
            Error::config_invalid("--diff-lint-groups takes two groups, e.g. uber1,uber2")
        })?;
        let left_ids: BTreeSet<&str> = lint::group_rules(left.trim())?
            .iter()
            .map(|rule| rule.id)
            .collect();
        let right_ids: BTreeSet<&str> = lint::group_rules(right.trim())?
            .iter()
            .map(|rule| rule.id)
            .collect();
        for id in left_ids.difference(&right_ids) {
            println!("< {id}");
        }
        for id in right_ids.difference(&left_ids) {
            println!("> {id}");
        }
        return Ok(Outcome::Clean);
    }
    if lists.list_linters {
        // The effective set depends on the governing config of the input.
        let input_dir = input.unwrap_or_else(|| Path::new("."));
        let groups = context.groups(Some(input_dir)).or_else(|err| {
            // No .proto files is fine for listing; fall back to the config
            // governing the directory itself.
            if matches!(err, Error::NotFound(_)) {
                Ok(Vec::new())
            } else {
                Err(err)
            }
        })?;
        let settings = match groups.first() {
            Some(group) => group.settings.clone(),
            None => {
                let mut resolver = context.resolver();
                let config_dir = resolver
                    .governing_dir(context.cwd())
                    .unwrap_or_else(|| context.cwd().to_path_buf());
                std::sync::Arc::new(resolver.load(&config_dir)?)
            }
        };
        for rule in lint::effective_rules(&settings.lint)? {
            println!("{}\t{}", rule.id, rule.purpose);
        }
        return Ok(Outcome::Clean);
    }
    Ok(Outcome::Clean)
}

pub struct FormatMode {
    pub fix: bool,
    pub overwrite: bool,
    pub diff_mode: bool,
    pub lint_mode: bool,
}

/// `format`: print, rewrite, diff, or lint-check the canonical form.
pub fn format(context: &Context, input: Option<&Path>, mode: FormatMode) -> Result<Outcome, Error> {
    let groups = context.groups(input)?;
    let mut failures = Vec::new();
    for group in &groups {
        for file in &group.files {
            let source = fs::read_to_string(file)?;
            let display = context.display_path(file);
            let ast = match parse_source(&display, &source) {
                Ok(ast) => ast,
                Err(failure) => {
                    failures.push(failure);
                    continue;
                }
            };
            let formatted = fmt::format_file(&ast, &group.settings.lint, mode.fix);

            if mode.overwrite {
                if formatted != source {
                    fmt::write_atomic(file, &formatted)?;
                }
            } else if mode.diff_mode {
                if let Some(diff) = fmt::unified_diff(&display, &source, &formatted) {
                    print!("{diff}");
                }
            } else if mode.lint_mode {
                if formatted != source {
                    failures.push(fmt::format_failure(&display));
                }
            } else {
                print!("{formatted}");
            }
        }
    }
    Failure::sort(&mut failures);
    Ok(print_failures(&failures, context.json()))
}

/// The formatting check used by `all`.
pub(super) fn format_check(context: &Context, groups: &[FileGroup]) -> Result<Vec<Failure>, Error> {
    let mut failures = Vec::new();
    for group in groups {
        for file in &group.files {
            let source = fs::read_to_string(file)?;
            let display = context.display_path(file);
            let ast = match parse_source(&display, &source) {
                Ok(ast) => ast,
                Err(failure) => {
                    failures.push(failure);
                    continue;
                }
            };
            if fmt::format_file(&ast, &group.settings.lint, false) != source {
                failures.push(fmt::format_failure(&display));
            }
        }
    }
    Ok(failures)
}

/// `all`: compile, lint, and check formatting in one pass.
pub fn all(context: &Context, input: Option<&Path>) -> Result<Outcome, Error> {
    let groups = context.groups(input)?;
    let (compiled, mut failures) = compile_groups(context, groups)?;
    failures.extend(lint_compiled(context, &compiled)?);
    let groups: Vec<FileGroup> = compiled.iter().map(|entry| entry.group.clone()).collect();
    failures.extend(format_check(context, &groups)?);
    Failure::sort(&mut failures);
    Ok(print_failures(&failures, context.json()))
}
