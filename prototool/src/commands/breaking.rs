use std::path::Path;

use prototool_check::breaking::{check, BreakOptions};
use prototool_check::git::GitWorktree;
use prototool_config::{Error, Failure};

use crate::output::{print_failures, Outcome};

use super::{compile_groups, merge_descriptors, Context};

/// `break check`: compile the baseline ref and the current worktree, then
/// diff the descriptor sets under the compatibility rules.
pub fn break_check(
    context: &Context,
    input: Option<&Path>,
    git_ref: &str,
    options: BreakOptions,
) -> Result<Outcome, Error> {
    let input = match input {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => context.cwd().join(path),
        None => context.cwd().to_path_buf(),
    };
    let input = dunce::canonicalize(&input).map_err(|_| Error::NotFound(input))?;

    // Current worktree first; a broken `to` makes the comparison moot.
    let to_groups = context.groups(Some(&input))?;
    let (to_compiled, mut failures) = compile_groups(context, to_groups)?;
    if !failures.is_empty() {
        Failure::sort(&mut failures);
        return Ok(print_failures(&failures, context.json()));
    }
    let to_descriptors = merge_descriptors(&to_compiled);

    let worktree = GitWorktree::checkout(&input, git_ref)?;
    let baseline_input = worktree.map_path(&input)?;
    let from_descriptors = match context.groups(Some(&baseline_input)) {
        Ok(from_groups) => {
            let (from_compiled, from_failures) = compile_groups(context, from_groups)?;
            if !from_failures.is_empty() {
                log::debug!(
                    "baseline {git_ref} does not compile cleanly; comparing what compiled"
                );
            }
            merge_descriptors(&from_compiled)
        }
        // The path may not exist at the baseline ref; everything is new.
        Err(Error::NotFound(_)) => Default::default(),
        Err(err) => return Err(err),
    };

    let failures = check(&from_descriptors, &to_descriptors, &options);
    Ok(print_failures(&failures, context.json()))
}
