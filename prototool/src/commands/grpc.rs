use std::path::Path;

use prototool_config::Error;
use prototool_grpc::InvokeRequest;

use crate::output::{print_failures, Outcome};

use super::{compile_groups, merge_descriptors, Context};

/// `grpc`: compile the schema in-process, then invoke the method against the
/// given address, writing response JSON to stdout.
pub fn grpc(
    context: &Context,
    input: Option<&Path>,
    request: InvokeRequest,
) -> Result<Outcome, Error> {
    let groups = context.groups(input)?;
    let (compiled, failures) = compile_groups(context, groups)?;
    if !failures.is_empty() {
        return Ok(print_failures(&failures, context.json()));
    }

    let descriptors = merge_descriptors(&compiled);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    prototool_grpc::invoke(descriptors, request, &mut out)?;
    Ok(Outcome::Clean)
}
