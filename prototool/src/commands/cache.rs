use std::collections::BTreeSet;
use std::path::Path;

use prototool_config::Error;
use prototool_protoc::Platform;

use crate::output::Outcome;

use super::Context;

/// `cache update`: install the protoc version pinned by each governing
/// config. Already-installed versions are a no-op.
pub fn cache_update(context: &Context, input: Option<&Path>) -> Result<Outcome, Error> {
    let cache = context.cache()?;
    let platform = Platform::current()?;

    let versions: BTreeSet<String> = context
        .groups(input)?
        .iter()
        .map(|group| group.settings.protoc.version.clone())
        .collect();
    let versions = if versions.is_empty() {
        // No .proto files found; still honor the governing config's pin.
        let mut resolver = context.resolver();
        let config_dir = resolver
            .governing_dir(context.cwd())
            .unwrap_or_else(|| context.cwd().to_path_buf());
        BTreeSet::from([resolver.load(&config_dir)?.protoc.version])
    } else {
        versions
    };

    for version in versions {
        let entry = cache.ensure(&version, platform)?;
        println!("{}", entry.binary_path.display());
    }
    Ok(Outcome::Clean)
}

/// `cache delete`: remove the default cache root.
pub fn cache_delete(context: &Context) -> Result<Outcome, Error> {
    if context.globals.cache_path.is_some() {
        return Err(Error::config_invalid(
            "cache delete only removes the default cache; drop --cache-path",
        ));
    }
    context.cache()?.delete()?;
    Ok(Outcome::Clean)
}
