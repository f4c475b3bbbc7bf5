//! Command implementations. Each returns an [`Outcome`] after printing its
//! diagnostics; operational errors bubble up for exit-code 2.

mod breaking;
mod cache;
mod check;
mod grpc;
mod inspect;
mod scaffold;

pub use breaking::break_check;
pub use cache::{cache_delete, cache_update};
pub use check::{all, compile, format, generate, lint, FormatMode, LintLists};
pub use grpc::grpc;
pub use inspect::{inspect_package_deps, inspect_package_importers, inspect_packages};
pub use scaffold::{config_init, create, files, version};

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rayon::prelude::*;

use prost_types::FileDescriptorSet;
use prototool_config::{discover, Error, Failure, FileGroup, Resolver, Settings};
use prototool_protoc::{CompileOutput, Platform, ProtocRunner, ToolchainCache};

use crate::GlobalArgs;

pub struct Context {
    globals: GlobalArgs,
    cwd: PathBuf,
}

impl Context {
    pub fn new(globals: GlobalArgs) -> Result<Context, Error> {
        let cwd = dunce::canonicalize(env::current_dir()?)?;
        Ok(Context { globals, cwd })
    }

    pub fn json(&self) -> bool {
        self.globals.json_output()
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(self.globals.config_data.clone())
    }

    /// Resolves the input to config groups: discovery, governing configs,
    /// excludes.
    pub fn groups(&self, input: Option<&Path>) -> Result<Vec<FileGroup>, Error> {
        let input = self.resolve_input(input)?;
        let files = discover(&input)?;
        let fallback = if input.is_file() {
            input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.cwd.clone())
        } else {
            input
        };
        self.resolver().group(files, &fallback)
    }

    fn resolve_input(&self, input: Option<&Path>) -> Result<PathBuf, Error> {
        let input = match input {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.cwd.join(path),
            None => self.cwd.clone(),
        };
        dunce::canonicalize(&input).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(input)
            } else {
                Error::Io(err)
            }
        })
    }

    pub fn cache(&self) -> Result<ToolchainCache, Error> {
        match &self.globals.cache_path {
            Some(path) => Ok(ToolchainCache::at(
                path.clone(),
                self.globals.protoc_url.clone(),
            )),
            None => ToolchainCache::new(self.globals.protoc_url.clone()),
        }
    }

    /// A protoc runner for one group's settings: the explicit binary override
    /// when given, otherwise the cached toolchain for the pinned version.
    pub fn runner(&self, settings: &Settings) -> Result<ProtocRunner, Error> {
        if let Some(binary) = &self.globals.protoc_bin_path {
            return Ok(ProtocRunner::new(
                binary.clone(),
                self.globals.protoc_wkt_path.clone(),
            ));
        }
        let cache = self.cache()?;
        let entry = cache.ensure(&settings.protoc.version, Platform::current()?)?;
        let wkt = self
            .globals
            .protoc_wkt_path
            .clone()
            .unwrap_or(entry.wkt_include_path);
        Ok(ProtocRunner::new(entry.binary_path, Some(wkt)))
    }

    /// A path as printed to the user: relative to the working directory when
    /// possible.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.cwd)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// One compiled group.
pub struct Compiled {
    pub group: FileGroup,
    pub descriptors: Option<FileDescriptorSet>,
}

/// Compiles every group, fanning disjoint groups out across the CPU pool.
/// Diagnostics land in a shared, mutex-guarded collector; the first
/// operational error wins.
pub fn compile_groups(
    context: &Context,
    groups: Vec<FileGroup>,
) -> Result<(Vec<Compiled>, Vec<Failure>), Error> {
    // One runner per distinct protoc version, resolved up front so a cold
    // cache downloads each version once.
    let mut runners: BTreeMap<String, ProtocRunner> = BTreeMap::new();
    for group in &groups {
        let version = group.settings.protoc.version.clone();
        if !runners.contains_key(&version) {
            runners.insert(version, context.runner(&group.settings)?);
        }
    }

    let failures = Mutex::new(Vec::new());
    let compiled = Mutex::new(Vec::new());
    groups.into_par_iter().try_for_each(|group| {
        let runner = &runners[&group.settings.protoc.version];
        let CompileOutput {
            descriptor_set,
            failures: group_failures,
        } = runner.compile(&group)?;
        failures.lock().expect("collector poisoned").extend(group_failures);
        compiled.lock().expect("collector poisoned").push(Compiled {
            group,
            descriptors: descriptor_set,
        });
        Ok::<(), Error>(())
    })?;

    let mut compiled = compiled.into_inner().expect("collector poisoned");
    compiled.sort_by(|a, b| a.group.config_dir.cmp(&b.group.config_dir));
    let mut failures = failures.into_inner().expect("collector poisoned");
    Failure::sort(&mut failures);
    Ok((compiled, failures))
}

/// Descriptor-set file names for the group's own files: each file named the
/// way protoc names it, relative to the include root that covers it.
pub fn group_targets(group: &FileGroup) -> std::collections::BTreeSet<String> {
    let mut roots = group.settings.protoc.includes.clone();
    roots.push(group.config_dir.clone());
    group
        .files
        .iter()
        .filter_map(|file| {
            roots.iter().find_map(|root| {
                file.strip_prefix(root)
                    .ok()
                    .map(|relative| relative.to_string_lossy().into_owned())
            })
        })
        .collect()
}

/// Merges per-group descriptor sets, deduplicating shared imports by name.
pub fn merge_descriptors(compiled: &[Compiled]) -> FileDescriptorSet {
    let mut seen = std::collections::BTreeSet::new();
    let mut merged = FileDescriptorSet::default();
    for entry in compiled {
        let Some(descriptors) = &entry.descriptors else {
            continue;
        };
        for file in &descriptors.file {
            if seen.insert(file.name().to_string()) {
                merged.file.push(file.clone());
            }
        }
    }
    merged
}

/// Parses repeated `key:value` header flags.
pub fn parse_headers(headers: &[String]) -> Result<Vec<(String, String)>, Error> {
    headers
        .iter()
        .map(|header| {
            header
                .split_once(':')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| {
                    Error::config_invalid(format!("header {header:?} must be key:value"))
                })
        })
        .collect()
}
