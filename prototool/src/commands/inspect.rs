use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use prost_types::FileDescriptorSet;
use prototool_config::Error;

use crate::output::Outcome;

use super::{compile_groups, group_targets, merge_descriptors, Context};

/// The package graph of a compiled schema: which packages the targets
/// declare, and the import edges between packages.
struct PackageGraph {
    /// Packages declared by the files under inspection.
    packages: BTreeSet<String>,
    /// package -> packages it imports (targets and dependencies alike).
    deps: BTreeMap<String, BTreeSet<String>>,
}

fn build_graph(descriptors: &FileDescriptorSet, targets: &BTreeSet<String>) -> PackageGraph {
    let package_of: BTreeMap<&str, &str> = descriptors
        .file
        .iter()
        .map(|file| (file.name(), file.package()))
        .collect();

    let mut packages = BTreeSet::new();
    let mut deps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for file in &descriptors.file {
        if !targets.contains(file.name()) {
            continue;
        }
        let package = file.package().to_string();
        packages.insert(package.clone());
        let entry = deps.entry(package.clone()).or_default();
        for dependency in &file.dependency {
            if let Some(&imported) = package_of.get(dependency.as_str()) {
                if imported != package {
                    entry.insert(imported.to_string());
                }
            }
        }
    }
    PackageGraph { packages, deps }
}

fn compiled_graph(context: &Context, input: Option<&Path>) -> Result<PackageGraph, Error> {
    let groups = context.groups(input)?;
    let mut targets = BTreeSet::new();
    for group in &groups {
        targets.extend(group_targets(group));
    }
    let (compiled, failures) = compile_groups(context, groups)?;
    if !failures.is_empty() {
        return Err(Error::internal(
            "schema does not compile; run prototool compile for diagnostics",
        ));
    }
    Ok(build_graph(&merge_descriptors(&compiled), &targets))
}

/// `inspect packages`: every package declared by the inputs.
pub fn inspect_packages(context: &Context, input: Option<&Path>) -> Result<Outcome, Error> {
    let graph = compiled_graph(context, input)?;
    for package in &graph.packages {
        println!("{package}");
    }
    Ok(Outcome::Clean)
}

/// `inspect package-deps --name`: packages the named package imports.
pub fn inspect_package_deps(
    context: &Context,
    input: Option<&Path>,
    name: &str,
) -> Result<Outcome, Error> {
    let graph = compiled_graph(context, input)?;
    let deps = graph
        .deps
        .get(name)
        .ok_or_else(|| Error::NotFound(name.into()))?;
    for dep in deps {
        println!("{dep}");
    }
    Ok(Outcome::Clean)
}

/// `inspect package-importers --name`: packages that import the named one.
pub fn inspect_package_importers(
    context: &Context,
    input: Option<&Path>,
    name: &str,
) -> Result<Outcome, Error> {
    let graph = compiled_graph(context, input)?;
    if !graph.packages.contains(name)
        && !graph.deps.values().any(|deps| deps.contains(name))
    {
        return Err(Error::NotFound(name.into()));
    }
    for (package, deps) in &graph.deps {
        if deps.contains(name) {
            println!("{package}");
        }
    }
    Ok(Outcome::Clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::FileDescriptorProto;

    fn descriptors() -> FileDescriptorSet {
        FileDescriptorSet {
            file: vec![
                FileDescriptorProto {
                    name: Some("a.proto".into()),
                    package: Some("foo.v1".into()),
                    dependency: vec!["b.proto".into(), "wkt.proto".into()],
                    ..Default::default()
                },
                FileDescriptorProto {
                    name: Some("b.proto".into()),
                    package: Some("bar.v1".into()),
                    ..Default::default()
                },
                FileDescriptorProto {
                    name: Some("wkt.proto".into()),
                    package: Some("google.protobuf".into()),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn graph_tracks_target_packages_and_edges() {
        let targets: BTreeSet<String> =
            ["a.proto".to_string(), "b.proto".to_string()].into_iter().collect();
        let graph = build_graph(&descriptors(), &targets);
        assert!(graph.packages.contains("foo.v1"));
        assert!(graph.packages.contains("bar.v1"));
        assert!(!graph.packages.contains("google.protobuf"));

        let foo_deps = &graph.deps["foo.v1"];
        assert!(foo_deps.contains("bar.v1"));
        assert!(foo_deps.contains("google.protobuf"));
        assert!(graph.deps["bar.v1"].is_empty());
    }
}
