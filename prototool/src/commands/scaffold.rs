use std::fs;
use std::path::Path;

use heck::ToUpperCamelCase;
use prototool_check::lint::render_header;
use prototool_config::{CreateRule, Error, Settings, DEFAULT_PROTOC_VERSION};

use crate::output::Outcome;
use crate::template::{CONFIG_TEMPLATE, CONFIG_TEMPLATE_UNCOMMENTED};

use super::Context;

/// Package used when no create rule covers a new file.
const DEFAULT_CREATE_PACKAGE: &str = "uncategorized";

/// `files`: print the discovered FileRefs, one absolute path per line.
pub fn files(context: &Context, input: Option<&Path>) -> Result<Outcome, Error> {
    for group in context.groups(input)? {
        for file in &group.files {
            println!("{}", context.display_path(file));
        }
    }
    Ok(Outcome::Clean)
}

/// `create`: scaffold new .proto files with computed package names.
pub fn create(
    context: &Context,
    new_files: &[std::path::PathBuf],
    package_override: Option<&str>,
) -> Result<Outcome, Error> {
    if new_files.is_empty() {
        return Err(Error::config_invalid("create requires at least one file"));
    }
    for file in new_files {
        let file = if file.is_absolute() {
            file.clone()
        } else {
            context.cwd().join(file)
        };
        if file.extension().map_or(true, |ext| ext != "proto") {
            return Err(Error::config_invalid(format!(
                "{} does not end in .proto",
                file.display()
            )));
        }
        if file.exists() {
            return Err(Error::config_invalid(format!(
                "{} already exists",
                file.display()
            )));
        }

        let dir = file
            .parent()
            .ok_or_else(|| Error::internal(format!("{} has no parent", file.display())))?;
        let mut resolver = context.resolver();
        let config_dir = resolver.governing_dir(dir);
        let settings = match &config_dir {
            Some(config_dir) => resolver.load(config_dir)?,
            None => Settings::default(),
        };

        let package = match package_override {
            Some(package) => package.to_string(),
            None => compute_package(dir, &settings.create),
        };

        fs::create_dir_all(dir)?;
        let content = render_new_file(&file, &package, &settings);
        fs::write(&file, content)?;
        log::debug!("created {} with package {package}", file.display());
    }
    Ok(Outcome::Clean)
}

/// Computes the package for a new file: the deepest create rule whose
/// directory contains the file anchors the base package, and the path from
/// the rule directory down contributes one segment per directory.
fn compute_package(dir: &Path, rules: &[CreateRule]) -> String {
    let best = rules
        .iter()
        .filter(|rule| dir.starts_with(&rule.directory))
        .max_by_key(|rule| rule.directory.components().count());
    let Some(rule) = best else {
        return DEFAULT_CREATE_PACKAGE.to_string();
    };
    let mut package = rule.base_package.clone();
    if let Ok(relative) = dir.strip_prefix(&rule.directory) {
        for component in relative.components() {
            let segment = component.as_os_str().to_string_lossy();
            if segment.is_empty() {
                continue;
            }
            package.push('.');
            package.push_str(&sanitize_segment(&segment));
        }
    }
    package
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn render_new_file(file: &Path, package: &str, settings: &Settings) -> String {
    let stem = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut out = String::new();
    if let Some(header) = &settings.lint.file_header {
        out.push_str(&render_header(&header.content, header.is_commented));
        out.push('\n');
    }
    out.push_str("syntax = \"proto3\";\n\n");
    out.push_str(&format!("package {package};\n\n"));
    let last_segment = package.rsplit('.').next().unwrap_or(package);
    out.push_str(&format!("option go_package = \"{last_segment}pb\";\n"));
    out.push_str("option java_multiple_files = true;\n");
    out.push_str(&format!(
        "option java_outer_classname = \"{}Proto\";\n",
        stem.to_upper_camel_case()
    ));
    out.push_str(&format!("option java_package = \"com.{package}\";\n"));
    out
}

/// `config init`: write the embedded template, refusing to overwrite.
pub fn config_init(
    context: &Context,
    dir: Option<&Path>,
    uncomment: bool,
) -> Result<Outcome, Error> {
    let dir = match dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => context.cwd().join(dir),
        None => context.cwd().to_path_buf(),
    };
    fs::create_dir_all(&dir)?;
    let target = dir.join(prototool_config::CONFIG_FILE_YAML);
    if target.exists() || dir.join(prototool_config::CONFIG_FILE_JSON).exists() {
        return Err(Error::config_invalid(format!(
            "{} already has a prototool config",
            dir.display()
        )));
    }
    let template = if uncomment {
        CONFIG_TEMPLATE_UNCOMMENTED
    } else {
        CONFIG_TEMPLATE
    };
    fs::write(&target, template)?;
    println!("{}", target.display());
    Ok(Outcome::Clean)
}

/// `version`: tool and default toolchain versions.
pub fn version() -> Result<Outcome, Error> {
    println!("prototool {}", env!("CARGO_PKG_VERSION"));
    println!("default protoc version {DEFAULT_PROTOC_VERSION}");
    Ok(Outcome::Clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn package_from_nearest_rule() {
        let rules = vec![
            CreateRule {
                directory: PathBuf::from("/repo"),
                base_package: "uber".to_string(),
            },
            CreateRule {
                directory: PathBuf::from("/repo/special"),
                base_package: "special.v1".to_string(),
            },
        ];
        assert_eq!(compute_package(Path::new("/repo/a"), &rules), "uber.a");
        assert_eq!(compute_package(Path::new("/repo"), &rules), "uber");
        assert_eq!(
            compute_package(Path::new("/repo/special/x"), &rules),
            "special.v1.x"
        );
        assert_eq!(compute_package(Path::new("/elsewhere"), &rules), "uncategorized");
    }

    #[test]
    fn rendered_file_has_package_and_options() {
        let content = render_new_file(
            Path::new("/repo/a/user_record.proto"),
            "uber.a",
            &Settings::default(),
        );
        assert!(content.starts_with("syntax = \"proto3\";\n\npackage uber.a;\n"));
        assert!(content.contains("option go_package = \"apb\";"));
        assert!(content.contains("option java_outer_classname = \"UserRecordProto\";"));
        assert!(content.contains("option java_package = \"com.uber.a\";"));
    }
}
