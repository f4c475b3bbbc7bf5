//! The shipped lint rules. Groups nest: `google` ⊂ `uber1` ⊂ `uber2`.

use std::collections::{BTreeMap, BTreeSet};

use heck::{ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use prost_types::FileDescriptorSet;

use prototool_config::{Failure, LintSettings};
use prototool_parse::{Ast, NodeIndex, NodeKind};

use super::{Check, Edit, Rule};

const ALL: &[&str] = &["google", "uber1", "uber2"];
const UBER: &[&str] = &["uber1", "uber2"];
const UBER2: &[&str] = &["uber2"];

pub(super) fn all() -> Vec<Rule> {
    vec![
        Rule {
            id: "PACKAGE_IS_DECLARED",
            purpose: "Files must declare a package.",
            groups: ALL,
            check: Check::Ast(package_is_declared),
            fix: None,
        },
        Rule {
            id: "PACKAGE_LOWER_SNAKE_CASE",
            purpose: "Package names must be lower_snake_case.",
            groups: ALL,
            check: Check::Ast(package_lower_snake_case),
            fix: None,
        },
        Rule {
            id: "PACKAGE_HAS_VERSION_SUFFIX",
            purpose: "Package names must end in a version suffix such as .v1 or .v1beta1.",
            groups: UBER2,
            check: Check::Ast(package_has_version_suffix),
            fix: None,
        },
        Rule {
            id: "PACKAGES_SAME_IN_DIR",
            purpose: "All files in a directory must declare the same package.",
            groups: UBER,
            check: Check::DescriptorSet(packages_same_in_dir),
            fix: None,
        },
        Rule {
            id: "SYNTAX_PROTO3",
            purpose: "Files must use proto3 syntax.",
            groups: UBER,
            check: Check::Ast(syntax_proto3),
            fix: None,
        },
        Rule {
            id: "JAVA_PACKAGE_IS_DECLARED",
            purpose: "Files must set the java_package file option.",
            groups: ALL,
            check: Check::Ast(java_package_is_declared),
            fix: None,
        },
        Rule {
            id: "JAVA_OUTER_CLASSNAME_IS_DECLARED",
            purpose: "Files must set the java_outer_classname file option.",
            groups: ALL,
            check: Check::Ast(java_outer_classname_is_declared),
            fix: None,
        },
        Rule {
            id: "IMPORTS_NOT_WEAK",
            purpose: "Weak imports must not be used.",
            groups: ALL,
            check: Check::Ast(imports_not_weak),
            fix: None,
        },
        Rule {
            id: "IMPORTS_NOT_PUBLIC",
            purpose: "Public imports must not be used.",
            groups: UBER,
            check: Check::Ast(imports_not_public),
            fix: None,
        },
        Rule {
            id: "MESSAGE_NAMES_CAPITALIZED",
            purpose: "Message names must begin with a capital letter.",
            groups: ALL,
            check: Check::Ast(message_names_capitalized),
            fix: None,
        },
        Rule {
            id: "MESSAGE_NAMES_CAMEL_CASE",
            purpose: "Message names must be CamelCase.",
            groups: ALL,
            check: Check::Ast(message_names_camel_case),
            fix: None,
        },
        Rule {
            id: "FIELD_NAMES_LOWER_SNAKE_CASE",
            purpose: "Field names must be lower_snake_case.",
            groups: ALL,
            check: Check::Ast(field_names_lower_snake_case),
            fix: None,
        },
        Rule {
            id: "ONEOF_NAMES_LOWER_SNAKE_CASE",
            purpose: "Oneof names must be lower_snake_case.",
            groups: ALL,
            check: Check::Ast(oneof_names_lower_snake_case),
            fix: None,
        },
        Rule {
            id: "ENUM_NAMES_CAPITALIZED",
            purpose: "Enum names must begin with a capital letter.",
            groups: ALL,
            check: Check::Ast(enum_names_capitalized),
            fix: None,
        },
        Rule {
            id: "ENUM_NAMES_CAMEL_CASE",
            purpose: "Enum names must be CamelCase.",
            groups: ALL,
            check: Check::Ast(enum_names_camel_case),
            fix: None,
        },
        Rule {
            id: "ENUM_VALUE_NAMES_UPPER_SNAKE_CASE",
            purpose: "Enum value names must be UPPER_SNAKE_CASE.",
            groups: ALL,
            check: Check::Ast(enum_value_names_upper_snake_case),
            fix: None,
        },
        Rule {
            id: "ENUM_ZERO_VALUES_INVALID",
            purpose: "Enum zero values must end in _INVALID.",
            groups: UBER,
            check: Check::Ast(enum_zero_values_invalid),
            fix: None,
        },
        Rule {
            id: "ENUM_FIELD_PREFIXES",
            purpose: "Enum value names must be prefixed with the enum name.",
            groups: UBER2,
            check: Check::Ast(enum_field_prefixes),
            fix: None,
        },
        Rule {
            id: "SERVICE_NAMES_CAPITALIZED",
            purpose: "Service names must begin with a capital letter.",
            groups: ALL,
            check: Check::Ast(service_names_capitalized),
            fix: None,
        },
        Rule {
            id: "SERVICE_NAMES_CAMEL_CASE",
            purpose: "Service names must be CamelCase.",
            groups: ALL,
            check: Check::Ast(service_names_camel_case),
            fix: None,
        },
        Rule {
            id: "SERVICE_NAMES_END_IN_SERVICE",
            purpose: "Service names must end in Service.",
            groups: UBER2,
            check: Check::Ast(service_names_end_in_service),
            fix: None,
        },
        Rule {
            id: "RPC_NAMES_CAMEL_CASE",
            purpose: "RPC names must be CamelCase.",
            groups: ALL,
            check: Check::Ast(rpc_names_camel_case),
            fix: None,
        },
        Rule {
            id: "REQUEST_RESPONSE_NAMES_MATCH_RPC",
            purpose: "RPC request and response types must be named after the RPC.",
            groups: UBER2,
            check: Check::Ast(request_response_names_match_rpc),
            fix: None,
        },
        Rule {
            id: "COMMENTS_ON_TOP_LEVEL_ITEMS",
            purpose: "Top-level messages, enums, and services must have comments.",
            groups: UBER2,
            check: Check::Ast(comments_on_top_level_items),
            fix: None,
        },
        Rule {
            id: "FILE_HEADER",
            purpose: "Files must begin with the configured file header.",
            groups: &[],
            check: Check::Ast(file_header),
            fix: Some(file_header_fix),
        },
    ]
}

// -- helpers ----------------------------------------------------------------

fn failure(ast: &Ast, node: NodeIndex, message: String) -> Failure {
    let location = ast.location(node);
    Failure::new(&ast.path, location.line, location.column, message)
}

fn is_capitalized(name: &str) -> bool {
    name.chars().next().is_some_and(|ch| ch.is_ascii_uppercase())
}

fn is_upper_camel(name: &str) -> bool {
    !name.contains('_') && name.to_upper_camel_case() == name
}

fn is_lower_snake(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
        && name.to_snake_case() == name
}

fn is_upper_snake(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_')
}

fn each_node<'a>(
    ast: &'a Ast,
    mut visit: impl FnMut(NodeIndex, &'a NodeKind),
) {
    for (index, node) in ast.nodes.iter().enumerate() {
        visit(index, &node.kind);
    }
}

// -- package rules ----------------------------------------------------------

fn package_is_declared(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    if ast.package().is_none() {
        failures.push(Failure::new(&ast.path, 1, 1, "file does not declare a package"));
    }
}

fn package_lower_snake_case(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Package { name } = kind {
            if !name.split('.').all(is_lower_snake) {
                failures.push(failure(
                    ast,
                    index,
                    format!("package name {name:?} must be lower_snake_case"),
                ));
            }
        }
    });
}

fn package_has_version_suffix(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Package { name } = kind {
            let last = name.rsplit('.').next().unwrap_or_default();
            if !is_version_segment(last) {
                failures.push(failure(
                    ast,
                    index,
                    format!("package name {name:?} must end in a version such as .v1 or .v1beta1"),
                ));
            }
        }
    });
}

/// `vN` or `vNbetaM`.
fn is_version_segment(segment: &str) -> bool {
    let Some(rest) = segment.strip_prefix('v') else {
        return false;
    };
    match rest.split_once("beta") {
        Some((major, beta)) => {
            !major.is_empty()
                && major.bytes().all(|b| b.is_ascii_digit())
                && !beta.is_empty()
                && beta.bytes().all(|b| b.is_ascii_digit())
        }
        None => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
    }
}

fn packages_same_in_dir(
    descriptors: &FileDescriptorSet,
    targets: &BTreeSet<String>,
    failures: &mut Vec<Failure>,
) {
    let mut by_dir: BTreeMap<&str, BTreeMap<&str, Vec<&str>>> = BTreeMap::new();
    for file in &descriptors.file {
        let name = file.name();
        if !targets.contains(name) {
            continue;
        }
        let dir = name.rsplit_once('/').map_or("", |(dir, _)| dir);
        by_dir
            .entry(dir)
            .or_default()
            .entry(file.package())
            .or_default()
            .push(name);
    }
    for packages in by_dir.values() {
        if packages.len() <= 1 {
            continue;
        }
        let all: Vec<&str> = packages.keys().copied().collect();
        for files in packages.values() {
            for file in files {
                failures.push(Failure::new(
                    *file,
                    1,
                    1,
                    format!("directory contains multiple packages: {}", all.join(", ")),
                ));
            }
        }
    }
}

// -- file-level rules -------------------------------------------------------

fn syntax_proto3(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    if ast.syntax() == "proto3" {
        return;
    }
    let location = ast
        .nodes
        .iter()
        .enumerate()
        .find(|(_, node)| matches!(node.kind, NodeKind::Syntax { .. }))
        .map(|(index, _)| ast.location(index));
    let (line, column) = location.map_or((1, 1), |loc| (loc.line, loc.column));
    failures.push(Failure::new(&ast.path, line, column, "files must use proto3 syntax"));
}

/// Whether the file sets the named file-scope option.
fn has_file_option(ast: &Ast, option_name: &str) -> bool {
    ast.children(0).any(|index| {
        matches!(&ast.node(index).kind, NodeKind::Option { name, .. } if name == option_name)
    })
}

fn java_package_is_declared(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    if !has_file_option(ast, "java_package") {
        failures.push(Failure::new(
            &ast.path,
            1,
            1,
            "file does not set the java_package option",
        ));
    }
}

fn java_outer_classname_is_declared(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    if !has_file_option(ast, "java_outer_classname") {
        failures.push(Failure::new(
            &ast.path,
            1,
            1,
            "file does not set the java_outer_classname option",
        ));
    }
}

fn imports_not_weak(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Import { path, modifier } = kind {
            if modifier.as_deref() == Some("weak") {
                failures.push(failure(ast, index, format!("import {path:?} must not be weak")));
            }
        }
    });
}

fn imports_not_public(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Import { path, modifier } = kind {
            if modifier.as_deref() == Some("public") {
                failures.push(failure(ast, index, format!("import {path:?} must not be public")));
            }
        }
    });
}

// -- message rules ----------------------------------------------------------

fn message_names_capitalized(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Message { name } = kind {
            if !is_capitalized(name) {
                failures.push(failure(
                    ast,
                    index,
                    format!("message name {name:?} must begin with a capital letter"),
                ));
            }
        }
    });
}

fn message_names_camel_case(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Message { name } = kind {
            if !is_upper_camel(name) {
                failures.push(failure(
                    ast,
                    index,
                    format!("message name {name:?} must be CamelCase"),
                ));
            }
        }
    });
}

fn field_names_lower_snake_case(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        let name = match kind {
            NodeKind::Field { name, .. } | NodeKind::MapField { name, .. } => name,
            _ => return,
        };
        if !is_lower_snake(name) {
            failures.push(failure(
                ast,
                index,
                format!("field name {name:?} must be lower_snake_case"),
            ));
        }
    });
}

fn oneof_names_lower_snake_case(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Oneof { name } = kind {
            if !is_lower_snake(name) {
                failures.push(failure(
                    ast,
                    index,
                    format!("oneof name {name:?} must be lower_snake_case"),
                ));
            }
        }
    });
}

// -- enum rules -------------------------------------------------------------

fn enum_names_capitalized(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Enum { name } = kind {
            if !is_capitalized(name) {
                failures.push(failure(
                    ast,
                    index,
                    format!("enum name {name:?} must begin with a capital letter"),
                ));
            }
        }
    });
}

fn enum_names_camel_case(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Enum { name } = kind {
            if !is_upper_camel(name) {
                failures.push(failure(ast, index, format!("enum name {name:?} must be CamelCase")));
            }
        }
    });
}

fn enum_value_names_upper_snake_case(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::EnumValue { name, .. } = kind {
            if !is_upper_snake(name) {
                failures.push(failure(
                    ast,
                    index,
                    format!("enum value name {name:?} must be UPPER_SNAKE_CASE"),
                ));
            }
        }
    });
}

fn enum_zero_values_invalid(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::EnumValue { name, number, .. } = kind {
            if *number == 0 && !name.ends_with("_INVALID") {
                failures.push(failure(
                    ast,
                    index,
                    format!("enum zero value {name:?} must end in _INVALID"),
                ));
            }
        }
    });
}

fn enum_field_prefixes(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    for (index, node) in ast.nodes.iter().enumerate() {
        let NodeKind::EnumValue { name, .. } = &node.kind else {
            continue;
        };
        let Some(parent) = node.parent else { continue };
        let NodeKind::Enum { name: enum_name } = &ast.node(parent).kind else {
            continue;
        };
        let prefix = format!("{}_", enum_name.to_shouty_snake_case());
        if !name.starts_with(&prefix) {
            failures.push(failure(
                ast,
                index,
                format!("enum value name {name:?} must be prefixed with {prefix:?}"),
            ));
        }
    }
}

// -- service rules ----------------------------------------------------------

fn service_names_capitalized(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Service { name } = kind {
            if !is_capitalized(name) {
                failures.push(failure(
                    ast,
                    index,
                    format!("service name {name:?} must begin with a capital letter"),
                ));
            }
        }
    });
}

fn service_names_camel_case(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Service { name } = kind {
            if !is_upper_camel(name) {
                failures.push(failure(
                    ast,
                    index,
                    format!("service name {name:?} must be CamelCase"),
                ));
            }
        }
    });
}

fn service_names_end_in_service(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Service { name } = kind {
            if !name.ends_with("Service") {
                failures.push(failure(
                    ast,
                    index,
                    format!("service name {name:?} must end in Service"),
                ));
            }
        }
    });
}

fn rpc_names_camel_case(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Rpc { name, .. } = kind {
            if !is_upper_camel(name) {
                failures.push(failure(ast, index, format!("rpc name {name:?} must be CamelCase")));
            }
        }
    });
}

fn request_response_names_match_rpc(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    each_node(ast, |index, kind| {
        if let NodeKind::Rpc {
            name,
            request_type,
            response_type,
            ..
        } = kind
        {
            let request = request_type.rsplit('.').next().unwrap_or_default();
            let response = response_type.rsplit('.').next().unwrap_or_default();
            if request != format!("{name}Request") {
                failures.push(failure(
                    ast,
                    index,
                    format!("rpc {name:?} request type must be named {name}Request, got {request}"),
                ));
            }
            if response != format!("{name}Response") {
                failures.push(failure(
                    ast,
                    index,
                    format!(
                        "rpc {name:?} response type must be named {name}Response, got {response}"
                    ),
                ));
            }
        }
    });
}

// -- comment rules ----------------------------------------------------------

fn comments_on_top_level_items(ast: &Ast, _: &LintSettings, failures: &mut Vec<Failure>) {
    for (index, node) in ast.nodes.iter().enumerate() {
        if node.parent != Some(0) {
            continue;
        }
        let what = match &node.kind {
            NodeKind::Message { .. } => "message",
            NodeKind::Enum { .. } => "enum",
            NodeKind::Service { .. } => "service",
            _ => continue,
        };
        if !ast.has_comment(index) {
            let name = node.kind.name().unwrap_or_default();
            failures.push(failure(ast, index, format!("{what} {name:?} must have a comment")));
        }
    }
}

// -- file header ------------------------------------------------------------

/// Renders a configured header the way it must appear in files: raw when the
/// header content is already commented, otherwise `// `-prefixed per line.
pub fn render_header(content: &str, is_commented: bool) -> String {
    let mut rendered = String::new();
    if is_commented {
        rendered.push_str(content);
    } else {
        for line in content.lines() {
            if line.is_empty() {
                rendered.push_str("//\n");
            } else {
                rendered.push_str("// ");
                rendered.push_str(line);
                rendered.push('\n');
            }
        }
    }
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    rendered
}

/// Byte offset of the syntax declaration, or 0 when the file has none.
fn header_span_end(ast: &Ast) -> usize {
    ast.nodes
        .iter()
        .find(|node| matches!(node.kind, NodeKind::Syntax { .. }))
        .map(|node| ast.tokens[node.start_token].location.offset)
        .unwrap_or(0)
}

fn expected_prefix(settings: &LintSettings) -> Option<String> {
    let header = settings.file_header.as_ref()?;
    Some(render_header(&header.content, header.is_commented))
}

fn file_header(ast: &Ast, settings: &LintSettings, failures: &mut Vec<Failure>) {
    let Some(expected) = expected_prefix(settings) else {
        return;
    };
    let end = header_span_end(ast);
    let actual: String = ast.tokens[..]
        .iter()
        .take_while(|token| token.location.offset < end)
        .map(|token| token.text.as_str())
        .collect();
    if actual.trim_end() != expected.trim_end() {
        failures.push(Failure::new(
            &ast.path,
            1,
            1,
            "file does not begin with the configured file header",
        ));
    }
}

fn file_header_fix(ast: &Ast, settings: &LintSettings) -> Vec<Edit> {
    let Some(expected) = expected_prefix(settings) else {
        return Vec::new();
    };
    let end = header_span_end(ast);
    let replacement = format!("{expected}\n");
    let current: String = ast
        .tokens
        .iter()
        .take_while(|token| token.location.offset < end)
        .map(|token| token.text.as_str())
        .collect();
    if current == replacement {
        return Vec::new();
    }
    vec![Edit {
        start: 0,
        end,
        replacement,
        rule_id: "FILE_HEADER",
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prototool_parse::parse_source;
    use std::path::PathBuf;

    fn lint_with_group(src: &str, group: &str) -> Vec<Failure> {
        let ast = parse_source("test.proto", src).unwrap();
        let settings = LintSettings {
            group: Some(group.to_string()),
            ..LintSettings::default()
        };
        super::super::lint_file(&ast, &settings, None, &BTreeSet::new()).unwrap()
    }

    fn ids(failures: &[Failure]) -> Vec<&str> {
        failures
            .iter()
            .filter_map(|failure| failure.rule_id.as_deref())
            .collect()
    }

    #[test]
    fn clean_file_passes_uber1() {
        let src = r#"syntax = "proto3";

package foo.v1;

option java_outer_classname = "RecordProto";
option java_package = "com.foo.v1";

message UserRecord {
  string user_id = 1;
}

enum RecordKind {
  RECORD_KIND_INVALID = 0;
  RECORD_KIND_USER = 1;
}
"#;
        let failures = lint_with_group(src, "uber1");
        assert!(failures.is_empty(), "unexpected failures: {failures:?}");
    }

    #[test]
    fn google_requires_java_file_options() {
        let src = "syntax = \"proto3\";\npackage foo.v1;\n";
        let failures = lint_with_group(src, "google");
        let ids1 = ids(&failures);
        assert!(ids1.contains(&"JAVA_PACKAGE_IS_DECLARED"));
        assert!(ids1.contains(&"JAVA_OUTER_CLASSNAME_IS_DECLARED"));

        let src = r#"syntax = "proto3";

package foo.v1;

option java_outer_classname = "FooProto";
option java_package = "com.foo.v1";
"#;
        let failures = lint_with_group(src, "google");
        let ids2 = ids(&failures);
        assert!(!ids2.contains(&"JAVA_PACKAGE_IS_DECLARED"));
        assert!(!ids2.contains(&"JAVA_OUTER_CLASSNAME_IS_DECLARED"));
    }

    #[test]
    fn version_suffix_required_by_uber2_only() {
        let src = "syntax = \"proto3\";\npackage foo.bar;\n";
        assert!(!ids(&lint_with_group(src, "uber1")).contains(&"PACKAGE_HAS_VERSION_SUFFIX"));
        assert!(ids(&lint_with_group(src, "uber2")).contains(&"PACKAGE_HAS_VERSION_SUFFIX"));
    }

    #[test]
    fn version_segments() {
        assert!(is_version_segment("v1"));
        assert!(is_version_segment("v2"));
        assert!(is_version_segment("v1beta1"));
        assert!(!is_version_segment("v"));
        assert!(!is_version_segment("v1beta"));
        assert!(!is_version_segment("beta1"));
    }

    #[test]
    fn proto2_fails_syntax_rule() {
        let src = "syntax = \"proto2\";\npackage foo.v1;\n";
        let failures = lint_with_group(src, "uber1");
        assert!(ids(&failures).contains(&"SYNTAX_PROTO3"));
    }

    #[test]
    fn bad_field_and_enum_value_names() {
        let src = r#"syntax = "proto3";
package foo.v1;

message UserRecord {
  string UserId = 1;
}

enum RecordKind {
  record_kind_invalid = 0;
}
"#;
        let failures = lint_with_group(src, "uber1");
        let ids = ids(&failures);
        assert!(ids.contains(&"FIELD_NAMES_LOWER_SNAKE_CASE"));
        assert!(ids.contains(&"ENUM_VALUE_NAMES_UPPER_SNAKE_CASE"));
    }

    #[test]
    fn zero_value_must_be_invalid_suffix() {
        let src = "syntax = \"proto3\";\npackage foo.v1;\nenum Kind {\n  KIND_UNSET = 0;\n}\n";
        let failures = lint_with_group(src, "uber1");
        let failure = failures
            .iter()
            .find(|failure| failure.rule_id.as_deref() == Some("ENUM_ZERO_VALUES_INVALID"))
            .unwrap();
        assert_eq!(failure.line, 4);
    }

    #[test]
    fn uber2_requires_comments_and_service_suffix() {
        let src = r#"syntax = "proto3";

package foo.v1;

service Echo {
  rpc Echo(EchoRequest) returns (EchoResponse);
}

message EchoRequest {
  string value = 1;
}

message EchoResponse {
  string value = 1;
}
"#;
        let failures = lint_with_group(src, "uber2");
        let ids = ids(&failures);
        assert!(ids.contains(&"SERVICE_NAMES_END_IN_SERVICE"));
        assert!(ids.contains(&"COMMENTS_ON_TOP_LEVEL_ITEMS"));
    }

    #[test]
    fn request_response_naming() {
        let src = r#"syntax = "proto3";
package foo.v1;
service FooService {
  rpc Get(Item) returns (GetResponse);
}
message Item { string id = 1; }
message GetResponse { string id = 1; }
"#;
        let failures = lint_with_group(src, "uber2");
        let matching: Vec<&Failure> = failures
            .iter()
            .filter(|failure| {
                failure.rule_id.as_deref() == Some("REQUEST_RESPONSE_NAMES_MATCH_RPC")
            })
            .collect();
        assert_eq!(matching.len(), 1);
        assert!(matching[0].message.contains("GetRequest"));
    }

    #[test]
    fn packages_same_in_dir_flags_mixed_dirs() {
        use prost_types::FileDescriptorProto;
        let descriptors = FileDescriptorSet {
            file: vec![
                FileDescriptorProto {
                    name: Some("idl/a.proto".into()),
                    package: Some("foo.v1".into()),
                    ..Default::default()
                },
                FileDescriptorProto {
                    name: Some("idl/b.proto".into()),
                    package: Some("bar.v1".into()),
                    ..Default::default()
                },
            ],
        };
        let targets: BTreeSet<String> =
            ["idl/a.proto", "idl/b.proto"].iter().map(|s| s.to_string()).collect();
        let mut failures = Vec::new();
        packages_same_in_dir(&descriptors, &targets, &mut failures);
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn file_header_check_and_fix() {
        let settings = LintSettings {
            file_header: Some(prototool_config::FileHeader {
                path: PathBuf::from("/work/header.txt"),
                is_commented: false,
                content: "Copyright 2020 Example Co.".to_string(),
            }),
            no_default: true,
            add: vec!["FILE_HEADER".to_string()],
            ..LintSettings::default()
        };

        let src = "syntax = \"proto3\";\npackage foo.v1;\n";
        let ast = parse_source("test.proto", src).unwrap();
        let failures =
            super::super::lint_file(&ast, &settings, None, &BTreeSet::new()).unwrap();
        assert_eq!(ids(&failures), vec!["FILE_HEADER"]);

        let (fixed, conflicts) = super::super::apply_fixes(&ast, &settings, src).unwrap();
        assert!(conflicts.is_empty());
        assert!(fixed.starts_with("// Copyright 2020 Example Co.\n\nsyntax = \"proto3\";"));

        // A fixed file passes and fixing again changes nothing.
        let ast = parse_source("test.proto", &fixed).unwrap();
        let failures =
            super::super::lint_file(&ast, &settings, None, &BTreeSet::new()).unwrap();
        assert!(failures.is_empty());
        let (fixed_again, _) = super::super::apply_fixes(&ast, &settings, &fixed).unwrap();
        assert_eq!(fixed_again, fixed);
    }

    #[test]
    fn overlapping_edits_conflict() {
        let edits = vec![
            Edit {
                start: 0,
                end: 10,
                replacement: "first".to_string(),
                rule_id: "A",
            },
            Edit {
                start: 5,
                end: 15,
                replacement: "second".to_string(),
                rule_id: "B",
            },
        ];
        let (fixed, failures) =
            super::super::apply_edits("test.proto", "0123456789abcdefgh", edits);
        assert_eq!(fixed, "firstabcdefgh");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].rule_id.as_deref(), Some("FIX_CONFLICT"));
    }
}
