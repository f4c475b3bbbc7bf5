//! Backwards-compatibility checking between two compiled descriptor sets:
//! `from` is the baseline (typically a git ref), `to` is the current
//! worktree. Each violated rule becomes a failure anchored at the most
//! relevant source location.

use std::collections::BTreeMap;

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MethodDescriptorProto, ServiceDescriptorProto,
};

use prototool_config::{Failure, Severity};

#[derive(Clone, Copy, Debug, Default)]
pub struct BreakOptions {
    /// Also flag removals of beta-package files and their contents.
    pub include_beta: bool,
    /// Permit stable packages to import beta packages.
    pub allow_beta_deps: bool,
}

/// A package is beta when its final segment is a `vNbetaM` version or when
/// any dot-separated segment is the literal `beta`. Both heuristics apply;
/// either one marks the package.
pub fn is_beta_package(package: &str) -> bool {
    let mut segments = package.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segment == "beta" {
            return true;
        }
        if segments.peek().is_none() && is_beta_version(segment) {
            return true;
        }
    }
    false
}

fn is_beta_version(segment: &str) -> bool {
    let Some(rest) = segment.strip_prefix('v') else {
        return false;
    };
    let Some((major, beta)) = rest.split_once("beta") else {
        return false;
    };
    !major.is_empty()
        && major.bytes().all(|b| b.is_ascii_digit())
        && !beta.is_empty()
        && beta.bytes().all(|b| b.is_ascii_digit())
}

/// Compares two descriptor sets and returns the sorted incompatibilities.
/// Equal inputs produce no failures.
pub fn check(
    from: &FileDescriptorSet,
    to: &FileDescriptorSet,
    options: &BreakOptions,
) -> Vec<Failure> {
    let from_index = Index::build(from);
    let to_index = Index::build(to);
    let mut failures = Vec::new();

    check_files(&from_index, &to_index, options, &mut failures);
    check_messages(&from_index, &to_index, &mut failures);
    check_enums(&from_index, &to_index, &mut failures);
    check_services(&from_index, &to_index, &mut failures);
    check_beta_deps(&to_index, options, &mut failures);

    Failure::sort(&mut failures);
    failures
}

// -- descriptor indexing ----------------------------------------------------

struct Entry<'a, T> {
    descriptor: T,
    file: &'a FileDescriptorProto,
    /// Path into the file's `source_code_info`.
    path: Vec<i32>,
}

struct Index<'a> {
    files: BTreeMap<&'a str, &'a FileDescriptorProto>,
    messages: BTreeMap<String, Entry<'a, &'a DescriptorProto>>,
    enums: BTreeMap<String, Entry<'a, &'a EnumDescriptorProto>>,
    services: BTreeMap<String, Entry<'a, &'a ServiceDescriptorProto>>,
}

impl<'a> Index<'a> {
    fn build(set: &'a FileDescriptorSet) -> Index<'a> {
        let mut index = Index {
            files: BTreeMap::new(),
            messages: BTreeMap::new(),
            enums: BTreeMap::new(),
            services: BTreeMap::new(),
        };
        for file in &set.file {
            index.files.insert(file.name(), file);
            let prefix = if file.package().is_empty() {
                String::new()
            } else {
                format!("{}.", file.package())
            };
            for (position, message) in file.message_type.iter().enumerate() {
                index.add_message(
                    file,
                    message,
                    format!("{prefix}{}", message.name()),
                    vec![4, position as i32],
                );
            }
            for (position, enum_type) in file.enum_type.iter().enumerate() {
                index.enums.insert(
                    format!("{prefix}{}", enum_type.name()),
                    Entry {
                        descriptor: enum_type,
                        file,
                        path: vec![5, position as i32],
                    },
                );
            }
            for (position, service) in file.service.iter().enumerate() {
                index.services.insert(
                    format!("{prefix}{}", service.name()),
                    Entry {
                        descriptor: service,
                        file,
                        path: vec![6, position as i32],
                    },
                );
            }
        }
        index
    }

    fn add_message(
        &mut self,
        file: &'a FileDescriptorProto,
        message: &'a DescriptorProto,
        fq_name: String,
        path: Vec<i32>,
    ) {
        for (position, nested) in message.nested_type.iter().enumerate() {
            let mut nested_path = path.clone();
            nested_path.extend([3, position as i32]);
            self.add_message(
                file,
                nested,
                format!("{fq_name}.{}", nested.name()),
                nested_path,
            );
        }
        for (position, enum_type) in message.enum_type.iter().enumerate() {
            let mut enum_path = path.clone();
            enum_path.extend([4, position as i32]);
            self.enums.insert(
                format!("{fq_name}.{}", enum_type.name()),
                Entry {
                    descriptor: enum_type,
                    file,
                    path: enum_path,
                },
            );
        }
        self.messages.insert(
            fq_name,
            Entry {
                descriptor: message,
                file,
                path,
            },
        );
    }
}

/// Span lookup in a file's `source_code_info`, 1-based.
fn location(file: &FileDescriptorProto, path: &[i32]) -> (u32, u32) {
    if let Some(info) = &file.source_code_info {
        for candidate in &info.location {
            if candidate.path == path && candidate.span.len() >= 2 {
                return (
                    candidate.span[0] as u32 + 1,
                    candidate.span[1] as u32 + 1,
                );
            }
        }
    }
    (1, 1)
}

fn breaking<T>(entry: &Entry<'_, T>, rule: &'static str, message: String) -> Failure {
    let (line, column) = location(entry.file, &entry.path);
    Failure::new(entry.file.name(), line, column, message).with_rule(rule)
}

// -- file rules -------------------------------------------------------------

fn check_files(
    from: &Index<'_>,
    to: &Index<'_>,
    options: &BreakOptions,
    failures: &mut Vec<Failure>,
) {
    for (name, file) in &from.files {
        if to.files.contains_key(name) {
            continue;
        }
        if is_beta_package(file.package()) && !options.include_beta {
            continue;
        }
        failures.push(
            Failure::new(*name, 1, 1, format!("file {name} was removed")).with_rule("FILE_REMOVED"),
        );
    }
}

fn check_beta_deps(to: &Index<'_>, options: &BreakOptions, failures: &mut Vec<Failure>) {
    if options.allow_beta_deps {
        return;
    }
    for (name, file) in &to.files {
        if is_beta_package(file.package()) {
            continue;
        }
        for dependency in &file.dependency {
            let Some(imported) = to.files.get(dependency.as_str()) else {
                continue;
            };
            if is_beta_package(imported.package()) {
                failures.push(
                    Failure::new(
                        *name,
                        1,
                        1,
                        format!(
                            "stable file {name} imports beta file {dependency}; pass \
                             --allow-beta-deps to permit this"
                        ),
                    )
                    .with_rule("FILE_NO_BETA_DEPS"),
                );
            }
        }
    }
}

// -- message rules ----------------------------------------------------------

fn check_messages(from: &Index<'_>, to: &Index<'_>, failures: &mut Vec<Failure>) {
    for (fq_name, from_entry) in &from.messages {
        // A removed file already reports; its contents would only cascade.
        if !to.files.contains_key(from_entry.file.name()) {
            continue;
        }
        let Some(to_entry) = to.messages.get(fq_name) else {
            failures.push(breaking(
                from_entry,
                "MESSAGE_REMOVED",
                format!("message {fq_name} was removed"),
            ));
            continue;
        };
        check_fields(fq_name, from_entry, to_entry, failures);
    }
}

fn check_fields(
    fq_name: &str,
    from_entry: &Entry<'_, &DescriptorProto>,
    to_entry: &Entry<'_, &DescriptorProto>,
    failures: &mut Vec<Failure>,
) {
    let to_fields: BTreeMap<i32, _> = to_entry
        .descriptor
        .field
        .iter()
        .map(|field| (field.number(), field))
        .collect();
    let from_numbers: Vec<i32> = from_entry
        .descriptor
        .field
        .iter()
        .map(|field| field.number())
        .collect();

    for (position, from_field) in from_entry.descriptor.field.iter().enumerate() {
        let mut field_path = from_entry.path.clone();
        field_path.extend([2, position as i32]);
        let number = from_field.number();

        let Some(to_field) = to_fields.get(&number) else {
            if !is_reserved(to_entry.descriptor, number) {
                let (line, column) = location(from_entry.file, &field_path);
                failures.push(
                    Failure::new(
                        from_entry.file.name(),
                        line,
                        column,
                        format!(
                            "field {} ({}) of message {fq_name} was removed without being reserved",
                            from_field.name(),
                            number
                        ),
                    )
                    .with_rule("FIELD_REMOVED"),
                );
            }
            continue;
        };

        let to_position = to_entry
            .descriptor
            .field
            .iter()
            .position(|field| field.number() == number)
            .unwrap_or(position);
        let mut to_field_path = to_entry.path.clone();
        to_field_path.extend([2, to_position as i32]);
        let (line, column) = location(to_entry.file, &to_field_path);
        let site = to_entry.file.name();

        if !same_type(from_field.r#type(), to_field.r#type())
            || (from_field.r#type() == Type::Message
                && from_field.type_name() != to_field.type_name())
            || (from_field.r#type() == Type::Enum
                && from_field.type_name() != to_field.type_name())
        {
            failures.push(
                Failure::new(
                    site,
                    line,
                    column,
                    format!(
                        "field {} ({}) of message {fq_name} changed type from {} to {}",
                        to_field.name(),
                        number,
                        type_label(from_field),
                        type_label(to_field),
                    ),
                )
                .with_rule("FIELD_SAME_TYPE"),
            );
        }

        if from_field.label() != to_field.label()
            && (from_field.label() == Label::Repeated || to_field.label() == Label::Repeated)
        {
            failures.push(
                Failure::new(
                    site,
                    line,
                    column,
                    format!(
                        "field {} ({}) of message {fq_name} changed label from {:?} to {:?}",
                        to_field.name(),
                        number,
                        from_field.label(),
                        to_field.label(),
                    ),
                )
                .with_rule("FIELD_SAME_LABEL"),
            );
        }

        if from_field.name() != to_field.name() {
            failures.push(
                Failure::new(
                    site,
                    line,
                    column,
                    format!(
                        "field {} ({}) of message {fq_name} was renamed to {}",
                        from_field.name(),
                        number,
                        to_field.name(),
                    ),
                )
                .with_rule("FIELD_SAME_NAME")
                .with_severity(Severity::Warning),
            );
        }
    }

    // proto2 required fields cannot be introduced after the fact.
    if to_entry.file.syntax() != "proto3" {
        for (position, to_field) in to_entry.descriptor.field.iter().enumerate() {
            if to_field.label() == Label::Required && !from_numbers.contains(&to_field.number()) {
                let mut to_field_path = to_entry.path.clone();
                to_field_path.extend([2, position as i32]);
                let (line, column) = location(to_entry.file, &to_field_path);
                failures.push(
                    Failure::new(
                        to_entry.file.name(),
                        line,
                        column,
                        format!(
                            "required field {} ({}) was added to message {fq_name}",
                            to_field.name(),
                            to_field.number(),
                        ),
                    )
                    .with_rule("FIELD_ADDED_REQUIRED"),
                );
            }
        }
    }
}

fn is_reserved(message: &DescriptorProto, number: i32) -> bool {
    message.reserved_range.iter().any(|range| {
        number >= range.start.unwrap_or(0) && number < range.end.unwrap_or(0)
    })
}

/// Wire-compatible scalar changes: varint integers interconvert, as do the
/// two zigzag types and each fixed-width pair. Everything else must match.
fn same_type(from: Type, to: Type) -> bool {
    if from == to {
        return true;
    }
    const VARINT: &[Type] = &[
        Type::Int32,
        Type::Int64,
        Type::Uint32,
        Type::Uint64,
        Type::Bool,
    ];
    const ZIGZAG: &[Type] = &[Type::Sint32, Type::Sint64];
    const FIXED32: &[Type] = &[Type::Fixed32, Type::Sfixed32];
    const FIXED64: &[Type] = &[Type::Fixed64, Type::Sfixed64];
    for family in [VARINT, ZIGZAG, FIXED32, FIXED64] {
        if family.contains(&from) && family.contains(&to) {
            return true;
        }
    }
    false
}

fn type_label(field: &prost_types::FieldDescriptorProto) -> String {
    match field.r#type() {
        Type::Message | Type::Enum | Type::Group => field.type_name().to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}

// -- enum rules -------------------------------------------------------------

fn check_enums(from: &Index<'_>, to: &Index<'_>, failures: &mut Vec<Failure>) {
    for (fq_name, from_entry) in &from.enums {
        if !to.files.contains_key(from_entry.file.name()) {
            continue;
        }
        let Some(to_entry) = to.enums.get(fq_name) else {
            failures.push(breaking(
                from_entry,
                "ENUM_REMOVED",
                format!("enum {fq_name} was removed"),
            ));
            continue;
        };

        let to_by_name: BTreeMap<&str, i32> = to_entry
            .descriptor
            .value
            .iter()
            .map(|value| (value.name(), value.number()))
            .collect();

        for (position, from_value) in from_entry.descriptor.value.iter().enumerate() {
            let mut value_path = from_entry.path.clone();
            value_path.extend([2, position as i32]);
            match to_by_name.get(from_value.name()) {
                Some(&to_number) if to_number != from_value.number() => {
                    failures.push(
                        Failure::new(
                            to_entry.file.name(),
                            location(to_entry.file, &to_entry.path).0,
                            location(to_entry.file, &to_entry.path).1,
                            format!(
                                "enum value {} of {fq_name} changed number from {} to {}",
                                from_value.name(),
                                from_value.number(),
                                to_number,
                            ),
                        )
                        .with_rule("ENUM_VALUE_SAME_NUMBER"),
                    );
                }
                Some(_) => {}
                None => {
                    if !enum_number_reserved(to_entry.descriptor, from_value.number())
                        && !to_entry
                            .descriptor
                            .reserved_name
                            .iter()
                            .any(|name| name == from_value.name())
                    {
                        let (line, column) = location(from_entry.file, &value_path);
                        failures.push(
                            Failure::new(
                                from_entry.file.name(),
                                line,
                                column,
                                format!(
                                    "enum value {} ({}) of {fq_name} was removed without being \
                                     reserved",
                                    from_value.name(),
                                    from_value.number(),
                                ),
                            )
                            .with_rule("ENUM_VALUE_REMOVED"),
                        );
                    }
                }
            }
        }
    }
}

fn enum_number_reserved(enum_type: &EnumDescriptorProto, number: i32) -> bool {
    enum_type.reserved_range.iter().any(|range| {
        number >= range.start.unwrap_or(0) && number <= range.end.unwrap_or(0)
    })
}

// -- service rules ----------------------------------------------------------

fn check_services(from: &Index<'_>, to: &Index<'_>, failures: &mut Vec<Failure>) {
    for (fq_name, from_entry) in &from.services {
        if !to.files.contains_key(from_entry.file.name()) {
            continue;
        }
        let Some(to_entry) = to.services.get(fq_name) else {
            failures.push(breaking(
                from_entry,
                "SERVICE_REMOVED",
                format!("service {fq_name} was removed"),
            ));
            continue;
        };

        let to_methods: BTreeMap<&str, &MethodDescriptorProto> = to_entry
            .descriptor
            .method
            .iter()
            .map(|method| (method.name(), method))
            .collect();

        for (position, from_method) in from_entry.descriptor.method.iter().enumerate() {
            let mut method_path = from_entry.path.clone();
            method_path.extend([2, position as i32]);
            let Some(to_method) = to_methods.get(from_method.name()) else {
                let (line, column) = location(from_entry.file, &method_path);
                failures.push(
                    Failure::new(
                        from_entry.file.name(),
                        line,
                        column,
                        format!("rpc {} of service {fq_name} was removed", from_method.name()),
                    )
                    .with_rule("RPC_REMOVED"),
                );
                continue;
            };

            let to_position = to_entry
                .descriptor
                .method
                .iter()
                .position(|method| method.name() == from_method.name())
                .unwrap_or(position);
            let mut to_method_path = to_entry.path.clone();
            to_method_path.extend([2, to_position as i32]);
            let (line, column) = location(to_entry.file, &to_method_path);
            let site = to_entry.file.name();
            let rpc = from_method.name();

            if from_method.input_type() != to_method.input_type() {
                failures.push(
                    Failure::new(
                        site,
                        line,
                        column,
                        format!(
                            "rpc {rpc} of service {fq_name} changed request type from {} to {}",
                            from_method.input_type(),
                            to_method.input_type(),
                        ),
                    )
                    .with_rule("RPC_SAME_REQUEST_TYPE"),
                );
            }
            if from_method.output_type() != to_method.output_type() {
                failures.push(
                    Failure::new(
                        site,
                        line,
                        column,
                        format!(
                            "rpc {rpc} of service {fq_name} changed response type from {} to {}",
                            from_method.output_type(),
                            to_method.output_type(),
                        ),
                    )
                    .with_rule("RPC_SAME_RESPONSE_TYPE"),
                );
            }
            if from_method.client_streaming() != to_method.client_streaming() {
                failures.push(
                    Failure::new(
                        site,
                        line,
                        column,
                        format!(
                            "rpc {rpc} of service {fq_name} changed client streaming from {} to {}",
                            from_method.client_streaming(),
                            to_method.client_streaming(),
                        ),
                    )
                    .with_rule("RPC_SAME_CLIENT_STREAMING"),
                );
            }
            if from_method.server_streaming() != to_method.server_streaming() {
                failures.push(
                    Failure::new(
                        site,
                        line,
                        column,
                        format!(
                            "rpc {rpc} of service {fq_name} changed server streaming from {} to {}",
                            from_method.server_streaming(),
                            to_method.server_streaming(),
                        ),
                    )
                    .with_rule("RPC_SAME_SERVER_STREAMING"),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, FileDescriptorSet, MethodDescriptorProto, ServiceDescriptorProto,
    };

    fn field(name: &str, number: i32, field_type: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            r#type: Some(field_type as i32),
            label: Some(Label::Optional as i32),
            ..Default::default()
        }
    }

    fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
        DescriptorProto {
            name: Some(name.to_string()),
            field: fields,
            ..Default::default()
        }
    }

    fn file(name: &str, package: &str, messages: Vec<DescriptorProto>) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some(name.to_string()),
            package: Some(package.to_string()),
            message_type: messages,
            syntax: Some("proto3".to_string()),
            ..Default::default()
        }
    }

    fn set(files: Vec<FileDescriptorProto>) -> FileDescriptorSet {
        FileDescriptorSet { file: files }
    }

    fn ids(failures: &[Failure]) -> Vec<&str> {
        failures
            .iter()
            .filter_map(|failure| failure.rule_id.as_deref())
            .collect()
    }

    #[test]
    fn identical_sets_have_no_failures() {
        let descriptors = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![field("a", 1, Type::String)])],
        )]);
        assert!(check(&descriptors, &descriptors, &BreakOptions::default()).is_empty());
    }

    #[test]
    fn adding_optional_field_is_compatible() {
        let from = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![field("a", 1, Type::String)])],
        )]);
        let to = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message(
                "M",
                vec![field("a", 1, Type::String), field("b", 2, Type::Int32)],
            )],
        )]);
        assert!(check(&from, &to, &BreakOptions::default()).is_empty());
    }

    #[test]
    fn changed_field_type_is_breaking() {
        let from = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![field("a", 1, Type::String)])],
        )]);
        let to = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![field("a", 1, Type::Int32)])],
        )]);
        let failures = check(&from, &to, &BreakOptions::default());
        assert_eq!(ids(&failures), vec!["FIELD_SAME_TYPE"]);
        assert_eq!(failures[0].severity, Severity::Error);
    }

    #[test]
    fn varint_promotion_is_compatible() {
        let from = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![field("a", 1, Type::Int32)])],
        )]);
        let to = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![field("a", 1, Type::Int64)])],
        )]);
        assert!(check(&from, &to, &BreakOptions::default()).is_empty());
    }

    #[test]
    fn sint_to_int_is_breaking() {
        assert!(!same_type(Type::Sint32, Type::Int32));
        assert!(same_type(Type::Sint32, Type::Sint64));
        assert!(same_type(Type::Fixed64, Type::Sfixed64));
        assert!(!same_type(Type::Fixed32, Type::Fixed64));
    }

    #[test]
    fn removed_field_requires_reservation() {
        let from = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message(
                "M",
                vec![field("a", 1, Type::String), field("b", 2, Type::Int32)],
            )],
        )]);
        let mut stripped = message("M", vec![field("a", 1, Type::String)]);
        stripped
            .reserved_range
            .push(prost_types::descriptor_proto::ReservedRange {
                start: Some(2),
                end: Some(3),
            });
        let reserved_to = set(vec![file("foo.proto", "foo.v1", vec![stripped])]);
        assert!(check(&from, &reserved_to, &BreakOptions::default()).is_empty());

        let unreserved_to = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![field("a", 1, Type::String)])],
        )]);
        let failures = check(&from, &unreserved_to, &BreakOptions::default());
        assert_eq!(ids(&failures), vec!["FIELD_REMOVED"]);
    }

    #[test]
    fn renamed_field_is_reported_not_breaking() {
        let from = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![field("a", 1, Type::String)])],
        )]);
        let to = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![field("renamed", 1, Type::String)])],
        )]);
        let failures = check(&from, &to, &BreakOptions::default());
        assert_eq!(ids(&failures), vec!["FIELD_SAME_NAME"]);
        assert_eq!(failures[0].severity, Severity::Warning);
    }

    #[test]
    fn label_change_is_breaking() {
        let from = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![field("a", 1, Type::String)])],
        )]);
        let mut repeated = field("a", 1, Type::String);
        repeated.label = Some(Label::Repeated as i32);
        let to = set(vec![file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![repeated])],
        )]);
        let failures = check(&from, &to, &BreakOptions::default());
        assert_eq!(ids(&failures), vec!["FIELD_SAME_LABEL"]);
    }

    #[test]
    fn required_field_added_in_proto2_is_breaking() {
        let mut from_file = file(
            "foo.proto",
            "foo.v1",
            vec![message("M", vec![field("a", 1, Type::String)])],
        );
        from_file.syntax = Some("proto2".to_string());
        let mut required = field("b", 2, Type::String);
        required.label = Some(Label::Required as i32);
        let mut to_file = file(
            "foo.proto",
            "foo.v1",
            vec![message(
                "M",
                vec![field("a", 1, Type::String), required],
            )],
        );
        to_file.syntax = Some("proto2".to_string());
        let failures = check(&set(vec![from_file]), &set(vec![to_file]), &BreakOptions::default());
        assert_eq!(ids(&failures), vec!["FIELD_ADDED_REQUIRED"]);
    }

    #[test]
    fn removed_message_and_enum_are_breaking() {
        let from = set(vec![FileDescriptorProto {
            name: Some("foo.proto".to_string()),
            package: Some("foo.v1".to_string()),
            message_type: vec![message("M", vec![])],
            enum_type: vec![EnumDescriptorProto {
                name: Some("E".to_string()),
                value: vec![EnumValueDescriptorProto {
                    name: Some("E_INVALID".to_string()),
                    number: Some(0),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            syntax: Some("proto3".to_string()),
            ..Default::default()
        }]);
        let to = set(vec![file("foo.proto", "foo.v1", vec![])]);
        let failures = check(&from, &to, &BreakOptions::default());
        assert_eq!(ids(&failures), vec!["ENUM_REMOVED", "MESSAGE_REMOVED"]);
    }

    #[test]
    fn enum_value_number_change_is_breaking() {
        let enum_with = |number: i32| EnumDescriptorProto {
            name: Some("E".to_string()),
            value: vec![EnumValueDescriptorProto {
                name: Some("E_ONE".to_string()),
                number: Some(number),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut from_file = file("foo.proto", "foo.v1", vec![]);
        from_file.enum_type = vec![enum_with(1)];
        let mut to_file = file("foo.proto", "foo.v1", vec![]);
        to_file.enum_type = vec![enum_with(2)];
        let failures = check(&set(vec![from_file]), &set(vec![to_file]), &BreakOptions::default());
        assert_eq!(ids(&failures), vec!["ENUM_VALUE_SAME_NUMBER"]);
    }

    #[test]
    fn rpc_changes_are_breaking() {
        let service_with = |output: &str, server_streaming: bool| ServiceDescriptorProto {
            name: Some("S".to_string()),
            method: vec![MethodDescriptorProto {
                name: Some("Get".to_string()),
                input_type: Some(".foo.v1.Req".to_string()),
                output_type: Some(output.to_string()),
                server_streaming: Some(server_streaming),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut from_file = file("foo.proto", "foo.v1", vec![]);
        from_file.service = vec![service_with(".foo.v1.Resp", false)];
        let mut to_file = file("foo.proto", "foo.v1", vec![]);
        to_file.service = vec![service_with(".foo.v1.Other", true)];
        let failures = check(&set(vec![from_file]), &set(vec![to_file]), &BreakOptions::default());
        let ids = ids(&failures);
        assert!(ids.contains(&"RPC_SAME_RESPONSE_TYPE"));
        assert!(ids.contains(&"RPC_SAME_SERVER_STREAMING"));
    }

    #[test]
    fn beta_file_removal_is_exempt_unless_included() {
        let from = set(vec![file("beta.proto", "foo.v1beta1", vec![])]);
        let to = set(vec![]);
        assert!(check(&from, &to, &BreakOptions::default()).is_empty());
        let failures = check(
            &from,
            &to,
            &BreakOptions {
                include_beta: true,
                ..Default::default()
            },
        );
        assert_eq!(ids(&failures), vec!["FILE_REMOVED"]);
    }

    #[test]
    fn beta_detection_covers_both_heuristics() {
        assert!(is_beta_package("foo.v1beta1"));
        assert!(is_beta_package("foo.beta.bar"));
        assert!(!is_beta_package("foo.v1"));
        assert!(!is_beta_package("foo.betabar"));
        assert!(!is_beta_package("vbeta"));
    }

    #[test]
    fn stable_importing_beta_is_breaking() {
        let mut stable = file("stable.proto", "foo.v1", vec![]);
        stable.dependency = vec!["beta.proto".to_string()];
        let beta = file("beta.proto", "foo.v1beta1", vec![]);
        let to = set(vec![stable, beta]);
        let failures = check(&to.clone(), &to, &BreakOptions::default());
        assert_eq!(ids(&failures), vec!["FILE_NO_BETA_DEPS"]);

        let none = check(
            &to.clone(),
            &to,
            &BreakOptions {
                allow_beta_deps: true,
                ..Default::default()
            },
        );
        assert!(none.is_empty());
    }
}
