//! The embedded `config init` template. Process-wide constants, never
//! mutated; `--uncomment` selects the fully expanded variant.

/// Default template: every option present but commented out, so a fresh
/// config is valid and empty.
pub const CONFIG_TEMPLATE: &str = r#"# Paths to exclude when searching for .proto files, relative to this file.
#excludes:
#  - path/to/a
#  - path/to/b/file.proto

# Protoc directives.
#protoc:
#  # The protoc version to download and cache.
#  version: 3.11.4
#  # Additional include roots passed to protoc with -I.
#  includes:
#    - ../other/idl
#  # Do not fail on unused imports.
#  allow_unused_imports: false

# Package name directives for prototool create.
#create:
#  packages:
#    - directory: .
#      name: uber
#    - directory: idl/baz
#      name: special

# Lint directives.
#lint:
#  # The lint group to use: google, uber1, or uber2.
#  group: uber1
#  # Linters to skip for specific files.
#  ignores:
#    - id: ENUM_NAMES_CAPITALIZED
#      files:
#        - path/to/foo.proto
#  rules:
#    # Skip the default group entirely.
#    no_default: false
#    # Extra linters to run.
#    add:
#      - PACKAGE_HAS_VERSION_SUFFIX
#    # Linters to disable.
#    remove:
#      - SYNTAX_PROTO3
#  # Require every file to begin with this header.
#  file_header:
#    path: path/to/license_header.txt
#    is_commented: false

# Code generation directives.
#generate:
#  go_options:
#    import_path: github.com/example/repo/idl
#    extra_modifiers:
#      google/api/annotations.proto: google.golang.org/genproto/googleapis/api/annotations
#  plugins:
#    - name: go
#      type: go
#      flags: plugins=grpc
#      output: ../gen/go
#    - name: descriptor_set
#      output: ../gen/descriptor
#      file_suffix: fileset.bin
#      include_imports: true
"#;

/// `--uncomment` variant: the same template with everything active.
pub const CONFIG_TEMPLATE_UNCOMMENTED: &str = r#"excludes:
  - path/to/a
  - path/to/b/file.proto

protoc:
  version: 3.11.4
  includes:
    - ../other/idl
  allow_unused_imports: false

create:
  packages:
    - directory: .
      name: uber
    - directory: idl/baz
      name: special

lint:
  group: uber1
  ignores:
    - id: ENUM_NAMES_CAPITALIZED
      files:
        - path/to/foo.proto
  rules:
    no_default: false
    add:
      - PACKAGE_HAS_VERSION_SUFFIX
    remove:
      - SYNTAX_PROTO3
  file_header:
    path: path/to/license_header.txt
    is_commented: false

generate:
  go_options:
    import_path: github.com/example/repo/idl
    extra_modifiers:
      google/api/annotations.proto: google.golang.org/genproto/googleapis/api/annotations
  plugins:
    - name: go
      type: go
      flags: plugins=grpc
      output: ../gen/go
    - name: descriptor_set
      output: ../gen/descriptor
      file_suffix: fileset.bin
      include_imports: true
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commented_template_parses_as_empty_config() {
        let settings = prototool_config::Settings::from_yaml(
            CONFIG_TEMPLATE,
            std::path::Path::new("/work"),
        )
        .unwrap();
        assert!(settings.excludes.is_empty());
        assert!(settings.generate.plugins.is_empty());
    }
}
