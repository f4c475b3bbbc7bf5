use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Error;

pub const CONFIG_FILE_YAML: &str = "prototool.yaml";
pub const CONFIG_FILE_JSON: &str = "prototool.json";

/// The protoc version assumed when no configuration pins one.
pub const DEFAULT_PROTOC_VERSION: &str = "3.11.4";

/// The lint group in effect when no configuration selects one.
pub const DEFAULT_LINT_GROUP: &str = "uber1";

/// Raw configuration as it appears on disk. Unknown keys at any level are
/// rejected, which surfaces typos as `config-invalid` instead of silently
/// ignoring them.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalConfig {
    #[serde(default)]
    excludes: Vec<String>,
    #[serde(default)]
    protoc: ExternalProtoc,
    #[serde(default)]
    create: ExternalCreate,
    #[serde(default)]
    lint: ExternalLint,
    #[serde(default)]
    generate: ExternalGenerate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalProtoc {
    version: Option<String>,
    #[serde(default)]
    includes: Vec<String>,
    #[serde(default)]
    allow_unused_imports: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalCreate {
    #[serde(default)]
    packages: Vec<ExternalCreatePackage>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalCreatePackage {
    directory: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalLint {
    group: Option<String>,
    #[serde(default)]
    ignores: Vec<ExternalLintIgnore>,
    #[serde(default)]
    rules: ExternalLintRules,
    file_header: Option<ExternalFileHeader>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalLintIgnore {
    id: String,
    #[serde(default)]
    files: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalLintRules {
    #[serde(default)]
    no_default: bool,
    #[serde(default)]
    add: Vec<String>,
    #[serde(default)]
    remove: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalFileHeader {
    path: String,
    #[serde(default)]
    is_commented: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalGenerate {
    go_options: Option<ExternalGoOptions>,
    #[serde(default)]
    plugins: Vec<ExternalPlugin>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalGoOptions {
    import_path: Option<String>,
    #[serde(default)]
    extra_modifiers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalPlugin {
    name: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    flags: Option<String>,
    output: String,
    path: Option<String>,
    file_suffix: Option<String>,
    #[serde(default)]
    include_imports: bool,
    #[serde(default)]
    include_source_info: bool,
}

/// Validated configuration governing one directory subtree. Loaded once per
/// input path at the start of a command and immutable thereafter.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Absolute paths excluded from discovery, matched by prefix.
    pub excludes: Vec<PathBuf>,
    pub protoc: ProtocSettings,
    pub create: Vec<CreateRule>,
    pub lint: LintSettings,
    pub generate: GenerateSettings,
}

#[derive(Clone, Debug)]
pub struct ProtocSettings {
    pub version: String,
    /// Ordered include roots, absolute.
    pub includes: Vec<PathBuf>,
    pub allow_unused_imports: bool,
}

#[derive(Clone, Debug)]
pub struct CreateRule {
    /// Absolute directory the rule anchors to.
    pub directory: PathBuf,
    pub base_package: String,
}

#[derive(Clone, Debug, Default)]
pub struct LintSettings {
    pub group: Option<String>,
    /// rule id -> absolute file paths the rule is suppressed for.
    pub ignores: BTreeMap<String, Vec<PathBuf>>,
    pub no_default: bool,
    pub add: Vec<String>,
    pub remove: Vec<String>,
    pub file_header: Option<FileHeader>,
}

#[derive(Clone, Debug)]
pub struct FileHeader {
    pub path: PathBuf,
    pub is_commented: bool,
    /// Header file contents, loaded at config time.
    pub content: String,
}

#[derive(Clone, Debug, Default)]
pub struct GenerateSettings {
    pub go_options: GoOptions,
    pub plugins: Vec<Plugin>,
}

#[derive(Clone, Debug, Default)]
pub struct GoOptions {
    pub import_path: Option<String>,
    pub extra_modifiers: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PluginKind {
    Go,
    Gogo,
    #[default]
    None,
}

#[derive(Clone, Debug)]
pub struct Plugin {
    pub name: String,
    pub kind: PluginKind,
    pub flags: Option<String>,
    /// Output directory, relative to the config directory.
    pub output: PathBuf,
    /// Overrides the `protoc-gen-<name>` binary looked up on PATH.
    pub path_override: Option<PathBuf>,
    pub file_suffix: Option<String>,
    pub include_imports: bool,
    pub include_source_info: bool,
}

impl Plugin {
    /// The `descriptor_set` plugin is not a real protoc plugin; it maps to
    /// `--descriptor_set_out`.
    pub fn is_descriptor_set(&self) -> bool {
        self.name == "descriptor_set"
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            excludes: Vec::new(),
            protoc: ProtocSettings {
                version: DEFAULT_PROTOC_VERSION.to_string(),
                includes: Vec::new(),
                allow_unused_imports: false,
            },
            create: Vec::new(),
            lint: LintSettings::default(),
            generate: GenerateSettings::default(),
        }
    }
}

impl Settings {
    /// Loads the config file in `dir`, if one exists. YAML wins over JSON when
    /// both are present, matching the lookup order of the resolver.
    pub fn load_dir(dir: &Path) -> Result<Option<Settings>, Error> {
        let yaml = dir.join(CONFIG_FILE_YAML);
        if yaml.is_file() {
            let data = fs::read_to_string(&yaml)?;
            return Settings::from_yaml(&data, dir).map(Some);
        }
        let json = dir.join(CONFIG_FILE_JSON);
        if json.is_file() {
            let data = fs::read_to_string(&json)?;
            return Settings::from_json(&data, dir).map(Some);
        }
        Ok(None)
    }

    /// Parses inline configuration data. YAML is a superset of the JSON we
    /// accept, so a single parser covers `--config-data` in either shape.
    pub fn from_data(data: &str, base_dir: &Path) -> Result<Settings, Error> {
        Settings::from_yaml(data, base_dir)
    }

    pub fn from_yaml(data: &str, base_dir: &Path) -> Result<Settings, Error> {
        let external: ExternalConfig = serde_yaml::from_str(data)
            .map_err(|err| Error::ConfigInvalid(err.to_string()))?;
        Settings::validate(external, base_dir)
    }

    pub fn from_json(data: &str, base_dir: &Path) -> Result<Settings, Error> {
        let external: ExternalConfig = serde_json::from_str(data)
            .map_err(|err| Error::ConfigInvalid(err.to_string()))?;
        Settings::validate(external, base_dir)
    }

    fn validate(external: ExternalConfig, base_dir: &Path) -> Result<Settings, Error> {
        let ExternalConfig {
            excludes,
            protoc,
            create,
            lint,
            generate,
        } = external;

        let protoc_version = match protoc.version {
            Some(version) => {
                if !is_semver(&version) {
                    return Err(Error::ConfigInvalid(format!(
                        "protoc.version must look like \"3.11.4\", got {version:?}"
                    )));
                }
                version
            }
            None => DEFAULT_PROTOC_VERSION.to_string(),
        };

        let go_options = generate.go_options.unwrap_or_default();

        let mut descriptor_set_seen = false;
        let mut plugins = Vec::with_capacity(generate.plugins.len());
        for plugin in generate.plugins {
            let output = PathBuf::from(&plugin.output);
            if output.is_absolute() {
                return Err(Error::ConfigInvalid(format!(
                    "generate.plugins.{}: output must be a relative path, got {}",
                    plugin.name, plugin.output
                )));
            }
            let is_descriptor_set = plugin.name == "descriptor_set";
            if is_descriptor_set {
                if descriptor_set_seen {
                    return Err(Error::ConfigInvalid(
                        "at most one plugin may be named descriptor_set".to_string(),
                    ));
                }
                descriptor_set_seen = true;
                if plugin.file_suffix.is_none() {
                    return Err(Error::ConfigInvalid(
                        "generate.plugins.descriptor_set: file_suffix is required".to_string(),
                    ));
                }
            } else if plugin.include_imports || plugin.include_source_info {
                return Err(Error::ConfigInvalid(format!(
                    "generate.plugins.{}: include_imports/include_source_info are only valid \
                     for the descriptor_set plugin",
                    plugin.name
                )));
            }
            let kind = match plugin.kind.as_deref() {
                None | Some("none") => PluginKind::None,
                Some("go") => PluginKind::Go,
                Some("gogo") => PluginKind::Gogo,
                Some(other) => {
                    return Err(Error::ConfigInvalid(format!(
                        "generate.plugins.{}: unknown type {other:?}",
                        plugin.name
                    )))
                }
            };
            plugins.push(Plugin {
                name: plugin.name,
                kind,
                flags: plugin.flags,
                output,
                path_override: plugin.path.map(PathBuf::from),
                file_suffix: plugin.file_suffix,
                include_imports: plugin.include_imports,
                include_source_info: plugin.include_source_info,
            });
        }

        let file_header = match lint.file_header {
            Some(header) => {
                let path = absolutize(base_dir, &header.path);
                let content = fs::read_to_string(&path).map_err(|err| {
                    Error::ConfigInvalid(format!(
                        "lint.file_header.path {}: {err}",
                        path.display()
                    ))
                })?;
                Some(FileHeader {
                    path,
                    is_commented: header.is_commented,
                    content,
                })
            }
            None => None,
        };

        let mut ignores: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for ignore in lint.ignores {
            let files = ignore
                .files
                .iter()
                .map(|file| absolutize(base_dir, file))
                .collect();
            ignores.insert(ignore.id, files);
        }

        if lint.group.is_some() && lint.rules.no_default {
            log::debug!("lint.group is set; lint.rules.no_default is ignored");
        }

        Ok(Settings {
            excludes: excludes
                .iter()
                .map(|exclude| absolutize(base_dir, exclude))
                .collect(),
            protoc: ProtocSettings {
                version: protoc_version,
                includes: protoc
                    .includes
                    .iter()
                    .map(|include| absolutize(base_dir, include))
                    .collect(),
                allow_unused_imports: protoc.allow_unused_imports,
            },
            create: create
                .packages
                .into_iter()
                .map(|rule| CreateRule {
                    directory: absolutize(base_dir, &rule.directory),
                    base_package: rule.name,
                })
                .collect(),
            lint: LintSettings {
                group: lint.group,
                ignores,
                no_default: lint.rules.no_default,
                add: lint.rules.add,
                remove: lint.rules.remove,
                file_header,
            },
            generate: GenerateSettings {
                go_options: GoOptions {
                    import_path: go_options.import_path,
                    extra_modifiers: go_options.extra_modifiers,
                },
                plugins,
            },
        })
    }
}

fn absolutize(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn is_semver(version: &str) -> bool {
    let mut parts = 0;
    for part in version.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        parts += 1;
    }
    parts == 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let settings = Settings::from_yaml("{}", Path::new("/work")).unwrap();
        assert_eq!(settings.protoc.version, DEFAULT_PROTOC_VERSION);
        assert!(settings.excludes.is_empty());
        assert!(settings.lint.group.is_none());
    }

    #[test]
    fn parses_full_config() {
        let yaml = r#"
excludes:
  - vendor
protoc:
  version: 3.11.4
  includes:
    - idl
  allow_unused_imports: true
create:
  packages:
    - directory: .
      name: uber
lint:
  group: uber2
  ignores:
    - id: ENUM_NAMES_CAPITALIZED
      files:
        - idl/legacy.proto
  rules:
    add:
      - PACKAGE_IS_DECLARED
    remove:
      - SYNTAX_PROTO3
generate:
  go_options:
    import_path: github.com/example/idl
  plugins:
    - name: go
      type: go
      flags: plugins=grpc
      output: gen/go
"#;
        let settings = Settings::from_yaml(yaml, Path::new("/work")).unwrap();
        assert_eq!(settings.excludes, vec![PathBuf::from("/work/vendor")]);
        assert!(settings.protoc.allow_unused_imports);
        assert_eq!(settings.protoc.includes, vec![PathBuf::from("/work/idl")]);
        assert_eq!(settings.create[0].base_package, "uber");
        assert_eq!(settings.lint.group.as_deref(), Some("uber2"));
        assert_eq!(
            settings.lint.ignores["ENUM_NAMES_CAPITALIZED"],
            vec![PathBuf::from("/work/idl/legacy.proto")]
        );
        assert_eq!(settings.generate.plugins[0].kind, PluginKind::Go);
        assert_eq!(
            settings.generate.go_options.import_path.as_deref(),
            Some("github.com/example/idl")
        );
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Settings::from_yaml("protoc:\n  verison: 3.11.4\n", Path::new("/work"))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_bad_version() {
        let err = Settings::from_yaml("protoc:\n  version: v3.11\n", Path::new("/work"))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_absolute_plugin_output() {
        let yaml = "generate:\n  plugins:\n    - name: go\n      output: /abs/out\n";
        let err = Settings::from_yaml(yaml, Path::new("/work")).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_include_imports_outside_descriptor_set() {
        let yaml =
            "generate:\n  plugins:\n    - name: go\n      output: gen\n      include_imports: true\n";
        let err = Settings::from_yaml(yaml, Path::new("/work")).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_second_descriptor_set() {
        let yaml = r#"
generate:
  plugins:
    - name: descriptor_set
      output: gen
      file_suffix: fileset.bin
    - name: descriptor_set
      output: gen2
      file_suffix: other.bin
"#;
        let err = Settings::from_yaml(yaml, Path::new("/work")).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn accepts_json() {
        let json = r#"{"protoc": {"version": "3.9.1"}}"#;
        let settings = Settings::from_json(json, Path::new("/work")).unwrap();
        assert_eq!(settings.protoc.version, "3.9.1");
    }
}
