use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use prost::Message;
use prost_types::FileDescriptorSet;

use prototool_config::{Error, Failure, FileGroup, Severity};

/// Result of one `protoc` invocation over a file group.
#[derive(Debug, Default)]
pub struct CompileOutput {
    /// Present when `protoc` exited zero and the descriptor set decoded.
    pub descriptor_set: Option<FileDescriptorSet>,
    pub failures: Vec<Failure>,
}

/// Drives `protoc` over file groups: compile mode produces descriptor sets,
/// generate mode produces plugin outputs.
pub struct ProtocRunner {
    protoc_path: PathBuf,
    wkt_include_path: Option<PathBuf>,
}

impl ProtocRunner {
    pub fn new(protoc_path: PathBuf, wkt_include_path: Option<PathBuf>) -> ProtocRunner {
        ProtocRunner {
            protoc_path,
            wkt_include_path,
        }
    }

    pub fn from_entry(entry: &crate::ToolchainEntry) -> ProtocRunner {
        ProtocRunner {
            protoc_path: entry.binary_path.clone(),
            wkt_include_path: Some(entry.wkt_include_path.clone()),
        }
    }

    /// The include roots for a group: configured includes, the config
    /// directory itself, then the cached well-known types.
    fn include_roots(&self, group: &FileGroup) -> Vec<PathBuf> {
        let mut roots = group.settings.protoc.includes.clone();
        roots.push(group.config_dir.clone());
        if let Some(wkt) = &self.wkt_include_path {
            roots.push(wkt.clone());
        }
        roots
    }

    /// Compile-mode argv, excluding the binary itself. The descriptor set is
    /// written to `descriptor_out`.
    pub fn compile_argv(&self, group: &FileGroup, descriptor_out: &Path) -> Vec<OsString> {
        let mut argv: Vec<OsString> = Vec::new();
        for root in self.include_roots(group) {
            if root.exists() {
                argv.push(join_os("-I", root.as_os_str()));
            } else {
                log::debug!("skipping missing include root {}", root.display());
            }
        }
        let mut out = OsString::from("--descriptor_set_out=");
        out.push(descriptor_out);
        argv.push(out);
        argv.push("--include_imports".into());
        argv.push("--include_source_info".into());
        for file in &group.files {
            argv.push(file.as_os_str().to_owned());
        }
        argv
    }

    /// Compiles one group, returning the decoded descriptor set and any
    /// diagnostics parsed from `protoc` stderr. The temporary descriptor-set
    /// file lives only as long as this call, on every exit path.
    pub fn compile(&self, group: &FileGroup) -> Result<CompileOutput, Error> {
        let tmp = tempfile::Builder::new()
            .prefix("prototool-descriptor-set")
            .tempfile()?;
        let argv = self.compile_argv(group, tmp.path());

        log::debug!("running {:?} {:?}", self.protoc_path, argv);
        let output = Command::new(&self.protoc_path)
            .args(&argv)
            .output()
            .map_err(|err| {
                Error::internal(format!(
                    "failed to invoke protoc at {}: {err}",
                    self.protoc_path.display()
                ))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut failures = parse_stderr(&stderr, group.settings.protoc.allow_unused_imports);

        if !output.status.success() {
            if failures.is_empty() {
                failures.push(
                    Failure::new("", 1, 1, format!("protoc exited with {}", output.status))
                        .with_rule("PROTOC_UNKNOWN"),
                );
            }
            return Ok(CompileOutput {
                descriptor_set: None,
                failures,
            });
        }

        let buf = fs::read(tmp.path())?;
        let descriptor_set = FileDescriptorSet::decode(buf.as_slice())
            .map_err(|err| Error::internal(format!("invalid descriptor set: {err}")))?;
        Ok(CompileOutput {
            descriptor_set: Some(descriptor_set),
            failures,
        })
    }

    /// Generate-mode argv for the group's configured plugins.
    pub fn generate_argv(&self, group: &FileGroup) -> Result<Vec<OsString>, Error> {
        let mut argv: Vec<OsString> = Vec::new();
        for root in self.include_roots(group) {
            if root.exists() {
                argv.push(join_os("-I", root.as_os_str()));
            }
        }

        for plugin in &group.settings.generate.plugins {
            let output_dir = group.config_dir.join(&plugin.output);
            if plugin.is_descriptor_set() {
                // file_suffix presence is enforced at config validation.
                let file_suffix = plugin.file_suffix.as_deref().unwrap_or("bin");
                let mut arg = OsString::from("--descriptor_set_out=");
                arg.push(output_dir.join(file_suffix));
                argv.push(arg);
                if plugin.include_imports {
                    argv.push("--include_imports".into());
                }
                if plugin.include_source_info {
                    argv.push("--include_source_info".into());
                }
                continue;
            }

            if let Some(path_override) = &plugin.path_override {
                let mut arg = OsString::from(format!("--plugin=protoc-gen-{}=", plugin.name));
                arg.push(path_override);
                argv.push(arg);
            } else if !is_builtin_plugin(&plugin.name) {
                // Builtins like cpp/java ship inside protoc; everything else
                // must resolve on PATH before we hand protoc a bare name.
                which::which(format!("protoc-gen-{}", plugin.name)).map_err(|_| {
                    Error::NotFound(PathBuf::from(format!("protoc-gen-{}", plugin.name)))
                })?;
            }

            let mut flags = plugin.flags.clone().unwrap_or_default();
            if matches!(
                plugin.kind,
                prototool_config::PluginKind::Go | prototool_config::PluginKind::Gogo
            ) {
                for (path, import) in &group.settings.generate.go_options.extra_modifiers {
                    if !flags.is_empty() {
                        flags.push(',');
                    }
                    flags.push_str(&format!("M{path}={import}"));
                }
            }

            let mut arg = OsString::from(format!("--{}_out=", plugin.name));
            if !flags.is_empty() {
                arg.push(&flags);
                arg.push(":");
            }
            arg.push(&output_dir);
            argv.push(arg);
        }

        for file in &group.files {
            argv.push(file.as_os_str().to_owned());
        }
        Ok(argv)
    }

    /// Runs generate mode, creating plugin output directories first.
    pub fn generate(&self, group: &FileGroup) -> Result<Vec<Failure>, Error> {
        for plugin in &group.settings.generate.plugins {
            let output_dir = group.config_dir.join(&plugin.output);
            fs::create_dir_all(&output_dir)?;
        }
        let argv = self.generate_argv(group)?;

        log::debug!("running {:?} {:?}", self.protoc_path, argv);
        let output = Command::new(&self.protoc_path)
            .args(&argv)
            .output()
            .map_err(|err| {
                Error::internal(format!(
                    "failed to invoke protoc at {}: {err}",
                    self.protoc_path.display()
                ))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut failures = parse_stderr(&stderr, group.settings.protoc.allow_unused_imports);
        if !output.status.success() && failures.is_empty() {
            failures.push(
                Failure::new("", 1, 1, format!("protoc exited with {}", output.status))
                    .with_rule("PROTOC_UNKNOWN"),
            );
        }
        Ok(failures)
    }
}

fn join_os(prefix: &str, value: &std::ffi::OsStr) -> OsString {
    let mut joined = OsString::from(prefix);
    joined.push(value);
    joined
}

fn is_builtin_plugin(name: &str) -> bool {
    matches!(
        name,
        "cpp" | "csharp" | "java" | "js" | "objc" | "php" | "python" | "ruby"
    )
}

/// Parses protoc stderr into failures.
///
/// Lines have the shape `path:line:col: message`, occasionally `path: message`
/// for file-level problems. Anything else is preserved verbatim so the user
/// still sees protoc's free-form notes.
fn parse_stderr(stderr: &str, allow_unused_imports: bool) -> Vec<Failure> {
    let mut failures = Vec::new();
    for line in stderr.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        log::debug!("protoc: {line}");
        let Some(failure) = parse_line(line) else {
            failures.push(Failure::new("", 1, 1, line).with_rule("PROTOC"));
            continue;
        };
        if allow_unused_imports && failure.message.contains("is unused") {
            log::debug!("suppressing unused-import diagnostic: {}", failure.message);
            continue;
        }
        failures.push(failure);
    }
    failures
}

fn parse_line(line: &str) -> Option<Failure> {
    let mut parts = line.splitn(4, ':');
    let path = parts.next()?;
    if path.is_empty() || !path.ends_with(".proto") {
        return None;
    }
    let rest: Vec<&str> = parts.collect();
    match rest.as_slice() {
        [line_str, col_str, message] => {
            let line_no: u32 = line_str.trim().parse().ok()?;
            let col_no: u32 = col_str.trim().parse().ok()?;
            Some(classify(Failure::new(
                path,
                line_no,
                col_no,
                message.trim(),
            )))
        }
        [message] => Some(classify(Failure::new(path, 1, 1, message.trim()))),
        [first, second] => {
            // `path: warning: message` and friends; line/col absent.
            let message = format!("{}:{}", first, second);
            Some(classify(Failure::new(path, 1, 1, message.trim())))
        }
        _ => None,
    }
}

fn classify(failure: Failure) -> Failure {
    if failure.message.starts_with("warning:") {
        let message = failure
            .message
            .trim_start_matches("warning:")
            .trim()
            .to_string();
        Failure {
            message,
            ..failure
        }
        .with_severity(Severity::Warning)
        .with_rule("PROTOC_WARNING")
    } else {
        failure.with_rule("PROTOC")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prototool_config::Settings;
    use std::sync::Arc;

    fn group_in(dir: &Path, files: Vec<PathBuf>) -> FileGroup {
        FileGroup {
            config_dir: dir.to_path_buf(),
            settings: Arc::new(Settings::default()),
            files,
        }
    }

    #[test]
    fn parses_positional_diagnostics() {
        let failures = parse_stderr("idl/foo.proto:3:14: Expected field number.\n", false);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "idl/foo.proto");
        assert_eq!(failures[0].line, 3);
        assert_eq!(failures[0].column, 14);
        assert_eq!(failures[0].message, "Expected field number.");
        assert_eq!(failures[0].severity, Severity::Error);
    }

    #[test]
    fn parses_file_level_diagnostics() {
        let failures = parse_stderr("foo.proto: File not found.\n", false);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].line, 1);
        assert_eq!(failures[0].column, 1);
    }

    #[test]
    fn keeps_unparseable_lines_verbatim() {
        let failures = parse_stderr("some free-form note from protoc\n", false);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "");
        assert_eq!(failures[0].message, "some free-form note from protoc");
    }

    #[test]
    fn warnings_get_warning_severity() {
        let failures = parse_stderr(
            "foo.proto:2:1: warning: Import bar.proto is unused.\n",
            false,
        );
        assert_eq!(failures[0].severity, Severity::Warning);
        assert_eq!(failures[0].message, "Import bar.proto is unused.");
    }

    #[test]
    fn allow_unused_imports_suppresses_those_warnings() {
        let failures = parse_stderr(
            "foo.proto:2:1: warning: Import bar.proto is unused.\n",
            true,
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn compile_argv_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.proto");
        std::fs::write(&file, "syntax = \"proto3\";\n").unwrap();

        let runner = ProtocRunner::new(PathBuf::from("/protoc"), None);
        let group = group_in(tmp.path(), vec![file.clone()]);
        let argv = runner.compile_argv(&group, Path::new("/tmp/out.bin"));

        let rendered: Vec<String> = argv
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(rendered[0], format!("-I{}", tmp.path().display()));
        assert_eq!(rendered[1], "--descriptor_set_out=/tmp/out.bin");
        assert_eq!(rendered[2], "--include_imports");
        assert_eq!(rendered[3], "--include_source_info");
        assert_eq!(rendered[4], file.display().to_string());
    }

    #[test]
    fn generate_argv_descriptor_set_plugin() {
        let tmp = tempfile::tempdir().unwrap();
        let yaml = r#"
generate:
  plugins:
    - name: descriptor_set
      output: gen
      file_suffix: fileset.bin
      include_imports: true
"#;
        let settings = Settings::from_yaml(yaml, tmp.path()).unwrap();
        let group = FileGroup {
            config_dir: tmp.path().to_path_buf(),
            settings: Arc::new(settings),
            files: vec![],
        };
        let runner = ProtocRunner::new(PathBuf::from("/protoc"), None);
        let argv = runner.generate_argv(&group).unwrap();
        let rendered: Vec<String> = argv
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert!(rendered.contains(&format!(
            "--descriptor_set_out={}",
            tmp.path().join("gen/fileset.bin").display()
        )));
        assert!(rendered.contains(&"--include_imports".to_string()));
        assert!(!rendered.contains(&"--include_source_info".to_string()));
    }

    #[test]
    fn generate_argv_plugin_with_override_and_modifiers() {
        let tmp = tempfile::tempdir().unwrap();
        let yaml = r#"
generate:
  go_options:
    import_path: github.com/example/idl
    extra_modifiers:
      google/api/annotations.proto: google.golang.org/genproto/googleapis/api/annotations
  plugins:
    - name: go
      type: go
      flags: plugins=grpc
      output: gen/go
      path: /usr/local/bin/protoc-gen-go
"#;
        let settings = Settings::from_yaml(yaml, tmp.path()).unwrap();
        let group = FileGroup {
            config_dir: tmp.path().to_path_buf(),
            settings: Arc::new(settings),
            files: vec![],
        };
        let runner = ProtocRunner::new(PathBuf::from("/protoc"), None);
        let argv = runner.generate_argv(&group).unwrap();
        let rendered: Vec<String> = argv
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert!(rendered.contains(&"--plugin=protoc-gen-go=/usr/local/bin/protoc-gen-go".to_string()));
        let out = rendered
            .iter()
            .find(|arg| arg.starts_with("--go_out="))
            .unwrap();
        assert!(out.contains("plugins=grpc,Mgoogle/api/annotations.proto="));
        assert!(out.ends_with(&format!(":{}", tmp.path().join("gen/go").display())));
    }
}
