//! Configuration resolution, `.proto` file discovery, and the diagnostics
//! model shared by every prototool subsystem.
//!
//! A run starts here: the input path is resolved to a set of files, each file
//! is matched to its governing `prototool.yaml`/`prototool.json`, and files
//! sharing a config are grouped so that downstream stages can process each
//! group with a single `protoc` invocation.

mod discovery;
mod error;
mod failure;
mod resolve;
mod settings;

pub use discovery::discover;
pub use error::Error;
pub use failure::{Failure, Severity};
pub use resolve::{FileGroup, Resolver};
pub use settings::{
    CreateRule, FileHeader, GenerateSettings, GoOptions, LintSettings, Plugin, PluginKind,
    ProtocSettings, Settings, CONFIG_FILE_JSON, CONFIG_FILE_YAML, DEFAULT_LINT_GROUP,
    DEFAULT_PROTOC_VERSION,
};
