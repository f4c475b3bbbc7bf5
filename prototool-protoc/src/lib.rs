//! The hermetic `protoc` toolchain: a content-addressed on-disk cache of
//! release binaries plus well-known-type includes, and a driver that turns
//! `protoc` invocations into structured diagnostics.

mod cache;
mod driver;

pub use cache::{default_cache_root, Platform, ToolchainCache, ToolchainEntry};
pub use driver::{CompileOutput, ProtocRunner};
