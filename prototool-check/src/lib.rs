//! Schema checking: the lint rule engine, the canonical formatter, and the
//! breaking-change checker. All three report their findings as
//! [`prototool_config::Failure`] values and leave exit-code policy to the
//! caller.

pub mod breaking;
pub mod format;
pub mod git;
pub mod lint;
