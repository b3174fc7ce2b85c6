//! n8forge-lib: build orchestration for the N8 language toolchain
//!
//! This crate turns an N8 source tree into distributable artifacts:
//! - `profile`: compiler, flags and libraries per (OS, arch, variant)
//! - `probe`: host CPU features safe to enable
//! - `plan`: the artifact graph for a target, with skip directives applied
//! - `execute`: wave-ordered, failure-isolated stage execution
//! - `embed` / `package`: Windows installer resources and Debian packages

pub mod artifact;
pub mod config;
pub mod consts;
pub mod discover;
pub mod embed;
pub mod execute;
pub mod layout;
pub mod package;
pub mod pipeline;
pub mod plan;
pub mod platform;
pub mod probe;
pub mod profile;
pub mod stages;
pub mod util;
