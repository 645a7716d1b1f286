//! Core library for `snctool`: supervised record patching and data
//! migration against a remote low-code platform, reached exclusively
//! through the vendor `snc` CLI.

pub mod client;
pub mod config;
pub mod extract;
pub mod migrate;
pub mod patch;
pub mod runtime;
pub mod splice;
