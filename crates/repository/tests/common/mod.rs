//! Test infrastructure for the repository engine.
//!
//! Provides fixture entities covering every engine feature (uniqueness
//! groups, extensions, ownership, relations) and a harness wiring them to a
//! SQLite backend.

#![allow(dead_code)]

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::*;
