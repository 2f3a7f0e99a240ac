//! Test infrastructure for the persistence layer.
//!
//! Provides a service wired to an in-memory SQLite store and an in-memory
//! document index, plus a seeded roster that most scenarios start from.

#![allow(dead_code)]

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::*;
