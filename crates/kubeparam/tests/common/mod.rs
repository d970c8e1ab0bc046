//! Shared test utilities for kubeparam integration tests.
//!
//! This module provides:
//! - Builders for mapping records
//! - `FakeTemplateSource`, an in-memory template store

pub mod builders;
pub mod source;

pub use builders::*;
pub use source::FakeTemplateSource;
