//! End-to-End Integration Tests
//!
//! These tests run the group mapper against an in-memory directory and an
//! in-memory local store, covering each mode, both retrieval strategies and
//! the sync job.

mod common;
mod modes;
mod paths;
mod strategies;
mod sync;
