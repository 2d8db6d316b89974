//! Integration test crate; the scenarios live under `tests/`.
