//! Capture loop acceptance scenarios.

mod common;
mod jitter_test;
mod retry_test;
