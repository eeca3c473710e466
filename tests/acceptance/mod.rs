//! Integration tests for hubclock acceptance testing.
//!
//! No privileges are required; wake lock tests use temporary files in
//! place of the sysfs nodes.

mod common;
mod concurrency_test;
mod hardware_sync_test;
mod runtime_test;
