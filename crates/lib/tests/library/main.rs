//! Library integration tests for n8forge-lib.

mod common;
mod driver_tests;
mod pipeline_tests;
