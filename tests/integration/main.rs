//! Workspace integration tests for the preview pipeline.

mod helpers;
mod pipeline_test;
