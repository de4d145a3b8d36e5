//! Infrastructure integration tests.

mod engines_over_workspace_tests;
mod sandbox_engine_tests;
