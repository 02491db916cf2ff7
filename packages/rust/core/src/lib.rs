//! Core pipeline orchestration for docsmith.
//!
//! Ties the content reader, prompt assembly and the completion client into
//! the end-to-end `run` workflow, and maintains the rolling context summary.

pub mod layout;
pub mod pipeline;
pub mod prompt;
pub mod summary;

#[cfg(test)]
pub(crate) mod test_support;
