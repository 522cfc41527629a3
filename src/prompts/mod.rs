//! Prompt module for LLM-based operations.
//!
//! This module provides prompt templates for the generative-language tasks.

pub mod summarize;

pub use summarize::*;
