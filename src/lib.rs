//! Assemble a directory subtree into a single Markdown context document.

pub mod config;
pub mod error;
pub mod event;
pub mod fs;
pub mod output;
