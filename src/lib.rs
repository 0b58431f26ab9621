//! Batch translation of gettext catalogs through a chat-completion model.
//!
//! The coordinator expands locale directories into per-file work items and
//! runs each one through the file pipeline: chunk pending entries, prompt the
//! model, recover JSON from its reply, merge, save, recompile the `.mo`.

pub mod config;
pub mod error;
pub mod model;
pub mod services;

pub use error::{Error, Result};
