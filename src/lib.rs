//! mailgraph — email → knowledge-base sync core.
//!
//! Turns classified inbound email into append-only markdown mutations under
//! a personal knowledge tree, tracks idempotent processing state across
//! runs, and answers ad hoc natural-language queries over a message set.
//!
//! The mailbox transport and the classification service are collaborators
//! behind the [`mailbox::Mailbox`] and [`classify::Classifier`] traits.

pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod mailbox;
pub mod router;
pub mod search;
pub mod section;
pub mod state;
pub mod sync;

pub use error::{Error, Result};
