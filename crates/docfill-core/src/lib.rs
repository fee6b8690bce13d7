//! Core library for docfill.
//!
//! Turns text templates containing `{{ placeholder }}` tokens into finished documents:
//!
//! - [`scanner`] finds placeholder names in template text
//! - [`substitute`] fills tokens from a [`record::Record`] via a precompiled [`substitute::TokenTable`]
//! - [`batch`] expands one template against many records, concurrently but in row order
//! - [`package`] bundles the resulting artifacts into one ZIP container
//! - [`pipeline`] sequences the above into the extract, single, and batch flows
//!
//! Binary formats are handled by collaborators behind the traits in [`backend`].
//! The Office/LibreOffice implementations live in
//! [`docfill_office`](https://docs.rs/docfill-office).

pub mod artifacts;
pub mod backend;
pub mod batch;
pub mod config;
pub mod error;
pub mod package;
pub mod pipeline;
pub mod record;
pub mod scanner;
pub mod store;
pub mod substitute;
