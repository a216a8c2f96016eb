//! Core types and operations for tracking progress through a curriculum.
//!
//! The registry of subject records is the only state. Writes go through the
//! [`ledger`]; everything shown to the user (the matrix, the prerequisite
//! graph, dashboard and period statistics) is recomputed from a registry
//! snapshot by pure functions.
//!
//! This crate is deliberately free of database and terminal dependencies.
//! Storage backends implement [`store::KeyValueStore`].

pub mod aggregate;
pub mod calculator;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod period;
pub mod registry;
pub mod seed;
pub mod session;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
