//! Core types for the server status monitor.
//!
//! Holds the persisted monitor model, the data reported by game servers,
//! rendering of that data into a status display, the shared error type and
//! command-line settings.

pub mod error;
pub mod models;
pub mod render;
pub mod settings;

pub use error::{Result, StatusError};
