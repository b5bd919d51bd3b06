//! Shared wire types for the check-in service.
//!
//! `models` holds the domain enums every crate agrees on, `api` the JSON
//! bodies of the HTTP endpoints and `line` the LINE webhook payloads.

pub mod api;
pub mod line;
pub mod models;
