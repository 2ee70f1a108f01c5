//! services/api/src/lib.rs
//!
//! The library crate backing the `api` and `openapi` binaries and the
//! integration tests.

pub mod adapters;
pub mod config;
pub mod error;
pub mod password;
pub mod seed;
pub mod web;
