//! Integration tests for chainserve
//!
//! Each test starts an in-process server on an ephemeral port with a fixed
//! set of fixture routes (see `helpers.rs`).
//!
//! Run with: cargo test --test integration

mod helpers;

mod files;
mod responses;
mod transport;
