//! End-to-end tests over a real TCP listener.
//! Run with: cargo test --test e2e

#[path = "../common/mod.rs"]
mod common;

mod helpers;
mod speech_pipeline;
