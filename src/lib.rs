//! Purpose: Shared library crate used by the `remodel` CLI and tests.
//! Exports: `api` (public surface) and `core` (cache, schema, records, errors).
//! Role: Client-side relational cache and lazy record access for remote model
//! stores reachable only through a coarse-grained RPC surface.
//! Invariants: The cache layer never retries or suppresses remote faults.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;

pub(crate) mod session_paths;
