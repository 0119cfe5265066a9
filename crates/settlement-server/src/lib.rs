//! HTTP surface for the bank settlement core.
//!
//! Wraps `settlement-core`'s envelope codec, ledger verifier, and
//! settlement engine in an `actix-web` server exposing the wire contract of
//! spec.md §6. Routing, CORS, and process bootstrap live here; business
//! logic does not — every handler in [`routes`] is a thin translation
//! between HTTP and the pure functions `settlement-core` exposes.
//!
//! # Modules
//!
//! - [`config`] — environment-sourced process configuration
//! - [`state`] — shared [`state::AppState`] (database handle, bank
//!   identity, config)
//! - [`routes`] — `/settle`, `/verify`, `/bank-key`, `/audit-log`, `/health`

pub mod config;
pub mod routes;
pub mod state;
