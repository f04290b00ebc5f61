//! A differential verifier for Redis-style stream commands.
//!
//! This crate drives two command-accepting endpoints through identical
//! `XADD`/`XREAD` sequences and asserts structural equivalence of the
//! results:
//!
//! - A **reference** endpoint: any stream server reachable over TCP,
//!   speaking RESP
//! - A **candidate** endpoint: an in-memory stream engine living in this
//!   crate, with auto-generated entry IDs, `COUNT`-capped reads, and
//!   blocking reads woken by concurrent adds
//!
//! Entry IDs legitimately differ between independent endpoints, so the
//! comparison checks ID well-formedness and position-by-position content
//! equality instead of raw reply equality. The candidate engine can also
//! be served over TCP, making both endpoints addressable the same way.

pub mod commands;
pub mod config;
pub mod endpoint;
pub mod input;
pub mod memory;
pub mod remote;
pub mod resp;
pub mod server;
pub mod state;
pub mod store;
pub mod verifier;
