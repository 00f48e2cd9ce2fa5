//! # AGI Dispatcher
//!
//! Core of the call-control daemon. Answers synchronous FastAGI requests
//! from the dialplan by running the named feature handler against a pooled
//! database connection, then writes routing variables back to the switch.
//!
//! ## Core Components
//!
//! - **server**: TCP acceptor, per-request dispatch, commit/rollback and
//!   the reload command path
//! - **handler**: the `AgiHandler` trait, the per-handler read/write lock
//!   discipline and the process registry
//! - **modules**: the feature handlers served by this daemon
//! - **config**: daemon configuration
//!
//! Handlers run concurrently under a shared read lock; a reload takes the
//! write lock per handler, so in-flight executions finish before handler
//! state is replaced.

pub mod config;
pub mod dialplan_variables;
pub mod handler;
pub mod modules;
pub mod server;
