//! # Database Module
//!
//! Data access layer for the call-control daemon.
//!
//! ## Core Components
//!
//! - **api**: the database connection pool and the Postgres connector
//! - **models**: plain row structs mapped from query results
//! - **objects**: data mappers turning configuration rows into engine values
//!
//! The pool hands out raw `tokio_postgres` clients; request handlers run
//! inside a transaction opened on the acquired client, so commit and
//! rollback stay under the dispatcher's control.

pub mod api;
pub mod models;
pub mod objects;
