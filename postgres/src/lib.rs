//! `PostgreSQL` persistence for the RSVP capacity engine.
//!
//! This crate provides the production implementations of the engine's
//! collaborator traits from `rsvp-core`:
//!
//! - [`PostgresResponseStore`]: transactional access to events and responses
//! - [`PostgresGroupAccess`]: group-membership visibility checks
//! - [`PostgresConfig`]: connection pool settings loaded from the environment
//!
//! Every transaction locks the event row (`SELECT ... FOR UPDATE`) before the
//! admission decision reads it, so the capacity invariant also holds when
//! several engine processes share one database.
//!
//! # Example
//!
//! ```ignore
//! use rsvp_postgres::{PostgresConfig, PostgresGroupAccess, PostgresResponseStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PostgresConfig::from_env().connect().await?;
//!     let store = PostgresResponseStore::from_pool(pool.clone());
//!     store.migrate().await?;
//!
//!     let access = PostgresGroupAccess::new(pool);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod access;
mod config;
mod store;

pub use access::PostgresGroupAccess;
pub use config::PostgresConfig;
pub use store::PostgresResponseStore;
