//! Document store for the storefront settlement service.
//!
//! One trait per collection, an in-memory implementation for tests and local
//! runs, and a PostgreSQL implementation. Cross-entity invariants (no
//! overselling, one status change per expected state, payment recorded once)
//! rest on the conditional single-document updates these traits expose.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{CartStore, OrderStore, ProductStore, StockCommit, Store, UserStore};
