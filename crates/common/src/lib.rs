//! Identifier types shared across the settlement workspace.

mod types;

pub use types::{OrderId, ProductId, UserId};
