//! Order document and related types.

mod document;
mod state;
mod value_objects;

pub use document::Order;
pub use state::{OrderStatus, PaymentMethod, PaymentStatus};
pub use value_objects::{Money, OrderLineItem, PaymentInfo, ShippingInfo};
