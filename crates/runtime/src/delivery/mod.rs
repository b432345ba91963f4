//! Update delivery.
//!
//! Sends the merged state of a room to an external endpoint. Delivery is best effort:
//! each call is independent, bounded by a timeout, and its failures are logged rather
//! than returned to the code that mutated the document.

pub mod callback;
pub mod error;

pub use callback::{DeliveryOutcome, UpdateCallback, report};
pub use error::DeliveryError;
