//! Core data model for farmtrace.
//!
//! Items move through a fixed four-stage lifecycle. Every transition leaves
//! one hash-chained tracking record behind and emits one transition event.

mod address;
mod item;
mod record;

pub use address::{ADDRESS_LEN, Address, AddressParseError};
pub use item::{Item, ItemId, State};
pub use record::{RecordHash, TrackingRecord, TransitionEvent};
