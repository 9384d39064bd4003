//! Pinning and garbage collection for dagfs.
//!
//! A pin marks a CID as a garbage-collection root. Direct pins protect a
//! single block; recursive pins protect everything reachable from their
//! root. Indirect pins are never stored: they are recomputed by walking
//! the recursive pins whenever they are asked for.
//!
//! # Modules
//!
//! - [`pinner`] -- the [`Pinner`]: add, remove and list pins
//! - [`store`] -- persistence of pin records
//! - [`walk`] -- reachability over any supported codec
//! - [`gc`] -- mark and sweep over the block store

pub mod error;
pub mod gc;
pub mod pinner;
pub mod store;
pub mod types;
pub mod walk;

pub use error::{PinError, PinResult};
pub use gc::{collect_garbage, GcReport};
pub use pinner::{PinAddOptions, Pinner};
pub use store::{FsPinStore, InMemoryPinStore, PinStore};
pub use types::{Pin, PinEntry, PinFilter, PinMode, PinStatus};
pub use walk::reachable;
