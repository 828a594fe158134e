//! Observer-side push-channel client.
//!
//! [`ObserverClient`] keeps one subscription to the relay alive across
//! transient network loss using the [`ReconnectPolicy`] schedule.

pub mod backoff;
pub mod observer;

pub use backoff::{ReconnectPolicy, ReconnectState};
pub use observer::{ObserverClient, ObserverPhase};
