//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IObjectStore`] - Remote object storage (list / exists / put)
//! - [`IObjectStoreFactory`] - Builds an object store from the current credential
//! - [`INetworkState`] - Snapshot of the host's network interfaces
//! - [`IStatusReporter`] - Last sync status, last success time, and observers

pub mod network_state;
pub mod object_store;
pub mod status;

pub use network_state::{INetworkState, NetworkInterface};
pub use object_store::{IObjectStore, IObjectStoreFactory, ObjectInfo, ObjectReader};
pub use status::{
    IStatusObserver, IStatusReporter, StatusSnapshot, StatusSubscription, UNKNOWN_STATUS,
};
