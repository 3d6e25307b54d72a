//! Device registry for ecgingest
//!
//! [`DeviceRegistryCache`] holds an immutable snapshot of the deviceId → userId
//! mapping. Refreshes build a complete new snapshot from a [`RegistrySource`]
//! and swap it in whole, so readers only ever see a finished mapping.
//! [`RefreshScheduler`] drives periodic refreshes until cancelled.

mod cache;
mod error;
mod scheduler;
mod source;

pub use cache::{DeviceRegistryCache, RegistrySnapshot};
pub use error::RegistryError;
pub use scheduler::{RefreshHandle, RefreshScheduler};
pub use source::{DocumentRegistrySource, RegistrySource};
