//! Local key-value persistence for CollectPro.
//!
//! Mirrors the browser's local storage contract: string keys mapped to
//! string values, with every read and write modeled as fallible. Two
//! backends are provided:
//! - [`MemoryStore`]: in-process map (tests, ephemeral shells)
//! - [`FileStore`]: a single JSON document on disk, written through on
//!   every mutation

pub mod error;
pub mod file;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Key under which the last-activity timestamp (epoch millis) is stored.
pub const LAST_ACTIVE_KEY: &str = "app_last_active";

/// Key under which the last visited application path is stored.
pub const LAST_PAGE_KEY: &str = "app_last_page";

/// Key under which the pending-operation queue is stored.
pub const OFFLINE_QUEUE_KEY: &str = "app_offline_queue";

/// Key under which the backend auth session is stored.
pub const AUTH_SESSION_KEY: &str = "app_auth_session";

/// String key-value storage with local-storage semantics.
pub trait LocalStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> StoreResult<()>;

    /// Loads and deserializes a JSON value stored under `key`.
    fn load_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get_item(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serializes `value` as JSON and stores it under `key`.
    fn save_json<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()>
    where
        Self: Sized,
    {
        let json = serde_json::to_string(value)?;
        self.set_item(key, &json)
    }
}

impl<S: LocalStore + ?Sized> LocalStore for std::sync::Arc<S> {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        (**self).remove_item(key)
    }
}
