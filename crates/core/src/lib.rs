#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Shared resource model, origin filtering and cache storage for the weather relay.

pub mod model;
pub mod origin;
pub mod store;

mod util;

pub use model::{CacheEntry, ParseResourceError, ResourceName, ResourceSpec, ResourceStatus};
pub use origin::{CorsGrant, OriginGate};
pub use store::{CacheStore, FsCacheStore, MemoryCacheStore, StoreError};
pub use util::{now_ms, system_time_ms, EpochMs};
