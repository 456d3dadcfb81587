//! In-memory cache for remote reads.
//!
//! This module coordinates fetches of backend resources:
//! - Keys entries by [`QueryIdentity`] (resource name + normalized params)
//! - Deduplicates concurrent requests for the same identity
//! - Serves fresh data without a request, refetches stale data
//! - Keeps last known good data while revalidating (stale-while-revalidate)
//! - Fences out responses from superseded requests
//! - Runs periodic refetches for observed identities

mod entry;
mod identity;
mod layer;

pub use entry::{CacheEntry, FetchPolicy, FetchStatus};
pub use identity::{ParamValue, QueryIdentity, QueryPattern};
pub use layer::{ObserverGuard, ResourceCache};
