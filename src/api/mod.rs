//! Admin backend API: entities, response envelopes, the HTTP client and its
//! cached wrapper.

pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod queries;
pub mod types;

pub use cached_client::AdminClient;
pub use client::AdminApi;
