//! Admin client for the fantasy football platform.
//!
//! Screens declare their reads as cache queries and their writes as
//! mutations; the cache keeps local state consistent with the backend.

pub mod admin;
pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod mutation;
pub mod notify;
pub mod prefs;
pub mod query;
pub mod session;
pub mod storage;
pub mod transport;
