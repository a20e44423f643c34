//! Caching layer for external calendar accounts.
//!
//! This crate mirrors a remote calendar source into local storage and
//! serves reads from that mirror:
//! - `cache` decides when the mirror is stale, claims the refresh lease
//!   through the account store, and runs the refresh
//! - `access` exposes the read operations, `fallback` stands in when a
//!   source cannot be set up at all
//! - `store` and `remote` define the collaborators, with file and
//!   in-memory implementations

pub mod access;
pub mod account;
pub mod alarm;
pub mod cache;
pub mod clock;
pub mod config;
pub mod date_range;
pub mod diff;
pub mod error;
pub mod event;
pub mod fallback;
pub mod mirror;
pub mod projection;
pub mod remote;
pub mod store;

pub use access::{CachingCalendarAccess, CalendarAccess};
pub use error::{MirrorError, MirrorResult, Warning};
pub use mirror::CalendarMirror;
