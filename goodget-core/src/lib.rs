//! GoodGet core library: domain types, the got store, errors.
//!
//! Public API surface:
//! - [`types`]: feeds, package identities and package state
//! - [`version`]: package version validation
//! - [`got`]: the local record of what was last fetched
//! - [`error`]: [`CoreError`]

pub mod error;
pub mod got;
pub mod types;
pub mod version;

pub use error::CoreError;
pub use got::{GotFolder, GotNone, GotStore};
pub use types::{Feed, FeedPackages, Package, PackageId};
pub use version::PackageVersion;
