//! Discovery feed: paginated profiles merged with existing connections.
//!
//! # Architecture
//!
//! ```text
//! DiscoveryAggregator
//!     ├── FeedCaches (CoalescingCache per source)
//!     │     ├── pages        PageKey { viewer, signature, offset }
//!     │     ├── connections  ConnectionsKey { viewer }
//!     │     └── access       AccessKey { viewer, target }
//!     ├── merge / assemble_feed / apply_status_filter (pure)
//!     └── ContactOverlay (optimistic contact intents)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use mirror_core::access::{ContactRequest, ContactRequestAck, MirrorRequest, ProfileId};
//! use mirror_core::backend::{BackendError, BackendResult, DiscoveryBackend, RequestBackend};
//! use mirror_core::cache::TtlPolicy;
//! use mirror_core::discovery::{
//!     DiscoveryAggregator, DiscoveryFilters, DiscoveryPage, FeedCaches, Profile,
//! };
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl DiscoveryBackend for Offline {
//!     async fn discover(&self, _: &ProfileId, _: &DiscoveryFilters) -> BackendResult<DiscoveryPage> {
//!         Ok(DiscoveryPage { profiles: Vec::new(), has_more: false })
//!     }
//!
//!     async fn connections(&self, _: &ProfileId) -> BackendResult<Vec<Profile>> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! #[async_trait]
//! impl RequestBackend for Offline {
//!     async fn create_mirror_request(&self, _: &ProfileId, _: &ProfileId) -> BackendResult<MirrorRequest> {
//!         Err(BackendError::Network("offline".into()))
//!     }
//!
//!     async fn mirror_requests(&self, _: &ProfileId, _: &ProfileId) -> BackendResult<Vec<MirrorRequest>> {
//!         Ok(Vec::new())
//!     }
//!
//!     async fn create_contact_request(&self, _: &ProfileId, _: &ProfileId) -> BackendResult<ContactRequestAck> {
//!         Err(BackendError::Network("offline".into()))
//!     }
//!
//!     async fn contact_request(&self, _: &ProfileId, _: &ProfileId) -> BackendResult<Option<ContactRequest>> {
//!         Ok(None)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let caches = FeedCaches::new(TtlPolicy::default());
//!     let feed = DiscoveryAggregator::new("viewer", Arc::new(Offline), caches);
//!
//!     feed.load_initial(DiscoveryFilters::default()).await?;
//!     for entry in feed.entries().await {
//!         println!("{} {:?}", entry.profile.display_name, entry.access.mirror_action());
//!     }
//!     feed.load_more().await?;
//!     Ok(())
//! }
//! ```

mod aggregator;
mod error;
pub mod keys;
pub mod merge;
pub mod types;

pub use aggregator::{DiscoveryAggregator, FeedCaches};
pub use error::{DiscoveryError, DiscoveryResult};
pub use keys::{AccessKey, ConnectionsKey, PageKey};
pub use merge::{apply_status_filter, assemble_feed, merge};
pub use types::{
    DiscoveryFilters, DiscoveryPage, FeedEntry, FeedSnapshot, FeedSource, Gender, LoadOutcome,
    Profile, SortBy, StatusFilter, DEFAULT_PAGE_SIZE,
};
