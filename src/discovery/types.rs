//! Core types for the discovery feed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::{DiscoveryError, DiscoveryResult};
use crate::access::{AccessState, MirrorVisibility, ProfileId, RelationshipStage};

/// Default page size for discovery queries.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Youngest age accepted in filters.
pub const MIN_AGE: u8 = 18;

/// Oldest age accepted in filters.
pub const MAX_AGE: u8 = 120;

/// Gender as reported on profiles and used by the gender filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Woman.
    Female,
    /// Man.
    Male,
    /// Non-binary.
    NonBinary,
    /// Anything else.
    Other,
}

impl Gender {
    /// Converts to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
            Self::NonBinary => "non_binary",
            Self::Other => "other",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "female" => Some(Self::Female),
            "male" => Some(Self::Male),
            "non_binary" => Some(Self::NonBinary),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Server-side sort order for discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Most recently joined first.
    #[default]
    Newest,
    /// Closest first.
    Distance,
    /// Highest mirror compatibility first.
    Compatibility,
}

impl SortBy {
    /// Converts to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Distance => "distance",
            Self::Compatibility => "compatibility",
        }
    }
}

/// Client-side relationship filter applied to the merged feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    /// Everything.
    #[default]
    All,
    /// No request attempted.
    New,
    /// Mirror or contact request outstanding.
    Pending,
    /// Mirror access established.
    Accepted,
}

impl StatusFilter {
    /// Returns whether a profile at `stage` passes this filter.
    #[must_use]
    pub const fn matches(&self, stage: RelationshipStage) -> bool {
        match self {
            Self::All => true,
            Self::New => matches!(stage, RelationshipStage::New),
            Self::Pending => matches!(stage, RelationshipStage::Pending),
            Self::Accepted => matches!(stage, RelationshipStage::Accepted),
        }
    }
}

/// Immutable discovery query.
///
/// Use the `with_*` methods to derive a changed copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryFilters {
    /// Restrict to one gender, or `None` for everyone.
    pub gender_filter: Option<Gender>,
    /// Minimum age, inclusive.
    pub min_age: u8,
    /// Maximum age, inclusive.
    pub max_age: u8,
    /// Maximum distance in kilometres, or `None` for unlimited.
    pub max_distance_km: Option<u32>,
    /// Server sort order.
    pub sort_by: SortBy,
    /// Page size.
    pub limit: u32,
    /// Page offset.
    pub offset: u32,
    /// Client-side relationship filter.
    pub status_filter: StatusFilter,
}

impl Default for DiscoveryFilters {
    fn default() -> Self {
        Self {
            gender_filter: None,
            min_age: MIN_AGE,
            max_age: MAX_AGE,
            max_distance_km: None,
            sort_by: SortBy::default(),
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
            status_filter: StatusFilter::default(),
        }
    }
}

impl DiscoveryFilters {
    /// Creates default filters with the given page size.
    #[must_use]
    pub fn with_page_size(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Sets the gender filter.
    #[must_use]
    pub const fn with_gender(mut self, gender: Option<Gender>) -> Self {
        self.gender_filter = gender;
        self
    }

    /// Sets the age range.
    #[must_use]
    pub const fn with_age_range(mut self, min_age: u8, max_age: u8) -> Self {
        self.min_age = min_age;
        self.max_age = max_age;
        self
    }

    /// Sets the maximum distance.
    #[must_use]
    pub const fn with_max_distance(mut self, km: Option<u32>) -> Self {
        self.max_distance_km = km;
        self
    }

    /// Sets the sort order.
    #[must_use]
    pub const fn with_sort(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    /// Sets the status filter.
    #[must_use]
    pub const fn with_status(mut self, status_filter: StatusFilter) -> Self {
        self.status_filter = status_filter;
        self
    }

    /// Returns a copy positioned at `offset`.
    #[must_use]
    pub fn at_offset(&self, offset: u32) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }

    /// Checks the filters for contradictions.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidFilters`] for an empty page size, an
    /// age below [`MIN_AGE`], or an inverted age range.
    pub fn validate(&self) -> DiscoveryResult<()> {
        if self.limit == 0 {
            return Err(DiscoveryError::InvalidFilters(
                "limit must be greater than zero".to_string(),
            ));
        }
        if self.min_age < MIN_AGE {
            return Err(DiscoveryError::InvalidFilters(format!(
                "min_age must be at least {MIN_AGE}"
            )));
        }
        if self.min_age > self.max_age {
            return Err(DiscoveryError::InvalidFilters(format!(
                "min_age {} exceeds max_age {}",
                self.min_age, self.max_age
            )));
        }
        Ok(())
    }

    /// Stable signature of the server-relevant query fields.
    ///
    /// `offset` and `status_filter` are excluded: pages of the same query
    /// share a signature, and the status filter never reaches the server.
    #[must_use]
    pub fn signature(&self) -> String {
        let canonical = format!(
            "gender={};age={}-{};distance={};sort={};limit={}",
            self.gender_filter.map_or("any", |g| g.as_str()),
            self.min_age,
            self.max_age,
            self.max_distance_km
                .map_or_else(|| "any".to_string(), |km| km.to_string()),
            self.sort_by.as_str(),
            self.limit,
        );
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(&digest[..8])
    }
}

/// A profile as returned by the discovery or connections query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile owner.
    pub id: ProfileId,
    /// Display name.
    pub display_name: String,
    /// Age, if shared.
    #[serde(default)]
    pub age: Option<u8>,
    /// Gender, if shared.
    #[serde(default)]
    pub gender: Option<Gender>,
    /// Distance from the viewer in kilometres.
    #[serde(default)]
    pub distance_km: Option<f64>,
    /// Photo URLs, primary first.
    #[serde(default)]
    pub photos: Vec<String>,
    /// Short bio.
    #[serde(default)]
    pub bio: Option<String>,
    /// Reference to the psychological snapshot backing the mirror.
    #[serde(default)]
    pub snapshot_id: Option<String>,
    /// Owner's mirror visibility setting.
    #[serde(default)]
    pub mirror_visibility: MirrorVisibility,
    /// Whether the viewer has an accepted mirror relationship with this profile.
    #[serde(default)]
    pub connected: bool,
}

impl Profile {
    /// Creates a minimal profile.
    #[must_use]
    pub fn new(id: impl Into<ProfileId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            age: None,
            gender: None,
            distance_km: None,
            photos: Vec::new(),
            bio: None,
            snapshot_id: None,
            mirror_visibility: MirrorVisibility::default(),
            connected: false,
        }
    }
}

/// One page of discovery results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryPage {
    /// Profiles on this page.
    pub profiles: Vec<Profile>,
    /// Whether the server has further pages.
    pub has_more: bool,
}

/// A feed row: profile plus its derived access state.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    /// The merged profile.
    pub profile: Profile,
    /// Access state evaluated for the viewer.
    pub access: AccessState,
}

/// A data source contributing to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    /// The paginated discovery query.
    Discoverable,
    /// The connections query.
    Connections,
}

/// What a load call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Results were applied to the feed.
    Applied {
        /// Discoverable profiles received in this load.
        loaded: usize,
        /// Whether more pages are available.
        has_more: bool,
    },
    /// A newer load superseded this one; its response was discarded.
    Superseded,
    /// Nothing to do (load in flight, no more pages, or no filters yet).
    Skipped,
}

/// Point-in-time view of the aggregator.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    /// Entries after the status filter.
    pub entries: Vec<FeedEntry>,
    /// Whether more discoverable pages exist.
    pub has_more: bool,
    /// Whether a load is in flight.
    pub loading: bool,
    /// Sources that failed during the last initial load.
    pub degraded: Vec<FeedSource>,
}
