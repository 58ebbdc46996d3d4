//! Wire types of the aggregation server's HTTP API.
//!
//! The server speaks camelCase JSON. Request bodies omit empty optional
//! fields so that the server applies its own defaults.

use modhub_types::{Event, PublicKey};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Relay-style event filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<PublicKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Popular,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Popular => "popular",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "popular" => Ok(Self::Popular),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub offset: u32,
    pub limit: u32,
    #[serde(default)]
    pub sort: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
            sort: SortOrder::Newest,
        }
    }
}

/// Whose moderation decisions the server should apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationMode {
    /// The requesting user's mutes and web of trust.
    #[default]
    User,
    /// The site administrators' moderation.
    Admin,
    None,
}

impl FromStr for ModerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "none" => Ok(Self::None),
            other => Err(format!("unknown moderation mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationOptions {
    #[serde(default)]
    pub mode: ModerationMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub muted_authors: Vec<PublicKey>,
    /// Minimum trust score an author needs to be included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wot_threshold: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wot_root: Option<PublicKey>,
}

/// Body of `POST /paginated-events`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedEventsRequest {
    #[serde(flatten)]
    pub filter: EventFilter,
    pub pagination: PageRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderation: Option<ModerationOptions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_tags: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_tags: Vec<Vec<String>>,
}

impl PaginatedEventsRequest {
    pub fn new(filter: EventFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn with_page(mut self, offset: u32, limit: u32) -> Self {
        self.pagination.offset = offset;
        self.pagination.limit = limit;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.pagination.sort = sort;
        self
    }

    pub fn with_moderation(mut self, moderation: ModerationOptions) -> Self {
        self.moderation = Some(moderation);
        self
    }

    /// Require a tag, e.g. `["t", "chess"]`.
    pub fn include_tag(mut self, tag: Vec<String>) -> Self {
        self.include_tags.push(tag);
        self
    }

    pub fn exclude_tag(mut self, tag: Vec<String>) -> Self {
        self.exclude_tags.push(tag);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub offset: u32,
    pub limit: u32,
    pub has_more: bool,
}

/// Body of a successful `POST /paginated-events`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedEventsResponse {
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_flattens_filter_and_omits_empty_fields() {
        let request = PaginatedEventsRequest::new(EventFilter {
            kinds: vec![30023],
            ..EventFilter::default()
        })
        .with_page(40, 20)
        .with_sort(SortOrder::Popular)
        .include_tag(vec!["t".into(), "chess".into()]);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "kinds": [30023],
                "pagination": { "offset": 40, "limit": 20, "sort": "popular" },
                "includeTags": [["t", "chess"]],
            })
        );
    }

    #[test]
    fn moderation_uses_camel_case() {
        let root = PublicKey::new([7; 32]);
        let request = PaginatedEventsRequest::default().with_moderation(ModerationOptions {
            mode: ModerationMode::Admin,
            wot_threshold: Some(25),
            wot_root: Some(root),
            ..ModerationOptions::default()
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["moderation"]["mode"], "admin");
        assert_eq!(value["moderation"]["wotThreshold"], 25);
        assert_eq!(value["moderation"]["wotRoot"], root.to_hex());
    }

    #[test]
    fn response_tolerates_missing_pagination() {
        let response: PaginatedEventsResponse = serde_json::from_str(r#"{"events": []}"#).unwrap();
        assert!(response.events.is_empty());
        assert!(!response.pagination.has_more);
    }

    #[test]
    fn parses_sort_and_moderation_names() {
        assert_eq!("Popular".parse::<SortOrder>().unwrap(), SortOrder::Popular);
        assert_eq!("none".parse::<ModerationMode>().unwrap(), ModerationMode::None);
        assert!("best".parse::<SortOrder>().is_err());
    }

    #[test]
    fn health_requires_ok_status() {
        assert!(HealthResponse { status: "ok".into() }.is_ok());
        assert!(!HealthResponse { status: "degraded".into() }.is_ok());
    }
}
