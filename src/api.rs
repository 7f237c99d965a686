#![forbid(unsafe_code)]

//! Thin typed layer over the YouTube Data API v3 `list` endpoints.
//!
//! Only the three resources the resolver and enumerator need are modelled:
//! `channels`, `playlistItems` and `search`. Every field is optional because
//! the API omits parts that were not requested.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
/// Largest page the API hands out for `playlistItems`.
pub const MAX_PAGE_SIZE: u32 = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Data API key. Read once at startup and moved into the client.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The API answered with a non-2xx status.
    #[error("{resource} request failed with status {status}: {message}")]
    Status {
        resource: &'static str,
        status: u16,
        message: String,
    },

    /// DNS, TLS, connection or timeout failure.
    #[error("{resource} request could not be sent: {message}")]
    Transport {
        resource: &'static str,
        message: String,
    },

    #[error("{resource} response could not be decoded: {source}")]
    Decode {
        resource: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Channels,
    PlaylistItems,
    Search,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Channels => "channels",
            Resource::PlaylistItems => "playlistItems",
            Resource::Search => "search",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Id(String),
    ForUsername(String),
    PlaylistId(String),
    /// Free-text search restricted to channel results.
    ChannelQuery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub resource: Resource,
    pub part: &'static str,
    pub filter: Filter,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

impl ListRequest {
    pub fn channels_for_username(name: &str) -> Self {
        Self {
            resource: Resource::Channels,
            part: "id",
            filter: Filter::ForUsername(name.to_owned()),
            max_results: None,
            page_token: None,
        }
    }

    pub fn channel_content_details(channel_id: &str) -> Self {
        Self {
            resource: Resource::Channels,
            part: "contentDetails",
            filter: Filter::Id(channel_id.to_owned()),
            max_results: None,
            page_token: None,
        }
    }

    pub fn channel_search(query: &str) -> Self {
        Self {
            resource: Resource::Search,
            part: "snippet",
            filter: Filter::ChannelQuery(query.to_owned()),
            max_results: None,
            page_token: None,
        }
    }

    pub fn playlist_items(playlist_id: &str, page_token: Option<&str>) -> Self {
        Self {
            resource: Resource::PlaylistItems,
            part: "contentDetails",
            filter: Filter::PlaylistId(playlist_id.to_owned()),
            max_results: Some(MAX_PAGE_SIZE),
            page_token: page_token.map(str::to_owned),
        }
    }

    /// Query parameters in the order they are sent, without the API key.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("part", self.part.to_owned())];
        match &self.filter {
            Filter::Id(value) => pairs.push(("id", value.clone())),
            Filter::ForUsername(value) => pairs.push(("forUsername", value.clone())),
            Filter::PlaylistId(value) => pairs.push(("playlistId", value.clone())),
            Filter::ChannelQuery(value) => {
                pairs.push(("q", value.clone()));
                pairs.push(("type", "channel".to_owned()));
            }
        }
        if let Some(max) = self.max_results {
            pairs.push(("maxResults", max.min(MAX_PAGE_SIZE).to_string()));
        }
        if let Some(token) = &self.page_token {
            pairs.push(("pageToken", token.clone()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl ListResponse {
    /// The continuation cursor, with empty strings treated as absent.
    pub fn next_page(&self) -> Option<&str> {
        self.next_page_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub content_details: Option<ContentDetails>,
    #[serde(default)]
    pub snippet: Option<Snippet>,
}

/// `channels` return the id as a plain string, `search` as a resource object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Plain(String),
    Resource {
        #[serde(default, rename = "channelId")]
        channel_id: Option<String>,
        #[serde(default, rename = "videoId")]
        video_id: Option<String>,
        #[serde(default, rename = "playlistId")]
        playlist_id: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetails {
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedPlaylists {
    #[serde(default)]
    pub uploads: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl Item {
    /// The bare `id` string of a `channels` item.
    pub fn plain_id(&self) -> Option<&str> {
        match &self.id {
            Some(ItemId::Plain(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn snippet_channel_id(&self) -> Option<&str> {
        self.snippet.as_ref()?.channel_id.as_deref()
    }

    /// The video referenced by a `playlistItems` entry.
    pub fn video_id(&self) -> Option<&str> {
        self.content_details.as_ref()?.video_id.as_deref()
    }

    pub fn uploads_playlist(&self) -> Option<&str> {
        self.content_details
            .as_ref()?
            .related_playlists
            .as_ref()?
            .uploads
            .as_deref()
    }
}

/// The single call shape every resolver strategy and the enumerator use.
pub trait ListingApi {
    fn list(&self, request: &ListRequest) -> Result<ListResponse, ApiError>;
}

impl<T: ListingApi + ?Sized> ListingApi for &T {
    fn list(&self, request: &ListRequest) -> Result<ListResponse, ApiError> {
        (**self).list(request)
    }
}

/// Blocking HTTPS client for the Data API.
pub struct DataApiClient {
    agent: ureq::Agent,
    base_url: String,
    key: ApiKey,
}

impl DataApiClient {
    pub fn new(base_url: &str, key: ApiKey) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
        }
    }

    fn endpoint(&self, resource: Resource) -> String {
        format!("{}/{}", self.base_url, resource.as_str())
    }
}

impl ListingApi for DataApiClient {
    fn list(&self, request: &ListRequest) -> Result<ListResponse, ApiError> {
        let resource = request.resource.as_str();
        let mut call = self.agent.get(&self.endpoint(request.resource));
        for (key, value) in request.query_pairs() {
            call = call.query(key, &value);
        }
        call = call.query("key", self.key.expose());

        tracing::debug!(resource, filter = ?request.filter, page = ?request.page_token, "listing");

        match call.call() {
            Ok(response) => response
                .into_json::<ListResponse>()
                .map_err(|source| ApiError::Decode { resource, source }),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(ApiError::Status {
                    resource,
                    status,
                    message: error_message(&body),
                })
            }
            Err(ureq::Error::Transport(transport)) => Err(ApiError::Transport {
                resource,
                message: transport.to_string(),
            }),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Pulls `error.message` out of a Google error payload, falling back to the
/// raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .unwrap_or_else(|| body.trim().to_string())
}
