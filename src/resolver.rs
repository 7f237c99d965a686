#![forbid(unsafe_code)]

//! Turns channel-ish input (ids, `/user/` links, `@handle` links, free text)
//! into a channel id.
//!
//! Strategies run in order and the first one producing an id wins. A strategy
//! that hits an API error logs it and yields nothing so the next one still
//! gets a chance; the resolver itself never fails, it only reports "not
//! found" as `None`.

use crate::api::{ListRequest, ListingApi};
use crate::ids::ChannelId;
use regex::Regex;
use std::sync::LazyLock;

static USER_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.)?youtube\.com/user/([^/?&]+)").expect("valid user url pattern")
});
static HANDLE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.)?youtube\.com/@([^/?&]+)").expect("valid handle url pattern")
});

pub const DIRECT: &str = "direct-id";
pub const USERNAME: &str = "username-url";
pub const HANDLE: &str = "handle-url";
pub const SEARCH: &str = "search";

/// One way of turning input into a channel id.
pub trait ResolveStrategy {
    fn name(&self) -> &'static str;

    fn resolve(&self, input: &str, api: &dyn ListingApi) -> Option<ChannelId>;
}

/// Input that already is a channel id. Never touches the network.
pub struct DirectChannelId;

impl ResolveStrategy for DirectChannelId {
    fn name(&self) -> &'static str {
        DIRECT
    }

    fn resolve(&self, input: &str, _api: &dyn ListingApi) -> Option<ChannelId> {
        ChannelId::parse(input)
    }
}

/// Looks a name up through the legacy `forUsername` field.
///
/// Used for both `/user/<name>` and `/@<handle>` links. `forUsername` knows
/// nothing about handles, so a channel that has a handle but no legacy
/// username is not found here and resolution falls through to search. Swap
/// the [`HANDLE`] slot with [`ChannelResolver::replace`] to use a real handle
/// lookup.
pub struct LegacyNameLookup {
    name: &'static str,
    pattern: &'static LazyLock<Regex>,
}

impl LegacyNameLookup {
    pub fn for_user_urls() -> Self {
        Self {
            name: USERNAME,
            pattern: &USER_URL,
        }
    }

    pub fn for_handle_urls() -> Self {
        Self {
            name: HANDLE,
            pattern: &HANDLE_URL,
        }
    }

    fn extract<'a>(&self, input: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(input)
            .and_then(|captures| captures.get(2))
            .map(|segment| segment.as_str())
    }
}

impl ResolveStrategy for LegacyNameLookup {
    fn name(&self) -> &'static str {
        self.name
    }

    fn resolve(&self, input: &str, api: &dyn ListingApi) -> Option<ChannelId> {
        let legacy_name = self.extract(input)?;
        match api.list(&ListRequest::channels_for_username(legacy_name)) {
            Ok(response) => first_channel(self.name, response.items.iter().map(|item| item.plain_id())),
            Err(err) => {
                tracing::warn!(strategy = self.name, name = legacy_name, "lookup failed: {err}");
                None
            }
        }
    }
}

/// Last resort: channel-type search with the raw input as query.
pub struct SearchFallback;

impl ResolveStrategy for SearchFallback {
    fn name(&self) -> &'static str {
        SEARCH
    }

    fn resolve(&self, input: &str, api: &dyn ListingApi) -> Option<ChannelId> {
        if input.trim().is_empty() {
            return None;
        }
        match api.list(&ListRequest::channel_search(input)) {
            Ok(response) => first_channel(
                SEARCH,
                response.items.iter().map(|item| item.snippet_channel_id()),
            ),
            Err(err) => {
                tracing::warn!(strategy = SEARCH, query = input, "search failed: {err}");
                None
            }
        }
    }
}

/// Only the first result counts; if it does not look like a channel id the
/// strategy has found nothing.
fn first_channel<'a>(
    strategy: &str,
    mut candidates: impl Iterator<Item = Option<&'a str>>,
) -> Option<ChannelId> {
    let raw = candidates.next()??;
    let channel = ChannelId::parse(raw);
    if channel.is_none() {
        tracing::warn!(strategy, value = raw, "API returned a malformed channel id");
    }
    channel
}

pub struct ChannelResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl Default for ChannelResolver {
    fn default() -> Self {
        Self::new(vec![
            Box::new(DirectChannelId),
            Box::new(LegacyNameLookup::for_user_urls()),
            Box::new(LegacyNameLookup::for_handle_urls()),
            Box::new(SearchFallback),
        ])
    }
}

impl ChannelResolver {
    pub fn new(strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// Swaps the strategy registered under `name`, keeping its position.
    /// Appends when no strategy has that name.
    pub fn replace(mut self, name: &str, strategy: Box<dyn ResolveStrategy>) -> Self {
        match self.strategies.iter().position(|existing| existing.name() == name) {
            Some(index) => self.strategies[index] = strategy,
            None => self.strategies.push(strategy),
        }
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    pub fn resolve(&self, input: &str, api: &dyn ListingApi) -> Option<ChannelId> {
        self.strategies.iter().find_map(|strategy| {
            let found = strategy.resolve(input, api);
            if let Some(channel) = &found {
                tracing::debug!(strategy = strategy.name(), %channel, "resolved channel");
            }
            found
        })
    }
}

/// Resolves with the default strategy chain.
pub fn resolve_channel(input: &str, api: &dyn ListingApi) -> Option<ChannelId> {
    ChannelResolver::default().resolve(input, api)
}
