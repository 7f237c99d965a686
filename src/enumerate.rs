#![forbid(unsafe_code)]

//! Expands a playlist (or a channel's uploads playlist) into its video ids.
//!
//! The walk is lazy: a page is only requested once the ids buffered from the
//! previous page are used up, and it ends when the API stops handing out a
//! continuation token. There is no page cap. A failed page request is logged
//! and ends the walk early, so results can be partial and callers should
//! treat them that way.

use crate::api::{ListRequest, ListingApi};
use crate::ids::{ChannelId, VideoId};
use std::collections::VecDeque;

/// A playlist that can be walked any number of times.
pub struct PlaylistEnumeration<'a, A: ListingApi + ?Sized> {
    api: &'a A,
    playlist_id: String,
}

impl<'a, A: ListingApi + ?Sized> PlaylistEnumeration<'a, A> {
    pub fn new(api: &'a A, playlist_id: impl Into<String>) -> Self {
        Self {
            api,
            playlist_id: playlist_id.into(),
        }
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    /// Starts a fresh walk from the first page.
    pub fn walk(&self) -> PlaylistWalk<'a, A> {
        PlaylistWalk {
            api: self.api,
            playlist_id: self.playlist_id.clone(),
            buffered: VecDeque::new(),
            cursor: Cursor::Start,
            pages: 0,
        }
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

pub struct PlaylistWalk<'a, A: ListingApi + ?Sized> {
    api: &'a A,
    playlist_id: String,
    buffered: VecDeque<VideoId>,
    cursor: Cursor,
    pages: usize,
}

impl<A: ListingApi + ?Sized> PlaylistWalk<'_, A> {
    /// Pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    fn fetch_page(&mut self) {
        let token = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return,
        };

        let request = ListRequest::playlist_items(&self.playlist_id, token.as_deref());
        let response = match self.api.list(&request) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    playlist = %self.playlist_id,
                    pages = self.pages,
                    "stopping playlist walk early: {err}"
                );
                return;
            }
        };
        self.pages += 1;

        for item in &response.items {
            match item.video_id() {
                Some(id) => self.buffered.push_back(VideoId::from_listing(id.to_owned())),
                None => {
                    tracing::debug!(playlist = %self.playlist_id, "playlist item without a video id")
                }
            }
        }

        if let Some(next) = response.next_page() {
            self.cursor = Cursor::Next(next.to_owned());
        }
    }
}

impl<A: ListingApi + ?Sized> Iterator for PlaylistWalk<'_, A> {
    type Item = VideoId;

    fn next(&mut self) -> Option<VideoId> {
        loop {
            if let Some(id) = self.buffered.pop_front() {
                return Some(id);
            }
            if matches!(self.cursor, Cursor::Done) {
                return None;
            }
            // Empty pages with a token are legal; keep going.
            self.fetch_page();
        }
    }
}

/// Every video id in the playlist, in server order.
pub fn enumerate_playlist<A: ListingApi + ?Sized>(api: &A, playlist_id: &str) -> Vec<VideoId> {
    PlaylistEnumeration::new(api, playlist_id).walk().collect()
}

/// Looks up the channel's implicit uploads playlist.
pub fn uploads_playlist<A: ListingApi + ?Sized>(api: &A, channel: &ChannelId) -> Option<String> {
    match api.list(&ListRequest::channel_content_details(channel.as_str())) {
        Ok(response) => {
            let uploads = response
                .items
                .first()
                .and_then(|item| item.uploads_playlist())
                .map(str::to_owned);
            if uploads.is_none() {
                tracing::warn!(%channel, "channel has no uploads playlist");
            }
            uploads
        }
        Err(err) => {
            tracing::warn!(%channel, "could not look up uploads playlist: {err}");
            None
        }
    }
}

/// Every upload of the channel. Empty when the uploads playlist cannot be
/// found.
pub fn enumerate_channel_uploads<A: ListingApi + ?Sized>(
    api: &A,
    channel: &ChannelId,
) -> Vec<VideoId> {
    match uploads_playlist(api, channel) {
        Some(playlist) => enumerate_playlist(api, &playlist),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        ApiError, ContentDetails, Filter, Item, ItemId, ListResponse, RelatedPlaylists, Resource,
    };
    use std::cell::RefCell;

    /// Serves pre-built pages; `pages[i]` answers the i-th playlistItems call.
    #[derive(Default)]
    struct PagedApi {
        pages: Vec<Result<Vec<String>, ()>>,
        uploads: Option<&'static str>,
        calls: RefCell<Vec<ListRequest>>,
    }

    impl PagedApi {
        fn with_pages<S: AsRef<str>>(pages: Vec<Vec<S>>) -> Self {
            Self {
                pages: pages.iter().map(|page| Ok(owned(page))).collect(),
                ..Self::default()
            }
        }

        fn playlist_calls(&self) -> Vec<ListRequest> {
            self.calls
                .borrow()
                .iter()
                .filter(|request| request.resource == Resource::PlaylistItems)
                .cloned()
                .collect()
        }
    }

    fn owned<S: AsRef<str>>(ids: &[S]) -> Vec<String> {
        ids.iter().map(|id| id.as_ref().to_string()).collect()
    }

    fn video_item(id: String) -> Item {
        Item {
            content_details: Some(ContentDetails {
                video_id: Some(id),
                related_playlists: None,
            }),
            ..Item::default()
        }
    }

    impl ListingApi for PagedApi {
        fn list(&self, request: &ListRequest) -> Result<ListResponse, ApiError> {
            self.calls.borrow_mut().push(request.clone());
            if request.resource == Resource::Channels {
                let items = self
                    .uploads
                    .map(|uploads| Item {
                        id: Some(ItemId::Plain("UCHnyfMqiRRG1u-2MsSQLbXA".into())),
                        content_details: Some(ContentDetails {
                            video_id: None,
                            related_playlists: Some(RelatedPlaylists {
                                uploads: Some(uploads.into()),
                            }),
                        }),
                        snippet: None,
                    })
                    .into_iter()
                    .collect();
                return Ok(ListResponse {
                    items,
                    next_page_token: None,
                });
            }

            let index = match &request.page_token {
                None => 0,
                Some(token) => token.trim_start_matches("page-").parse::<usize>().unwrap(),
            };
            let page = self.pages.get(index).cloned().unwrap_or(Ok(Vec::new()));
            match page {
                Ok(ids) => Ok(ListResponse {
                    items: ids.into_iter().map(video_item).collect(),
                    next_page_token: (index + 1 < self.pages.len())
                        .then(|| format!("page-{}", index + 1)),
                }),
                Err(()) => Err(ApiError::Transport {
                    resource: "playlistItems",
                    message: "connection reset".into(),
                }),
            }
        }
    }

    fn ids(result: &[VideoId]) -> Vec<&str> {
        result.iter().map(VideoId::as_str).collect()
    }

    fn generated(count: usize) -> Vec<Vec<String>> {
        let all: Vec<String> = (0..count).map(|n| format!("vid{n:08}")).collect();
        if all.is_empty() {
            return vec![Vec::new()];
        }
        all.chunks(50).map(<[String]>::to_vec).collect()
    }

    #[test]
    fn result_length_matches_playlist_size() {
        for count in [0usize, 1, 50, 51] {
            let api = PagedApi::with_pages(generated(count));
            let result = enumerate_playlist(&api, "PLsize");
            assert_eq!(result.len(), count, "{count} items");
        }
    }

    #[test]
    fn fifty_one_items_need_exactly_one_continuation() {
        let api = PagedApi::with_pages(generated(51));
        enumerate_playlist(&api, "PLsize");
        let calls = api.playlist_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].page_token, None);
        assert_eq!(calls[1].page_token.as_deref(), Some("page-1"));
        assert!(calls.iter().all(|call| call.max_results == Some(50)));
        assert!(calls
            .iter()
            .all(|call| call.filter == Filter::PlaylistId("PLsize".into())));
    }

    #[test]
    fn preserves_server_order_across_pages() {
        let api = PagedApi::with_pages(vec![vec!["a", "b", "c"], vec!["d", "e"]]);
        let result = enumerate_playlist(&api, "PLorder");
        assert_eq!(ids(&result), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn duplicates_are_kept() {
        let api = PagedApi::with_pages(vec![vec!["a", "b"], vec!["b", "a"]]);
        let result = enumerate_playlist(&api, "PLdup");
        assert_eq!(ids(&result), vec!["a", "b", "b", "a"]);
    }

    #[test]
    fn failure_after_first_page_returns_partial_result() {
        let api = PagedApi {
            pages: vec![Ok(owned(&["a", "b", "c"])), Err(()), Ok(owned(&["z"]))],
            ..PagedApi::default()
        };
        let result = enumerate_playlist(&api, "PLflaky");
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
        assert_eq!(api.playlist_calls().len(), 2);
    }

    #[test]
    fn failure_on_first_page_returns_empty() {
        let api = PagedApi {
            pages: vec![Err(())],
            ..PagedApi::default()
        };
        assert!(enumerate_playlist(&api, "PLdown").is_empty());
    }

    #[test]
    fn empty_page_with_token_keeps_walking() {
        let api = PagedApi::with_pages(vec![vec!["a"], Vec::new(), vec!["b"]]);
        let result = enumerate_playlist(&api, "PLgap");
        assert_eq!(ids(&result), vec!["a", "b"]);
    }

    #[test]
    fn walk_is_lazy_and_restartable() {
        let api = PagedApi::with_pages(generated(120));
        let enumeration = PlaylistEnumeration::new(&api, "PLlazy");

        let mut walk = enumeration.walk();
        let first: Vec<VideoId> = walk.by_ref().take(3).collect();
        assert_eq!(first.len(), 3);
        assert_eq!(walk.pages_fetched(), 1);
        assert_eq!(api.playlist_calls().len(), 1);

        let again: Vec<VideoId> = enumeration.walk().take(3).collect();
        assert_eq!(first, again);

        let full: Vec<VideoId> = enumeration.walk().collect();
        let full_again: Vec<VideoId> = enumeration.walk().collect();
        assert_eq!(full.len(), 120);
        assert_eq!(full, full_again);
    }

    #[test]
    fn channel_uploads_walks_the_uploads_playlist() {
        let api = PagedApi {
            uploads: Some("UUHnyfMqiRRG1u-2MsSQLbXA"),
            ..PagedApi::with_pages(vec![vec!["x", "y"]])
        };
        let channel = ChannelId::parse("UCHnyfMqiRRG1u-2MsSQLbXA").unwrap();
        let result = enumerate_channel_uploads(&api, &channel);
        assert_eq!(ids(&result), vec!["x", "y"]);

        let calls = api.calls.borrow();
        assert_eq!(
            calls[0],
            ListRequest::channel_content_details("UCHnyfMqiRRG1u-2MsSQLbXA")
        );
        assert_eq!(
            calls[1].filter,
            Filter::PlaylistId("UUHnyfMqiRRG1u-2MsSQLbXA".into())
        );
    }

    #[test]
    fn channel_without_uploads_yields_nothing() {
        let api = PagedApi::with_pages(vec![vec!["x"]]);
        let channel = ChannelId::parse("UCHnyfMqiRRG1u-2MsSQLbXA").unwrap();
        assert!(enumerate_channel_uploads(&api, &channel).is_empty());
        assert!(api.playlist_calls().is_empty());
    }
}
