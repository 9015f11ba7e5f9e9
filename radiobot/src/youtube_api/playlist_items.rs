//! YouTube PlaylistItems API types.

use crate::youtube_api::types::PageInfo;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `playlistItems.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItemListResponse {
    /// A list of playlist items that match the request criteria.
    #[serde(default)]
    pub items: VecDeque<PlaylistItem>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
    /// Token that can be used as the value of the pageToken parameter to retrieve the next page in the result set.
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// A `playlistItem` resource identifies a resource, such as a video, that is included in a playlist.
///
/// Only the parts this crate requests are modelled.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// The ID that YouTube uses to uniquely identify the playlist item.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "contentDetails")]
    pub content_details: Option<PlaylistItemContentDetails>,
}

impl PlaylistItem {
    /// The video this item points at, if the `contentDetails` part was returned.
    pub fn video_id(&self) -> Option<&str> {
        self.content_details
            .as_ref()
            .map(|details| details.video_id.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItemContentDetails {
    #[serde(rename = "videoId")]
    pub video_id: String,
}

/// Body of a `playlistItems.insert` call.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/insert>
#[derive(Debug, Serialize)]
pub struct PlaylistItemInsertRequest<'a> {
    pub snippet: PlaylistItemInsertSnippet<'a>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistItemInsertSnippet<'a> {
    #[serde(rename = "playlistId")]
    pub playlist_id: &'a str,
    #[serde(rename = "resourceId")]
    pub resource_id: ResourceId<'a>,
}

#[derive(Debug, Serialize)]
pub struct ResourceId<'a> {
    pub kind: &'a str,
    #[serde(rename = "videoId")]
    pub video_id: &'a str,
}

impl<'a> PlaylistItemInsertRequest<'a> {
    pub fn video(playlist_id: &'a str, video_id: &'a str) -> Self {
        Self {
            snippet: PlaylistItemInsertSnippet {
                playlist_id,
                resource_id: ResourceId {
                    kind: "youtube#video",
                    video_id,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_body_shape() {
        let body = serde_json::to_value(PlaylistItemInsertRequest::video("PL123", "dQw4w9WgXcQ"))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "snippet": {
                    "playlistId": "PL123",
                    "resourceId": { "kind": "youtube#video", "videoId": "dQw4w9WgXcQ" }
                }
            })
        );
    }

    #[test]
    fn list_response_tolerates_missing_fields() {
        let response: PlaylistItemListResponse = serde_json::from_value(json!({
            "kind": "youtube#playlistItemListResponse",
            "items": [
                { "id": "a", "contentDetails": { "videoId": "dQw4w9WgXcQ" } },
                { "id": "b" }
            ]
        }))
        .unwrap();
        assert_eq!(response.items.len(), 2);
        assert_eq!(response.items[0].video_id(), Some("dQw4w9WgXcQ"));
        assert_eq!(response.items[1].video_id(), None);
        assert!(response.next_page_token.is_none());
    }
}
