//! Minimal YouTube Data API v3 client.
//!
//! Only the calls the playlist pipeline needs are modelled: listing and inserting playlist
//! items, and reading a video's snippet and content details. Authentication is the caller's
//! business; every call takes the bearer token to send.

pub mod client;
pub mod playlist_items;
pub mod types;
pub mod videos;

pub use client::{DEFAULT_API_BASE, YouTubeClient};
pub use playlist_items::PlaylistItem;
pub use types::{PageInfo, PagedStream};
pub use videos::{Video, format_duration, parse_iso8601_duration};
