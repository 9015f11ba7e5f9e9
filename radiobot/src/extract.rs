//! Extraction of YouTube video identifiers from free-form chat text.
//!
//! Chat messages contain links in all shapes: with or without a scheme, wrapped in angle
//! brackets or parentheses, separated by commas, or carrying tracking parameters. Everything
//! here is pure so that it can be tested without any network or chat fixtures.

use std::fmt;
use url::Url;

/// Length of a YouTube video identifier.
const VIDEO_ID_LEN: usize = 11;

/// Path prefixes on `youtube.com` whose first segment is the video identifier.
const ID_PATH_PREFIXES: [&str; 4] = ["shorts", "embed", "v", "live"];

/// Characters that chat users commonly leave stuck to the end of a link.
const TRAILING_PUNCTUATION: [char; 5] = [')', ']', ',', '.', '>'];

/// A canonical YouTube video identifier.
///
/// Only produced by a successful match, so holding one means the identifier is exactly 11
/// characters of `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoRef {
    id: String,
}

impl VideoRef {
    /// Accepts a bare identifier if it has the shape of a YouTube video id.
    pub fn parse(id: &str) -> Option<Self> {
        is_video_id(id).then(|| Self { id: id.to_string() })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shareable short link for this video.
    pub fn short_url(&self) -> String {
        format!("https://youtu.be/{}", self.id)
    }
}

impl fmt::Display for VideoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Returns the first YouTube video referenced in `text`, if any.
pub fn extract(text: &str) -> Option<VideoRef> {
    candidates(text).find_map(|candidate| video_from_url(&candidate))
}

/// Returns every distinct YouTube video referenced in `text`, in order of first appearance.
pub fn extract_all(text: &str) -> Vec<VideoRef> {
    let mut videos = Vec::new();
    for video in candidates(text).filter_map(|candidate| video_from_url(&candidate)) {
        if !videos.contains(&video) {
            videos.push(video);
        }
    }
    videos
}

/// Case-insensitive check for the passive trigger keyword.
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    !keyword.is_empty() && text.to_lowercase().contains(&keyword.to_lowercase())
}

fn is_video_id(s: &str) -> bool {
    s.len() == VIDEO_ID_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Splits text into URL-shaped candidates, each normalized to carry a scheme.
fn candidates(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | '<' | '>'))
        .filter_map(link_start)
        .map(|link| link.trim_end_matches(TRAILING_PUNCTUATION))
        .filter(|link| !link.is_empty())
        .map(|link| {
            if link.contains("://") {
                link.to_string()
            } else {
                format!("https://{link}")
            }
        })
}

/// Finds where a link starts within a whitespace-delimited token.
///
/// Explicit `http(s)://` links win. Otherwise a bare `youtube.com/` or `youtu.be/` is accepted,
/// together with any subdomain directly in front of it.
fn link_start(token: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets stable.
    let lower = token.to_ascii_lowercase();
    if let Some(at) = ["https://", "http://"]
        .iter()
        .filter_map(|scheme| lower.find(scheme))
        .min()
    {
        return Some(&token[at..]);
    }

    let at = ["youtube.com/", "youtu.be/"]
        .iter()
        .filter_map(|host| lower.find(host))
        .min()?;
    let start = token[..at]
        .char_indices()
        .rev()
        .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '.' || c == '-'))
        .map_or(0, |(i, c)| i + c.len_utf8());
    Some(&token[start..])
}

fn video_from_url(candidate: &str) -> Option<VideoRef> {
    let url = Url::parse(candidate).ok()?;
    // `Url` already lowercases the host.
    let host = url.host_str()?;

    if host == "youtu.be" || host.ends_with(".youtu.be") {
        return VideoRef::parse(url.path_segments()?.next()?);
    }

    if host != "youtube.com" && !host.ends_with(".youtube.com") {
        return None;
    }

    let mut segments = url.path_segments()?;
    match segments.next() {
        Some("watch") => v_param(&url),
        Some(prefix) if ID_PATH_PREFIXES.contains(&prefix) => VideoRef::parse(segments.next()?),
        _ => v_param(&url),
    }
}

fn v_param(url: &Url) -> Option<VideoRef> {
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .and_then(|(_, id)| VideoRef::parse(&id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(text: &str) -> Vec<String> {
        extract_all(text)
            .into_iter()
            .map(|v| v.id().to_string())
            .collect()
    }

    #[test]
    fn short_form() {
        let video = extract("check out https://youtu.be/dQw4w9WgXcQ 730Radio").unwrap();
        assert_eq!(video.id(), "dQw4w9WgXcQ");
    }

    #[test]
    fn canonical_form_ignores_other_parameters() {
        let video = extract("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=30s").unwrap();
        assert_eq!(video.id(), "dQw4w9WgXcQ");

        let video = extract("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ").unwrap();
        assert_eq!(video.id(), "dQw4w9WgXcQ");
    }

    #[test]
    fn identifier_case_is_preserved() {
        let video = extract("https://YOUTU.BE/AbCdEfGhIjK").unwrap();
        assert_eq!(video.id(), "AbCdEfGhIjK");
        assert_ne!(video, VideoRef::parse("abcdefghijk").unwrap());
    }

    #[test]
    fn first_match_wins() {
        let video = extract("https://youtu.be/AAAAAAA1111 https://youtu.be/BBBBBBB2222").unwrap();
        assert_eq!(video.id(), "AAAAAAA1111");
    }

    #[test]
    fn all_variants_in_order_without_duplicates() {
        let text = "check these: \
            https://youtu.be/AAAAAAA1111?t=30 \
            https://www.youtube.com/watch?v=BBBBBBB2222&ab_channel=test \
            https://m.youtube.com/shorts/CCCCCCC3333 \
            https://www.youtube.com/embed/DDDDDDD4444?start=10 \
            https://www.youtube.com/v/EEEEEEE5555#t=1m \
            dup: https://youtube.com/watch?v=BBBBBBB2222&feature=share \
            and live: https://www.youtube.com/live/FFFFFFF6666?si=xyz";
        assert_eq!(
            ids(text),
            vec![
                "AAAAAAA1111",
                "BBBBBBB2222",
                "CCCCCCC3333",
                "DDDDDDD4444",
                "EEEEEEE5555",
                "FFFFFFF6666",
            ]
        );
    }

    #[test]
    fn comma_separated_and_scheme_less() {
        let text = "https://youtu.be/GAAAAAA1111,https://youtu.be/HBBBBBB2222, \
            www.youtube.com/watch?v=ICCCCCC3333";
        assert_eq!(ids(text), vec!["GAAAAAA1111", "HBBBBBB2222", "ICCCCCC3333"]);
    }

    #[test]
    fn punctuation_around_links() {
        assert_eq!(ids("(https://youtu.be/AAAAAAA1111)."), vec!["AAAAAAA1111"]);
        assert_eq!(ids("<https://youtu.be/BBBBBBB2222>"), vec!["BBBBBBB2222"]);
        assert_eq!(ids("→youtu.be/CCCCCCC3333"), vec!["CCCCCCC3333"]);
        assert_eq!(ids("[youtu.be/DDDDDDD4444]"), vec!["DDDDDDD4444"]);
    }

    #[test]
    fn v_parameter_on_other_paths() {
        assert_eq!(
            ids("https://www.youtube.com/attribution_link?v=AAAAAAA1111"),
            vec!["AAAAAAA1111"]
        );
    }

    #[test]
    fn nothing_recognizable() {
        for text in [
            "",
            "730radio",
            "just some words about music",
            "https://vimeo.com/123456789",
            "https://notyoutube.com/watch?v=AAAAAAA1111",
            "https://youtube.com/watch?v=tooshort",
            "https://youtube.com/watch?v=waytoolongidentifier",
            "https://youtu.be/",
            "https://youtube.com/playlist?list=PL1234567890",
            "https://youtu.be/AAAA$AA1111",
            "youtube.com",
        ] {
            assert_eq!(extract(text), None, "{text:?}");
        }
    }

    #[test]
    fn parse_checks_shape() {
        assert!(VideoRef::parse("dQw4w9WgXcQ").is_some());
        assert!(VideoRef::parse("a_b-c_d-e_f").is_some());
        assert!(VideoRef::parse("dQw4w9WgXc").is_none());
        assert!(VideoRef::parse("dQw4w9WgXcQ?").is_none());
    }

    #[test]
    fn short_url() {
        let video = VideoRef::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(video.short_url(), "https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(video.to_string(), "dQw4w9WgXcQ");
    }

    #[test]
    fn keyword_is_case_insensitive() {
        assert!(contains_keyword("check out 730Radio", "730radio"));
        assert!(contains_keyword("730RADIO!", "730radio"));
        assert!(!contains_keyword("radio 730", "730radio"));
        assert!(!contains_keyword("anything", ""));
    }
}
