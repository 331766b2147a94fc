//! Canonical cache keys for source links.

use url::Url;

const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com"];

/// Rewrite a source link to the form used as its cache key.
///
/// YouTube shorts, `youtu.be` links, mobile links and watch links with extra
/// query parameters all collapse to `https://www.youtube.com/watch?v=<id>`.
/// Other links are trimmed and lose their `#fragment`. Text that is not a
/// URL is returned trimmed. The result is a fixed point:
/// `normalize_url(&normalize_url(u)) == normalize_url(u)`.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();

    let Some(mut parsed) = parse_lenient(trimmed) else {
        return trimmed.to_string();
    };

    if let Some(id) = youtube_video_id(&parsed) {
        return format!("https://www.youtube.com/watch?v={id}");
    }

    if !trimmed.contains("://") {
        // Don't invent a scheme for links we don't canonicalize.
        return trimmed.split('#').next().unwrap_or(trimmed).to_string();
    }

    parsed.set_fragment(None);
    parsed.into()
}

/// Parse `input`, assuming `https://` when no scheme is present.
fn parse_lenient(input: &str) -> Option<Url> {
    if input.is_empty() || input.contains(char::is_whitespace) {
        return None;
    }
    let url = if input.contains("://") {
        Url::parse(input).ok()?
    } else {
        Url::parse(&format!("https://{input}")).ok()?
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Video ID of a YouTube watch, shorts or `youtu.be` link.
fn youtube_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let mut segments = url.path_segments()?;

    let id = if host == "youtu.be" {
        segments.next()?.to_string()
    } else if YOUTUBE_HOSTS.contains(&host) {
        match segments.next()? {
            "shorts" => segments.next()?.to_string(),
            "watch" => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())?,
            _ => return None,
        }
    } else {
        return None;
    };

    is_video_id(&id).then_some(id)
}

fn is_video_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
