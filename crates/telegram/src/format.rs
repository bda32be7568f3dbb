//! Message size limits and the HTML to plain-text fallback.

pub use botdeck_common::text::escape_html;

/// Telegram message length limit (UTF-8 bytes are a safe upper bound).
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Photo caption limit.
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;

pub fn truncate_at_char_boundary(text: &str, max_len: usize) -> &str {
    &text[..text.floor_char_boundary(max_len)]
}

/// Split `text` into pieces of at most `max_len` bytes, preferring line
/// breaks, then spaces, then any char boundary.
///
/// Our HTML never spans lines, so splitting at a newline keeps tags
/// balanced.
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.len() > max_len {
        let mut window = remaining.floor_char_boundary(max_len);
        if window == 0 {
            window = remaining
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(remaining.len());
        }

        let slice = &remaining[..window];
        let split_at = match slice.rfind('\n').or_else(|| slice.rfind(' ')) {
            Some(0) | None => window,
            Some(at) => at,
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start_matches(['\n', ' ']);
    }

    if !remaining.is_empty() || chunks.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}

/// Turn our Telegram HTML back into readable plain text: drop tags and
/// decode the entities [`escape_html`] produces.
pub fn html_to_plain(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {},
            _ => out.push(c),
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_message("hello", 4096), vec!["hello"]);
        assert_eq!(chunk_message("", 4096), vec![""]);
    }

    #[test]
    fn prefers_newlines() {
        let text = format!("{}\n{}", "a".repeat(10), "b".repeat(10));
        assert_eq!(chunk_message(&text, 15), vec!["a".repeat(10), "b".repeat(10)]);
    }

    #[test]
    fn falls_back_to_spaces_then_hard_split() {
        assert_eq!(chunk_message("aaaa bbbb", 6), vec!["aaaa", "bbbb"]);
        assert_eq!(chunk_message("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn respects_utf8_boundary() {
        let text = format!("{}лz", "a".repeat(4095));
        let chunks = chunk_message(&text, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4095);
        assert_eq!(chunks[1], "лz");
    }

    #[test]
    fn every_chunk_fits() {
        let text = "word ".repeat(3_000);
        let chunks = chunk_message(&text, TELEGRAM_MAX_MESSAGE_LEN);
        assert!(chunks.len() >= 4);
        assert!(chunks.iter().all(|c| c.len() <= TELEGRAM_MAX_MESSAGE_LEN));
    }

    #[test]
    fn truncate_handles_utf8() {
        let text = format!("{}л", "a".repeat(1023));
        assert_eq!(truncate_at_char_boundary(&text, 1024).len(), 1023);
    }

    #[rstest]
    #[case("<b>Movie</b> (2024)", "Movie (2024)")]
    #[case("Tom &amp; Jerry &lt;3", "Tom & Jerry <3")]
    #[case("<a href=\"https://imdb.com\">IMDb</a>", "IMDb")]
    #[case("plain", "plain")]
    fn html_to_plain_strips_markup(#[case] html: &str, #[case] plain: &str) {
        assert_eq!(html_to_plain(html), plain);
    }

    #[test]
    fn escaped_text_round_trips_through_plain() {
        let original = "a < b && c > d";
        assert_eq!(html_to_plain(&escape_html(original)), original);
    }
}
