//! Web page retrieval and flattening
//!
//! Fetches a page and condenses its markup to plain text for the model:
//! script/style blocks dropped, tags stripped, entities decoded, whitespace
//! collapsed, and the result truncated to a fixed character budget so one
//! page cannot blow up the context window.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;

/// Character budget for flattened page text.
pub const PAGE_TEXT_BUDGET: usize = 12_000;

const TRUNCATION_MARKER: &str = "... [content truncated]";

lazy_static! {
    static ref SCRIPT_RE: Regex =
        Regex::new(r"(?is)<script\b.*?</script>").expect("script regex");
    static ref STYLE_RE: Regex = Regex::new(r"(?is)<style\b.*?</style>").expect("style regex");
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").expect("tag regex");
}

/// Flatten an HTML document to condensed plain text.
pub fn flatten_html(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, " ");
    let without_styles = STYLE_RE.replace_all(&without_scripts, " ");
    let without_tags = TAG_RE.replace_all(&without_styles, " ");
    let decoded = html_escape::decode_html_entities(&without_tags);

    let condensed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");

    if condensed.chars().count() > PAGE_TEXT_BUDGET {
        let truncated: String = condensed.chars().take(PAGE_TEXT_BUDGET).collect();
        format!("{truncated}{TRUNCATION_MARKER}")
    } else {
        condensed
    }
}

/// Fetch a URL and return its flattened text content.
pub async fn fetch_page_text(url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .user_agent("handsfree/0.2")
        .build()
        .context("failed to build web client")?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to fetch {url}"))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("page fetch returned {}", status.as_u16());
    }

    let body = response.text().await.context("failed to read page body")?;
    Ok(flatten_html(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style_blocks() {
        let html = "<html><head><style>body { color: red }</style>\
                    <script>var x = '<p>not text</p>';</script></head>\
                    <body><h1>Title</h1><p>Hello &amp; welcome</p></body></html>";
        let text = flatten_html(html);
        assert_eq!(text, "Title Hello & welcome");
    }

    #[test]
    fn collapses_whitespace_between_elements() {
        let html = "<div>\n  <span>one</span>\n\n  <span>two</span>\n</div>";
        assert_eq!(flatten_html(html), "one two");
    }

    #[test]
    fn truncates_oversized_pages() {
        let html = format!("<p>{}</p>", "word ".repeat(5_000));
        let text = flatten_html(&html);
        assert!(text.ends_with("... [content truncated]"));
        assert!(text.chars().count() <= PAGE_TEXT_BUDGET + 30);
    }
}
