//! HTML to plain text normalization

use scraper::{Html, Selector};

use crate::entry::FeedEntry;

/// Plain text of an entry, or an empty string when it carries no text
pub fn clean_text(entry: &FeedEntry) -> String {
    entry.text_html().map(strip_html).unwrap_or_default()
}

/// Strip HTML tags from text
///
/// The fragment is parsed as HTML, so entities are decoded and comments
/// dropped. Text nodes are trimmed and joined with single spaces.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);

    fragment
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract image URL from HTML content (the `src` of the first `<img>`)
pub fn extract_image_from_html(html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    let selector = Selector::parse("img").ok()?;

    let src = fragment.select(&selector).next()?.value().attr("src")?.trim();
    if src.is_empty() {
        return None;
    }
    Some(src.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryContent;

    #[test]
    fn test_strip_html() {
        let html = "<p>Hello <b>world</b>!</p>";
        assert_eq!(strip_html(html), "Hello world !");
    }

    #[test]
    fn test_tags_become_spaces() {
        assert_eq!(strip_html("<p>Hello</p><p>World</p>"), "Hello World");
        assert_eq!(strip_html("line<br/>break"), "line break");
    }

    #[test]
    fn test_entities_and_whitespace() {
        assert_eq!(
            strip_html("  Caf&eacute;&nbsp;&amp;\n\t p&#227;o &#x21; "),
            "Café & pão !"
        );
        assert_eq!(
            strip_html("S&Atilde;O PAULO &ndash; 1&ordm; lugar &laquo;alta&raquo; &euro;5"),
            "SÃO PAULO – 1º lugar «alta» €5"
        );
        // decoded text is not decoded again
        assert_eq!(strip_html("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_comments_and_bare_brackets() {
        assert_eq!(strip_html("<p>keep</p><!-- a > b --><p>this</p>"), "keep this");
        assert_eq!(strip_html("a < b"), "a < b");
    }

    #[test]
    fn test_clean_text_uses_precedence() {
        let entry = FeedEntry {
            description: Some("<b>desc</b>".to_string()),
            content: vec![EntryContent {
                value: Some("<i>content</i>".to_string()),
            }],
            ..Default::default()
        };
        assert_eq!(clean_text(&entry), "desc");
        assert_eq!(clean_text(&FeedEntry::default()), "");
    }

    #[test]
    fn test_extract_image_from_html() {
        assert_eq!(
            extract_image_from_html(r#"<p>x</p><IMG class="a" SRC="https://i.example.com/a.jpg"/>"#)
                .as_deref(),
            Some("https://i.example.com/a.jpg")
        );
        assert_eq!(extract_image_from_html("<p>no image</p>"), None);
    }

    #[test]
    fn test_extract_image_reads_src_attribute_only() {
        assert_eq!(
            extract_image_from_html(
                r#"<img data-src="https://i.example.com/placeholder.gif" src="https://i.example.com/real.jpg">"#
            )
            .as_deref(),
            Some("https://i.example.com/real.jpg")
        );
        assert_eq!(
            extract_image_from_html("<p><img src=http://x/y.jpg></p>").as_deref(),
            Some("http://x/y.jpg")
        );
    }
}
