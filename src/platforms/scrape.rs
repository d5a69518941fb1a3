// Scraping helpers for loosely structured upstream pages.
// Tag/attribute pattern matching for feeds, JSON-in-HTML extraction and strategy chains.

use serde_json::Value;
use tracing::debug;

use crate::format::decode_html_entities;

/// A named extraction strategy over a fetched page.
pub struct Strategy<'a, T> {
    pub name: &'static str,
    pub extract: &'a dyn Fn(&str) -> Option<T>,
}

/// Try each strategy in order and return the first usable result with its name.
///
/// A strategy that matches but fails to produce a value is logged and skipped.
pub fn first_match<T>(
    platform: &str,
    page: &str,
    strategies: &[Strategy<'_, T>],
) -> Option<(&'static str, T)> {
    for strategy in strategies {
        match (strategy.extract)(page) {
            Some(value) => {
                debug!(platform, strategy = strategy.name, "Extraction strategy matched");
                return Some((strategy.name, value));
            }
            None => debug!(platform, strategy = strategy.name, "Extraction strategy missed"),
        }
    }
    None
}

/// Raw contents of every `<tag>...</tag>` block, in document order.
pub fn xml_blocks<'a>(text: &'a str, tag: &str) -> Vec<&'a str> {
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some((content_start, _)) = find_open_tag(rest, tag) {
        let after = &rest[content_start..];
        let Some(end) = after.find(&close) else {
            break;
        };
        blocks.push(&after[..end]);
        rest = &after[end + close.len()..];
    }
    blocks
}

/// Decoded text of the first `<tag>...</tag>` in `text`, CDATA unwrapped.
pub fn xml_text(text: &str, tag: &str) -> Option<String> {
    let raw = xml_blocks(text, tag).into_iter().next()?;
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .map(str::to_string)
        .unwrap_or_else(|| decode_html_entities(trimmed));
    let inner = inner.trim().to_string();
    (!inner.is_empty()).then_some(inner)
}

/// Value of `attr` on the first `<tag ...>` in `text`.
pub fn xml_attr(text: &str, tag: &str, attr: &str) -> Option<String> {
    let (_, attrs) = find_open_tag(text, tag)?;
    attr_value(attrs, attr)
}

/// Value of `attr` within a tag's attribute string.
pub fn attr_value(attrs: &str, attr: &str) -> Option<String> {
    let needle = format!("{}=", attr);
    let mut search = attrs;
    loop {
        let pos = search.find(&needle)?;
        let preceded_ok = pos == 0
            || search[..pos]
                .chars()
                .last()
                .is_some_and(|c| c.is_whitespace());
        let after = &search[pos + needle.len()..];
        if preceded_ok {
            let quote = after.chars().next()?;
            if quote == '"' || quote == '\'' {
                let value = &after[1..];
                let end = value.find(quote)?;
                return Some(decode_html_entities(&value[..end]));
            }
        }
        search = after;
    }
}

/// Locate `<tag` followed by whitespace, `/` or `>`.
/// Returns the index just past the opening tag and the attribute text.
fn find_open_tag<'a>(text: &'a str, tag: &str) -> Option<(usize, &'a str)> {
    let open = format!("<{}", tag);
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(&open) {
        let start = offset + pos;
        let after_name = start + open.len();
        match text[after_name..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => {
                let end = after_name + text[after_name..].find('>')?;
                let attrs = text[after_name..end].trim_end_matches('/');
                return Some((end + 1, attrs));
            }
            _ => offset = after_name,
        }
    }
    None
}

/// Inner text of the `<script>` element carrying `id="{id}"`.
pub fn script_by_id<'a>(html: &'a str, id: &str) -> Option<&'a str> {
    let marker = format!("id=\"{}\"", id);
    let pos = html.find(&marker)?;
    let open_end = pos + html[pos..].find('>')? + 1;
    let close = html[open_end..].find("</script>")?;
    Some(&html[open_end..open_end + close])
}

/// Parse the first JSON value starting at `text`, ignoring whatever follows it.
pub fn leading_json(text: &str) -> Option<Value> {
    let start = text.find(['{', '['])?;
    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<Value>()
        .next()?
        .ok()
}

/// Parse the JSON object assigned right after `marker`, e.g. `window._sharedData = {...};`.
pub fn json_after(html: &str, marker: &str) -> Option<Value> {
    let pos = html.find(marker)?;
    leading_json(&html[pos + marker.len()..])
}

/// Content of `<meta property="{property}" content="...">` (or `name=`).
pub fn meta_content(html: &str, property: &str) -> Option<String> {
    let mut rest = html;
    while let Some((end, attrs)) = find_open_tag(rest, "meta") {
        let matches = attr_value(attrs, "property").as_deref() == Some(property)
            || attr_value(attrs, "name").as_deref() == Some(property);
        if matches {
            return attr_value(attrs, "content");
        }
        rest = &rest[end..];
    }
    None
}

/// Undo JSON string escaping of a value captured by a regex (e.g. `\u002F`).
pub fn unescape_json_str(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<rss><channel>
        <title><![CDATA[My Letter]]></title>
        <link>https://letter.substack.com</link>
        <item><title>First &amp; best</title><link>https://a/p/first</link></item>
        <item><title>Second</title><enclosure url="https://img/2.png" type="image/png"/></item>
        </channel></rss>"#;

    #[test]
    fn test_xml_text_unwraps_cdata() {
        assert_eq!(xml_text(FEED, "title").as_deref(), Some("My Letter"));
        assert_eq!(
            xml_text(FEED, "link").as_deref(),
            Some("https://letter.substack.com")
        );
        assert!(xml_text(FEED, "missing").is_none());
    }

    #[test]
    fn test_xml_blocks() {
        let items = xml_blocks(FEED, "item");
        assert_eq!(items.len(), 2);
        assert_eq!(xml_text(items[0], "title").as_deref(), Some("First & best"));
        assert_eq!(
            xml_attr(items[1], "enclosure", "url").as_deref(),
            Some("https://img/2.png")
        );
    }

    #[test]
    fn test_open_tag_requires_boundary() {
        let text = "<titles>x</titles><title>y</title>";
        assert_eq!(xml_text(text, "title").as_deref(), Some("y"));
    }

    #[test]
    fn test_attr_value_requires_boundary() {
        assert_eq!(
            attr_value(r#"data-url="a" url="b""#, "url").as_deref(),
            Some("b")
        );
    }

    #[test]
    fn test_script_by_id_and_leading_json() {
        let html = r#"<html><script id="DATA" type="application/json">{"a": {"b": 1}}</script>"#;
        let script = script_by_id(html, "DATA").unwrap();
        assert_eq!(leading_json(script).unwrap()["a"]["b"], 1);
    }

    #[test]
    fn test_json_after_ignores_trailing_text() {
        let html = r#"<script>window._sharedData = {"x": [1, 2]};</script>"#;
        let value = json_after(html, "window._sharedData = ").unwrap();
        assert_eq!(value["x"][1], 2);
    }

    #[test]
    fn test_meta_content() {
        let html = r#"<head><meta name="viewport" content="w"><meta property="og:image" content="https://x/a.jpg?a=1&amp;b=2" /></head>"#;
        assert_eq!(
            meta_content(html, "og:image").as_deref(),
            Some("https://x/a.jpg?a=1&b=2")
        );
        assert!(meta_content(html, "og:title").is_none());
    }

    #[test]
    fn test_first_match_skips_failed_strategies() {
        let fail = |_: &str| -> Option<u32> { None };
        let ok = |page: &str| -> Option<u32> { Some(page.len() as u32) };
        let strategies = [
            Strategy {
                name: "fail",
                extract: &fail,
            },
            Strategy {
                name: "ok",
                extract: &ok,
            },
        ];

        assert_eq!(first_match("test", "abc", &strategies), Some(("ok", 3)));
        assert_eq!(first_match::<u32>("test", "abc", &strategies[..1]), None);
    }

    #[test]
    fn test_unescape_json_str() {
        assert_eq!(
            unescape_json_str(r"https:\u002F\u002Fcdn.example\u002Fa.jpg"),
            "https://cdn.example/a.jpg"
        );
    }
}
