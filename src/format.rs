// Display formatting helpers shared by every adapter.
// Relative times, abbreviated counts, durations and light text cleanup.

use chrono::{DateTime, Utc};

/// Boundaries at which a relative time switches to a coarser unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeScale {
    /// Ages below this many hours render as `{h}h`.
    pub hour_limit: i64,
    /// Ages below this many days render as `{d}d`.
    pub day_limit: i64,
}

impl TimeScale {
    pub const GITHUB: TimeScale = TimeScale {
        hour_limit: 24,
        day_limit: 30,
    };
    pub const REDDIT: TimeScale = TimeScale {
        hour_limit: 24,
        day_limit: 30,
    };
    pub const SUBSTACK: TimeScale = TimeScale {
        hour_limit: 48,
        day_limit: 30,
    };
    pub const YOUTUBE: TimeScale = TimeScale {
        hour_limit: 24,
        day_limit: 7,
    };
}

/// Letter case of count suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Lower,
    Upper,
}

/// Compact age of `then` relative to `now`, e.g. `45m`, `3h`, `2d`, `5mo`.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>, scale: TimeScale) -> String {
    let secs = now.signed_duration_since(then).num_seconds();
    if secs < 60 {
        return "now".to_string();
    }

    let minutes = secs / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < scale.hour_limit {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < scale.day_limit {
        return format!("{}d", days.max(1));
    }
    if days < 30 {
        return format!("{}w", (days / 7).max(1));
    }
    if days < 365 {
        return format!("{}mo", (days / 30).max(1));
    }
    format!("{}y", days / 365)
}

/// Relative time from a unix timestamp in seconds.
pub fn relative_time_from_epoch(epoch_secs: f64, now: DateTime<Utc>, scale: TimeScale) -> String {
    match DateTime::from_timestamp(epoch_secs as i64, 0) {
        Some(then) => relative_time(then, now, scale),
        None => String::new(),
    }
}

/// Abbreviate a count: `999`, `1.0k`, `12.3k`, `1.5m`, `2.0b`.
pub fn abbreviate(n: u64, case: Case) -> String {
    if n < 1_000 {
        return n.to_string();
    }

    const UNITS: [(f64, char); 3] = [(1e9, 'b'), (1e6, 'm'), (1e3, 'k')];
    for (div, suffix) in UNITS {
        let value = (n as f64 / div * 10.0).round() / 10.0;
        if value >= 1.0 {
            let suffix = match case {
                Case::Lower => suffix,
                Case::Upper => suffix.to_ascii_uppercase(),
            };
            return format!("{:.1}{}", value, suffix);
        }
    }
    n.to_string()
}

/// Parse a display count such as `1,234`, `12.5K` or `3M` back into a number.
pub fn parse_abbreviated(text: &str) -> Option<u64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    let (number, multiplier) = match cleaned.chars().last()? {
        'k' | 'K' => (&cleaned[..cleaned.len() - 1], 1e3),
        'm' | 'M' => (&cleaned[..cleaned.len() - 1], 1e6),
        'b' | 'B' => (&cleaned[..cleaned.len() - 1], 1e9),
        _ => (cleaned.as_str(), 1.0),
    };
    let value: f64 = number.trim().parse().ok()?;
    if value < 0.0 {
        return None;
    }
    Some((value * multiplier).round() as u64)
}

/// Format a duration in seconds as `m:ss` or `h:mm:ss`.
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Cut `text` to at most `max` characters, appending `...` when shortened.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

/// Collapse every run of whitespace (newlines included) into a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the HTML/XML entities that show up in upstream payloads.
pub fn decode_html_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let hex = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X"));
            let code = match hex {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => name.strip_prefix('#')?.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Remove tags from an HTML fragment, leaving decoded text.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    collapse_whitespace(&decode_html_entities(&out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ago(duration: Duration, scale: TimeScale) -> String {
        let now = Utc::now();
        relative_time(now - duration, now, scale)
    }

    #[test]
    fn test_relative_minutes() {
        assert_eq!(ago(Duration::minutes(45), TimeScale::GITHUB), "45m");
        assert!(ago(Duration::minutes(45), TimeScale::YOUTUBE).ends_with('m'));
    }

    #[test]
    fn test_relative_now() {
        assert_eq!(ago(Duration::seconds(20), TimeScale::REDDIT), "now");
        assert_eq!(ago(Duration::seconds(-300), TimeScale::REDDIT), "now");
    }

    #[test]
    fn test_relative_thirty_hours_per_scale() {
        assert_eq!(ago(Duration::hours(30), TimeScale::GITHUB), "1d");
        assert_eq!(ago(Duration::hours(30), TimeScale::REDDIT), "1d");
        assert_eq!(ago(Duration::hours(30), TimeScale::SUBSTACK), "30h");
        assert_eq!(ago(Duration::hours(30), TimeScale::YOUTUBE), "1d");
    }

    #[test]
    fn test_relative_coarse_units() {
        assert_eq!(ago(Duration::days(10), TimeScale::YOUTUBE), "1w");
        assert_eq!(ago(Duration::days(10), TimeScale::GITHUB), "10d");
        assert_eq!(ago(Duration::days(90), TimeScale::GITHUB), "3mo");
        assert_eq!(ago(Duration::days(800), TimeScale::SUBSTACK), "2y");
    }

    #[test]
    fn test_relative_from_epoch() {
        let now = Utc::now();
        let then = (now - Duration::hours(5)).timestamp() as f64;
        assert_eq!(relative_time_from_epoch(then, now, TimeScale::REDDIT), "5h");
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate(0, Case::Lower), "0");
        assert_eq!(abbreviate(999, Case::Lower), "999");
        assert_eq!(abbreviate(1_000, Case::Lower), "1.0k");
        assert_eq!(abbreviate(1_000, Case::Upper), "1.0K");
        assert_eq!(abbreviate(12_345, Case::Upper), "12.3K");
        assert_eq!(abbreviate(1_500_000, Case::Lower), "1.5m");
        assert_eq!(abbreviate(1_500_000, Case::Upper), "1.5M");
        assert_eq!(abbreviate(999_999, Case::Upper), "1.0M");
        assert_eq!(abbreviate(2_000_000_000, Case::Upper), "2.0B");
    }

    #[test]
    fn test_parse_abbreviated() {
        assert_eq!(parse_abbreviated("1,234"), Some(1234));
        assert_eq!(parse_abbreviated("12.5K"), Some(12_500));
        assert_eq!(parse_abbreviated("3M"), Some(3_000_000));
        assert_eq!(parse_abbreviated("abc"), None);
        assert_eq!(parse_abbreviated(""), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(3723), "1:02:03");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        let long = "a".repeat(300);
        let cut = truncate_chars(&long, 120);
        assert_eq!(cut.chars().count(), 123);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a\n\nb \n c"), "a b c");
    }

    #[test]
    fn test_decode_html_entities() {
        assert_eq!(
            decode_html_entities("https://x.com/a.png?w=1&amp;s=2"),
            "https://x.com/a.png?w=1&s=2"
        );
        assert_eq!(decode_html_entities("&lt;b&gt; &#39;q&#x27;"), "<b> 'q'");
        assert_eq!(decode_html_entities("fish & chips"), "fish & chips");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
    }
}
