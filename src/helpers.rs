//! Helper functions shared by sources and hoster extractors
//!
//! - CSS selection with jsoup-like text semantics
//! - base64 embed decoding
//! - JSON string unescaping for HTML embedded in ajax payloads
//! - URL and date helpers
//!
//! # Examples
//!
//! ```
//! use rust_anime_scraper::helpers::{substring_after, url_without_domain};
//!
//! assert_eq!(substring_after("Episode 12", " "), "12");
//! assert_eq!(url_without_domain("https://example.org/anime/x?p=1"), "/anime/x?p=1");
//! ```

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

/// All descendants of `scope` matching `css`. An invalid selector matches nothing.
pub fn select<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(_) => {
            log::error!("Invalid selector: {}", css);
            Vec::new()
        }
    }
}

pub fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    scope.select(&selector).next()
}

/// Text content with whitespace collapsed, like jsoup's `text()`.
pub fn element_text(element: ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Text of the element's direct text children only.
pub fn own_text(element: ElementRef) -> String {
    let raw: String = element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect();
    collapse_whitespace(&raw)
}

pub fn first_text(scope: ElementRef, css: &str) -> Option<String> {
    select_first(scope, css).map(element_text)
}

/// Attribute value, empty when absent.
pub fn attr(element: ElementRef, name: &str) -> String {
    element.value().attr(name).unwrap_or_default().to_string()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode a base64 value, tolerating line breaks and missing padding.
pub fn decode_base64(value: &str) -> Option<String> {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(&cleaned)
        .or_else(|_| STANDARD_NO_PAD.decode(cleaned.trim_end_matches('=')))
        .ok()?;
    String::from_utf8(bytes).ok()
}

pub fn encode_base64(value: &str) -> String {
    STANDARD.encode(value)
}

/// Decode a base64-wrapped embed fragment and return the `src` of its iframe.
pub fn decode_iframe_src(encoded: &str) -> Option<String> {
    let html = decode_base64(encoded)?;
    let fragment = Html::parse_fragment(&html);
    let src = select_first(fragment.root_element(), "iframe")?
        .value()
        .attr("src")?
        .trim()
        .to_string();
    if src.is_empty() {
        None
    } else {
        Some(src)
    }
}

/// Unescape the body of a JSON string literal (`\"`, `\/`, `\n`, `\uXXXX`, ...).
pub fn unescape_json_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Text after the first `delim`, or the whole string when absent.
pub fn substring_after<'a>(s: &'a str, delim: &str) -> &'a str {
    s.find(delim).map(|i| &s[i + delim.len()..]).unwrap_or(s)
}

/// Text before the first `delim`, or the whole string when absent.
pub fn substring_before<'a>(s: &'a str, delim: &str) -> &'a str {
    s.find(delim).map(|i| &s[..i]).unwrap_or(s)
}

pub fn substring_after_last<'a>(s: &'a str, delim: &str) -> &'a str {
    s.rfind(delim).map(|i| &s[i + delim.len()..]).unwrap_or(s)
}

pub fn substring_before_last<'a>(s: &'a str, delim: &str) -> &'a str {
    s.rfind(delim).map(|i| &s[..i]).unwrap_or(s)
}

/// Path, query and fragment of `url`; relative input is returned unchanged.
pub fn url_without_domain(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let mut out = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                out.push('?');
                out.push_str(query);
            }
            if let Some(fragment) = parsed.fragment() {
                out.push('#');
                out.push_str(fragment);
            }
            out
        }
        Err(_) => url.to_string(),
    }
}

/// Resolve `href` against `base`; falls back to `href` when either is unusable.
pub fn absolute_url(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// `scheme://host[:port]` of `url`.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Parse a date with a chrono format string into epoch milliseconds.
pub fn parse_date_millis(text: &str, format: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(text.trim(), format).ok()?;
    let datetime = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&datetime).timestamp_millis())
}

/// Parse a bare year ("2019") into epoch milliseconds of January 1st.
pub fn parse_year_millis(text: &str) -> Option<i64> {
    let year: i32 = text.trim().parse().ok()?;
    let datetime = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&datetime).timestamp_millis())
}

/// Build a deep-link search query (`prefix` + second path segment) from a site URL,
/// e.g. `https://site/anime/<id>` → `id:<id>`.
pub fn deep_link_query(url: &str, prefix: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    if segments.len() > 1 {
        Some(format!("{}{}", prefix, segments[1]))
    } else {
        log::error!("Could not parse deep link from {}", url);
        None
    }
}
