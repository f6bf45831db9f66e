// HTML sites with hoster mirrors
pub mod animesonlinex;
pub mod einfach;
pub mod latanime;
pub mod voircartoon;
pub mod zoro;

// JSON APIs
pub mod jellyfin;
pub mod vizer;

use crate::helpers::{absolute_url, attr, select, select_first, url_without_domain};
use crate::models::{AnimesPage, ListingItem};
use scraper::{ElementRef, Html};

/// Parse a listing page: every element matching `item_selector` goes through
/// `parse_item`; the page has a next page when `next_selector` matches.
pub(crate) fn parse_listing<F>(
    html: &str,
    item_selector: &str,
    next_selector: Option<&str>,
    parse_item: F,
) -> AnimesPage
where
    F: Fn(ElementRef) -> Option<ListingItem>,
{
    let document = Html::parse_document(html);
    let root = document.root_element();

    let items = select(root, item_selector)
        .into_iter()
        .filter_map(|element| parse_item(element))
        .collect();
    let has_next_page = next_selector
        .map(|selector| select_first(root, selector).is_some())
        .unwrap_or(false);

    AnimesPage::new(items, has_next_page)
}

/// Absolute image URL from the first non-empty lazy-load or `src` attribute.
pub(crate) fn image_url(img: ElementRef, base_url: &str) -> Option<String> {
    ["data-lazy-src", "data-src", "src"]
        .iter()
        .map(|name| attr(img, name))
        .find(|value| !value.trim().is_empty())
        .map(|value| absolute_url(base_url, value.trim()))
}

/// Listing item built from a link element's `href`, stored without the domain.
pub(crate) fn listing_item(href: &str, title: String, thumbnail_url: Option<String>) -> Option<ListingItem> {
    if href.trim().is_empty() {
        return None;
    }
    Some(ListingItem {
        title,
        url: url_without_domain(href.trim()),
        thumbnail_url,
    })
}

/// `base` + `path`, tolerating a missing or doubled slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_and_next_page() {
        let html = r#"<div class="list">
            <a class="item" href="https://site.example/anime/a" title="A"><img data-src="/a.jpg"></a>
            <a class="item" href="" title="broken"></a>
            <a class="item" href="/anime/b" title="B"><img src="https://cdn.example/b.jpg"></a>
        </div><a class="next" href="/page/2">next</a>"#;

        let page = parse_listing(html, "a.item", Some("a.next"), |el| {
            let thumb = select_first(el, "img").and_then(|img| image_url(img, "https://site.example"));
            listing_item(&attr(el, "href"), attr(el, "title"), thumb)
        });

        assert!(page.has_next_page);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].url, "/anime/a");
        assert_eq!(page.items[0].thumbnail_url.as_deref(), Some("https://site.example/a.jpg"));
        assert_eq!(page.items[1].title, "B");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.example/", "/x/y"), "https://a.example/x/y");
        assert_eq!(join_url("https://a.example", "x"), "https://a.example/x");
        assert_eq!(join_url("https://a.example", "https://b.example/z"), "https://b.example/z");
    }
}
