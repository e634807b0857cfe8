// src/services/navigation.rs

//! Pagination and environmental-section discovery.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::strategies::parse_selector;
use crate::error::Result;
use crate::utils::text::{Term, any_term, collapse_whitespace, fold_lowercase, normalize};
use crate::utils::url::{resolve, same_site};

const PAGE_PARAMS: [&str; 4] = ["page", "strona", "pageno", "p"];
const NEXT_LABELS: [&str; 5] = ["nastepna", "nastepna strona", "dalej", "next", "kolejna"];
const NEXT_SYMBOLS: [&str; 5] = ["»", "›", ">", ">>", "→"];

// Section scoring: (keywords, score) checked against link text and href.
const TEXT_HIGH: [&str; 8] = [
    "decyzje srodowiskowe",
    "decyzji srodowiskowych",
    "srodowiskowych uwarunkowan",
    "uwarunkowan srodowiskowych",
    "karty informacyjne",
    "wykaz danych o srodowisku",
    "publicznie dostepny wykaz",
    "6220",
];
const TEXT_MEDIUM: [&str; 5] = [
    "ochrona srodowiska",
    "ochrony srodowiska",
    "obwieszczenia",
    "decyzje",
    "srodowisk",
];
const TEXT_LOW: [&str; 6] = ["ogloszenia", "tablica", "komunikaty", "ekolog", "klimat", "aktualnosci"];
const HREF_HIGH: [&str; 5] = ["srodowisk", "environment", "6220", "karty-informacyjne", "uwarunkowan"];
const HREF_MEDIUM: [&str; 3] = ["obwieszcz", "decyzj", "ochrona"];
const HREF_LOW: [&str; 3] = ["oglosz", "tablica", "komunikat"];
const SKIP_HREF: [&str; 4] = ["facebook", "twitter", "youtube", "instagram"];

/// Finds continuation links on a listing page.
pub struct Navigator {
    anchor: Selector,
    explicit_next: Selector,
    pager: Selector,
    text_high: Vec<Term>,
    text_medium: Vec<Term>,
    text_low: Vec<Term>,
}

impl Navigator {
    pub fn new() -> Result<Self> {
        let terms = |items: &[&str]| items.iter().map(|s| Term::new(s)).collect::<Vec<_>>();
        Ok(Self {
            anchor: parse_selector("a[href]")?,
            explicit_next: parse_selector("a[rel=\"next\"], a.next, li.next a, .next a")?,
            pager: parse_selector(
                ".pagination a, .pager a, .pages a, a[href*=\"page=\"], a[href*=\"strona=\"], a[href*=\"PageNo=\"]",
            )?,
            text_high: terms(&TEXT_HIGH),
            text_medium: terms(&TEXT_MEDIUM),
            text_low: terms(&TEXT_LOW),
        })
    }

    /// The link to the following listing page, if the page has one.
    ///
    /// An explicit `rel="next"` (or `.next`) link wins. Otherwise pager links
    /// labelled "następna"/"»" or numbered one past the current page qualify.
    pub fn next_page(&self, document: &Html, page_url: &Url) -> Option<Url> {
        let usable = |anchor: ElementRef<'_>| {
            anchor
                .value()
                .attr("href")
                .and_then(|href| resolve(page_url, href))
                .filter(|url| url != page_url && same_site(url, page_url))
        };

        if let Some(url) = document.select(&self.explicit_next).find_map(usable) {
            return Some(url);
        }

        let current = current_page(page_url);
        let mut numbered = None;
        for anchor in document.select(&self.pager) {
            let raw = collapse_whitespace(&anchor.text().collect::<String>());
            let label = normalize(&raw);
            let is_next = NEXT_LABELS.contains(&label.as_str())
                || NEXT_SYMBOLS.contains(&raw.as_str())
                || anchor
                    .value()
                    .attr("title")
                    .is_some_and(|t| normalize(t).starts_with("nastepna"));
            if is_next {
                if let Some(url) = usable(anchor) {
                    return Some(url);
                }
            } else if numbered.is_none() && label.parse::<u32>().ok() == Some(current + 1) {
                numbered = usable(anchor);
            }
        }
        numbered
    }

    /// Same-site links that look like environmental sections, best first.
    pub fn sections(&self, document: &Html, page_url: &Url) -> Vec<Url> {
        let mut scored: Vec<(u32, Url)> = Vec::new();
        for anchor in document.select(&self.anchor) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let href_lower = fold_lowercase(href);
            if SKIP_HREF.iter().any(|s| href_lower.contains(s)) {
                continue;
            }
            let Some(url) = resolve(page_url, href) else {
                continue;
            };
            if &url == page_url || !same_site(&url, page_url) {
                continue;
            }

            let text = normalize(&anchor.text().collect::<String>());
            let score = self.score(&text, &href_lower);
            if score > 0 {
                scored.push((score, url));
            }
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.as_str().cmp(b.1.as_str())));
        let mut seen = HashSet::new();
        scored
            .into_iter()
            .map(|(_, url)| url)
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    fn score(&self, text: &str, href_lower: &str) -> u32 {
        let href_has = |keys: &[&str]| keys.iter().any(|k| href_lower.contains(k));
        let mut score = 0;
        if any_term(&self.text_high, text) {
            score += 10;
        }
        if href_has(&HREF_HIGH) {
            score += 8;
        }
        if any_term(&self.text_medium, text) {
            score += 5;
        }
        if href_has(&HREF_MEDIUM) {
            score += 4;
        }
        if any_term(&self.text_low, text) {
            score += 2;
        }
        if href_has(&HREF_LOW) {
            score += 1;
        }
        score
    }
}

/// Page number from the URL query, 1 when absent.
fn current_page(url: &Url) -> u32 {
    url.query_pairs()
        .find(|(key, _)| PAGE_PARAMS.contains(&key.to_lowercase().as_str()))
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_explicit_next_link() {
        let html = r#"<div class="pagination"><a href="?page=1">1</a>
            <a rel="next" href="?page=2">›</a></div>"#;
        let navigator = Navigator::new().unwrap();
        let doc = Html::parse_document(html);
        let next = navigator.next_page(&doc, &url("https://bip.x.pl/ogloszenia"));
        assert_eq!(next.unwrap().as_str(), "https://bip.x.pl/ogloszenia?page=2");
    }

    #[test]
    fn test_numbered_pager_uses_current_page() {
        let html = r#"<ul class="pager">
            <li><a href="/lista?strona=1">1</a></li>
            <li><a href="/lista?strona=2">2</a></li>
            <li><a href="/lista?strona=3">3</a></li></ul>"#;
        let navigator = Navigator::new().unwrap();
        let doc = Html::parse_document(html);
        let next = navigator.next_page(&doc, &url("https://bip.x.pl/lista?strona=2"));
        assert_eq!(next.unwrap().as_str(), "https://bip.x.pl/lista?strona=3");
    }

    #[test]
    fn test_labelled_next_and_last_page() {
        let navigator = Navigator::new().unwrap();
        let html = r#"<div class="pages"><a href="/l?page=4">Następna</a></div>"#;
        let doc = Html::parse_document(html);
        assert_eq!(
            navigator
                .next_page(&doc, &url("https://bip.x.pl/l?page=3"))
                .unwrap()
                .as_str(),
            "https://bip.x.pl/l?page=4"
        );

        let last = Html::parse_document(r#"<div class="pagination"><a href="/l?page=1">1</a></div>"#);
        assert!(navigator.next_page(&last, &url("https://bip.x.pl/l?page=1")).is_none());
    }

    #[test]
    fn test_next_link_to_other_site_is_ignored() {
        let navigator = Navigator::new().unwrap();
        let doc = Html::parse_document(r#"<a rel="next" href="https://elsewhere.pl/2">dalej</a>"#);
        assert!(navigator.next_page(&doc, &url("https://bip.x.pl/")).is_none());
    }

    #[test]
    fn test_sections_scored_and_same_site() {
        let html = r##"
            <a href="/tablica-ogloszen">Tablica ogłoszeń</a>
            <a href="/ochrona-srodowiska/decyzje">Decyzje środowiskowe</a>
            <a href="/obwieszczenia">Obwieszczenia</a>
            <a href="https://facebook.com/gmina">Facebook</a>
            <a href="https://inny.pl/srodowisko">Środowisko</a>
            <a href="/kontakt">Kontakt</a>
            <a href="#top">Środowisko</a>"##;
        let navigator = Navigator::new().unwrap();
        let doc = Html::parse_document(html);
        let sections = navigator.sections(&doc, &url("https://www.bip.gmina.pl/"));
        let paths: Vec<&str> = sections.iter().map(|u| u.path()).collect();
        assert_eq!(
            paths,
            vec!["/ochrona-srodowiska/decyzje", "/obwieszczenia", "/tablica-ogloszen"]
        );
    }
}
