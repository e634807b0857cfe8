// src/services/strategies.rs

//! Listing extraction strategies.
//!
//! Each strategy turns a parsed page into [`Candidate`]s: the raw title, link,
//! date text and surrounding block of one notice. Turning candidates into
//! records (relevance gate, date, stage, signature) is the extractor's job.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::ListingPattern;
use crate::utils::text::{Term, any_term, collapse_whitespace, normalize};
use crate::utils::url::resolve;

/// Name of the labelled-table strategy, usable as a structure hint.
pub const LABELED_TABLE: &str = "labeled_table";
/// Name of the generic fallback strategy.
pub const HEURISTIC: &str = "heuristic";

// Blocks longer than this are page containers, not notice entries.
const MAX_BLOCK_CHARS: usize = 1_200;

/// One notice as located on a page, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub link: Option<Url>,
    /// Text of a dedicated date element or column
    pub date_text: Option<String>,
    /// Whole text of the row or block the notice sits in
    pub block_text: String,
    /// Text of a dedicated signature column
    pub signature_text: Option<String>,
    /// Text of a dedicated location column
    pub location_text: Option<String>,
}

/// Parsed page handed to strategies.
pub struct PageDocument<'a> {
    pub document: &'a Html,
    pub url: &'a Url,
    /// Lowercased raw HTML, for marker detection
    pub html_lower: &'a str,
}

/// A way of locating notices on a page.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this strategy should be tried on the page at all.
    fn detect(&self, page: &PageDocument<'_>) -> bool;

    fn candidates(&self, page: &PageDocument<'_>) -> Vec<Candidate>;

    /// Minimum candidates for the strategy's output to be trusted.
    fn min_rows(&self) -> usize {
        1
    }

    /// True for the catch-all strategy; its use marks the page degraded.
    fn is_fallback(&self) -> bool {
        false
    }
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

// --- Listing patterns ---

/// Repeating rows located by configured CSS selectors.
pub struct ListingStrategy {
    name: String,
    detect_url_contains: Option<String>,
    detect_html_contains: Option<String>,
    row: Selector,
    title: Selector,
    date: Option<Selector>,
    link_attr: String,
}

impl ListingStrategy {
    pub fn from_pattern(pattern: &ListingPattern) -> Result<Self> {
        Ok(Self {
            name: pattern.name.clone(),
            detect_url_contains: pattern.detect_url_contains.clone(),
            detect_html_contains: pattern.detect_html_contains.as_ref().map(|s| s.to_lowercase()),
            row: parse_selector(&pattern.row_selector)?,
            title: parse_selector(&pattern.title_selector)?,
            date: pattern.date_selector.as_deref().map(parse_selector).transpose()?,
            link_attr: pattern.link_attr.clone(),
        })
    }

    /// True when the pattern only applies to pages carrying its URL or HTML marker.
    pub fn is_targeted(&self) -> bool {
        self.detect_url_contains.is_some() || self.detect_html_contains.is_some()
    }

    fn parse_row(&self, row: &ElementRef<'_>, page_url: &Url) -> Option<Candidate> {
        let title_elem = row.select(&self.title).next()?;
        let title = element_text(&title_elem);
        if title.is_empty() {
            return None;
        }

        let link = title_elem
            .value()
            .attr(&self.link_attr)
            .and_then(|href| resolve(page_url, href));

        let date_text = self
            .date
            .as_ref()
            .and_then(|sel| row.select(sel).next())
            .map(|el| {
                el.value()
                    .attr("datetime")
                    .map(str::to_string)
                    .unwrap_or_else(|| element_text(&el))
            })
            .filter(|t| !t.is_empty());

        Some(Candidate {
            title,
            link,
            date_text,
            block_text: element_text(row),
            ..Candidate::default()
        })
    }
}

impl ExtractionStrategy for ListingStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, page: &PageDocument<'_>) -> bool {
        match (&self.detect_url_contains, &self.detect_html_contains) {
            (None, None) => true,
            (url_marker, html_marker) => {
                url_marker
                    .as_ref()
                    .is_some_and(|m| page.url.as_str().contains(m.as_str()))
                    || html_marker
                        .as_ref()
                        .is_some_and(|m| page.html_lower.contains(m.as_str()))
            }
        }
    }

    fn candidates(&self, page: &PageDocument<'_>) -> Vec<Candidate> {
        page.document
            .select(&self.row)
            .filter_map(|row| self.parse_row(&row, page.url))
            .collect()
    }

    fn min_rows(&self) -> usize {
        2
    }
}

// --- Labelled tables ---

#[derive(Debug, Default, Clone, Copy)]
struct ColumnMap {
    date: Option<usize>,
    signature: Option<usize>,
    title: Option<usize>,
    location: Option<usize>,
}

impl ColumnMap {
    fn labelled(&self) -> usize {
        [self.date, self.signature, self.title, self.location]
            .iter()
            .filter(|c| c.is_some())
            .count()
    }
}

/// Tables whose header row names the columns (`Data`, `Znak sprawy`,
/// `Przedmiot`, `Lokalizacja`, ...).
pub struct LabeledTableStrategy {
    table: Selector,
    row: Selector,
    cell: Selector,
    link: Selector,
    date_labels: Vec<Term>,
    signature_labels: Vec<Term>,
    title_labels: Vec<Term>,
    location_labels: Vec<Term>,
}

impl LabeledTableStrategy {
    pub fn new() -> Result<Self> {
        let labels = |items: &[&str]| items.iter().map(|s| Term::new(s)).collect::<Vec<_>>();
        Ok(Self {
            table: parse_selector("table")?,
            row: parse_selector("tr")?,
            cell: parse_selector("th, td")?,
            link: parse_selector("a[href]")?,
            date_labels: labels(&["data", "dnia"]),
            signature_labels: labels(&["znak", "sygnatur", "nr sprawy", "numer sprawy"]),
            title_labels: labels(&[
                "tytul",
                "przedmiot",
                "opis",
                "nazwa",
                "dotyczy",
                "w sprawie",
                "tresc",
                "rodzaj przedsiewziecia",
            ]),
            location_labels: labels(&["lokalizac", "miejsc", "gmina"]),
        })
    }

    fn map_columns(&self, header: &ElementRef<'_>) -> ColumnMap {
        let mut map = ColumnMap::default();
        for (idx, cell) in header.select(&self.cell).enumerate() {
            let label = normalize(&element_text(&cell));
            if label.is_empty() {
                continue;
            }
            // The first matching role claims the column.
            if map.signature.is_none() && any_term(&self.signature_labels, &label) {
                map.signature = Some(idx);
            } else if map.date.is_none() && any_term(&self.date_labels, &label) {
                map.date = Some(idx);
            } else if map.location.is_none() && any_term(&self.location_labels, &label) {
                map.location = Some(idx);
            } else if map.title.is_none() && any_term(&self.title_labels, &label) {
                map.title = Some(idx);
            }
        }
        map
    }

    fn table_candidates(&self, table: &ElementRef<'_>, page_url: &Url) -> Vec<Candidate> {
        let mut rows = table.select(&self.row);
        let Some(header) = rows.next() else {
            return Vec::new();
        };
        let columns = self.map_columns(&header);
        if columns.labelled() < 2 {
            return Vec::new();
        }

        rows.filter_map(|row| {
            let cells: Vec<ElementRef<'_>> = row.select(&self.cell).collect();
            if cells.is_empty() {
                return None;
            }
            let text_at = |idx: Option<usize>| {
                idx.and_then(|i| cells.get(i))
                    .map(element_text)
                    .filter(|t| !t.is_empty())
            };

            let title = text_at(columns.title).or_else(|| {
                // Unlabelled subject column: take the longest cell.
                cells
                    .iter()
                    .map(element_text)
                    .max_by_key(|t| t.chars().count())
            })?;
            if title.is_empty() {
                return None;
            }

            let title_cell = columns.title.and_then(|i| cells.get(i));
            let link = title_cell
                .and_then(|cell| cell.select(&self.link).next())
                .or_else(|| row.select(&self.link).next())
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve(page_url, href));

            Some(Candidate {
                title,
                link,
                date_text: text_at(columns.date),
                block_text: element_text(&row),
                signature_text: text_at(columns.signature),
                location_text: text_at(columns.location),
            })
        })
        .collect()
    }
}

impl ExtractionStrategy for LabeledTableStrategy {
    fn name(&self) -> &str {
        LABELED_TABLE
    }

    fn detect(&self, page: &PageDocument<'_>) -> bool {
        page.html_lower.contains("<table")
    }

    fn candidates(&self, page: &PageDocument<'_>) -> Vec<Candidate> {
        page.document
            .select(&self.table)
            .flat_map(|table| self.table_candidates(&table, page.url))
            .collect()
    }
}

// --- Heuristic fallback ---

/// Scans anchors and text blocks when no known structure matched.
///
/// Every anchor outside navigation chrome yields the nearest block element
/// it sits in; link-less blocks qualify when they mention a procedural
/// stage. One candidate per block.
pub struct HeuristicStrategy {
    anchor: Selector,
    text_block: Selector,
    stage_markers: Vec<Term>,
    min_title_length: usize,
}

const CHROME: [&str; 4] = ["nav", "header", "footer", "aside"];
const BLOCKS: [&str; 9] = ["li", "tr", "p", "article", "section", "dd", "td", "div", "h3"];

impl HeuristicStrategy {
    pub fn new(stage_markers: Vec<Term>, min_title_length: usize) -> Result<Self> {
        Ok(Self {
            anchor: parse_selector("a[href]")?,
            text_block: parse_selector("p, li, td")?,
            stage_markers,
            min_title_length,
        })
    }

    fn in_chrome(element: &ElementRef<'_>) -> bool {
        element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| {
                let value = el.value();
                CHROME.contains(&value.name())
                    || value.classes().any(|c| {
                        let c = c.to_ascii_lowercase();
                        c.contains("menu") || c.contains("breadcrumb") || c == "nav"
                    })
            })
    }

    fn nearest_block<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
        element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| BLOCKS.contains(&el.value().name()))
    }
}

impl ExtractionStrategy for HeuristicStrategy {
    fn name(&self) -> &str {
        HEURISTIC
    }

    fn detect(&self, _page: &PageDocument<'_>) -> bool {
        true
    }

    fn candidates(&self, page: &PageDocument<'_>) -> Vec<Candidate> {
        let mut seen_blocks = HashSet::new();
        let mut candidates = Vec::new();

        for anchor in page.document.select(&self.anchor) {
            if Self::in_chrome(&anchor) {
                continue;
            }
            let Some(link) = anchor
                .value()
                .attr("href")
                .and_then(|href| resolve(page.url, href))
            else {
                continue;
            };

            let anchor_text = element_text(&anchor);
            let block = Self::nearest_block(&anchor)
                .map(|b| (b.id(), element_text(&b)))
                .filter(|(_, text)| text.chars().count() <= MAX_BLOCK_CHARS);
            let (block_id, block_text) = match block {
                Some((id, text)) => (Some(id), text),
                None => (None, anchor_text.clone()),
            };
            if let Some(id) = block_id {
                if !seen_blocks.insert(id) {
                    continue;
                }
            }

            let title = if anchor_text.chars().count() >= self.min_title_length {
                anchor_text
            } else {
                block_text.clone()
            };
            if title.is_empty() {
                continue;
            }

            candidates.push(Candidate {
                title,
                link: Some(link),
                block_text,
                ..Candidate::default()
            });
        }

        for block in page.document.select(&self.text_block) {
            if seen_blocks.contains(&block.id())
                || block.select(&self.anchor).next().is_some()
                || Self::in_chrome(&block)
            {
                continue;
            }
            // Nested blocks: an enclosing block already produced this text.
            if block
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| seen_blocks.contains(&a.id()))
            {
                continue;
            }
            let text = element_text(&block);
            let length = text.chars().count();
            if length < self.min_title_length || length > MAX_BLOCK_CHARS {
                continue;
            }
            if !any_term(&self.stage_markers, &normalize(&text)) {
                continue;
            }
            seen_blocks.insert(block.id());
            candidates.push(Candidate {
                title: text.clone(),
                link: None,
                block_text: text,
                ..Candidate::default()
            });
        }

        candidates
    }

    fn is_fallback(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://bip.gmina.pl/ogloszenia/").unwrap()
    }

    fn run(strategy: &dyn ExtractionStrategy, html: &str) -> Vec<Candidate> {
        let document = Html::parse_document(html);
        let url = page_url();
        let lower = html.to_lowercase();
        let page = PageDocument {
            document: &document,
            url: &url,
            html_lower: &lower,
        };
        assert!(strategy.detect(&page));
        strategy.candidates(&page)
    }

    fn news_list() -> ListingStrategy {
        ListingStrategy::from_pattern(&ListingPattern {
            name: "news".into(),
            detect_url_contains: None,
            detect_html_contains: Some("news-list".into()),
            row_selector: ".news-list li".into(),
            title_selector: "a".into(),
            date_selector: Some(".date".into()),
            link_attr: "href".into(),
        })
        .unwrap()
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("[[invalid").is_err());
        assert!(parse_selector("tr:has(a)").is_ok());
    }

    #[test]
    fn test_listing_rows() {
        let html = r#"
            <ul class="news-list">
              <li><span class="date">12.01.2026</span><a href="/o/1#x">Obwieszczenie RDOŚ nr 1</a></li>
              <li><a href="o/2">Obwieszczenie RDOŚ nr 2</a></li>
              <li><span class="date">x</span></li>
            </ul>"#;
        let candidates = run(&news_list(), html);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Obwieszczenie RDOŚ nr 1");
        assert_eq!(
            candidates[0].link.as_ref().unwrap().as_str(),
            "https://bip.gmina.pl/o/1"
        );
        assert_eq!(candidates[0].date_text.as_deref(), Some("12.01.2026"));
        assert_eq!(
            candidates[1].link.as_ref().unwrap().as_str(),
            "https://bip.gmina.pl/ogloszenia/o/2"
        );
        assert_eq!(candidates[1].date_text, None);
    }

    #[test]
    fn test_listing_detection_markers() {
        let strategy = news_list();
        let document = Html::parse_document("<p>nothing</p>");
        let url = page_url();
        let page = PageDocument {
            document: &document,
            url: &url,
            html_lower: "<p>nothing</p>",
        };
        assert!(strategy.is_targeted());
        assert!(!strategy.detect(&page));
    }

    #[test]
    fn test_labeled_table_maps_columns_by_label() {
        let html = r#"
            <table>
              <tr><th>Lp.</th><th>Znak sprawy</th><th>Data</th><th>Przedmiot</th><th>Lokalizacja</th></tr>
              <tr><td>1</td><td>OŚ.6220.1.2026</td><td>2026-01-09</td>
                  <td><a href="/d/1">Budowa farmy fotowoltaicznej</a></td><td>Wólka</td></tr>
              <tr><td>2</td><td>OŚ.6220.2.2026</td><td></td><td>Rozbudowa zakładu</td><td></td></tr>
            </table>"#;
        let strategy = LabeledTableStrategy::new().unwrap();
        let candidates = run(&strategy, html);
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.title, "Budowa farmy fotowoltaicznej");
        assert_eq!(first.signature_text.as_deref(), Some("OŚ.6220.1.2026"));
        assert_eq!(first.date_text.as_deref(), Some("2026-01-09"));
        assert_eq!(first.location_text.as_deref(), Some("Wólka"));
        assert_eq!(first.link.as_ref().unwrap().as_str(), "https://bip.gmina.pl/d/1");

        let second = &candidates[1];
        assert_eq!(second.date_text, None);
        assert_eq!(second.link, None);
    }

    #[test]
    fn test_unlabelled_table_is_ignored() {
        let html = "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>";
        let strategy = LabeledTableStrategy::new().unwrap();
        assert!(run(&strategy, html).is_empty());
    }

    #[test]
    fn test_heuristic_skips_navigation_and_merges_blocks() {
        let html = r#"
            <nav><ul><li><a href="/">Strona główna</a></li></ul></nav>
            <div id="content">
              <p>15.01.2026 <a href="/a">Obwieszczenie o wszczęciu</a> <a href="/a.pdf">pdf</a></p>
              <p>Zawiadomienie o wszczęciu postępowania w sprawie farmy wiatrowej</p>
              <p>Krótko</p>
            </div>"#;
        let markers = vec![Term::new("wszczeciu postepowania")];
        let strategy = HeuristicStrategy::new(markers, 15).unwrap();
        let candidates = run(&strategy, html);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Obwieszczenie o wszczęciu");
        assert!(candidates[0].block_text.starts_with("15.01.2026"));
        assert!(candidates[1].link.is_none());
        assert!(candidates[1].title.starts_with("Zawiadomienie"));
    }

    #[test]
    fn test_malformed_markup_does_not_panic() {
        let html = "<div><li><a href='/x'>Obwieszczenie bez końca<table><tr><td>";
        let strategy = HeuristicStrategy::new(Vec::new(), 5).unwrap();
        let candidates = run(&strategy, html);
        assert!(candidates.iter().all(|c| !c.title.is_empty()));
    }
}
