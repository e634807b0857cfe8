// src/services/extractor.rs

//! Page extractor: turns a listing page into raw notice records.

use std::sync::{Arc, LazyLock};

use log::debug;
use regex::Regex;
use scraper::Html;
use url::Url;

use super::navigation::Navigator;
use super::strategies::{
    Candidate, ExtractionStrategy, HeuristicStrategy, LabeledTableStrategy, ListingStrategy,
    PageDocument,
};
use crate::error::Result;
use crate::models::{ExtractionConfig, ProceduralStage, RawRecord, SourceDescriptor};
use crate::utils::date::parse_date;
use crate::utils::text::{Term, any_term, normalize, terms, truncate_chars};

const MAX_DESCRIPTION_CHARS: usize = 300;
const MAX_EXCERPT_CHARS: usize = 500;

static SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\p{Lu}{2,}(?:[-.]\p{L}{1,6})*[-.]\d{3,4}\.\d{1,4}\.\d{4}(?:\.\p{L}{1,5})?(?:\.\d{1,3})?",
    )
    .expect("valid signature pattern")
});

static LABELLED_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:znak|sygnatura)(?:\s+sprawy)?\s*:?\s+([\p{L}\d][\p{L}\d.\-/]*\d[\p{L}\d.\-/]*)")
        .expect("valid labelled signature pattern")
});

/// Find a case signature such as `OŚ-IV-UII.6220.13.2025.SPA` or a value
/// introduced by `znak sprawy:`.
pub fn extract_signature(text: &str) -> Option<String> {
    if let Some(m) = SIGNATURE.find(text) {
        return Some(m.as_str().to_string());
    }
    LABELLED_SIGNATURE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', '-', '/']).to_string())
}

/// Rules that turn candidates into records.
pub struct RecordRules {
    environmental: Vec<Term>,
    blacklist: Vec<Term>,
    stages: Vec<(ProceduralStage, Vec<Term>)>,
    min_title_length: usize,
    relevance_filter: bool,
}

impl RecordRules {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            environmental: terms(&config.environmental_keywords),
            blacklist: terms(&config.blacklist_keywords),
            stages: config
                .stages
                .iter()
                .map(|rule| (rule.stage, terms(&rule.keywords)))
                .collect(),
            min_title_length: config.min_title_length,
            relevance_filter: config.relevance_filter,
        }
    }

    /// Every stage synonym, for spotting link-less notices.
    pub fn stage_markers(&self) -> Vec<Term> {
        self.stages
            .iter()
            .flat_map(|(_, terms)| terms.iter().cloned())
            .collect()
    }

    /// Whether normalized text reads like an environmental-procedure notice.
    pub fn is_relevant(&self, normalized: &str) -> bool {
        if !self.relevance_filter {
            return true;
        }
        !any_term(&self.blacklist, normalized) && any_term(&self.environmental, normalized)
    }

    /// The most advanced stage mentioned, or `Unknown`.
    pub fn stage(&self, normalized: &str) -> ProceduralStage {
        self.stages
            .iter()
            .find(|(_, terms)| any_term(terms, normalized))
            .map_or(ProceduralStage::Unknown, |(stage, _)| *stage)
    }

    fn context(title: &str, block_text: &str) -> String {
        normalize(&format!("{title} {block_text}"))
    }

    fn is_substantial(&self, candidate: &Candidate) -> bool {
        candidate.title.trim().chars().count() >= self.min_title_length
    }

    /// Whether `build` would turn the candidate into a record.
    fn accepts(&self, candidate: &Candidate) -> bool {
        self.is_substantial(candidate)
            && self.is_relevant(&Self::context(candidate.title.trim(), &candidate.block_text))
    }

    fn build(&self, candidate: Candidate, page_url: &Url, source_id: &str) -> Option<RawRecord> {
        if !self.is_substantial(&candidate) {
            return None;
        }
        let title = candidate.title.trim();
        let context = Self::context(title, &candidate.block_text);
        if !self.is_relevant(&context) {
            return None;
        }

        let publication_date = candidate
            .date_text
            .as_deref()
            .and_then(parse_date)
            .or_else(|| parse_date(&candidate.block_text));

        let signature = candidate
            .signature_text
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| extract_signature(&candidate.block_text))
            .or_else(|| extract_signature(title))
            .unwrap_or_default();

        Some(RawRecord {
            source_id: source_id.to_string(),
            publication_date,
            stage: self.stage(&context),
            signature,
            description: truncate_chars(title, MAX_DESCRIPTION_CHARS),
            link: candidate.link.unwrap_or_else(|| page_url.clone()),
            excerpt: truncate_chars(&candidate.block_text, MAX_EXCERPT_CHARS),
            location_hint: candidate.location_text,
        })
    }
}

/// Lazily built records of one page.
///
/// Finite and consuming: each candidate is interpreted once, when pulled.
pub struct Records {
    candidates: std::vec::IntoIter<Candidate>,
    rules: Arc<RecordRules>,
    page_url: Url,
    source_id: String,
}

impl Iterator for Records {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        for candidate in self.candidates.by_ref() {
            if let Some(record) = self.rules.build(candidate, &self.page_url, &self.source_id) {
                return Some(record);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.candidates.len()))
    }
}

/// Output of extracting one page.
pub struct PageYield {
    pub records: Records,
    /// Following listing page, if any
    pub next_page: Option<Url>,
    /// Environmental sections linked from the page, best first
    pub sections: Vec<Url>,
    /// Strategy that produced the candidates
    pub strategy: String,
    /// The generic fallback had to be used
    pub degraded: bool,
}

/// Structure-aware extractor with a generic fallback.
pub struct PageExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    navigator: Navigator,
    rules: Arc<RecordRules>,
}

impl PageExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let rules = RecordRules::new(config);
        let mut targeted: Vec<Box<dyn ExtractionStrategy>> = Vec::new();
        let mut generic: Vec<Box<dyn ExtractionStrategy>> = Vec::new();
        for pattern in &config.listing_patterns {
            let strategy = ListingStrategy::from_pattern(pattern)?;
            if strategy.is_targeted() {
                targeted.push(Box::new(strategy));
            } else {
                generic.push(Box::new(strategy));
            }
        }

        // Site-specific patterns, labelled tables, catch-all lists, heuristics.
        let mut strategies = targeted;
        strategies.push(Box::new(LabeledTableStrategy::new()?));
        strategies.append(&mut generic);
        strategies.push(Box::new(HeuristicStrategy::new(
            rules.stage_markers(),
            config.min_title_length,
        )?));

        Ok(Self {
            strategies,
            navigator: Navigator::new()?,
            rules: Arc::new(rules),
        })
    }

    /// Extract records and continuation links from one page.
    ///
    /// Never fails: malformed markup yields fewer records, an empty page
    /// yields none.
    pub fn extract(&self, html: &str, page_url: &Url, source: &SourceDescriptor) -> PageYield {
        let document = Html::parse_document(html);
        let html_lower = html.to_lowercase();
        let page = PageDocument {
            document: &document,
            url: page_url,
            html_lower: &html_lower,
        };

        let (strategy, degraded, candidates) =
            self.locate(&page, source.structure_hint.as_deref());
        if degraded {
            debug!(
                "[{}] no known structure on {page_url}; using {strategy} extraction",
                source.id
            );
        }

        PageYield {
            records: Records {
                candidates: candidates.into_iter(),
                rules: Arc::clone(&self.rules),
                page_url: page_url.clone(),
                source_id: source.id.clone(),
            },
            next_page: self.navigator.next_page(&document, page_url),
            sections: self.navigator.sections(&document, page_url),
            strategy,
            degraded,
        }
    }

    /// Strategies in trial order: the hinted one first, then the built-in order.
    fn ordered<'a>(&'a self, hint: Option<&'a str>) -> impl Iterator<Item = &'a dyn ExtractionStrategy> {
        let hinted = self
            .strategies
            .iter()
            .filter(move |s| Some(s.name()) == hint);
        let rest = self
            .strategies
            .iter()
            .filter(move |s| Some(s.name()) != hint);
        hinted.chain(rest).map(|s| s.as_ref())
    }

    /// Pick the strategy whose rows carry relevant notices.
    ///
    /// A structured strategy is taken when it finds `min_rows` substantial
    /// rows (one when hinted) and at least one of them passes the relevance
    /// gate. Otherwise the next strategy is tried, down to the fallback. When
    /// the fallback finds nothing relevant either, the first structural match
    /// stands, so a listing without environmental notices is not degraded.
    fn locate(
        &self,
        page: &PageDocument<'_>,
        hint: Option<&str>,
    ) -> (String, bool, Vec<Candidate>) {
        let mut structural: Option<(String, Vec<Candidate>)> = None;

        for strategy in self.ordered(hint) {
            if !strategy.detect(page) {
                continue;
            }
            let candidates = strategy.candidates(page);
            let relevant = candidates.iter().filter(|c| self.rules.accepts(c)).count();

            if strategy.is_fallback() {
                if relevant == 0 {
                    if let Some((name, rows)) = structural {
                        return (name, false, rows);
                    }
                }
                return (strategy.name().to_string(), true, candidates);
            }

            let required = if Some(strategy.name()) == hint {
                1
            } else {
                strategy.min_rows()
            };
            let substantial = candidates
                .iter()
                .filter(|c| self.rules.is_substantial(c))
                .count();
            if substantial < required {
                continue;
            }
            if relevant > 0 {
                return (strategy.name().to_string(), false, candidates);
            }
            debug!("{} matched {substantial} rows, none relevant", strategy.name());
            if structural.is_none() {
                structural = Some((strategy.name().to_string(), candidates));
            }
        }

        match structural {
            Some((name, rows)) => (name, false, rows),
            None => (String::from("none"), true, Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdministrativeTier;
    use chrono::NaiveDate;

    fn source(hint: Option<&str>) -> SourceDescriptor {
        SourceDescriptor {
            id: "gm-test".into(),
            name: "Gmina Test".into(),
            tier: AdministrativeTier::UrbanMunicipality,
            voivodeship: "mazowieckie".into(),
            base_url: Url::parse("https://bip.test.pl").unwrap(),
            structure_hint: hint.map(str::to_string),
            listing_path: None,
        }
    }

    fn page_url() -> Url {
        Url::parse("https://bip.test.pl/obwieszczenia").unwrap()
    }

    fn extractor() -> PageExtractor {
        PageExtractor::new(&ExtractionConfig::default()).unwrap()
    }

    #[test]
    fn test_extract_signature() {
        assert_eq!(
            extract_signature("Obwieszczenie OŚ-IV-UII.6220.13.2025.SPA z dnia").as_deref(),
            Some("OŚ-IV-UII.6220.13.2025.SPA")
        );
        assert_eq!(
            extract_signature("znak: RDOŚ-Gd-WOO.420.60.2024.JP.23").as_deref(),
            Some("RDOŚ-Gd-WOO.420.60.2024.JP.23")
        );
        assert_eq!(
            extract_signature("Znak sprawy: 12/2025.").as_deref(),
            Some("12/2025")
        );
        assert_eq!(extract_signature("Bez znaku sprawy"), None);
    }

    #[test]
    fn test_stage_prefers_most_advanced() {
        let rules = RecordRules::new(&ExtractionConfig::default());
        let text = normalize("Obwieszczenie o wydaniu decyzji po zebraniu materiału dowodowego");
        assert_eq!(rules.stage(&text), ProceduralStage::Decyzja);
        let text = normalize("Zawiadomienie o wszczęciu postępowania");
        assert_eq!(rules.stage(&text), ProceduralStage::Wszczecie);
        let text = normalize("Zmiana decyzji o środowiskowych uwarunkowaniach");
        assert_eq!(rules.stage(&text), ProceduralStage::Decyzja);
        assert_eq!(rules.stage("komunikat"), ProceduralStage::Unknown);
    }

    #[test]
    fn test_relevance_gate() {
        let rules = RecordRules::new(&ExtractionConfig::default());
        assert!(rules.is_relevant(&normalize(
            "Obwieszczenie o wszczęciu postępowania w sprawie wydania decyzji o środowiskowych uwarunkowaniach"
        )));
        assert!(!rules.is_relevant(&normalize("Przetarg na dostawę węgla")));
        assert!(!rules.is_relevant(&normalize(
            "Projekt programu ochrony środowiska - wydania decyzji"
        )));
    }

    #[test]
    fn test_listing_page_yields_records_and_next_page() {
        let html = r#"
            <ul class="news-list">
              <li><span class="date">15.01.2026</span>
                <a href="/o/1">Obwieszczenie o wszczęciu postępowania w sprawie wydania decyzji o środowiskowych uwarunkowaniach dla farmy fotowoltaicznej</a>
                WGK.6220.1.2026</li>
              <li><a href="/o/2">Zawiadomienie o zebraniu materiału dowodowego - rozbudowa drogi gminnej</a></li>
              <li><a href="/o/3">Przetarg na odśnieżanie dróg gminnych w sezonie zimowym</a></li>
            </ul>
            <div class="pagination"><a rel="next" href="?page=2">Następna</a></div>"#;
        let extractor = extractor();
        let yielded = extractor.extract(html, &page_url(), &source(None));
        assert_eq!(yielded.strategy, "bip_news_list");
        assert!(!yielded.degraded);
        assert_eq!(
            yielded.next_page.as_ref().map(Url::as_str),
            Some("https://bip.test.pl/obwieszczenia?page=2")
        );

        let records: Vec<RawRecord> = yielded.records.collect();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.publication_date, NaiveDate::from_ymd_opt(2026, 1, 15));
        assert_eq!(first.stage, ProceduralStage::Wszczecie);
        assert_eq!(first.signature, "WGK.6220.1.2026");
        assert_eq!(first.link.as_str(), "https://bip.test.pl/o/1");
        assert_eq!(first.source_id, "gm-test");

        let second = &records[1];
        assert_eq!(second.publication_date, None);
        assert_eq!(second.stage, ProceduralStage::ZebranieMaterialu);
        assert!(second.signature.is_empty());
    }

    #[test]
    fn test_heuristic_fallback_is_degraded() {
        let html = r#"<div id="tresc">
            <p><a href="/a.pdf">Obwieszczenie Wójta o wydaniu decyzji o środowiskowych uwarunkowaniach</a> (12.12.2025)</p>
            </div>"#;
        let yielded = extractor().extract(html, &page_url(), &source(None));
        assert!(yielded.degraded);
        let records: Vec<RawRecord> = yielded.records.collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stage, ProceduralStage::Decyzja);
        assert_eq!(
            records[0].publication_date,
            NaiveDate::from_ymd_opt(2025, 12, 12)
        );
    }

    #[test]
    fn test_hint_moves_strategy_first() {
        let html = r#"
            <table>
              <tr><th>Data</th><th>Przedmiot</th></tr>
              <tr><td>2026-01-10</td><td><a href="/x">Decyzja o środowiskowych uwarunkowaniach - biogazownia</a></td></tr>
            </table>
            <ul class="news-list">
              <li><a href="/n/1">Obwieszczenie o wszczęciu postępowania - farma wiatrowa</a></li>
              <li><a href="/n/2">Obwieszczenie o wszczęciu postępowania - magazyn energii</a></li>
            </ul>"#;
        let extractor = extractor();

        let plain = extractor.extract(html, &page_url(), &source(None));
        assert_eq!(plain.strategy, "labeled_table");
        let records: Vec<RawRecord> = plain.records.collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].link.as_str(), "https://bip.test.pl/x");
        assert_eq!(records[0].publication_date, NaiveDate::from_ymd_opt(2026, 1, 10));

        let hinted = extractor.extract(html, &page_url(), &source(Some("bip_news_list")));
        assert_eq!(hinted.strategy, "bip_news_list");
        assert_eq!(hinted.records.count(), 2);
    }

    #[test]
    fn test_sidebar_list_does_not_hide_notice_table() {
        let html = r#"
            <div class="content"><ul>
              <li><a href="/n/1">Zaproszenie na festyn rodzinny w parku</a></li>
              <li><a href="/n/2">Harmonogram odbioru odpadów na luty</a></li>
            </ul></div>
            <table>
              <tr><th>Data</th><th>Przedmiot</th></tr>
              <tr><td>2026-01-10</td><td><a href="/d/1">Decyzja o środowiskowych uwarunkowaniach - biogazownia</a></td></tr>
              <tr><td>2026-01-12</td><td><a href="/d/2">Decyzja o środowiskowych uwarunkowaniach - farma wiatrowa</a></td></tr>
            </table>"#;
        let yielded = extractor().extract(html, &page_url(), &source(None));
        assert_eq!(yielded.strategy, "labeled_table");
        assert!(!yielded.degraded);
        let links: Vec<String> = yielded.records.map(|r| r.link.to_string()).collect();
        assert_eq!(
            links,
            vec!["https://bip.test.pl/d/1", "https://bip.test.pl/d/2"]
        );
    }

    #[test]
    fn test_irrelevant_list_yields_to_next_pattern() {
        let html = r#"
            <ul class="news-list">
              <li><a href="/n/1">Zaproszenie na festyn rodzinny w parku</a></li>
              <li><a href="/n/2">Harmonogram odbioru odpadów na luty</a></li>
            </ul>
            <div class="content"><ul>
              <li><a href="/o/1">Obwieszczenie o wszczęciu postępowania - farma wiatrowa</a></li>
              <li><a href="/o/2">Obwieszczenie o wszczęciu postępowania - magazyn energii</a></li>
            </ul></div>"#;
        let yielded = extractor().extract(html, &page_url(), &source(None));
        assert_eq!(yielded.strategy, "bip_content_list");
        assert_eq!(yielded.records.count(), 2);
    }

    #[test]
    fn test_listing_without_notices_is_not_degraded() {
        let html = r#"
            <ul class="news-list">
              <li><a href="/n/1">Zaproszenie na festyn rodzinny w parku</a></li>
              <li><a href="/n/2">Harmonogram odbioru odpadów na luty</a></li>
            </ul>"#;
        let yielded = extractor().extract(html, &page_url(), &source(None));
        assert_eq!(yielded.strategy, "bip_news_list");
        assert!(!yielded.degraded);
        assert_eq!(yielded.records.count(), 0);
    }

    #[test]
    fn test_empty_and_malformed_pages_yield_nothing() {
        let extractor = extractor();
        assert_eq!(
            extractor
                .extract("", &page_url(), &source(None))
                .records
                .count(),
            0
        );
        let broken = "<html><body><ul class='news-list'><li><a href='/x'>Obwieszczenie";
        let yielded = extractor.extract(broken, &page_url(), &source(None));
        assert_eq!(yielded.records.count(), 0);
    }
}
