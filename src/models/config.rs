//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::{IndustryCategory, ProceduralStage};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client behaviour
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Worker pool, throttling and per-source bounds
    #[serde(default)]
    pub run: RunConfig,

    /// Listing detection and record filtering
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Ordered industry rules
    #[serde(default)]
    pub classification: ClassificationConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let crawler = &self.crawler;
        if crawler.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(AppError::validation("crawler.user_agents is empty"));
        }
        if crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if crawler.fetch_ceiling_secs < crawler.timeout_secs {
            return Err(AppError::validation(
                "crawler.fetch_ceiling_secs must be >= crawler.timeout_secs",
            ));
        }
        if crawler.retry_min_delay_ms > crawler.retry_max_delay_ms {
            return Err(AppError::validation(
                "crawler.retry_min_delay_ms must be <= crawler.retry_max_delay_ms",
            ));
        }

        let run = &self.run;
        if run.max_concurrent == 0 {
            return Err(AppError::validation("run.max_concurrent must be > 0"));
        }
        if run.max_pages_per_source == 0 {
            return Err(AppError::validation("run.max_pages_per_source must be > 0"));
        }
        if run.job_timeout_secs == 0 {
            return Err(AppError::validation("run.job_timeout_secs must be > 0"));
        }

        for pattern in &self.extraction.listing_patterns {
            pattern.validate()?;
        }
        if self.extraction.stages.iter().any(|s| s.stage == ProceduralStage::Unknown) {
            return Err(AppError::validation(
                "extraction.stages may not map keywords to 'unknown'",
            ));
        }

        if self.classification.rules.is_empty() {
            return Err(AppError::validation("No classification rules defined"));
        }
        for rule in &self.classification.rules {
            if rule.category == IndustryCategory::Unclassified {
                return Err(AppError::validation(
                    "classification rules may not target 'unclassified'",
                ));
            }
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(AppError::validation(format!(
                    "classification rule for {} has no keywords",
                    rule.category
                )));
            }
        }
        Ok(())
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent headers, rotated per request
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Wall-clock ceiling for one fetch including retries
    #[serde(default = "defaults::fetch_ceiling")]
    pub fetch_ceiling_secs: u64,

    /// Retries after the first attempt for transient failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: usize,

    #[serde(default = "defaults::retry_min_delay")]
    pub retry_min_delay_ms: u64,

    #[serde(default = "defaults::retry_max_delay")]
    pub retry_max_delay_ms: u64,

    #[serde(default = "defaults::max_redirects")]
    pub max_redirects: usize,

    /// Many municipal hosts serve incomplete certificate chains
    #[serde(default = "defaults::accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agents: defaults::user_agents(),
            timeout_secs: defaults::timeout(),
            fetch_ceiling_secs: defaults::fetch_ceiling(),
            max_retries: defaults::max_retries(),
            retry_min_delay_ms: defaults::retry_min_delay(),
            retry_max_delay_ms: defaults::retry_max_delay(),
            max_redirects: defaults::max_redirects(),
            accept_invalid_certs: defaults::accept_invalid_certs(),
        }
    }
}

/// Run orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum pages in flight
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Minimum spacing between requests to one host; 0 disables throttling
    #[serde(default = "defaults::min_host_spacing")]
    pub min_host_spacing_ms: u64,

    /// Page budget per source, entry page included
    #[serde(default = "defaults::max_pages_per_source")]
    pub max_pages_per_source: usize,

    /// Environmental sections followed from a source's entry page
    #[serde(default = "defaults::max_sections_per_source")]
    pub max_sections_per_source: usize,

    /// Time budget per source
    #[serde(default = "defaults::job_timeout")]
    pub job_timeout_secs: u64,

    /// How often the CLI logs progress
    #[serde(default = "defaults::progress_interval")]
    pub progress_interval_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            min_host_spacing_ms: defaults::min_host_spacing(),
            max_pages_per_source: defaults::max_pages_per_source(),
            max_sections_per_source: defaults::max_sections_per_source(),
            job_timeout_secs: defaults::job_timeout(),
            progress_interval_secs: defaults::progress_interval(),
        }
    }
}

/// Extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Shorter titles are navigation noise
    #[serde(default = "defaults::min_title_length")]
    pub min_title_length: usize,

    /// Keep only candidates that look like environmental-procedure notices
    #[serde(default = "defaults::relevance_filter")]
    pub relevance_filter: bool,

    #[serde(default = "defaults::environmental_keywords")]
    pub environmental_keywords: Vec<String>,

    /// Any of these rejects a candidate
    #[serde(default = "defaults::blacklist_keywords")]
    pub blacklist_keywords: Vec<String>,

    /// Stage synonyms, most advanced stage first
    #[serde(default = "defaults::stages")]
    pub stages: Vec<StageRule>,

    /// Known listing layouts
    #[serde(default = "defaults::listing_patterns")]
    pub listing_patterns: Vec<ListingPattern>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_title_length: defaults::min_title_length(),
            relevance_filter: defaults::relevance_filter(),
            environmental_keywords: defaults::environmental_keywords(),
            blacklist_keywords: defaults::blacklist_keywords(),
            stages: defaults::stages(),
            listing_patterns: defaults::listing_patterns(),
        }
    }
}

/// Keywords that identify one procedural stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRule {
    pub stage: ProceduralStage,
    pub keywords: Vec<String>,
}

/// A repeating listing layout with its selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingPattern {
    /// Pattern name, also usable as a source structure hint
    pub name: String,

    /// URL substring to match
    #[serde(default)]
    pub detect_url_contains: Option<String>,

    /// HTML content substring to match
    #[serde(default)]
    pub detect_html_contains: Option<String>,

    /// CSS selector for notice rows
    pub row_selector: String,

    /// CSS selector for the title element within a row
    pub title_selector: String,

    /// CSS selector for the date element; the row text is searched when unset
    #[serde(default)]
    pub date_selector: Option<String>,

    /// HTML attribute for link extraction
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,
}

impl ListingPattern {
    /// Check that every selector parses.
    pub fn validate(&self) -> Result<()> {
        let selectors = [
            Some(&self.row_selector),
            Some(&self.title_selector),
            self.date_selector.as_ref(),
        ];
        for selector in selectors.into_iter().flatten() {
            Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        }
        Ok(())
    }
}

/// Ordered industry rules; the first rule with a matching keyword wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default = "defaults::category_rules")]
    pub rules: Vec<CategoryRule>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            rules: defaults::category_rules(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: IndustryCategory,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for stored run results
    #[serde(default = "defaults::output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: defaults::output_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{CategoryRule, IndustryCategory, ListingPattern, ProceduralStage, StageRule};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // Crawler defaults
    pub fn user_agents() -> Vec<String> {
        strings(&[
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        ])
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn fetch_ceiling() -> u64 {
        60
    }
    pub fn max_retries() -> usize {
        3
    }
    pub fn retry_min_delay() -> u64 {
        500
    }
    pub fn retry_max_delay() -> u64 {
        8_000
    }
    pub fn max_redirects() -> usize {
        5
    }
    pub fn accept_invalid_certs() -> bool {
        true
    }

    // Run defaults
    pub fn max_concurrent() -> usize {
        16
    }
    pub fn min_host_spacing() -> u64 {
        1_000
    }
    pub fn max_pages_per_source() -> usize {
        8
    }
    pub fn max_sections_per_source() -> usize {
        5
    }
    pub fn job_timeout() -> u64 {
        180
    }
    pub fn progress_interval() -> u64 {
        10
    }

    // Extraction defaults
    pub fn min_title_length() -> usize {
        15
    }
    pub fn relevance_filter() -> bool {
        true
    }
    pub fn link_attr() -> String {
        "href".into()
    }

    pub fn environmental_keywords() -> Vec<String> {
        strings(&[
            "środowiskowych uwarunkowań",
            "środowiskowe uwarunkowania",
            "środowiskowych uwarunkowaniach",
            "decyzji o środowiskowych",
            "decyzja o środowiskowych",
            "decyzje o środowiskowych",
            "duś ",
            "ooś ",
            "postępowania w sprawie wydania decyzji",
            "postępowanie w sprawie wydania decyzji",
            "postępowania administracyjnego w sprawie",
            "wszczęcie postępowania",
            "wszczęciu postępowania",
            "wszczęto postępowanie",
            "wznowienie postępowania",
            "zawieszenie postępowania",
            "umorzenie postępowania",
            "podjęcie postępowania",
            "ocena oddziaływania na środowisko",
            "oceny oddziaływania na środowisko",
            "oddziaływania na środowisko",
            "oddziaływaniu przedsięwzięcia na środowisko",
            "raport o oddziaływaniu",
            "raportu o oddziaływaniu",
            "karta informacyjna przedsięwzięcia",
            "karty informacyjnej przedsięwzięcia",
            "przedsięwzięcie mogące znacząco",
            "przedsięwzięcia mogącego znacząco",
            "przedsięwzięcia mogące potencjalnie",
            "przedsięwzięciu mogącym",
            "planowanym przedsięwzięciu",
            "planowanego przedsięwzięcia",
            "przedsięwzięcia polegającego",
            "zebraniu materiału dowodowego",
            "materiału dowodowego",
            "materiał dowodowy",
            "zapoznania się z aktami",
            "wydaniu decyzji",
            "wydania decyzji",
            "wydanie decyzji",
            "uzupełnienia dokumentacji",
            "uzupełnienie wniosku",
            "6220",
        ])
    }

    pub fn blacklist_keywords() -> Vec<String> {
        strings(&[
            "program ochrony środowiska",
            "programu ochrony środowiska",
            "odszkodowani",
            "plan zagospodarowania",
            "planu zagospodarowania",
            "studium uwarunkowań",
            "warunkach zabudowy",
            "warunków zabudowy",
            "pozwolenie na budowę",
            "informacja o stanie środowiska",
            "raport o stanie środowiska",
            "sprawozdanie z realizacji programu",
            "strategia rozwoju",
            "wybory",
            "referendum",
            "przetarg",
            "konkurs",
            "nabór wniosków",
            "zamówienie publiczne",
            "dotacj",
            "rekrutacj",
        ])
    }

    pub fn stages() -> Vec<StageRule> {
        vec![
            StageRule {
                stage: ProceduralStage::Decyzja,
                keywords: strings(&[
                    "zmiana decyzji",
                    "zmianę decyzji",
                    "zmieniająca decyzję",
                    "przeniesienie decyzji",
                    "decyzja o środowiskowych",
                    "decyzję o środowiskowych",
                    "wydano decyzję",
                    "wydaniu decyzji",
                    "decyzja nr",
                    "decyzja znak",
                    "decyzja z dnia",
                    "ostateczna decyzja",
                    "decyzja odmowna",
                ]),
            },
            StageRule {
                stage: ProceduralStage::ZebranieMaterialu,
                keywords: strings(&[
                    "zebranie materiału dowodowego",
                    "zebraniu materiału dowodowego",
                    "zakończenie zbierania",
                    "zakończeniu zbierania",
                    "zakończono zbieranie",
                    "zgromadzenie materiału",
                    "materiał dowodowy",
                    "możliwość zapoznania się",
                    "możliwości zapoznania się",
                    "możliwość wypowiedzenia",
                ]),
            },
            StageRule {
                stage: ProceduralStage::Wszczecie,
                keywords: strings(&[
                    "wszczęcie postępowania",
                    "wszczęciu postępowania",
                    "wszczyna postępowanie",
                    "wszczęto postępowanie",
                    "zawiadomienie o wszczęciu",
                ]),
            },
            StageRule {
                stage: ProceduralStage::Wniosek,
                keywords: strings(&[
                    "wniosek o wydanie",
                    "wniosku o wydanie",
                    "złożenie wniosku",
                    "wpłynął wniosek",
                    "wniosek o ustalenie",
                    "wniosek o zmianę",
                ]),
            },
        ]
    }

    pub fn listing_patterns() -> Vec<ListingPattern> {
        vec![
            ListingPattern {
                name: "gov_pl".to_string(),
                detect_url_contains: Some("gov.pl/web/".to_string()),
                detect_html_contains: None,
                row_selector: "li:has(a[href*=\"/web/\"])".to_string(),
                title_selector: "a[href*=\"/web/\"]".to_string(),
                date_selector: Some(".date, .event-date, time".to_string()),
                link_attr: "href".to_string(),
            },
            ListingPattern {
                name: "bip_news_list".to_string(),
                detect_url_contains: None,
                detect_html_contains: None,
                row_selector: ".news-list li, .article-list li, .document-list li, .ogloszenia-lista li"
                    .to_string(),
                title_selector: "a".to_string(),
                date_selector: Some(".date, .data, time".to_string()),
                link_attr: "href".to_string(),
            },
            ListingPattern {
                name: "bip_entries".to_string(),
                detect_url_contains: None,
                detect_html_contains: None,
                row_selector: ".entry, article".to_string(),
                title_selector: "h2 a, h3 a, a".to_string(),
                date_selector: Some(".date, .data, time".to_string()),
                link_attr: "href".to_string(),
            },
            ListingPattern {
                name: "bip_content_list".to_string(),
                detect_url_contains: None,
                detect_html_contains: None,
                row_selector: "ul.list li, .content li, div[class*=\"news\"] li, div[class*=\"ogloszeni\"] li"
                    .to_string(),
                title_selector: "a".to_string(),
                date_selector: None,
                link_attr: "href".to_string(),
            },
        ]
    }

    // Classification defaults. Order matters: the first matching rule wins.
    pub fn category_rules() -> Vec<CategoryRule> {
        vec![
            CategoryRule {
                category: IndustryCategory::ItDataCenters,
                keywords: strings(&[
                    "centrum danych",
                    "centrów danych",
                    "centra danych",
                    "data center",
                    "data centre",
                    "datacenter",
                    "serwerowni",
                    "serwerownia",
                    "kolokacj",
                    "colocation",
                    "chmura obliczeniow",
                    "centrum obliczeniow",
                    "centrum przetwarzania danych",
                    "hyperscale",
                ]),
            },
            CategoryRule {
                category: IndustryCategory::Oze,
                keywords: strings(&[
                    "fotowoltaik",
                    "fotowoltaiczn",
                    "solar",
                    "pv ",
                    "paneli słonecznych",
                    "panele słoneczne",
                    "elektrownia słoneczna",
                    "elektrowni słonecznej",
                    "wiatrow",
                    "wiatrak",
                    "biogaz",
                    "biomas",
                    "bioelektrowni",
                    "odnawialne źródła energii",
                    "odnawialnych źródeł energii",
                    "oze ",
                    "energia odnawialna",
                    "magazyn energii",
                    "magazynu energii",
                    "magazyny energii",
                    "magazynów energii",
                    "magazynowanie energii",
                    "bess ",
                    "elektrolizer",
                    "wodór",
                    "wodoru",
                    "pompa ciepła",
                    "pomp ciepła",
                    "pompy ciepła",
                    "geotermi",
                    "geotermaln",
                ]),
            },
            CategoryRule {
                category: IndustryCategory::Energetyka,
                keywords: strings(&[
                    "elektrowni",
                    "elektrownia",
                    "elektrociepłowni",
                    "ciepłowni",
                    "linia energetyczn",
                    "linii energetyczn",
                    "sieci energetyczn",
                    "linia elektroenergetyczn",
                    "linii elektroenergetyczn",
                    "sieci elektroenergetyczn",
                    "kabla energetyczn",
                    "stacja transformatorow",
                    "stacji transformatorow",
                    "gpz ",
                    "główny punkt zasilania",
                    "110 kv",
                    "220 kv",
                    "400 kv",
                    "110kv",
                    "220kv",
                    "400kv",
                    "rozdzielni",
                    "podstacj",
                    "blok energetyczn",
                    "bloku energetyczn",
                    "kogeneracj",
                    "turbiny gazow",
                ]),
            },
            CategoryRule {
                category: IndustryCategory::Gornictwo,
                keywords: strings(&[
                    "kopaln",
                    "odkrywk",
                    "złoża",
                    "złoże ",
                    "złóż ",
                    "wydobyci",
                    "wydobywani",
                    "eksploatacji złoża",
                    "eksploatacja złoża",
                    "kopalin",
                    "kruszyw",
                    "żwirowni",
                    "piaskowni",
                    "kamieniołom",
                    "górnictw",
                    "górnicz",
                ]),
            },
            CategoryRule {
                category: IndustryCategory::Logistyka,
                keywords: strings(&[
                    "centrum logistyczn",
                    "centra logistyczn",
                    "park logistyczn",
                    "parku logistyczn",
                    "hub logistyczn",
                    "centrum dystrybucj",
                    "magazyn",
                    "hala magazynow",
                    "hali magazynow",
                    "obiekt magazynow",
                    "plac składow",
                    "placu składow",
                    "przeładunk",
                    "cross dock",
                    "chłodni",
                    "mroźni",
                    "terminal przeładunkow",
                    "terminalu kontenerow",
                ]),
            },
            CategoryRule {
                category: IndustryCategory::Przemysl,
                keywords: strings(&[
                    "zakład produkcyjn",
                    "zakładu produkcyjn",
                    "zakładzie produkcyjn",
                    "zakład przemysłow",
                    "zakładu przemysłow",
                    "zakład przetw",
                    "zakładu przetw",
                    "przetwórni",
                    "hala produkcyjn",
                    "hali produkcyjn",
                    "budynku produkcyjn",
                    "fabryk",
                    "wytwórni",
                    "montowni",
                    "linii produkcyjn",
                    "linii technologiczn",
                    "instalacji produkcyjn",
                    "instalacji przemysłow",
                    "park przemysłow",
                    "parku przemysłow",
                    "strefie przemysłow",
                    "obróbki metal",
                    "ubojni",
                    "rzeźni",
                    "mleczarni",
                    "browar",
                    "gorzelni",
                    "zakład chemiczn",
                    "zakładu chemiczn",
                    "cementowni",
                    "betoniarni",
                    "asfaltowni",
                    "odlewni",
                    "stalowni",
                    "huty ",
                    "huta ",
                    "sortowni",
                    "spalarni",
                    "recykling",
                    "produkcj",
                    "lakierni",
                    "galwanizerni",
                    "cynkowni",
                    "stolarni",
                ]),
            },
            CategoryRule {
                category: IndustryCategory::Infrastruktura,
                keywords: strings(&[
                    "droga ",
                    "drogi ",
                    "drogę ",
                    "drodze ",
                    "dróg ",
                    "drogow",
                    "autostrad",
                    "obwodnic",
                    "skrzyżowani",
                    "rondo",
                    "chodnik",
                    "ścieżki rowerow",
                    "linia kolejow",
                    "linii kolejow",
                    "kolejow",
                    "kolei ",
                    "most ",
                    "mostu ",
                    "wiadukt",
                    "tunel",
                    "estakad",
                    "port morski",
                    "portu morskiego",
                    "nabrzeż",
                    "lotnisk",
                    "oczyszczalni",
                    "uzdatniania wody",
                    "wodociąg",
                    "kanalizacj",
                    "kolektor",
                    "gazociąg",
                    "rurociąg",
                ]),
            },
        ]
    }

    // Output defaults
    pub fn output_dir() -> PathBuf {
        PathBuf::from("results")
    }
    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agents() {
        let mut config = Config::default();
        config.crawler.user_agents = vec!["  ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.run.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_selector() {
        let mut config = Config::default();
        config.extraction.listing_patterns[0].row_selector = "li:::".to_string();
        assert!(matches!(
            config.validate(),
            Err(AppError::Selector { .. })
        ));
    }

    #[test]
    fn validate_rejects_unclassified_rule() {
        let mut config = Config::default();
        config.classification.rules.push(CategoryRule {
            category: IndustryCategory::Unclassified,
            keywords: vec!["cokolwiek".into()],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [run]
            max_concurrent = 4

            [[classification.rules]]
            category = "Górnictwo"
            keywords = ["kopaln"]
            "#,
        )
        .unwrap();
        assert_eq!(config.run.max_concurrent, 4);
        assert_eq!(config.run.max_pages_per_source, 8);
        assert_eq!(config.crawler.timeout_secs, 15);
        assert_eq!(config.classification.rules.len(), 1);
        assert!(!config.extraction.listing_patterns.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bundled_config_is_valid() {
        let config: Config = toml::from_str(include_str!("../../data/config.toml")).unwrap();
        assert!(config.validate().is_ok());
        let names: Vec<&str> = config
            .extraction
            .listing_patterns
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, ["gov_pl", "bip_news_list", "bip_entries", "bip_content_list"]);
        assert_eq!(config.extraction.stages.len(), 4);
    }

    #[test]
    fn load_or_default_falls_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(dir.path().join("missing.toml"));
        assert_eq!(config.run.max_concurrent, 16);

        let path = dir.path().join("config.toml");
        fs::write(&path, "[output]\ndir = \"out\"\n").unwrap();
        let config = Config::load_or_default(&path);
        assert_eq!(config.output.dir, PathBuf::from("out"));
    }

    #[test]
    fn default_rules_put_it_first_and_industry_late() {
        let rules = ClassificationConfig::default().rules;
        assert_eq!(rules[0].category, IndustryCategory::ItDataCenters);
        let position = |c| rules.iter().position(|r| r.category == c).unwrap();
        assert!(position(IndustryCategory::Oze) < position(IndustryCategory::Logistyka));
        assert!(position(IndustryCategory::Logistyka) < position(IndustryCategory::Przemysl));
    }
}
