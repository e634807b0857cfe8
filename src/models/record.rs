//! Notice record structures.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::text::normalize;

use super::CrawlJob;

/// Step of the environmental-decision procedure a notice belongs to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProceduralStage {
    /// Application filed
    Wniosek,
    /// Proceedings opened
    Wszczecie,
    /// Evidence gathered, parties may review the files
    ZebranieMaterialu,
    /// Decision issued (also amendments and transfers)
    Decyzja,
    #[default]
    Unknown,
}

impl ProceduralStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Wniosek => "Wniosek",
            Self::Wszczecie => "Wszczęcie postępowania",
            Self::ZebranieMaterialu => "Zebranie materiału dowodowego",
            Self::Decyzja => "Decyzja",
            Self::Unknown => "Nieznany",
        }
    }
}

impl fmt::Display for ProceduralStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Industry a project is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndustryCategory {
    #[serde(rename = "OZE")]
    Oze,
    #[serde(rename = "Przemysł")]
    Przemysl,
    #[serde(rename = "IT/Data Centers")]
    ItDataCenters,
    Energetyka,
    Logistyka,
    Infrastruktura,
    #[serde(rename = "Górnictwo")]
    Gornictwo,
    #[serde(rename = "unclassified")]
    Unclassified,
}

impl IndustryCategory {
    /// Every category, `Unclassified` last.
    pub const ALL: [IndustryCategory; 8] = [
        Self::Oze,
        Self::Przemysl,
        Self::ItDataCenters,
        Self::Energetyka,
        Self::Logistyka,
        Self::Infrastruktura,
        Self::Gornictwo,
        Self::Unclassified,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Oze => "OZE",
            Self::Przemysl => "Przemysł",
            Self::ItDataCenters => "IT/Data Centers",
            Self::Energetyka => "Energetyka",
            Self::Logistyka => "Logistyka",
            Self::Infrastruktura => "Infrastruktura",
            Self::Gornictwo => "Górnictwo",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for IndustryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IndustryCategory {
    type Err = String;

    /// Accepts labels with or without diacritics, in any case
    /// (`"gornictwo"`, `"IT/Data Centers"`, `"it"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        let category = match wanted.as_str() {
            "it" | "it data centers" | "data centers" => Self::ItDataCenters,
            "przemysl" | "przemysl produkcja" => Self::Przemysl,
            "logistyka magazyny" => Self::Logistyka,
            "gornictwo wydobycie" => Self::Gornictwo,
            _ => Self::ALL
                .into_iter()
                .find(|c| normalize(c.label()) == wanted)
                .ok_or_else(|| format!("unknown category '{s}'"))?,
        };
        Ok(category)
    }
}

/// A notice as extracted from one listing page, before classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawRecord {
    /// Registry id of the source the page belongs to
    pub source_id: String,

    /// Publication date; `None` when the page gave no parseable date
    pub publication_date: Option<NaiveDate>,

    pub stage: ProceduralStage,

    /// Case signature, e.g. `OŚ-IV-UII.6220.13.2025.SPA`; may be empty
    #[serde(default)]
    pub signature: String,

    /// Notice title or subject
    pub description: String,

    /// Absolute link to the notice (the listing page when it has none)
    pub link: Url,

    /// Surrounding block text, used as classification context
    #[serde(default)]
    pub excerpt: String,

    /// Location from a labelled column, when the page has one
    #[serde(default)]
    pub location_hint: Option<String>,
}

/// A record with its industry category and provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifiedRecord {
    #[serde(flatten)]
    pub record: RawRecord,

    pub category: IndustryCategory,

    /// Crawl job that produced the record
    pub job_id: usize,

    pub source_name: String,

    pub voivodeship: String,

    /// Human-readable location: the page's own hint or the source's seat
    pub location: String,

    /// Set when the publication date is unknown
    pub needs_review: bool,
}

impl ClassifiedRecord {
    pub fn new(record: RawRecord, category: IndustryCategory, job: &CrawlJob) -> Self {
        let source = &job.source;
        let location = match &record.location_hint {
            Some(hint) if !hint.trim().is_empty() => hint.trim().to_string(),
            _ if source.voivodeship.is_empty() => source.name.clone(),
            _ => format!("{}, woj. {}", source.name, source.voivodeship),
        };
        Self {
            needs_review: record.publication_date.is_none(),
            record,
            category,
            job_id: job.id,
            source_name: source.name.clone(),
            voivodeship: source.voivodeship.clone(),
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_str() {
        assert_eq!("OZE".parse(), Ok(IndustryCategory::Oze));
        assert_eq!("gornictwo".parse(), Ok(IndustryCategory::Gornictwo));
        assert_eq!("Górnictwo".parse(), Ok(IndustryCategory::Gornictwo));
        assert_eq!("it".parse(), Ok(IndustryCategory::ItDataCenters));
        assert_eq!(
            "IT/Data Centers".parse(),
            Ok(IndustryCategory::ItDataCenters)
        );
        assert!("rolnictwo".parse::<IndustryCategory>().is_err());
    }

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&IndustryCategory::Przemysl).unwrap();
        assert_eq!(json, "\"Przemysł\"");
        let back: IndustryCategory = serde_json::from_str("\"IT/Data Centers\"").unwrap();
        assert_eq!(back, IndustryCategory::ItDataCenters);
    }

    #[test]
    fn test_stage_default_is_unknown() {
        assert_eq!(ProceduralStage::default(), ProceduralStage::Unknown);
        assert_eq!(ProceduralStage::Wszczecie.to_string(), "Wszczęcie postępowania");
    }
}
