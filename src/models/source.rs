//! Source registry: the catalogue of BIP sites to crawl.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::utils::text::normalize;
use crate::utils::url::join_path;

/// Level of public administration a source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdministrativeTier {
    /// General Directorate for Environmental Protection
    Gdos,
    /// Regional directorates
    Rdos,
    /// Marshal offices
    Voivodeship,
    /// Cities with county rights
    CityCounty,
    County,
    UrbanMunicipality,
    UrbanRuralMunicipality,
    RuralMunicipality,
}

impl AdministrativeTier {
    pub const ALL: [AdministrativeTier; 8] = [
        Self::Gdos,
        Self::Rdos,
        Self::Voivodeship,
        Self::CityCounty,
        Self::County,
        Self::UrbanMunicipality,
        Self::UrbanRuralMunicipality,
        Self::RuralMunicipality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gdos => "gdos",
            Self::Rdos => "rdos",
            Self::Voivodeship => "voivodeship",
            Self::CityCounty => "city_county",
            Self::County => "county",
            Self::UrbanMunicipality => "urban_municipality",
            Self::UrbanRuralMunicipality => "urban_rural_municipality",
            Self::RuralMunicipality => "rural_municipality",
        }
    }

    /// Group name in the grouped registry file.
    pub fn group_key(&self) -> &'static str {
        match self {
            Self::Gdos => "gdos",
            Self::Rdos => "rdos",
            Self::Voivodeship => "voivodeships",
            Self::CityCounty => "miasta_na_prawach_powiatu",
            Self::County => "powiaty",
            Self::UrbanMunicipality => "gminy_miejskie",
            Self::UrbanRuralMunicipality => "gminy_miejsko_wiejskie",
            Self::RuralMunicipality => "gminy_wiejskie",
        }
    }

    /// Singular `type` value used by individual registry entries.
    fn type_key(&self) -> &'static str {
        match self {
            Self::Gdos => "gdos",
            Self::Rdos => "rdos",
            Self::Voivodeship => "voivodeship",
            Self::CityCounty => "miasto_na_prawach_powiatu",
            Self::County => "powiat",
            Self::UrbanMunicipality => "gmina_miejska",
            Self::UrbanRuralMunicipality => "gmina_miejsko_wiejska",
            Self::RuralMunicipality => "gmina_wiejska",
        }
    }
}

impl fmt::Display for AdministrativeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.group_key())
    }
}

impl FromStr for AdministrativeTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        let wanted = if wanted == "powiaty_sample" {
            "powiaty".to_string()
        } else {
            wanted
        };
        Self::ALL
            .into_iter()
            .find(|tier| {
                wanted == tier.group_key() || wanted == tier.type_key() || wanted == tier.as_str()
            })
            .ok_or_else(|| format!("unknown tier '{s}'"))
    }
}

/// One crawlable BIP site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Stable registry id, e.g. `rdos-gdansk`
    pub id: String,

    pub name: String,

    pub tier: AdministrativeTier,

    /// Voivodeship name; empty for the national directorate
    #[serde(default)]
    pub voivodeship: String,

    pub base_url: Url,

    /// Name of the extraction strategy to try first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_hint: Option<String>,

    /// Known path of the environmental-notices section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_path: Option<String>,
}

impl SourceDescriptor {
    /// URL the crawl of this source starts from.
    pub fn entry_url(&self) -> Url {
        self.listing_path
            .as_deref()
            .and_then(|path| join_path(&self.base_url, path))
            .unwrap_or_else(|| self.base_url.clone())
    }
}

// --- Grouped registry file ---

/// Entry as stored in the grouped registry JSON.
#[derive(Debug, Deserialize)]
struct RegistryEntry {
    id: String,
    name: String,
    #[serde(default)]
    voivodeship: Option<String>,
    #[serde(default)]
    bip_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "listing_path")]
    env_path: Option<String>,
    #[serde(default, alias = "structure_hint")]
    hint: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl RegistryEntry {
    fn into_descriptor(self, group_tier: AdministrativeTier) -> Result<SourceDescriptor> {
        let tier = match self.kind.as_deref() {
            Some(kind) => kind
                .parse()
                .map_err(|e: String| AppError::registry(format!("source '{}': {e}", self.id)))?,
            None => group_tier,
        };
        let raw_url = self
            .bip_url
            .filter(|u| !u.trim().is_empty())
            .or(self.url)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::registry(format!("source '{}' has no URL", self.id)))?;
        let base_url = Url::parse(raw_url.trim()).map_err(|e| {
            AppError::registry(format!("source '{}' has invalid URL '{raw_url}': {e}", self.id))
        })?;

        Ok(SourceDescriptor {
            id: self.id,
            name: self.name,
            tier,
            voivodeship: self.voivodeship.unwrap_or_default(),
            base_url,
            structure_hint: self.hint.filter(|h| !h.trim().is_empty()),
            listing_path: self.env_path.filter(|p| !p.trim().is_empty()),
        })
    }
}

/// Immutable, validated catalogue of sources.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<SourceDescriptor>>,
}

impl SourceRegistry {
    /// Build a registry, rejecting duplicate ids, empty names and non-http URLs.
    pub fn new(sources: Vec<SourceDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for source in &sources {
            if source.id.trim().is_empty() {
                return Err(AppError::registry("source with empty id"));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(AppError::registry(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
            if source.name.trim().is_empty() {
                return Err(AppError::registry(format!(
                    "source '{}' has an empty name",
                    source.id
                )));
            }
            if !matches!(source.base_url.scheme(), "http" | "https") {
                return Err(AppError::registry(format!(
                    "source '{}' has non-http URL {}",
                    source.id, source.base_url
                )));
            }
        }
        Ok(Self {
            sources: sources.into_iter().map(Arc::new).collect(),
        })
    }

    /// Load a registry from JSON.
    ///
    /// Two layouts are accepted: a flat array of descriptors, or an object
    /// of groups (`gdos`, `rdos`, `voivodeships`, `miasta_na_prawach_powiatu`,
    /// `powiaty` or `powiaty_sample`, `gminy_miejskie`,
    /// `gminy_miejsko_wiejskie`, `gminy_wiejskie`) whose entries carry
    /// `bip_url` (or `url`) and an optional `env_path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        if value.is_array() {
            let sources: Vec<SourceDescriptor> = serde_json::from_value(value)?;
            return Self::new(sources);
        }

        let mut groups: BTreeMap<String, serde_json::Value> = serde_json::from_value(value)?;
        if !groups.contains_key("powiaty") {
            if let Some(sample) = groups.remove("powiaty_sample") {
                groups.insert("powiaty".to_string(), sample);
            }
        }

        let mut sources = Vec::new();
        for tier in AdministrativeTier::ALL {
            let Some(group) = groups.remove(tier.group_key()) else {
                continue;
            };
            let entries: Vec<RegistryEntry> = serde_json::from_value(group)?;
            for entry in entries {
                sources.push(entry.into_descriptor(tier)?);
            }
        }
        for unknown in groups.keys() {
            log::debug!("Ignoring unknown registry group '{unknown}'");
        }

        Self::new(sources)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SourceDescriptor>> {
        self.sources.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<SourceDescriptor>> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Source counts per tier, in tier order.
    pub fn count_by_tier(&self) -> BTreeMap<AdministrativeTier, usize> {
        let mut counts = BTreeMap::new();
        for source in &self.sources {
            *counts.entry(source.tier).or_insert(0) += 1;
        }
        counts
    }

    /// Source counts per voivodeship, sorted by name.
    pub fn count_by_voivodeship(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for source in &self.sources {
            let key = if source.voivodeship.is_empty() {
                "(national)".to_string()
            } else {
                source.voivodeship.clone()
            };
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }
}

/// Subset of the registry a run should crawl. Empty lists select everything.
///
/// Criteria combine with AND; values within one list combine with OR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSelection {
    #[serde(default)]
    pub ids: Vec<String>,

    /// Matched ignoring case and diacritics
    #[serde(default)]
    pub voivodeships: Vec<String>,

    #[serde(default)]
    pub tiers: Vec<AdministrativeTier>,
}

impl SourceSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.ids.is_empty() && self.voivodeships.is_empty() && self.tiers.is_empty()
    }

    pub fn matches(&self, source: &SourceDescriptor) -> bool {
        let id_ok = self.ids.is_empty() || self.ids.iter().any(|id| id == &source.id);
        let tier_ok = self.tiers.is_empty() || self.tiers.contains(&source.tier);
        let voiv_ok = self.voivodeships.is_empty() || {
            let have = normalize(&source.voivodeship);
            self.voivodeships.iter().any(|v| normalize(v) == have)
        };
        id_ok && tier_ok && voiv_ok
    }

    /// Selected sources in registry order.
    pub fn apply(&self, registry: &SourceRegistry) -> Vec<Arc<SourceDescriptor>> {
        registry
            .iter()
            .filter(|s| self.matches(s))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPED: &str = r#"{
        "gdos": [{"id": "gdos", "name": "GDOŚ", "bip_url": "https://www.gov.pl/web/gdos"}],
        "rdos": [{"id": "rdos-gdansk", "name": "RDOŚ w Gdańsku", "voivodeship": "pomorskie",
                  "url": "https://www.gov.pl/web/rdos-gdansk", "env_path": "/obwieszczenia"}],
        "powiaty_sample": [{"id": "pow-kartuski", "name": "Powiat kartuski",
                            "voivodeship": "pomorskie", "bip_url": "https://bip.kartuzy.pl"}],
        "gminy_wiejskie": [{"id": "gw-zukowo", "name": "Gmina Żukowo", "voivodeship": "Pomorskie",
                            "bip_url": "https://bip.zukowo.pl", "type": "gmina_miejsko_wiejska"}],
        "unexpected": []
    }"#;

    #[test]
    fn test_load_grouped_registry() {
        let registry = SourceRegistry::from_json(GROUPED).unwrap();
        assert_eq!(registry.len(), 4);

        let rdos = registry.get("rdos-gdansk").unwrap();
        assert_eq!(rdos.tier, AdministrativeTier::Rdos);
        assert_eq!(
            rdos.entry_url().as_str(),
            "https://www.gov.pl/obwieszczenia"
        );

        let county = registry.get("pow-kartuski").unwrap();
        assert_eq!(county.tier, AdministrativeTier::County);
        assert_eq!(county.entry_url().as_str(), "https://bip.kartuzy.pl/");

        // Explicit entry type overrides the group.
        let gmina = registry.get("gw-zukowo").unwrap();
        assert_eq!(gmina.tier, AdministrativeTier::UrbanRuralMunicipality);
    }

    #[test]
    fn test_load_flat_registry() {
        let json = r#"[{"id": "a", "name": "A", "tier": "county",
                        "voivodeship": "opolskie", "base_url": "https://a.example.pl/"}]"#;
        let registry = SourceRegistry::from_json(json).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.count_by_tier()[&AdministrativeTier::County], 1);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{"gdos": [
            {"id": "x", "name": "X", "bip_url": "https://x.pl"},
            {"id": "x", "name": "Y", "bip_url": "https://y.pl"}
        ]}"#;
        assert!(matches!(
            SourceRegistry::from_json(json),
            Err(AppError::Registry(_))
        ));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let json = r#"{"gdos": [{"id": "x", "name": "X", "bip_url": "not a url"}]}"#;
        assert!(SourceRegistry::from_json(json).is_err());
        let json = r#"{"gdos": [{"id": "x", "name": "X"}]}"#;
        assert!(SourceRegistry::from_json(json).is_err());
    }

    #[test]
    fn test_selection_combines_criteria() {
        let registry = SourceRegistry::from_json(GROUPED).unwrap();

        let all = SourceSelection::all().apply(&registry);
        assert_eq!(all.len(), 4);

        let pomorskie = SourceSelection {
            voivodeships: vec!["POMORSKIE".into()],
            ..Default::default()
        };
        assert_eq!(pomorskie.apply(&registry).len(), 3);

        let pomorskie_counties = SourceSelection {
            voivodeships: vec!["pomorskie".into()],
            tiers: vec![AdministrativeTier::County],
            ..Default::default()
        };
        let picked = pomorskie_counties.apply(&registry);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "pow-kartuski");
    }

    #[test]
    fn test_bundled_registry_loads() {
        let registry = SourceRegistry::from_json(include_str!("../../data/sources.json")).unwrap();
        assert_eq!(registry.len(), 9);
        assert_eq!(registry.count_by_tier().len(), AdministrativeTier::ALL.len());
        assert_eq!(
            registry.get("rdos-gdansk").unwrap().entry_url().as_str(),
            "https://www.gov.pl/web/rdos-gdansk/obwieszczenia-i-zawiadomienia"
        );
        assert_eq!(
            registry.get("mnpp-gdynia").unwrap().structure_hint.as_deref(),
            Some("labeled_table")
        );
    }

    #[test]
    fn test_tier_from_str() {
        assert_eq!("powiaty".parse(), Ok(AdministrativeTier::County));
        assert_eq!("powiat".parse(), Ok(AdministrativeTier::County));
        assert_eq!("city_county".parse(), Ok(AdministrativeTier::CityCounty));
        assert_eq!(
            "gminy-wiejskie".parse(),
            Ok(AdministrativeTier::RuralMunicipality)
        );
        assert!("kraj".parse::<AdministrativeTier>().is_err());
    }
}
