// src/services/classifier.rs

//! Industry classification by ordered keyword rules.

use crate::models::{ClassificationConfig, IndustryCategory, RawRecord};
use crate::utils::text::{Term, any_term, normalize, terms};

/// Assigns each record to the first category whose keywords occur in it.
pub struct Classifier {
    rules: Vec<(IndustryCategory, Vec<Term>)>,
}

impl Classifier {
    pub fn new(config: &ClassificationConfig) -> Self {
        Self {
            rules: config
                .rules
                .iter()
                .map(|rule| (rule.category, terms(&rule.keywords)))
                .collect(),
        }
    }

    /// Classify on the description and its surrounding excerpt.
    pub fn classify(&self, record: &RawRecord) -> IndustryCategory {
        self.classify_text(&format!("{} {}", record.description, record.excerpt))
    }

    pub fn classify_text(&self, text: &str) -> IndustryCategory {
        let normalized = normalize(text);
        self.rules
            .iter()
            .find(|(_, keywords)| any_term(keywords, &normalized))
            .map_or(IndustryCategory::Unclassified, |(category, _)| *category)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ClassificationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryRule;

    #[test]
    fn test_data_center_beats_industry() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify_text(
                "Budowa centrum danych wraz z halą produkcyjną i infrastrukturą towarzyszącą"
            ),
            IndustryCategory::ItDataCenters
        );
    }

    #[test]
    fn test_common_categories() {
        let classifier = Classifier::default();
        let cases = [
            ("Budowa farmy fotowoltaicznej o mocy 20 MW", IndustryCategory::Oze),
            ("Instalacja PV na gruntach rolnych", IndustryCategory::Oze),
            ("Budowa magazynu energii BESS", IndustryCategory::Oze),
            ("Budowa linii elektroenergetycznej 110 kV", IndustryCategory::Energetyka),
            ("Wydobywanie kruszywa ze złoża Borowo", IndustryCategory::Gornictwo),
            ("Budowa centrum logistycznego z halą magazynową", IndustryCategory::Logistyka),
            ("Rozbudowa zakładu produkcyjnego mebli", IndustryCategory::Przemysl),
            ("Przebudowa drogi powiatowej nr 1234", IndustryCategory::Infrastruktura),
            ("Budowa oczyszczalni ścieków", IndustryCategory::Infrastruktura),
        ];
        for (text, expected) in cases {
            assert_eq!(classifier.classify_text(text), expected, "{text}");
        }
    }

    #[test]
    fn test_word_start_matching_avoids_false_hits() {
        let classifier = Classifier::default();
        // "raport" must not read as a sea port, "może" not as "oze".
        assert_eq!(
            classifier.classify_text("Raport o oddziaływaniu, który może zostać uzupełniony"),
            IndustryCategory::Unclassified
        );
        // Filing an application is not a mineral deposit.
        assert_eq!(
            classifier.classify_text("Złożenie wniosku o wydanie decyzji"),
            IndustryCategory::Unclassified
        );
    }

    #[test]
    fn test_no_match_is_unclassified() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify_text("Obwieszczenie w sprawie hodowli ślimaków"),
            IndustryCategory::Unclassified
        );
    }

    #[test]
    fn test_rule_order_comes_from_configuration() {
        let config = ClassificationConfig {
            rules: vec![
                CategoryRule {
                    category: IndustryCategory::Przemysl,
                    keywords: vec!["hala".into()],
                },
                CategoryRule {
                    category: IndustryCategory::ItDataCenters,
                    keywords: vec!["serwerownia".into()],
                },
            ],
        };
        let classifier = Classifier::new(&config);
        assert_eq!(
            classifier.classify_text("Hala z serwerownią"),
            IndustryCategory::Przemysl
        );
    }
}
