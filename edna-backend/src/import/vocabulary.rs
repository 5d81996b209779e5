use std::collections::HashMap;

use heck::ToSnakeCase;
use itertools::Itertools;

use crate::db::model::measurement::MeasurementType;

/// The measurement-type table loaded once per batch and indexed by every
/// spelling a spreadsheet header might use, so per-row matching is pure and
/// never touches storage.
pub struct Vocabulary {
    by_variant: HashMap<String, usize>,
    types: Vec<MeasurementType>,
}

impl Vocabulary {
    pub fn new(types: Vec<MeasurementType>) -> Self {
        let mut by_variant = HashMap::new();

        for (i, measurement_type) in types.iter().enumerate() {
            let MeasurementType { code, name, .. } = measurement_type;

            let variants = [
                code.to_lowercase(),
                name.to_lowercase(),
                name.to_snake_case(),
                name.to_lowercase().replace('_', " "),
                strip_separators(name),
                strip_separators(code),
            ];

            for variant in variants.into_iter().unique() {
                if variant.is_empty() {
                    continue;
                }
                // First definition wins when two types collide on a spelling.
                by_variant.entry(variant).or_insert(i);
            }
        }

        Self { by_variant, types }
    }

    /// Matches a normalized column header against the vocabulary.
    pub fn resolve(&self, column_key: &str) -> Option<&MeasurementType> {
        let key = column_key.trim().to_lowercase();

        self.by_variant
            .get(&key)
            .or_else(|| self.by_variant.get(&strip_separators(&key)))
            .map(|&i| &self.types[i])
    }
}

fn strip_separators(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Cell contents that field crews use to mean "no reading".
pub fn is_placeholder(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "" | "na" | "n/a" | "none"
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use uuid::Uuid;

    use super::{Vocabulary, is_placeholder};
    use crate::db::model::measurement::MeasurementType;

    fn vocabulary() -> Vocabulary {
        Vocabulary::new(vec![
            MeasurementType {
                id: Uuid::now_v7(),
                code: "water_temp".to_string(),
                name: "Water Temperature".to_string(),
                unit: "°C".to_string(),
            },
            MeasurementType {
                id: Uuid::now_v7(),
                code: "env_ph".to_string(),
                name: "pH".to_string(),
                unit: String::new(),
            },
        ])
    }

    #[rstest]
    #[case("water_temp")]
    #[case("Water Temperature")]
    #[case("water_temperature")]
    #[case("WaterTemperature")]
    #[case("WATER TEMP")]
    fn spelling_variants_resolve(#[case] header: &str) {
        let resolved = vocabulary().resolve(header).map(|t| t.code.clone());

        assert_eq!(resolved, Some("water_temp".to_string()));
    }

    #[test]
    fn unknown_headers_do_not_resolve() {
        assert!(vocabulary().resolve("dissolved_oxygen").is_none());
        assert!(vocabulary().resolve("").is_none());
    }

    #[rstest]
    #[case("", true)]
    #[case("  ", true)]
    #[case("NA", true)]
    #[case("n/a", true)]
    #[case("None", true)]
    #[case("0", false)]
    #[case("7.9", false)]
    fn placeholders(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_placeholder(value), expected);
    }
}
