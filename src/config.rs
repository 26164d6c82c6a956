use crate::error::{LakeError, Result};
use crate::types::{Frequency, SeriesMeta};
use serde::Deserialize;
use std::fs;

/// Raw catalog file shape. The catalog is reference data: it maps each
/// provider series id to its indicator metadata and target fact table. It is
/// loaded here, at the CLI boundary, and handed to the engine as plain data;
/// the engine itself never touches the filesystem.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    provider: ProviderConfig,
    series: Vec<SeriesEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProviderConfig {
    /// Override of the provider base URL, mainly for tests.
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesEntry {
    series_id: String,
    indicator: String,
    frequency: String,
    unit: String,
    category: String,
    subcategory: Option<String>,
    table: String,
    #[serde(default)]
    fetch_vintages: bool,
}

#[derive(Debug)]
pub struct SeriesCatalog {
    pub provider: ProviderConfig,
    pub series: Vec<SeriesMeta>,
}

impl SeriesCatalog {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LakeError::Config(format!("Failed to read catalog file '{path}': {e}"))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        if file.series.is_empty() {
            return Err(LakeError::Config("Catalog defines no series".to_string()));
        }
        let series = file
            .series
            .into_iter()
            .map(|entry| SeriesMeta {
                series_id: entry.series_id,
                indicator: entry.indicator,
                frequency: Frequency::from_catalog(&entry.frequency),
                unit: entry.unit,
                category: entry.category,
                subcategory: entry.subcategory,
                table: entry.table,
                fetch_vintages: entry.fetch_vintages,
            })
            .collect();
        Ok(Self {
            provider: file.provider,
            series,
        })
    }

    /// Series restricted to a table selection; `None` selects every table.
    pub fn series_for_tables(&self, tables: Option<&[String]>) -> Vec<&SeriesMeta> {
        self.series
            .iter()
            .filter(|meta| match tables {
                Some(selection) => selection
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(&meta.table)),
                None => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [[series]]
        series_id = "GDP"
        indicator = "GDP"
        frequency = "QUARTERLY"
        unit = "BILLIONS"
        category = "NATIONAL_ACCOUNTS"
        table = "economic_indicators"
        fetch_vintages = true

        [[series]]
        series_id = "DGS10"
        indicator = "10Y Treasury Yield"
        frequency = "WEEKLY_ODDITY"
        unit = "PERCENT"
        category = "RATES"
        subcategory = "TREASURY"
        table = "treasury_yields"
    "#;

    #[test]
    fn parses_catalog_and_defaults() {
        let catalog = SeriesCatalog::from_toml(CATALOG).unwrap();
        assert_eq!(catalog.series.len(), 2);
        assert!(catalog.series[0].fetch_vintages);
        assert!(!catalog.series[1].fetch_vintages);
        // Unrecognized frequency falls back to daily semantics.
        assert_eq!(catalog.series[1].frequency, Frequency::Daily);
    }

    #[test]
    fn table_selection_is_case_insensitive() {
        let catalog = SeriesCatalog::from_toml(CATALOG).unwrap();
        let picked = catalog.series_for_tables(Some(&["Treasury_Yields".to_string()]));
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].series_id, "DGS10");
        assert_eq!(catalog.series_for_tables(None).len(), 2);
    }

    #[test]
    fn empty_catalog_is_a_config_error() {
        assert!(SeriesCatalog::from_toml("series = []").is_err());
    }
}
