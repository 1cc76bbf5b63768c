//! Map configuration.

use std::path::{Path, PathBuf};
use rgb::RGB8;
use serde::{Deserialize, Serialize};
use crate::{Error, Interpolation, NumberFormat, Result, Scheme};

/// Everything that distinguishes one map from another.
///
/// Read from JSON with camelCase keys; absent keys take their
/// [`Default`] value, which describes regional price parities of
/// 2018 on a divergent red-yellow-blue scale.
///
/// ```
/// use choropleth::{MapConfig, Scheme};
/// let config = MapConfig::from_json(r##"{
///     "observationField": "rpp",
///     "scheme": { "kind": "sequential", "low": "#f7fbff", "high": "#08306b" },
///     "steps": 6
/// }"##).unwrap();
/// assert_eq!(config.steps, 6);
/// assert!(matches!(config.scheme, Scheme::Sequential { .. }));
/// assert_eq!(config.county_id_field, "county");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct MapConfig {
    /// CSV file of observations.
    pub data_path: PathBuf,
    /// TopoJSON file with `counties` and `states` objects.
    pub geometry_path: PathBuf,
    /// Preset name or specifier, see [`NumberFormat::lookup`].
    pub legend_format: String,
    pub tooltip_format: String,
    pub county_id_field: String,
    pub county_name_field: String,
    pub observation_field: String,
    /// Range labels (`$80-$85`, …, `$125+`) rather than lower bounds.
    pub range_truncated: bool,
    pub scheme: Scheme,
    pub interpolation: Interpolation,
    /// Lower bound of the first bin.
    pub min: f64,
    /// Lower bound of the last, open-ended, bin.
    pub max: f64,
    /// Number of bins (not counting "No Data").
    pub steps: usize,
    /// State borders.
    #[serde(with = "crate::hex_color")]
    pub border_color: RGB8,
    /// Counties without an observation.
    #[serde(with = "crate::hex_color")]
    pub no_data_color: RGB8,
    pub width: f64,
    pub height: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            data_path: PathBuf::from("data/rpp-2018-county.csv"),
            geometry_path: PathBuf::from("data/us.json"),
            legend_format: "dollars".to_string(),
            tooltip_format: "dollarsAndCents".to_string(),
            county_id_field: "county".to_string(),
            county_name_field: "name".to_string(),
            observation_field: "value".to_string(),
            range_truncated: true,
            scheme: Scheme::Divergent { low: RGB8::new(0xd7, 0x30, 0x27),
                                        mid: RGB8::new(0xff, 0xff, 0xbf),
                                        high: RGB8::new(0x45, 0x75, 0xb4) },
            interpolation: Interpolation::Hsl,
            min: 75.,
            max: 125.,
            steps: 11,
            border_color: RGB8::new(0xff, 0xff, 0xff),
            no_data_color: RGB8::new(0xdd, 0xdd, 0xdd),
            width: 580.,
            height: 450.,
        }
    }
}

impl MapConfig {
    /// Parse and validate a configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MapConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file.  Relative data and geometry paths
    /// are taken relative to the directory of `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut config = Self::from_json(&json)?;
        if let Some(dir) = path.parent() {
            config.data_path = dir.join(&config.data_path);
            config.geometry_path = dir.join(&config.geometry_path);
        }
        log::debug!("configuration {}: {config:?}", path.display());
        Ok(config)
    }

    /// Check the invariants the scale and legend builders rely on.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if self.steps == 0 {
            return invalid("steps must be at least 1".into())
        }
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return invalid(format!("min ({}) must be less than max ({})",
                                   self.min, self.max))
        }
        if !(self.width > 0. && self.height > 0.) {
            return invalid(format!("canvas {}×{} is empty", self.width, self.height))
        }
        for (key, field) in [("countyIdField", &self.county_id_field),
                             ("observationField", &self.observation_field)] {
            if field.is_empty() { return invalid(format!("{key} is empty")) }
        }
        NumberFormat::lookup(&self.legend_format)?;
        NumberFormat::lookup(&self.tooltip_format)?;
        Ok(())
    }
}
