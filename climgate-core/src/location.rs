use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Column header of the engine input file, in row order.
pub const INPUT_HEADER: [&str; 5] = ["id1", "id2", "lat", "long", "elev"];

/// Normal-period dataset used when a query does not name one.
pub const DEFAULT_REFERENCE_DATASET: &str = "Normal_1991_2020.nrm";

/// One site to evaluate.
///
/// The engine is the arbiter of what a sensible site is; only numeric sanity
/// is checked here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Primary site identifier.
    pub id1: String,
    /// Secondary site identifier.
    pub id2: String,
    /// Latitude in decimal degrees.
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// Longitude in decimal degrees.
    #[serde(rename = "long")]
    pub longitude: f64,
    /// Elevation in metres.
    #[serde(rename = "elev")]
    pub elevation: f64,
}

impl Location {
    /// Creates a location record.
    pub fn new(
        id1: impl Into<String>,
        id2: impl Into<String>,
        latitude: f64,
        longitude: f64,
        elevation: f64,
    ) -> Self {
        Self {
            id1: id1.into(),
            id2: id2.into(),
            latitude,
            longitude,
            elevation,
        }
    }

    /// Checks that every coordinate is finite and inside its range.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidLocation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), CoreError> {
        let checks = [
            ("lat", self.latitude, -90.0..=90.0),
            ("long", self.longitude, -180.0..=180.0),
            ("elev", self.elevation, f64::MIN..=f64::MAX),
        ];
        for (field, value, range) in checks {
            if !value.is_finite() || !range.contains(&value) {
                return Err(CoreError::InvalidLocation {
                    id1: self.id1.clone(),
                    id2: self.id2.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    /// The record as engine input columns, in [`INPUT_HEADER`] order.
    #[must_use]
    pub fn to_row(&self) -> [String; 5] {
        [
            self.id1.clone(),
            self.id2.clone(),
            self.latitude.to_string(),
            self.longitude.to_string(),
            self.elevation.to_string(),
        ]
    }
}

/// Output period selection understood by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Annual variables.
    #[serde(rename = "Y")]
    Annual,
    /// Seasonal variables.
    #[serde(rename = "S")]
    Seasonal,
    /// Monthly variables.
    #[serde(rename = "M")]
    #[default]
    Monthly,
    /// Annual, seasonal and monthly together.
    #[serde(rename = "YSM")]
    All,
}

impl Mode {
    /// The flag value passed on the engine command line.
    #[must_use]
    pub const fn as_flag(self) -> &'static str {
        match self {
            Mode::Annual => "Y",
            Mode::Seasonal => "S",
            Mode::Monthly => "M",
            Mode::All => "YSM",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag())
    }
}

/// Name of a normal-period parameter file shipped with the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferenceDataset(String);

impl ReferenceDataset {
    /// Validates and wraps a dataset name.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidReferenceDataset`] for empty names and names
    /// containing path separators or `..`.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty()
            || name.contains(['/', '\\', ':'])
            || name.contains("..")
        {
            return Err(CoreError::InvalidReferenceDataset(name));
        }
        Ok(Self(name))
    }

    /// Returns the dataset name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReferenceDataset {
    fn default() -> Self {
        Self(DEFAULT_REFERENCE_DATASET.to_owned())
    }
}

impl TryFrom<String> for ReferenceDataset {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReferenceDataset> for String {
    fn from(value: ReferenceDataset) -> Self {
        value.0
    }
}

impl fmt::Display for ReferenceDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
