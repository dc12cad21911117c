//! Schema-versioned JSON envelope used both on the wire and in the local cache file
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "source": "national-police-agency",
//!   "updatedAt": "2026-09-30T00:00:00Z",
//!   "count": 2,
//!   "records": [
//!     {"id": "11-0001", "lat": 37.5665, "lon": 126.978, "limitKph": 60},
//!     {"id": "11-0002", "lat": 37.5651, "lon": 126.9895}
//!   ]
//! }
//! ```

use crate::grid::HazardRecord;
use crate::route::Coordinate;
use crate::{GuideError, Result};
use serde::{Deserialize, Serialize};

/// Envelope versions this build understands
pub const SUPPORTED_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetEnvelope {
    pub schema_version: u32,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub count: usize,
    pub records: Vec<EnvelopeRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeRecord {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_kph: Option<u32>,
}

impl DatasetEnvelope {
    /// Parse and version-check an envelope
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let envelope: DatasetEnvelope = serde_json::from_slice(bytes)?;
        if envelope.schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(GuideError::DatasetUnavailable(format!(
                "unsupported schema version {} (expected {})",
                envelope.schema_version, SUPPORTED_SCHEMA_VERSION
            )));
        }
        if envelope.count != envelope.records.len() {
            tracing::warn!(
                declared = envelope.count,
                actual = envelope.records.len(),
                source = %envelope.source,
                "Dataset envelope count does not match its records"
            );
        }
        Ok(envelope)
    }

    /// Wrap records into a current-version envelope
    pub fn from_records(
        source: impl Into<String>,
        updated_at: impl Into<String>,
        records: &[HazardRecord],
    ) -> Self {
        Self {
            schema_version: SUPPORTED_SCHEMA_VERSION,
            source: source.into(),
            updated_at: updated_at.into(),
            count: records.len(),
            records: records
                .iter()
                .map(|r| EnvelopeRecord {
                    id: r.id.clone(),
                    lat: r.coordinate.lat,
                    lon: r.coordinate.lon,
                    limit_kph: r.speed_limit_kph,
                })
                .collect(),
        }
    }

    /// Convert into hazard records (coordinate validation happens at index build time)
    pub fn into_records(self) -> Vec<HazardRecord> {
        self.records
            .into_iter()
            .map(|r| HazardRecord {
                id: r.id,
                coordinate: Coordinate::new(r.lat, r.lon),
                speed_limit_kph: r.limit_kph,
            })
            .collect()
    }
}
