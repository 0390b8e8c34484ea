//! Loading a decoded recording into an immutable sample sequence.

use crate::types::{AccelSemantics, Metadata, RawRecord, Sample};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Recording contains no records")]
    EmptyInput,
    #[error("Metadata record at position {index}; only the first record may be metadata")]
    MisplacedMetadata { index: usize },
    #[error("Recording is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a recording document (a JSON array of records).
pub fn parse_records(json: &str) -> Result<Vec<RawRecord>, LoadError> {
    Ok(serde_json::from_str(json)?)
}

/// A finite, ordered sequence of samples plus optional metadata.
#[derive(Debug, Clone)]
pub struct Recording {
    samples: Vec<Sample>,
    metadata: Option<Metadata>,
    semantics: AccelSemantics,
}

impl Recording {
    /// Build a recording from decoded records.
    ///
    /// A leading `"metadata"` record is split off; any other metadata record
    /// rejects the whole recording.
    pub fn load(records: Vec<RawRecord>) -> Result<Self, LoadError> {
        if records.is_empty() {
            return Err(LoadError::EmptyInput);
        }

        let mut records = records.into_iter();
        let mut metadata = None;
        let mut samples = Vec::with_capacity(records.len());

        if let Some(first) = records.next() {
            if first.is_metadata() {
                metadata = Some(Metadata::from(first));
            } else {
                samples.push(Sample::from(first));
            }
        }

        for (offset, record) in records.enumerate() {
            if record.is_metadata() {
                return Err(LoadError::MisplacedMetadata { index: offset + 1 });
            }
            samples.push(Sample::from(record));
        }

        let semantics = detect_semantics(&samples);
        tracing::info!(
            samples = samples.len(),
            duration_s = metadata.as_ref().and_then(Metadata::duration_secs),
            ?semantics,
            "Recording loaded"
        );

        Ok(Self {
            samples,
            metadata,
            semantics,
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Acceleration semantics declared by the samples.
    pub fn semantics(&self) -> AccelSemantics {
        self.semantics
    }

    /// Human-readable load summary, e.g. "Loaded 1200 samples (12.5s)".
    pub fn summary(&self) -> String {
        match self.metadata.as_ref().and_then(Metadata::duration_secs) {
            Some(secs) => format!("Loaded {} samples ({}s)", self.samples.len(), secs),
            None => format!("Loaded {} samples", self.samples.len()),
        }
    }
}

/// Raw accelerometer data is declared by the `accelerationCorrected` field.
fn detect_semantics(samples: &[Sample]) -> AccelSemantics {
    if samples.iter().any(|s| s.acceleration_corrected.is_some()) {
        AccelSemantics::Raw
    } else {
        AccelSemantics::GravityCompensated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(t: f64) -> RawRecord {
        RawRecord {
            relative_time: Some(t),
            interval: Some(10.0),
            ..Default::default()
        }
    }

    fn metadata_record() -> RawRecord {
        RawRecord {
            kind: Some("metadata".into()),
            recording_duration: Some(2500.0),
            ..Default::default()
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            Recording::load(Vec::new()),
            Err(LoadError::EmptyInput)
        ));
    }

    #[test]
    fn leading_metadata_is_split_off() {
        let records = vec![metadata_record(), sample_record(0.0), sample_record(10.0)];
        let recording = Recording::load(records).unwrap();

        assert_eq!(recording.len(), 2);
        assert_eq!(recording.samples()[1].relative_time_ms, Some(10.0));
        let meta = recording.metadata().unwrap();
        assert_eq!(meta.duration_secs(), Some(2.5));
        assert_eq!(recording.summary(), "Loaded 2 samples (2.5s)");
    }

    #[test]
    fn recording_without_metadata_keeps_every_record() {
        let records = vec![sample_record(0.0), sample_record(10.0), sample_record(20.0)];
        let recording = Recording::load(records).unwrap();

        assert_eq!(recording.len(), 3);
        assert!(recording.metadata().is_none());
        assert_eq!(recording.summary(), "Loaded 3 samples");
    }

    #[test]
    fn metadata_after_first_record_is_rejected() {
        let records = vec![sample_record(0.0), metadata_record(), sample_record(10.0)];
        match Recording::load(records) {
            Err(LoadError::MisplacedMetadata { index }) => assert_eq!(index, 1),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn second_metadata_record_is_rejected() {
        let records = vec![metadata_record(), sample_record(0.0), metadata_record()];
        match Recording::load(records) {
            Err(LoadError::MisplacedMetadata { index }) => assert_eq!(index, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn metadata_only_recording_loads_with_no_samples() {
        let recording = Recording::load(vec![metadata_record()]).unwrap();
        assert!(recording.is_empty());
    }

    #[test]
    fn semantics_follow_acceleration_fields() {
        let json = r#"[
            {"relativeTime": 0, "interval": 10, "acceleration": {"x": 0, "y": 0, "z": 0}}
        ]"#;
        let recording = Recording::load(parse_records(json).unwrap()).unwrap();
        assert_eq!(recording.semantics(), AccelSemantics::GravityCompensated);

        let json = r#"[
            {"relativeTime": 0, "interval": 10, "accelerationCorrected": {"x": 0, "y": 9.8, "z": 0}}
        ]"#;
        let recording = Recording::load(parse_records(json).unwrap()).unwrap();
        assert_eq!(recording.semantics(), AccelSemantics::Raw);
    }

    #[test]
    fn malformed_json_is_a_load_error() {
        assert!(matches!(parse_records("[{"), Err(LoadError::Json(_))));
    }
}
