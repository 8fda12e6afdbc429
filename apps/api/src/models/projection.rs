//! Display projection: the normalized, template-facing view of a CV record.
//!
//! Absence is the only "hide this" signal. A key is present only when its source
//! survived normalization, so templates branch on presence alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::record::{RawRecord, WORK_SLOTS};

pub const PHONE_CENTERED: &str = "phoneCentered";
pub const CERTIFICATES_HEADING: &str = "certificatesHeading";
pub const ADDITIONAL_EXPERIENCE_HEADING: &str = "additionalExperienceHeading";
pub const CONTENT_MODE: &str = "contentMode";
pub const SPARSE: &str = "sparse";

/// A single title/duration/duties block. Missing parts are empty strings so the
/// template can always lay out three lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub title: String,
    pub duration: String,
    pub duties: String,
}

/// Layout hint derived from how much history the record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// Spacious single-track layout.
    Sparse,
    /// Dense multi-column layout.
    Standard,
}

impl ContentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentMode::Sparse => "sparse",
            ContentMode::Standard => "standard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProjectionValue {
    Text(String),
    Flag(bool),
    Work(WorkExperience),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DisplayProjection(BTreeMap<String, ProjectionValue>);

impl DisplayProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, key: &str, value: impl Into<String>) {
        self.0
            .insert(key.to_string(), ProjectionValue::Text(value.into()));
    }

    pub fn set_flag(&mut self, key: &str, value: bool) {
        self.0.insert(key.to_string(), ProjectionValue::Flag(value));
    }

    pub fn set_work(&mut self, key: &str, value: WorkExperience) {
        self.0.insert(key.to_string(), ProjectionValue::Work(value));
    }

    pub fn get(&self, key: &str) -> Option<&ProjectionValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ProjectionValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    #[allow(dead_code)]
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(ProjectionValue::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn work(&self, key: &str) -> Option<&WorkExperience> {
        match self.0.get(key) {
            Some(ProjectionValue::Work(w)) => Some(w),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProjectionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Flattens a projection back into raw fields. Text values keep their key, work
/// blocks are spread over their slot's three raw keys, derived flags and headings
/// are dropped because they are not raw fields.
impl From<&DisplayProjection> for RawRecord {
    fn from(projection: &DisplayProjection) -> Self {
        let mut record = RawRecord::new();
        for (key, value) in projection.iter() {
            match value {
                ProjectionValue::Text(text) => {
                    record.insert(key, text.clone());
                }
                ProjectionValue::Work(work) => {
                    if let Some(slot) = WORK_SLOTS.iter().find(|s| s.projection_key == key) {
                        record.insert(slot.title, work.title.clone());
                        record.insert(slot.duration, work.duration.clone());
                        record.insert(slot.duties, work.duties.clone());
                    }
                }
                ProjectionValue::Flag(_) => {}
            }
        }
        record
    }
}
