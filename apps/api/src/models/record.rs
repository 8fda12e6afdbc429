//! Raw CV field record as delivered by the web form.
//!
//! Every field is optional. Keys outside [`RECOGNIZED_FIELDS`] are dropped on
//! construction and never reach the normalizer.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

pub const NAME: &str = "name";
pub const PHONE: &str = "phone";
pub const EMAIL: &str = "email";
pub const ADDRESS: &str = "address";
pub const PHOTO: &str = "photo";
pub const BACKGROUND: &str = "background";
pub const CAREER_GOAL: &str = "careerGoal";
pub const SECONDARY_EDUCATION: &str = "secondaryEducation";
pub const TERTIARY_EDUCATION: &str = "tertiaryEducation";
pub const CERTIFICATES: &str = "certificates";
pub const OTHER_QUALIFICATIONS: &str = "otherQualifications";
pub const SKILLS: &str = "skills";
pub const LANGUAGES: &str = "languages";
pub const ADDITIONAL_EXPERIENCE: &str = "additionalExperience";

/// One repeated work-experience slot: the three raw keys it reads and the
/// projection key it is emitted under.
#[derive(Debug, Clone, Copy)]
pub struct WorkSlot {
    pub title: &'static str,
    pub duration: &'static str,
    pub duties: &'static str,
    pub projection_key: &'static str,
}

pub const WORK_SLOTS: [WorkSlot; 5] = [
    WorkSlot {
        title: "jobTitle1",
        duration: "duration1",
        duties: "duties1",
        projection_key: "experience1",
    },
    WorkSlot {
        title: "jobTitle2",
        duration: "duration2",
        duties: "duties2",
        projection_key: "experience2",
    },
    WorkSlot {
        title: "jobTitle3",
        duration: "duration3",
        duties: "duties3",
        projection_key: "experience3",
    },
    WorkSlot {
        title: "jobTitle4",
        duration: "duration4",
        duties: "duties4",
        projection_key: "experience4",
    },
    WorkSlot {
        title: "jobTitle5",
        duration: "duration5",
        duties: "duties5",
        projection_key: "experience5",
    },
];

pub const REFERENCE_SLOTS: [&str; 5] = [
    "reference1",
    "reference2",
    "reference3",
    "reference4",
    "reference5",
];

/// Every key the normalizer knows about.
pub const RECOGNIZED_FIELDS: [&str; 34] = [
    NAME,
    PHONE,
    EMAIL,
    ADDRESS,
    PHOTO,
    BACKGROUND,
    CAREER_GOAL,
    SECONDARY_EDUCATION,
    TERTIARY_EDUCATION,
    CERTIFICATES,
    OTHER_QUALIFICATIONS,
    SKILLS,
    LANGUAGES,
    ADDITIONAL_EXPERIENCE,
    "jobTitle1",
    "duration1",
    "duties1",
    "jobTitle2",
    "duration2",
    "duties2",
    "jobTitle3",
    "duration3",
    "duties3",
    "jobTitle4",
    "duration4",
    "duties4",
    "jobTitle5",
    "duration5",
    "duties5",
    "reference1",
    "reference2",
    "reference3",
    "reference4",
    "reference5",
];

/// Returns the canonical static key if `key` is recognized.
pub fn recognized_key(key: &str) -> Option<&'static str> {
    RECOGNIZED_FIELDS.iter().copied().find(|k| *k == key)
}

/// Sparse mapping from recognized field name to its raw (unnormalized) value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "HashMap<String, Option<String>>")]
pub struct RawRecord {
    fields: BTreeMap<&'static str, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from arbitrary key/value pairs, dropping unrecognized keys.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut record = Self::new();
        for (key, value) in pairs {
            record.insert(key.as_ref(), value);
        }
        record
    }

    /// Sets a field. Returns false (and stores nothing) when the key is not recognized.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> bool {
        match recognized_key(key) {
            Some(canonical) => {
                self.fields.insert(canonical, value.into());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<HashMap<String, Option<String>>> for RawRecord {
    fn from(map: HashMap<String, Option<String>>) -> Self {
        Self::from_pairs(
            map.into_iter()
                .filter_map(|(key, value)| value.map(|v| (key, v))),
        )
    }
}
