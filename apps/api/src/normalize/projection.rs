//! Builds the display projection from a raw record.
//!
//! Order of operations per field: emptiness filter -> trim/collapse -> field rule.
//! Anything that fails the emptiness filter is left out of the projection entirely.

use crate::models::projection::{
    ADDITIONAL_EXPERIENCE_HEADING, CERTIFICATES_HEADING, CONTENT_MODE, PHONE_CENTERED, SPARSE,
};
use crate::models::record::{
    ADDITIONAL_EXPERIENCE, ADDRESS, BACKGROUND, CAREER_GOAL, CERTIFICATES, EMAIL, LANGUAGES,
    NAME, OTHER_QUALIFICATIONS, PHONE, PHOTO, REFERENCE_SLOTS, SECONDARY_EDUCATION, SKILLS,
    TERTIARY_EDUCATION, WORK_SLOTS,
};
use crate::models::{ContentMode, DisplayProjection, RawRecord, WorkExperience};
use crate::normalize::fields::{
    clean_multi_line, clean_single_line, normalize_phone, one_item_per_line,
};

pub const CERTIFICATES_HEADING_TEXT: &str = "Certificates & Qualifications";
pub const ADDITIONAL_EXPERIENCE_HEADING_TEXT: &str = "Additional Experience";

/// Identity fields that only get the single-line treatment.
const PLAIN_IDENTITY_FIELDS: [&str; 4] = [NAME, ADDRESS, PHOTO, BACKGROUND];

/// Narrative fields passed through with their line breaks intact.
const NARRATIVE_FIELDS: [&str; 3] = [CAREER_GOAL, SECONDARY_EDUCATION, TERTIARY_EDUCATION];

/// Free-text lists reflowed to one item per line.
const LIST_FIELDS: [&str; 2] = [SKILLS, LANGUAGES];

// ────────────────────────────────────────────────────────────────────────────
// Entry point
// ────────────────────────────────────────────────────────────────────────────

/// Maps a raw record to its display projection. Deterministic and total.
pub fn normalize(record: &RawRecord) -> DisplayProjection {
    let mut projection = DisplayProjection::new();

    project_identity(record, &mut projection);

    for key in NARRATIVE_FIELDS {
        if let Some(text) = clean_multi_line(record.get(key)) {
            projection.set_text(key, text);
        }
    }

    project_qualifications(record, &mut projection);

    for key in LIST_FIELDS {
        if let Some(text) = clean_multi_line(record.get(key)) {
            let items = one_item_per_line(&text);
            if !items.is_empty() {
                projection.set_text(key, items);
            }
        }
    }

    project_work_experience(record, &mut projection);

    for key in REFERENCE_SLOTS {
        if let Some(text) = clean_multi_line(record.get(key)) {
            projection.set_text(key, text);
        }
    }

    if let Some(text) = clean_multi_line(record.get(ADDITIONAL_EXPERIENCE)) {
        projection.set_text(
            ADDITIONAL_EXPERIENCE_HEADING,
            ADDITIONAL_EXPERIENCE_HEADING_TEXT,
        );
        projection.set_text(ADDITIONAL_EXPERIENCE, text);
    }

    let mode = classify_content(&projection);
    projection.set_text(CONTENT_MODE, mode.as_str());
    projection.set_flag(SPARSE, mode == ContentMode::Sparse);

    projection
}

// ────────────────────────────────────────────────────────────────────────────
// Field groups
// ────────────────────────────────────────────────────────────────────────────

fn project_identity(record: &RawRecord, projection: &mut DisplayProjection) {
    for key in PLAIN_IDENTITY_FIELDS {
        if let Some(text) = clean_single_line(record.get(key)) {
            projection.set_text(key, text);
        }
    }

    let phone = clean_single_line(record.get(PHONE)).map(|p| normalize_phone(&p));
    let email = clean_single_line(record.get(EMAIL));

    // Phone alone in the header is centered; with an email the header splits.
    projection.set_flag(PHONE_CENTERED, phone.is_some() && email.is_none());

    if let Some(phone) = phone {
        projection.set_text(PHONE, phone);
    }
    if let Some(email) = email {
        projection.set_text(EMAIL, email);
    }
}

fn project_qualifications(record: &RawRecord, projection: &mut DisplayProjection) {
    let certificates = clean_multi_line(record.get(CERTIFICATES));
    let other = clean_multi_line(record.get(OTHER_QUALIFICATIONS));

    if certificates.is_none() && other.is_none() {
        return;
    }

    projection.set_text(CERTIFICATES_HEADING, CERTIFICATES_HEADING_TEXT);
    if let Some(text) = certificates {
        projection.set_text(CERTIFICATES, text);
    }
    if let Some(text) = other {
        projection.set_text(OTHER_QUALIFICATIONS, text);
    }
}

fn project_work_experience(record: &RawRecord, projection: &mut DisplayProjection) {
    for slot in WORK_SLOTS {
        let title = clean_single_line(record.get(slot.title));
        let duration = clean_single_line(record.get(slot.duration));
        let duties = clean_multi_line(record.get(slot.duties));

        if title.is_none() && duration.is_none() && duties.is_none() {
            continue;
        }

        projection.set_work(
            slot.projection_key,
            WorkExperience {
                title: title.unwrap_or_default(),
                duration: duration.unwrap_or_default(),
                duties: duties.unwrap_or_default(),
            },
        );
    }
}

/// Sparse when there is no titled job or no tertiary education.
fn classify_content(projection: &DisplayProjection) -> ContentMode {
    let has_titled_job = WORK_SLOTS.iter().any(|slot| {
        projection
            .work(slot.projection_key)
            .is_some_and(|work| !work.title.is_empty())
    });
    let has_tertiary = projection.contains(TERTIARY_EDUCATION);

    if has_titled_job && has_tertiary {
        ContentMode::Standard
    } else {
        ContentMode::Sparse
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
