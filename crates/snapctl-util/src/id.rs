//! Job identifiers.
//!
//! A job id tags the pre/post snapshot pair of a wrapped run so the pair can
//! be found again from the snapshot list. It is `job_` followed by a
//! lower-case ULID, so ids sort by creation time.

use ulid::Ulid;

const JOB_PREFIX: &str = "job_";

/// Generate a fresh job id.
pub fn job_id() -> String {
    job_id_from(Ulid::new())
}

/// Render the job id for a given ULID.
pub fn job_id_from(ulid: Ulid) -> String {
    format!("{JOB_PREFIX}{}", ulid.to_string().to_lowercase())
}
