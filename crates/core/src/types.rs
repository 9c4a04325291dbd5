//! Shared identifier types.

/// Short opaque job identifier, also the name of the job's directory.
pub type JobId = String;

/// Length of a freshly generated job id.
pub const JOB_ID_LEN: usize = 10;

/// Upper bound on ids accepted from callers.
const MAX_JOB_ID_LEN: usize = 64;

/// Generate a new job id: the first [`JOB_ID_LEN`] characters of a UUID v4.
pub fn new_job_id() -> JobId {
    let mut id = uuid::Uuid::new_v4().to_string();
    id.truncate(JOB_ID_LEN);
    id
}

/// Whether `id` is safe to use as a directory name under the output root.
///
/// Only ASCII alphanumerics and `-` are accepted, which rules out path
/// separators, `..`, and empty names.
pub fn is_valid_job_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_JOB_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
