use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One uploaded CSV session, stored under the data directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataFile {
    pub id: String,
    pub subject_id: String,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub file_path: String,
    pub source_device: Option<String>,
    pub notes: Option<String>,
}
