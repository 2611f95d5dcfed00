use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One question/answer pair of a session.
///
/// `index` is assigned by the store and is unique and strictly increasing
/// within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub index: u64,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}
