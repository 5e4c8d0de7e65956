use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::Id;

/// "N years ago today" selection. At most one live row per
/// `(owner, memory_date)` after regeneration.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Memory {
    pub id: Id,
    pub owner: Id,
    pub memory_date: NaiveDate,
    pub label: String,
    pub photo_ids: sqlx::types::Json<Vec<Id>>,
}
