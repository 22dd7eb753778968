use serde::{Deserialize, Serialize};

/// One entry of a reorder request: the sibling `id` moves to position `order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub id: String,
    pub order: i64,
}

/// Which collection a reorder request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReorderEntity {
    Space,
    Category,
    Bookmark,
}
