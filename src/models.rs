pub mod todo_item;
pub mod todo_list;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Id/title pair for enumerations exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LookupDto {
    pub id: i64,
    pub title: String,
}
