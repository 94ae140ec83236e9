use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

/// Stored flow definition. `data` holds the definition as JSON text.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Flow {
    pub id: String,
    pub name: String,
    pub status: String,
    pub category: Option<String>,
    pub data: String,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Flow {
    fn iden() -> StoreIden {
        StoreIden::Flows
    }
}
