use serde::{Deserialize, Serialize};

use crate::model::ConditionModel;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeModel {
    /// Optional id; defaults to `"{from}->{to}"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    /// Edges without a condition are unconditional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionModel>,
}

impl EdgeModel {
    pub fn new(
        from: &str,
        to: &str,
    ) -> Self {
        Self {
            id: None,
            from: from.to_string(),
            to: to.to_string(),
            condition: None,
        }
    }

    pub fn with_condition(
        mut self,
        condition: ConditionModel,
    ) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn edge_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| format!("{}->{}", self.from, self.to))
    }
}
