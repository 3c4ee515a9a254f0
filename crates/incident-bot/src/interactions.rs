//! Interactive component payloads (button clicks).

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub user: PayloadUser,
    #[serde(default)]
    pub channel: Option<PayloadChannel>,
    #[serde(default)]
    pub actions: Vec<BlockAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadUser {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadChannel {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl InteractionPayload {
    /// Slack wraps the JSON payload in a `payload` form field.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, String> {
        let raw = form
            .get("payload")
            .ok_or_else(|| "missing payload field".to_string())?;
        serde_json::from_str(raw).map_err(|e| format!("invalid interaction payload: {e}"))
    }

    #[must_use]
    pub fn is_block_actions(&self) -> bool {
        self.kind == "block_actions"
    }

    #[must_use]
    pub fn channel_id(&self) -> &str {
        self.channel.as_ref().map_or("", |c| c.id.as_str())
    }

    /// Values of the clicked actions with the given id.
    pub fn action_values<'a>(&'a self, action_id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.actions
            .iter()
            .filter(move |a| a.action_id == action_id)
            .filter_map(|a| a.value.as_deref())
            .filter(|v| !v.is_empty())
    }
}
