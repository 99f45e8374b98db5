use serde::Deserialize;

/// Action name that completes an order.
pub const ACTION_COMPLETE: &str = "complete";

/// A message sent by a client: `{"action": "...", "orderId": "..."}`.
///
/// Missing fields default to empty strings. Unknown actions parse fine and
/// are ignored by the session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientAction {
    /// Action name; only `"complete"` has defined behavior.
    pub action: String,
    /// Target order ID.
    pub order_id: String,
}

impl ClientAction {
    /// Parses an inbound text frame.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Returns `true` if this is a `complete` action.
    pub fn is_complete(&self) -> bool {
        self.action == ACTION_COMPLETE
    }
}
