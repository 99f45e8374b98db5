use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// The only legal transition is `New -> Done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order was placed and is still being prepared.
    New,
    /// Order was completed.
    Done,
}

/// A single pizza order.
///
/// This structure is the payload pushed to every connected viewer, one order
/// per text frame:
///
/// ```text
/// {"id":"order_1700000000000000000","pizza":"Margherita","customerName":"Sam Lee",
///  "address":"12 Main St","phoneNumber":"(555) 123-4567","status":"new",
///  "timestamp":"2024-01-01T12:00:00Z"}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique order ID, e.g. `"order_1700000000000000000"`.
    pub id: String,

    /// Ordered item.
    pub pizza: String,

    /// Customer full name.
    pub customer_name: String,

    /// Delivery address.
    pub address: String,

    /// Customer phone number.
    pub phone_number: String,

    /// Current lifecycle status.
    pub status: OrderStatus,

    /// Creation time as an RFC3339 string.
    ///
    /// Kept as text because it is what goes over the wire; the sweep parses
    /// it and skips the order when parsing fails.
    pub timestamp: String,
}

impl Order {
    /// Returns `true` while the order has not been completed.
    pub fn is_active(&self) -> bool {
        self.status != OrderStatus::Done
    }

    /// Marks the order as done. Re-applying it to a done order is a no-op.
    pub fn mark_done(&mut self) -> &mut Self {
        self.status = OrderStatus::Done;
        self
    }

    /// Parses the creation timestamp.
    ///
    /// Returns `None` for malformed timestamps.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Serializes the order into the JSON text frame sent to clients.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Formats a timestamp the way orders carry it (RFC3339, second precision, `Z`).
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
