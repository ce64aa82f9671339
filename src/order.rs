//! Repair order model and the inbound form payload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder for required text fields the form left out.
pub const MISSING_FIELD: &str = "未填寫";

/// Placeholder for a missing fault description.
pub const MISSING_DESCRIPTION: &str = "無詳細描述";

/// JSON body of `POST /submit_repair`.
///
/// Every field is optional on the wire; absent order fields fall back to
/// placeholder text, and an absent captcha token fails verification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub captcha: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SubmitRequest {
    /// Split into the captcha token and the normalized order.
    pub fn into_parts(self) -> (Option<String>, RepairOrder) {
        let order = RepairOrder::new(
            or_placeholder(self.customer_name, MISSING_FIELD),
            or_placeholder(self.phone, MISSING_FIELD),
            or_placeholder(self.address, MISSING_FIELD),
            or_placeholder(self.issue_type, MISSING_FIELD),
            or_placeholder(self.description, MISSING_DESCRIPTION),
        );
        (self.captcha, order)
    }
}

fn or_placeholder(value: Option<String>, placeholder: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => placeholder.to_string(),
    }
}

/// A customer's repair request, immutable once built from the form.
///
/// `id` is a server-assigned correlation ID for logs and relays.
/// The receive timestamp is assigned by the ledger, see [`crate::ledger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairOrder {
    pub id: Uuid,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub issue_type: String,
    pub description: String,
}

impl RepairOrder {
    pub fn new(
        customer_name: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
        issue_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_name: customer_name.into(),
            phone: phone.into(),
            address: address.into(),
            issue_type: issue_type.into(),
            description: description.into(),
        }
    }
}
