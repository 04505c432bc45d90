use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod item;
pub mod user;

// Re-exports for convenience
pub use item::*;
pub use user::*;

/// Direction of the last price change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Increased,
    Decreased,
    Unchanged,
}

impl ChangeType {
    pub fn from_delta(delta: Decimal) -> Self {
        if delta.is_zero() {
            ChangeType::Unchanged
        } else if delta.is_sign_positive() {
            ChangeType::Increased
        } else {
            ChangeType::Decreased
        }
    }
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
