use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::models::ChangeType;
use crate::utils::error::AppError;

/// A tracked product variant as stored after its latest refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    /// Price change against the previous refresh, signed.
    pub delta: Decimal,
    /// Variant tag (a colour code on the retailer page), used for display only.
    pub variant: String,
}

/// What the retailer page reports for an item right now.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchedItem {
    pub name: String,
    pub price: Decimal,
}

/// Raw `items` row. Decimals live in SQLite as canonical text.
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: String,
    pub name: String,
    pub price: String,
    pub delta: String,
    pub variant: String,
}

impl Item {
    pub fn change_type(&self) -> ChangeType {
        ChangeType::from_delta(self.delta)
    }

    /// Unsigned size of the last change.
    pub fn delta_magnitude(&self) -> Decimal {
        self.delta.abs()
    }
}

impl TryFrom<ItemRow> for Item {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let price = parse_stored_decimal(&row.id, "price", &row.price)?;
        let delta = parse_stored_decimal(&row.id, "delta", &row.delta)?;
        Ok(Item {
            id: row.id,
            name: row.name,
            price,
            delta,
            variant: row.variant,
        })
    }
}

fn parse_stored_decimal(id: &str, column: &str, raw: &str) -> Result<Decimal, AppError> {
    Decimal::from_str(raw)
        .map_err(|e| AppError::Store(format!("corrupt {} for item {}: {:?} ({})", column, id, raw, e)))
}
