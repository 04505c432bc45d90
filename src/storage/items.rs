use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::models::{Item, ItemRow};
use crate::storage::PriceStore;
use crate::utils::error::{AppError, Result};

const SELECT_ITEM: &str = "SELECT id, name, price, delta, variant FROM items WHERE id = ?";

#[derive(Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Item> {
        let row = sqlx::query_as::<_, ItemRow>(SELECT_ITEM)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("item {}", id)))?;

        Item::try_from(row)
    }

    /// Seed a catalog entry with a zero price. Returns false if the id was already present.
    pub async fn insert_item(&self, id: &str, name: &str, variant: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO items (id, name, price, delta, variant) VALUES (?, ?, '0', '0', ?)",
        )
        .bind(id)
        .bind(name)
        .bind(variant)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>("SELECT id, name, price, delta, variant FROM items ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Item::try_from).collect()
    }
}

#[async_trait]
impl PriceStore for ItemRepository {
    async fn update_price(&self, id: &str, price: Decimal) -> Result<Item> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ItemRow>(SELECT_ITEM)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(format!("item {}", id)))?;
        let mut item = Item::try_from(row)?;

        let delta = price - item.price;
        sqlx::query("UPDATE items SET price = ?, delta = ? WHERE id = ?")
            .bind(price.to_string())
            .bind(delta.to_string())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        item.price = price;
        item.delta = delta;
        Ok(item)
    }
}
