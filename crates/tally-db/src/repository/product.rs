//! # Product Repository
//!
//! The inventory ledger: catalog CRUD and stock adjustments for one user.
//!
//! ## Stock Writers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Changes Stock?                                   │
//! │                                                                         │
//! │  insert(NewProduct)        initial stock                               │
//! │  restock(id, delta)        UPDATE ... stock = stock + delta            │
//! │                            WHERE stock BETWEEN bounds (one statement)  │
//! │  set_stock(id, n)          UPDATE ... stock = n                        │
//! │  record_sale / create debt stock = stock - qty inside the checkout     │
//! │                            transaction (repository::take_stock)        │
//! │                                                                         │
//! │  update(id, ProductUpdate) never touches stock, so an edit racing a    │
//! │  sale cannot overwrite the sale's decrement.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tally_core::validation::{validate_new_product, validate_product_update, validate_stock};
use tally_core::{
    new_id, CoreError, Money, NewProduct, Product, ProductUpdate, Rate, ValidationError,
};
use tracing::{debug, info};

use crate::error::DbResult;
use crate::feed::{ChangeFeed, Collection};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    owner_id: String,
    name: String,
    cost_cents: i64,
    margin_bps: i64,
    stock: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            cost: Money::from_cents(row.cost_cents),
            margin: Rate::from_bps(u32::try_from(row.margin_bps).unwrap_or(0)),
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, owner_id, name, cost_cents, margin_bps, stock, created_at, updated_at";

/// Repository for one user's products.
///
/// ## Usage
/// ```rust,ignore
/// let products = db.user(uid)?.products();
///
/// let flour = products.insert(NewProduct {
///     name: "Flour 1kg".into(),
///     cost: Money::from_cents(10_000),
///     margin: Rate::from_bps(2_000),
///     stock: 5,
/// }).await?;
/// assert_eq!(flour.sale_price().cents(), 12_000);
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    owner_id: String,
    feed: ChangeFeed,
}

impl ProductRepository {
    /// Creates a new ProductRepository scoped to `owner_id`.
    pub fn new(pool: SqlitePool, owner_id: impl Into<String>, feed: ChangeFeed) -> Self {
        ProductRepository {
            pool,
            owner_id: owner_id.into(),
            feed,
        }
    }

    /// Adds a product to the catalog.
    pub async fn insert(&self, new: NewProduct) -> DbResult<Product> {
        validate_new_product(&new)?;

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            owner_id: self.owner_id.clone(),
            name: new.name.trim().to_string(),
            cost: new.cost,
            margin: new.margin,
            stock: new.stock,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, owner_id, name, cost_cents, margin_bps, stock, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.owner_id)
        .bind(&product.name)
        .bind(product.cost.cents())
        .bind(i64::from(product.margin.bps()))
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        self.feed.publish(&self.owner_id, Collection::Products);
        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(&self.owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::from)
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Full catalog, ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE owner_id = ? \
             ORDER BY name COLLATE NOCASE, id"
        ))
        .bind(&self.owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Products that can be sold right now (stock > 0), ordered by name.
    pub async fn list_in_stock(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE owner_id = ? AND stock > 0 \
             ORDER BY name COLLATE NOCASE, id"
        ))
        .bind(&self.owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Edits name, cost and margin. Stock is left alone.
    ///
    /// Past sales and debts keep the price and cost they captured.
    pub async fn update(&self, id: &str, update: &ProductUpdate) -> DbResult<Product> {
        validate_product_update(update)?;

        debug!(id = %id, "Updating product");

        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "UPDATE products SET name = ?, cost_cents = ?, margin_bps = ?, updated_at = ? \
             WHERE id = ? AND owner_id = ? RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(update.name.trim())
        .bind(update.cost.cents())
        .bind(i64::from(update.margin.bps()))
        .bind(Utc::now())
        .bind(id)
        .bind(&self.owner_id)
        .fetch_optional(&self.pool)
        .await?;

        let product = row
            .map(Product::from)
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;

        self.feed.publish(&self.owner_id, Collection::Products);
        Ok(product)
    }

    /// Adds `delta` units (negative to remove) in one atomic statement.
    ///
    /// The guard bounds the stock *before* the update, so `stock + delta`
    /// is never evaluated outside the i64 range.
    ///
    /// ## Errors
    /// - `ProductNotFound`
    /// - `InsufficientStock` when the result would be negative
    /// - `OutOfRange` when the result would exceed `i64::MAX`, or for
    ///   `delta == i64::MIN`
    pub async fn restock(&self, id: &str, delta: i64) -> DbResult<Product> {
        debug!(id = %id, delta = delta, "Adjusting stock");

        let removed = delta.checked_neg().ok_or_else(|| ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -i64::MAX,
            max: i64::MAX,
        })?;
        // stock must lie in [min_before, max_before] for the update to apply
        let (min_before, max_before) = if delta < 0 {
            (removed, i64::MAX)
        } else {
            (0, i64::MAX - delta)
        };

        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "UPDATE products SET stock = stock + ?, updated_at = ? \
             WHERE id = ? AND owner_id = ? AND stock >= ? AND stock <= ? \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(delta)
        .bind(Utc::now())
        .bind(id)
        .bind(&self.owner_id)
        .bind(min_before)
        .bind(max_before)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let product = Product::from(row);
                info!(id = %id, delta = delta, stock = product.stock, "Stock adjusted");
                self.feed.publish(&self.owner_id, Collection::Products);
                Ok(product)
            }
            None => {
                // Either missing or the guard refused; `get` tells which.
                let current = self.get(id).await?;
                if delta < 0 {
                    Err(CoreError::InsufficientStock {
                        product: current.name,
                        available: current.stock,
                        requested: removed,
                    }
                    .into())
                } else {
                    Err(ValidationError::exceeds_max("stock").into())
                }
            }
        }
    }

    /// Sets stock to an absolute count (physical inventory).
    pub async fn set_stock(&self, id: &str, stock: i64) -> DbResult<Product> {
        validate_stock(stock)?;

        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "UPDATE products SET stock = ?, updated_at = ? \
             WHERE id = ? AND owner_id = ? RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(stock)
        .bind(Utc::now())
        .bind(id)
        .bind(&self.owner_id)
        .fetch_optional(&self.pool)
        .await?;

        let product = row
            .map(Product::from)
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;

        info!(id = %id, stock = stock, "Stock set");
        self.feed.publish(&self.owner_id, Collection::Products);
        Ok(product)
    }

    /// Removes a product. Sales and debts keep their line snapshots.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(&self.owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        self.feed.publish(&self.owner_id, Collection::Products);
        Ok(())
    }

    /// Counts this user's products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE owner_id = ?")
            .bind(&self.owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};
    use tally_core::{CoreError, Money, NewProduct, ProductUpdate, Rate, ValidationError};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn flour(stock: i64) -> NewProduct {
        NewProduct {
            name: "Flour 1kg".to_string(),
            cost: Money::from_cents(10_000),
            margin: Rate::from_bps(2_000),
            stock,
        }
    }

    #[tokio::test]
    async fn test_insert_and_derived_price() {
        let db = setup().await;
        let products = db.user("u1").unwrap().products();

        let product = products.insert(flour(5)).await.unwrap();
        let fetched = products.get(&product.id).await.unwrap();

        assert_eq!(fetched, product);
        assert_eq!(fetched.sale_price().cents(), 12_000);
        assert_eq!(products.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_input() {
        let db = setup().await;
        let products = db.user("u1").unwrap().products();

        let mut bad = flour(5);
        bad.name = "  ".to_string();
        assert!(matches!(
            products.insert(bad).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));
        assert_eq!(products.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_owners_are_isolated() {
        let db = setup().await;
        let alice = db.user("alice").unwrap().products();
        let bob = db.user("bob").unwrap().products();

        let product = alice.insert(flour(5)).await.unwrap();

        assert!(bob.list().await.unwrap().is_empty());
        assert!(matches!(
            bob.get(&product.id).await,
            Err(DbError::Domain(CoreError::ProductNotFound(_)))
        ));
        assert!(bob.delete(&product.id).await.is_err());
        assert_eq!(alice.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_ordering_and_in_stock() {
        let db = setup().await;
        let products = db.user("u1").unwrap().products();

        for (name, stock) in [("rice", 0), ("Beans", 3), ("apples", 1)] {
            let mut p = flour(stock);
            p.name = name.to_string();
            products.insert(p).await.unwrap();
        }

        let names: Vec<String> = products.list().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["apples", "Beans", "rice"]);

        let in_stock: Vec<String> = products
            .list_in_stock()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(in_stock, vec!["apples", "Beans"]);
    }

    #[tokio::test]
    async fn test_update_keeps_stock() {
        let db = setup().await;
        let products = db.user("u1").unwrap().products();
        let product = products.insert(flour(7)).await.unwrap();

        let updated = products
            .update(
                &product.id,
                &ProductUpdate {
                    name: "Flour 2kg".to_string(),
                    cost: Money::from_cents(15_000),
                    margin: Rate::from_bps(1_000),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Flour 2kg");
        assert_eq!(updated.stock, 7);
        assert_eq!(updated.sale_price().cents(), 16_500);
    }

    #[tokio::test]
    async fn test_restock_and_guard() {
        let db = setup().await;
        let products = db.user("u1").unwrap().products();
        let product = products.insert(flour(2)).await.unwrap();

        assert_eq!(products.restock(&product.id, 5).await.unwrap().stock, 7);
        assert_eq!(products.restock(&product.id, -3).await.unwrap().stock, 4);

        match products.restock(&product.id, -10).await {
            Err(DbError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            })) => {
                assert_eq!(available, 4);
                assert_eq!(requested, 10);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(products.get(&product.id).await.unwrap().stock, 4);

        assert!(matches!(
            products.restock("missing", 1).await,
            Err(DbError::Domain(CoreError::ProductNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_restock_rejects_stock_beyond_i64() {
        let db = setup().await;
        let products = db.user("u1").unwrap().products();
        let product = products.insert(flour(1)).await.unwrap();

        assert!(matches!(
            products.restock(&product.id, i64::MAX).await,
            Err(DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. })))
        ));
        assert!(matches!(
            products.restock(&product.id, i64::MIN).await,
            Err(DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. })))
        ));

        // the row is untouched and still readable
        assert_eq!(products.get(&product.id).await.unwrap().stock, 1);
        assert_eq!(products.list().await.unwrap().len(), 1);

        // filling up to exactly i64::MAX is allowed
        let full = products.restock(&product.id, i64::MAX - 1).await.unwrap();
        assert_eq!(full.stock, i64::MAX);

        match products.restock(&product.id, -i64::MAX).await {
            Ok(emptied) => assert_eq!(emptied.stock, 0),
            other => panic!("unexpected: {:?}", other),
        }
        match products.restock(&product.id, -i64::MAX).await {
            Err(DbError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            })) => {
                assert_eq!(available, 0);
                assert_eq!(requested, i64::MAX);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_stock_and_delete() {
        let db = setup().await;
        let products = db.user("u1").unwrap().products();
        let product = products.insert(flour(2)).await.unwrap();

        assert_eq!(products.set_stock(&product.id, 40).await.unwrap().stock, 40);
        assert!(products.set_stock(&product.id, -1).await.is_err());

        products.delete(&product.id).await.unwrap();
        assert_eq!(products.count().await.unwrap(), 0);
        assert!(matches!(
            products.delete(&product.id).await,
            Err(DbError::Domain(CoreError::ProductNotFound(_)))
        ));
    }
}
