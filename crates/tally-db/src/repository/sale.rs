//! # Sale Repository
//!
//! Cash sales: the atomic checkout, reads, and retention.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       record_sale(&cart)                                │
//! │                                                                         │
//! │  1. VALIDATE (no storage touched)                                      │
//! │     └── Cart::validate → EmptyCart / InvalidQuantity / InvalidTotal    │
//! │                                                                         │
//! │  2. BEGIN                                                              │
//! │     └── take_stock: per line lock, re-read, check, decrement           │
//! │         └── ProductNotFound / InsufficientStock → drop tx (rollback)   │
//! │                                                                         │
//! │  3. INSERT sale + sale_lines (totals from the captured lines)          │
//! │                                                                         │
//! │  4. COMMIT → publish Products and Sales                                │
//! │                                                                         │
//! │  Nothing is retried here. On error the caller re-invokes with fresh    │
//! │  data if it wants to.                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tally_core::{new_id, Cart, CartLimits, Money, Sale, SaleTotals};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::feed::{ChangeFeed, Collection};
use crate::repository::{fetch_lines, insert_lines, take_stock, LineTable};

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    owner_id: String,
    created_at: DateTime<Utc>,
    total_cents: i64,
    cost_cents: i64,
    profit_cents: i64,
}

const SALE_COLUMNS: &str = "id, owner_id, created_at, total_cents, cost_cents, profit_cents";

async fn hydrate(conn: &mut SqliteConnection, rows: Vec<SaleRow>) -> DbResult<Vec<Sale>> {
    let mut sales = Vec::with_capacity(rows.len());
    for row in rows {
        let lines = fetch_lines(conn, LineTable::Sale, &row.id).await?;
        sales.push(Sale {
            id: row.id,
            owner_id: row.owner_id,
            created_at: row.created_at,
            lines,
            total: Money::from_cents(row.total_cents),
            cost: Money::from_cents(row.cost_cents),
            profit: Money::from_cents(row.profit_cents),
        });
    }
    Ok(sales)
}

/// Sales created in `[start, end)`, newest first.
pub(crate) async fn fetch_sales_between(
    conn: &mut SqliteConnection,
    owner_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> DbResult<Vec<Sale>> {
    let rows: Vec<SaleRow> = sqlx::query_as(&format!(
        "SELECT {SALE_COLUMNS} FROM sales \
         WHERE owner_id = ? AND created_at >= ? AND created_at < ? \
         ORDER BY created_at DESC, id"
    ))
    .bind(owner_id)
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?;

    hydrate(conn, rows).await
}

/// Repository for one user's sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    owner_id: String,
    feed: ChangeFeed,
    limits: CartLimits,
    retention_days: u32,
}

impl SaleRepository {
    /// Creates a new SaleRepository scoped to `owner_id`.
    pub fn new(
        pool: SqlitePool,
        owner_id: impl Into<String>,
        feed: ChangeFeed,
        limits: CartLimits,
        retention_days: u32,
    ) -> Self {
        SaleRepository {
            pool,
            owner_id: owner_id.into(),
            feed,
            limits,
            retention_days,
        }
    }

    /// Checks out a cart as a cash sale, stamped now.
    pub async fn record_sale(&self, cart: &Cart) -> DbResult<Sale> {
        self.record_sale_at(cart, Utc::now()).await
    }

    /// Checks out a cart as a cash sale with an explicit timestamp.
    ///
    /// All-or-nothing: on success every line's stock is decremented and
    /// exactly one sale exists; on any error nothing changed.
    pub async fn record_sale_at(&self, cart: &Cart, now: DateTime<Utc>) -> DbResult<Sale> {
        cart.validate(&self.limits)?;

        match self.checkout(cart, now).await {
            Ok(sale) => {
                info!(
                    sale_id = %sale.id,
                    lines = sale.lines.len(),
                    total = %sale.total,
                    profit = %sale.profit,
                    "Sale recorded"
                );
                self.feed.publish(&self.owner_id, Collection::Products);
                self.feed.publish(&self.owner_id, Collection::Sales);
                Ok(sale)
            }
            Err(e) => {
                warn!(owner_id = %self.owner_id, error = %e, "Sale rejected");
                Err(e)
            }
        }
    }

    async fn checkout(&self, cart: &Cart, now: DateTime<Utc>) -> DbResult<Sale> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let lines = take_stock(&mut tx, &self.owner_id, cart, now).await?;
        let totals = SaleTotals::from_lines(&lines)?;

        let sale = Sale {
            id: new_id(),
            owner_id: self.owner_id.clone(),
            created_at: now,
            lines,
            total: totals.total,
            cost: totals.cost,
            profit: totals.profit,
        };

        sqlx::query(
            r#"
            INSERT INTO sales (id, owner_id, created_at, total_cents, cost_cents, profit_cents)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.owner_id)
        .bind(sale.created_at)
        .bind(sale.total.cents())
        .bind(sale.cost.cents())
        .bind(sale.profit.cents())
        .execute(&mut *tx)
        .await?;

        insert_lines(&mut tx, LineTable::Sale, &sale.id, &sale.lines).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(sale)
    }

    /// Gets a sale by ID.
    pub async fn get(&self, id: &str) -> DbResult<Sale> {
        let mut conn = self.pool.acquire().await?;

        let row: Option<SaleRow> = sqlx::query_as(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(&self.owner_id)
        .fetch_optional(&mut *conn)
        .await?;

        let row = row.ok_or_else(|| DbError::not_found("Sale", id))?;
        hydrate(&mut conn, vec![row])
            .await?
            .pop()
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// All sales, newest first.
    pub async fn list(&self) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;

        let rows: Vec<SaleRow> = sqlx::query_as(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE owner_id = ? ORDER BY created_at DESC, id"
        ))
        .bind(&self.owner_id)
        .fetch_all(&mut *conn)
        .await?;

        hydrate(&mut conn, rows).await
    }

    /// Sales created in `[start, end)`, newest first.
    pub async fn list_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sales_between(&mut conn, &self.owner_id, start, end).await
    }

    /// Deletes one sale and its lines. Stock is not restored.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting sale");

        let result = sqlx::query("DELETE FROM sales WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(&self.owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        self.feed.publish(&self.owner_id, Collection::Sales);
        Ok(())
    }

    /// Deletes every sale created before `cutoff`. Returns how many went.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM sales WHERE owner_id = ? AND created_at < ?")
            .bind(&self.owner_id)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            info!(owner_id = %self.owner_id, purged, %cutoff, "Old sales purged");
            self.feed.publish(&self.owner_id, Collection::Sales);
        }
        Ok(purged)
    }

    /// Applies the configured retention (default 30 days) relative to `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let cutoff = now - Duration::days(i64::from(self.retention_days));
        self.purge_older_than(cutoff).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError, UserScope};
    use chrono::{Duration, TimeZone, Utc};
    use tally_core::{Cart, CoreError, Money, NewProduct, Product, Rate};

    async fn setup() -> (Database, UserScope) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db.user("u1").unwrap();
        (db, user)
    }

    async fn product(user: &UserScope, name: &str, cost: i64, stock: i64) -> Product {
        user.products()
            .insert(NewProduct {
                name: name.to_string(),
                cost: Money::from_cents(cost),
                margin: Rate::from_bps(2_000),
                stock,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_sale_decrements_stock() {
        let (_db, user) = setup().await;
        let flour = product(&user, "Flour", 10_000, 5).await;
        let salt = product(&user, "Salt", 100, 10).await;

        let cart = Cart::new()
            .add(&flour.id, 2, flour.sale_price())
            .add(&salt.id, 3, salt.sale_price());
        let sale = user.sales().record_sale(&cart).await.unwrap();

        assert_eq!(sale.lines.len(), 2);
        assert_eq!(sale.total.cents(), 2 * 12_000 + 3 * 120);
        assert_eq!(sale.cost.cents(), 2 * 10_000 + 3 * 100);
        assert_eq!(sale.profit, sale.total - sale.cost);
        assert_eq!(sale.total, sale.lines.iter().map(|l| l.line_total).sum());

        let products = user.products();
        assert_eq!(products.get(&flour.id).await.unwrap().stock, 3);
        assert_eq!(products.get(&salt.id).await.unwrap().stock, 7);

        let stored = user.sales().get(&sale.id).await.unwrap();
        assert_eq!(stored, sale);
        // reads are side-effect free
        assert_eq!(user.sales().get(&sale.id).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let (_db, user) = setup().await;
        let flour = product(&user, "Flour", 10_000, 5).await;
        let salt = product(&user, "Salt", 100, 10).await;

        // salt would succeed first; flour fails and must undo it
        let cart = Cart::new()
            .add(&salt.id, 4, salt.sale_price())
            .add(&flour.id, 7, flour.sale_price());

        match user.sales().record_sale(&cart).await {
            Err(DbError::Domain(CoreError::InsufficientStock {
                product,
                available,
                requested,
            })) => {
                assert_eq!(product, "Flour");
                assert_eq!(available, 5);
                assert_eq!(requested, 7);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let products = user.products();
        assert_eq!(products.get(&flour.id).await.unwrap().stock, 5);
        assert_eq!(products.get(&salt.id).await.unwrap().stock, 10);
        assert!(user.sales().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_product_on_two_lines() {
        let (_db, user) = setup().await;
        let flour = product(&user, "Flour", 10_000, 5).await;

        let cart = Cart::new()
            .add(&flour.id, 3, flour.sale_price())
            .add(&flour.id, 3, flour.sale_price());
        assert!(user.sales().record_sale(&cart).await.is_err());
        assert_eq!(user.products().get(&flour.id).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_missing_product() {
        let (_db, user) = setup().await;
        let cart = Cart::new().add("nope", 1, Money::from_cents(100));
        assert!(matches!(
            user.sales().record_sale(&cart).await,
            Err(DbError::Domain(CoreError::ProductNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_validation_happens_before_storage() {
        let (_db, user) = setup().await;
        let flour = product(&user, "Flour", 10_000, 5).await;

        assert!(matches!(
            user.sales().record_sale(&Cart::new()).await,
            Err(DbError::Domain(CoreError::EmptyCart))
        ));
        let cart = Cart::new().add(&flour.id, -1, flour.sale_price());
        assert!(matches!(
            user.sales().record_sale(&cart).await,
            Err(DbError::Domain(CoreError::InvalidQuantity { .. }))
        ));
        assert_eq!(user.products().get(&flour.id).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_captured_price_survives_product_edit() {
        let (_db, user) = setup().await;
        let flour = product(&user, "Flour", 10_000, 5).await;

        let cart = Cart::new().add(&flour.id, 1, flour.sale_price());
        let sale = user.sales().record_sale(&cart).await.unwrap();

        user.products()
            .update(
                &flour.id,
                &tally_core::ProductUpdate {
                    name: "Flour (new)".to_string(),
                    cost: Money::from_cents(50_000),
                    margin: Rate::zero(),
                },
            )
            .await
            .unwrap();

        let stored = user.sales().get(&sale.id).await.unwrap();
        assert_eq!(stored.lines[0].unit_price.cents(), 12_000);
        assert_eq!(stored.lines[0].unit_cost.cents(), 10_000);
        assert_eq!(stored.lines[0].name, "Flour");
    }

    #[tokio::test]
    async fn test_list_between_and_purge() {
        let (_db, user) = setup().await;
        let flour = product(&user, "Flour", 100, 100).await;
        let cart = Cart::new().add(&flour.id, 1, flour.sale_price());
        let sales = user.sales();

        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        let old = sales.record_sale_at(&cart, now - Duration::days(45)).await.unwrap();
        let recent = sales.record_sale_at(&cart, now - Duration::days(2)).await.unwrap();

        let window = sales
            .list_between(now - Duration::days(7), now)
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].id, recent.id);

        assert_eq!(sales.purge_expired(now).await.unwrap(), 1);
        assert!(matches!(sales.get(&old.id).await, Err(DbError::NotFound { .. })));
        assert_eq!(sales.list().await.unwrap().len(), 1);

        // stock is not restored by purging
        assert_eq!(user.products().get(&flour.id).await.unwrap().stock, 98);
    }

    #[tokio::test]
    async fn test_delete_sale() {
        let (_db, user) = setup().await;
        let flour = product(&user, "Flour", 100, 3).await;
        let sale = user
            .sales()
            .record_sale(&Cart::new().add(&flour.id, 1, flour.sale_price()))
            .await
            .unwrap();

        user.sales().delete(&sale.id).await.unwrap();
        assert!(user.sales().delete(&sale.id).await.is_err());
        assert_eq!(user.products().get(&flour.id).await.unwrap().stock, 2);
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() {
        let path = std::env::temp_dir().join(format!("tally-test-{}.db", tally_core::new_id()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        let user = db.user("u1").unwrap();
        let flour = product(&user, "Flour", 100, 5).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sales = user.sales();
            let cart = Cart::new().add(&flour.id, 1, flour.sale_price());
            handles.push(tokio::spawn(async move { sales.record_sale(&cart).await }));
        }

        let mut ok = 0;
        let mut short = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(DbError::Domain(CoreError::InsufficientStock { .. })) => short += 1,
                Err(other) => panic!("unexpected: {:?}", other),
            }
        }

        assert_eq!(ok, 5);
        assert_eq!(short, 3);
        assert_eq!(user.products().get(&flour.id).await.unwrap().stock, 0);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
