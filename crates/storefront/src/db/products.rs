//! Catalog lookups needed by the cart.
//!
//! Only what a cart line snapshots at add time: title, unit price, stock and
//! the owning vendor.

use rust_decimal::Decimal;
use sqlx::PgPool;

use mandir_core::cart::CartLine;
use mandir_core::{CurrencyCode, Price, ProductId, VariantId, VendorId};

use super::RepositoryError;

/// What the cart needs to know about a purchasable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockSnapshot {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub title: String,
    pub variant_title: Option<String>,
    pub unit_price: Price,
    pub stock: u32,
    pub vendor_id: VendorId,
}

impl StockSnapshot {
    /// A cart line for `quantity` of this item, capped by current stock.
    #[must_use]
    pub fn into_line(self, quantity: u32) -> CartLine {
        CartLine {
            product_id: self.product_id,
            variant_id: self.variant_id,
            title: self.title,
            variant_title: self.variant_title,
            quantity,
            unit_price: self.unit_price,
            stock_ceiling: self.stock,
            vendor_id: self.vendor_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    product_id: i32,
    variant_id: Option<i32>,
    title: String,
    variant_title: Option<String>,
    price: Decimal,
    currency: String,
    stock: i32,
    vendor_id: i32,
}

impl TryFrom<SnapshotRow> for StockSnapshot {
    type Error = RepositoryError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let currency = match row.currency.as_str() {
            "INR" => CurrencyCode::INR,
            "USD" => CurrencyCode::USD,
            "EUR" => CurrencyCode::EUR,
            "GBP" => CurrencyCode::GBP,
            other => {
                return Err(RepositoryError::DataCorruption(format!(
                    "unsupported currency {other} on product {}",
                    row.product_id
                )));
            }
        };
        let stock = u32::try_from(row.stock).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative stock on product {}", row.product_id))
        })?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            title: row.title,
            variant_title: row.variant_title,
            unit_price: Price::new(row.price, currency),
            stock,
            vendor_id: VendorId::new(row.vendor_id),
        })
    }
}

/// Repository for `products` and `product_variants`.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Current stock, price and vendor of an active product or one of its variants.
    ///
    /// A variant's own price overrides the product price when set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stock_snapshot(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Option<StockSnapshot>, RepositoryError> {
        let row: Option<SnapshotRow> = match variant_id {
            None => {
                sqlx::query_as(
                    r"
                    SELECT p.id AS product_id, NULL::INTEGER AS variant_id,
                           p.title, NULL::TEXT AS variant_title,
                           p.price, p.currency, p.stock, p.vendor_id
                    FROM products p
                    WHERE p.id = $1 AND p.is_active
                    ",
                )
                .bind(product_id.as_i32())
                .fetch_optional(self.pool)
                .await?
            }
            Some(variant_id) => {
                sqlx::query_as(
                    r"
                    SELECT p.id AS product_id, v.id AS variant_id,
                           p.title, v.title AS variant_title,
                           COALESCE(v.price, p.price) AS price, p.currency,
                           v.stock, p.vendor_id
                    FROM product_variants v
                    JOIN products p ON p.id = v.product_id
                    WHERE p.id = $1 AND v.id = $2 AND p.is_active
                    ",
                )
                .bind(product_id.as_i32())
                .bind(variant_id.as_i32())
                .fetch_optional(self.pool)
                .await?
            }
        };

        row.map(StockSnapshot::try_from).transpose()
    }

    /// Active products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self, limit: i64) -> Result<Vec<StockSnapshot>, RepositoryError> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            r"
            SELECT p.id AS product_id, NULL::INTEGER AS variant_id,
                   p.title, NULL::TEXT AS variant_title,
                   p.price, p.currency, p.stock, p.vendor_id
            FROM products p
            WHERE p.is_active
            ORDER BY p.created_at DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(StockSnapshot::try_from).collect()
    }

    /// Number of active products a vendor lists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_for_vendor(&self, vendor_id: VendorId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM products
            WHERE vendor_id = $1 AND is_active
            ",
        )
        .bind(vendor_id.as_i32())
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}
