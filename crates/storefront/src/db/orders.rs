//! Order repository for database operations.
//!
//! Orders and their line items are written in a single transaction at
//! checkout and mutated afterwards only through the narrow reconciliation
//! and status-update operations below. Status and payment-status updates
//! are single-row last-write-wins UPDATEs; no compare-and-swap guards two
//! operators racing on the same order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use bruma_core::{Email, OrderId, OrderItemId, OrderStatus, PaymentStatus, UserId};

use super::RepositoryError;
use crate::models::order::{NewOrder, Order, OrderItem, ShippingAddress};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: Option<i32>,
    customer_email: String,
    customer_name: Option<String>,
    shipping_address: String,
    subtotal: Decimal,
    shipping: Decimal,
    total: Decimal,
    status: String,
    payment_status: String,
    stripe_session_id: Option<String>,
    created_at: DateTime<Utc>,
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, customer_email, customer_name, \
     shipping_address, subtotal, shipping, total, status, payment_status, \
     stripe_session_id, created_at";

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let customer_email = Email::parse(&row.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        let shipping_address: ShippingAddress = serde_json::from_str(&row.shipping_address)
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid shipping address: {e}"))
            })?;

        let status: OrderStatus = row
            .status
            .parse()
            .map_err(RepositoryError::DataCorruption)?;
        let payment_status: PaymentStatus = row
            .payment_status
            .parse()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            user_id: row.user_id.map(UserId::new),
            customer_email,
            customer_name: row.customer_name,
            shipping_address,
            subtotal: row.subtotal,
            shipping: row.shipping,
            total: row.total,
            status,
            payment_status,
            stripe_session_id: row.stripe_session_id,
            created_at: row.created_at,
            items: Vec::new(),
        })
    }
}

/// Internal row type for order line items.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    variant_id: String,
    product_name: String,
    variant_name: String,
    price: Decimal,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            variant_id: row.variant_id,
            product_name: row.product_name,
            variant_name: row.variant_name,
            price: row.price,
            quantity: row.quantity,
        }
    }
}

// =============================================================================
// Filters & Aggregates
// =============================================================================

/// Filters for the admin order listing.
#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
    /// Case-insensitive substring match across order number, email, and name.
    pub search: Option<String>,
    /// Exact status match.
    pub status: Option<OrderStatus>,
    /// Minimum order total (inclusive).
    pub min_price: Option<Decimal>,
    /// Maximum order total (inclusive).
    pub max_price: Option<Decimal>,
    /// Only orders created at or after this instant.
    pub created_after: Option<DateTime<Utc>>,
}

/// Per-status order counts for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusCounts {
    #[serde(rename = "PROCESANDO")]
    pub procesando: i64,
    #[serde(rename = "ENVIADO")]
    pub enviado: i64,
    #[serde(rename = "ENTREGADO")]
    pub entregado: i64,
    #[serde(rename = "CANCELADO")]
    pub cancelado: i64,
}

/// Aggregate order statistics for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    /// Sum of totals over PAID orders.
    pub total_revenue: Decimal,
    /// Count of all orders regardless of status.
    pub total_orders: i64,
    /// Orders per fulfillment status.
    pub orders_by_status: StatusCounts,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist an order and its line items in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number (or session
    /// reference) collides with an existing order - callers retry with a
    /// fresh number. Returns `RepositoryError::Database` otherwise.
    pub async fn create_with_items(&self, new_order: &NewOrder) -> Result<Order, RepositoryError> {
        let address_json = serde_json::to_string(&new_order.shipping_address)
            .map_err(|e| RepositoryError::DataCorruption(format!("unserializable address: {e}")))?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            "INSERT INTO orders \
                 (order_number, user_id, customer_email, customer_name, shipping_address, \
                  subtotal, shipping, total, status, payment_status, stripe_session_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id, order_number, user_id, customer_email, customer_name, \
                       shipping_address, subtotal, shipping, total, status, payment_status, \
                       stripe_session_id, created_at",
        )
        .bind(&new_order.order_number)
        .bind(new_order.user_id.map(|id| id.as_i32()))
        .bind(new_order.customer_email.as_str())
        .bind(new_order.customer_name.as_deref())
        .bind(&address_json)
        .bind(new_order.subtotal)
        .bind(new_order.shipping)
        .bind(new_order.total)
        .bind(OrderStatus::Procesando.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .bind(&new_order.stripe_session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("order number already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        let mut items = Vec::with_capacity(new_order.items.len());
        for item in &new_order.items {
            let item_row = sqlx::query_as::<_, OrderItemRow>(
                "INSERT INTO order_items \
                     (order_id, variant_id, product_name, variant_name, price, quantity) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING id, order_id, variant_id, product_name, variant_name, price, quantity",
            )
            .bind(row.id)
            .bind(&item.variant_id)
            .bind(&item.product_name)
            .bind(&item.variant_name)
            .bind(item.price)
            .bind(item.quantity)
            .fetch_one(&mut *tx)
            .await?;

            items.push(OrderItem::from(item_row));
        }

        tx.commit().await?;

        let mut order = Order::try_from(row)?;
        order.items = items;
        Ok(order)
    }

    /// Get an order by its ID, with line items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => {
                let order = Order::try_from(row)?;
                let mut orders = self.attach_items(vec![order]).await?;
                Ok(orders.pop())
            }
            None => Ok(None),
        }
    }

    /// List a user's orders, newest first, with line items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_items(orders).await
    }

    /// List orders for the admin dashboard, newest first, with line items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_filtered(
        &self,
        filters: &OrderFilters,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1"));

        if let Some(search) = filters.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (order_number ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR customer_email ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR customer_name ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }

        if let Some(status) = filters.status {
            qb.push(" AND status = ");
            qb.push_bind(status.as_str());
        }

        if let Some(min) = filters.min_price {
            qb.push(" AND total >= ");
            qb.push_bind(min);
        }

        if let Some(max) = filters.max_price {
            qb.push(" AND total <= ");
            qb.push_bind(max);
        }

        if let Some(after) = filters.created_after {
            qb.push(" AND created_at >= ");
            qb.push_bind(after);
        }

        qb.push(" ORDER BY created_at DESC");

        let rows = qb
            .build_query_as::<OrderRow>()
            .fetch_all(self.pool)
            .await?;

        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_items(orders).await
    }

    /// Record a completed payment session: payment PAID, status PROCESANDO.
    ///
    /// Safe to apply repeatedly - re-delivered events land in the same state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order carries this session
    /// reference (a reconciliation gap, surfaced loudly by the caller).
    pub async fn mark_session_completed(
        &self,
        stripe_session_id: &str,
    ) -> Result<Order, RepositoryError> {
        self.update_by_session(
            stripe_session_id,
            OrderStatus::Procesando,
            PaymentStatus::Paid,
        )
        .await
    }

    /// Record an expired payment session: payment FAILED, status CANCELADO.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order carries this session
    /// reference.
    pub async fn mark_session_expired(
        &self,
        stripe_session_id: &str,
    ) -> Result<Order, RepositoryError> {
        self.update_by_session(
            stripe_session_id,
            OrderStatus::Cancelado,
            PaymentStatus::Failed,
        )
        .await
    }

    async fn update_by_session(
        &self,
        stripe_session_id: &str,
        status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET status = $1, payment_status = $2 \
             WHERE stripe_session_id = $3 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(payment_status.as_str())
        .bind(stripe_session_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let order = Order::try_from(row)?;
        let mut orders = self.attach_items(vec![order]).await?;
        orders.pop().ok_or(RepositoryError::NotFound)
    }

    /// Set an order's status unconditionally.
    ///
    /// Any status may replace any other; there is no transition graph.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET status = $1 WHERE id = $2 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let order = Order::try_from(row)?;
        let mut orders = self.attach_items(vec![order]).await?;
        orders.pop().ok_or(RepositoryError::NotFound)
    }

    /// Aggregate statistics for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let (total_revenue,): (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(total), 0) FROM orders WHERE payment_status = $1",
        )
        .bind(PaymentStatus::Paid.as_str())
        .fetch_one(self.pool)
        .await?;

        let (total_orders,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(self.pool)
            .await?;

        let status_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
                .fetch_all(self.pool)
                .await?;

        let mut orders_by_status = StatusCounts::default();
        for (status, count) in status_rows {
            match status.parse::<OrderStatus>() {
                Ok(OrderStatus::Procesando) => orders_by_status.procesando = count,
                Ok(OrderStatus::Enviado) => orders_by_status.enviado = count,
                Ok(OrderStatus::Entregado) => orders_by_status.entregado = count,
                Ok(OrderStatus::Cancelado) => orders_by_status.cancelado = count,
                Err(e) => return Err(RepositoryError::DataCorruption(e)),
            }
        }

        Ok(OrderStats {
            total_revenue,
            total_orders,
            orders_by_status,
        })
    }

    /// Load line items for a batch of orders and attach them in place.
    async fn attach_items(&self, mut orders: Vec<Order>) -> Result<Vec<Order>, RepositoryError> {
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<i32> = orders.iter().map(|o| o.id.as_i32()).collect();

        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, variant_id, product_name, variant_name, price, quantity \
             FROM order_items WHERE order_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        for row in rows {
            if let Some(order) = orders.iter_mut().find(|o| o.id.as_i32() == row.order_id) {
                order.items.push(OrderItem::from(row));
            }
        }

        Ok(orders)
    }
}

/// Escape LIKE wildcards in user-supplied search input.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
