// src/storage/postgres.rs

//! PostgreSQL [`Storage`] over sqlx. One [`PgSession`] wraps one database
//! transaction; the `*_for_update` reads take row-level locks so concurrent
//! checkouts competing for the same inventory serialize at the database.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{Address, Order, OrderItem, OrderState, Payment, PaymentState, Product, StateHistoryEntry, Variant};

use super::{OrderStats, Storage, StorageSession, StoreError};

#[derive(Debug, Clone)]
pub struct PgStorage {
  pool: PgPool,
}

impl PgStorage {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl Storage for PgStorage {
  async fn begin(&self) -> Result<Box<dyn StorageSession>, StoreError> {
    let tx = self.pool.begin().await?;
    Ok(Box::new(PgSession { tx }))
  }
}

struct PgSession {
  tx: Transaction<'static, Postgres>,
}

const PRODUCT_COLUMNS: &str = "id, name, description, base_price_cents, active, created_at, updated_at";
const VARIANT_COLUMNS: &str = "id, product_id, size, color, stock, surcharge_cents, active";
const ORDER_COLUMNS: &str = "id, order_number, user_id, contact_email, contact_phone, subtotal_cents, \
   shipping_cost_cents, total_cents, state, active, shipping_address_id, notes, created_at";
const PAYMENT_COLUMNS: &str = "id, order_id, order_number, gateway_payment_id, preference_id, amount_cents, \
   method, state, status_detail, payment_type, installments, payer_email, merchant_order_id, paid_at, created_at";

#[async_trait]
impl StorageSession for PgSession {
  async fn product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
    let product = sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await?;
    Ok(product)
  }

  async fn product_for_update(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
    let product = sqlx::query_as::<_, Product>(&format!(
      "SELECT {} FROM products WHERE id = $1 FOR UPDATE",
      PRODUCT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *self.tx)
    .await?;
    Ok(product)
  }

  async fn list_products(&mut self) -> Result<Vec<Product>, StoreError> {
    let products = sqlx::query_as::<_, Product>(&format!(
      "SELECT {} FROM products WHERE active ORDER BY name ASC",
      PRODUCT_COLUMNS
    ))
    .fetch_all(&mut *self.tx)
    .await?;
    Ok(products)
  }

  async fn product_variants(&mut self, product_id: Uuid) -> Result<Vec<Variant>, StoreError> {
    let variants = sqlx::query_as::<_, Variant>(&format!(
      "SELECT {} FROM variants WHERE product_id = $1 ORDER BY size, color",
      VARIANT_COLUMNS
    ))
    .bind(product_id)
    .fetch_all(&mut *self.tx)
    .await?;
    Ok(variants)
  }

  async fn variant_for_update(&mut self, id: Uuid) -> Result<Option<Variant>, StoreError> {
    let variant = sqlx::query_as::<_, Variant>(&format!(
      "SELECT {} FROM variants WHERE id = $1 FOR UPDATE",
      VARIANT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *self.tx)
    .await?;
    Ok(variant)
  }

  async fn product_variants_for_update(&mut self, product_id: Uuid) -> Result<Vec<Variant>, StoreError> {
    let variants = sqlx::query_as::<_, Variant>(&format!(
      "SELECT {} FROM variants WHERE product_id = $1 AND active ORDER BY stock DESC, id ASC FOR UPDATE",
      VARIANT_COLUMNS
    ))
    .bind(product_id)
    .fetch_all(&mut *self.tx)
    .await?;
    Ok(variants)
  }

  async fn adjust_variant_stock(&mut self, id: Uuid, delta: i32) -> Result<i32, StoreError> {
    let updated: Option<(i32,)> =
      sqlx::query_as("UPDATE variants SET stock = stock + $2 WHERE id = $1 AND stock + $2 >= 0 RETURNING stock")
        .bind(id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;
    match updated {
      Some((stock,)) => Ok(stock),
      None => {
        let available: Option<(i32,)> = sqlx::query_as("SELECT stock FROM variants WHERE id = $1")
          .bind(id)
          .fetch_optional(&mut *self.tx)
          .await?;
        match available {
          Some((available,)) => Err(StoreError::StockConflict { variant_id: id, available }),
          None => Err(StoreError::RowNotFound("variant")),
        }
      }
    }
  }

  async fn insert_address(&mut self, address: &Address) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO addresses (id, street, number, unit, city, province, postal_code) \
       VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(address.id)
    .bind(&address.street)
    .bind(&address.number)
    .bind(&address.unit)
    .bind(&address.city)
    .bind(&address.province)
    .bind(&address.postal_code)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO orders (id, order_number, user_id, contact_email, contact_phone, subtotal_cents, \
       shipping_cost_cents, total_cents, state, active, shipping_address_id, notes, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(&order.contact_email)
    .bind(&order.contact_phone)
    .bind(order.subtotal_cents)
    .bind(order.shipping_cost_cents)
    .bind(order.total_cents)
    .bind(order.state)
    .bind(order.active)
    .bind(order.shipping_address_id)
    .bind(&order.notes)
    .bind(order.created_at)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO order_items (id, order_id, product_id, variant_id, product_name, quantity, \
       unit_price_cents, subtotal_cents) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(item.id)
    .bind(item.order_id)
    .bind(item.product_id)
    .bind(item.variant_id)
    .bind(&item.product_name)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.subtotal_cents)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await?;
    Ok(order)
  }

  async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, StoreError> {
    let items = sqlx::query_as::<_, OrderItem>(
      "SELECT id, order_id, product_id, variant_id, product_name, quantity, unit_price_cents, subtotal_cents \
       FROM order_items WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut *self.tx)
    .await?;
    Ok(items)
  }

  async fn update_order_state(&mut self, id: Uuid, state: OrderState, active: bool) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE orders SET state = $2, active = $3 WHERE id = $1")
      .bind(id)
      .bind(state)
      .bind(active)
      .execute(&mut *self.tx)
      .await?;
    if result.rows_affected() == 0 {
      return Err(StoreError::RowNotFound("order"));
    }
    Ok(())
  }

  async fn insert_history(&mut self, entry: &StateHistoryEntry) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO order_state_history (id, order_id, previous_state, new_state, changed_by, comment, changed_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.id)
    .bind(entry.order_id)
    .bind(entry.previous_state)
    .bind(entry.new_state)
    .bind(entry.changed_by)
    .bind(&entry.comment)
    .bind(entry.changed_at)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn order_history(&mut self, order_id: Uuid) -> Result<Vec<StateHistoryEntry>, StoreError> {
    let entries = sqlx::query_as::<_, StateHistoryEntry>(
      "SELECT id, order_id, previous_state, new_state, changed_by, comment, changed_at \
       FROM order_state_history WHERE order_id = $1 ORDER BY changed_at DESC, id DESC",
    )
    .bind(order_id)
    .fetch_all(&mut *self.tx)
    .await?;
    Ok(entries)
  }

  async fn order_stats(&mut self) -> Result<OrderStats, StoreError> {
    let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE active")
      .fetch_one(&mut *self.tx)
      .await?;

    let counts: Vec<(OrderState, i64)> =
      sqlx::query_as("SELECT state, COUNT(*) FROM orders WHERE active GROUP BY state")
        .fetch_all(&mut *self.tx)
        .await?;
    let mut by_state = std::collections::HashMap::new();
    for state in OrderState::ALL {
      by_state.insert(state.as_str().to_string(), 0i64);
    }
    for (state, count) in counts {
      by_state.insert(state.as_str().to_string(), count);
    }

    let total_sold_cents: i64 = sqlx::query_scalar(
      "SELECT COALESCE(SUM(total_cents), 0)::bigint FROM orders \
       WHERE active AND state = ANY(ARRAY['in_preparation', 'shipped', 'delivered']::order_state[])",
    )
    .fetch_one(&mut *self.tx)
    .await?;

    let orders_today: i64 =
      sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE active AND created_at >= date_trunc('day', now())")
        .fetch_one(&mut *self.tx)
        .await?;

    Ok(OrderStats {
      total_orders,
      by_state,
      total_sold_cents,
      orders_today,
    })
  }

  async fn payment(&mut self, id: Uuid) -> Result<Option<Payment>, StoreError> {
    let payment = sqlx::query_as::<_, Payment>(&format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS))
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await?;
    Ok(payment)
  }

  async fn payment_by_gateway_id(&mut self, gateway_payment_id: &str) -> Result<Option<Payment>, StoreError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
      "SELECT {} FROM payments WHERE gateway_payment_id = $1 FOR UPDATE",
      PAYMENT_COLUMNS
    ))
    .bind(gateway_payment_id)
    .fetch_optional(&mut *self.tx)
    .await?;
    Ok(payment)
  }

  async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO payments (id, order_id, order_number, gateway_payment_id, preference_id, amount_cents, \
       method, state, status_detail, payment_type, installments, payer_email, merchant_order_id, paid_at, \
       created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(payment.id)
    .bind(payment.order_id)
    .bind(&payment.order_number)
    .bind(&payment.gateway_payment_id)
    .bind(&payment.preference_id)
    .bind(payment.amount_cents)
    .bind(&payment.method)
    .bind(payment.state)
    .bind(&payment.status_detail)
    .bind(&payment.payment_type)
    .bind(payment.installments)
    .bind(&payment.payer_email)
    .bind(&payment.merchant_order_id)
    .bind(payment.paid_at)
    .bind(payment.created_at)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
    let result = sqlx::query(
      "UPDATE payments SET gateway_payment_id = $2, preference_id = $3, amount_cents = $4, method = $5, \
       state = $6, status_detail = $7, payment_type = $8, installments = $9, payer_email = $10, \
       merchant_order_id = $11, paid_at = $12 WHERE id = $1",
    )
    .bind(payment.id)
    .bind(&payment.gateway_payment_id)
    .bind(&payment.preference_id)
    .bind(payment.amount_cents)
    .bind(&payment.method)
    .bind(payment.state)
    .bind(&payment.status_detail)
    .bind(&payment.payment_type)
    .bind(payment.installments)
    .bind(&payment.payer_email)
    .bind(&payment.merchant_order_id)
    .bind(payment.paid_at)
    .execute(&mut *self.tx)
    .await?;
    if result.rows_affected() == 0 {
      return Err(StoreError::RowNotFound("payment"));
    }
    Ok(())
  }

  async fn list_payments(
    &mut self,
    order_id: Option<Uuid>,
    state: Option<PaymentState>,
  ) -> Result<Vec<Payment>, StoreError> {
    let payments = sqlx::query_as::<_, Payment>(&format!(
      "SELECT {} FROM payments WHERE ($1::uuid IS NULL OR order_id = $1) \
       AND ($2::payment_state IS NULL OR state = $2) ORDER BY created_at DESC",
      PAYMENT_COLUMNS
    ))
    .bind(order_id)
    .bind(state)
    .fetch_all(&mut *self.tx)
    .await?;
    Ok(payments)
  }

  async fn commit(self: Box<Self>) -> Result<(), StoreError> {
    self.tx.commit().await?;
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
    self.tx.rollback().await?;
    Ok(())
  }
}
