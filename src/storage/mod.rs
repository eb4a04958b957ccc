// src/storage/mod.rs

//! Explicit storage abstraction.
//!
//! A [`Storage`] hands out [`StorageSession`]s; a session *is* the atomic
//! transaction boundary: every mutation performed through it either commits
//! wholesale or rolls back wholesale. Two implementations exist:
//!
//!  - [`postgres::PgStorage`]: sqlx/PostgreSQL, with row-level `FOR UPDATE`
//!    locks on the `*_for_update` reads.
//!  - [`memory::MemoryStorage`]: serialized in-memory store backing the test
//!    suite; a session works on a copy of the state and swaps it in on
//!    commit.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Address, Order, OrderItem, OrderState, Payment, PaymentState, Product, StateHistoryEntry, Variant};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// The inventory ledger refused a decrement that would leave a variant
  /// with negative stock.
  #[error("stock for variant {variant_id} cannot go below zero (available: {available})")]
  StockConflict { variant_id: Uuid, available: i32 },

  #[error("{0} not found")]
  RowNotFound(&'static str),
}

/// Order statistics over active orders.
#[derive(Debug, Serialize)]
pub struct OrderStats {
  pub total_orders: i64,
  pub by_state: HashMap<String, i64>,
  pub total_sold_cents: i64,
  pub orders_today: i64,
}

#[async_trait]
pub trait Storage: Send + Sync {
  async fn begin(&self) -> Result<Box<dyn StorageSession>, StoreError>;
}

/// One atomic unit of work. Dropping a session without calling
/// [`StorageSession::commit`] discards every mutation made through it.
#[async_trait]
pub trait StorageSession: Send {
  // --- catalog ---
  async fn product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError>;
  async fn product_for_update(&mut self, id: Uuid) -> Result<Option<Product>, StoreError>;
  async fn list_products(&mut self) -> Result<Vec<Product>, StoreError>;
  async fn product_variants(&mut self, product_id: Uuid) -> Result<Vec<Variant>, StoreError>;
  async fn variant_for_update(&mut self, id: Uuid) -> Result<Option<Variant>, StoreError>;
  /// Active variants of a product, most-stocked first (id as tie-break),
  /// locked for the duration of the session.
  async fn product_variants_for_update(&mut self, product_id: Uuid) -> Result<Vec<Variant>, StoreError>;
  /// Atomic stock adjustment with the never-negative check. Returns the new
  /// stock level.
  async fn adjust_variant_stock(&mut self, id: Uuid, delta: i32) -> Result<i32, StoreError>;

  // --- addresses ---
  async fn insert_address(&mut self, address: &Address) -> Result<(), StoreError>;

  // --- orders ---
  async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;
  async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), StoreError>;
  async fn order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError>;
  async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, StoreError>;
  async fn update_order_state(&mut self, id: Uuid, state: OrderState, active: bool) -> Result<(), StoreError>;
  async fn insert_history(&mut self, entry: &StateHistoryEntry) -> Result<(), StoreError>;
  /// State ledger of an order, newest first.
  async fn order_history(&mut self, order_id: Uuid) -> Result<Vec<StateHistoryEntry>, StoreError>;
  async fn order_stats(&mut self) -> Result<OrderStats, StoreError>;

  // --- payments ---
  async fn payment(&mut self, id: Uuid) -> Result<Option<Payment>, StoreError>;
  async fn payment_by_gateway_id(&mut self, gateway_payment_id: &str) -> Result<Option<Payment>, StoreError>;
  async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;
  async fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;
  async fn list_payments(
    &mut self,
    order_id: Option<Uuid>,
    state: Option<PaymentState>,
  ) -> Result<Vec<Payment>, StoreError>;

  // --- transaction boundary ---
  async fn commit(self: Box<Self>) -> Result<(), StoreError>;
  async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
