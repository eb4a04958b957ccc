// src/storage/memory.rs

//! In-memory [`Storage`] used by the test suite. Sessions are fully
//! serialized: `begin` takes the store's single lock and clones the state
//! into a working copy; `commit` swaps the working copy back in, `rollback`
//! (or dropping the session) discards it. This gives the same
//! all-or-nothing semantics the Postgres implementation gets from real
//! transactions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::{Address, Order, OrderItem, OrderState, Payment, PaymentState, Product, StateHistoryEntry, Variant};

use super::{OrderStats, Storage, StorageSession, StoreError};

#[derive(Debug, Default, Clone)]
struct MemoryState {
  products: HashMap<Uuid, Product>,
  variants: HashMap<Uuid, Variant>,
  addresses: HashMap<Uuid, Address>,
  orders: HashMap<Uuid, Order>,
  order_items: Vec<OrderItem>,
  history: Vec<StateHistoryEntry>,
  payments: Vec<Payment>,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
  state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seeds a catalog product outside any session. Test setup only; the
  /// serving paths never create products.
  pub async fn seed_product(&self, product: Product) {
    self.state.lock().await.products.insert(product.id, product);
  }

  pub async fn seed_variant(&self, variant: Variant) {
    self.state.lock().await.variants.insert(variant.id, variant);
  }
}

#[async_trait]
impl Storage for MemoryStorage {
  async fn begin(&self) -> Result<Box<dyn StorageSession>, StoreError> {
    let guard = self.state.clone().lock_owned().await;
    let work = guard.clone();
    Ok(Box::new(MemorySession { guard, work }))
  }
}

struct MemorySession {
  guard: OwnedMutexGuard<MemoryState>,
  work: MemoryState,
}

#[async_trait]
impl StorageSession for MemorySession {
  async fn product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
    Ok(self.work.products.get(&id).cloned())
  }

  async fn product_for_update(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
    // Sessions are serialized by the store lock; a plain read is already
    // exclusive.
    Ok(self.work.products.get(&id).cloned())
  }

  async fn list_products(&mut self) -> Result<Vec<Product>, StoreError> {
    let mut products: Vec<Product> = self.work.products.values().cloned().collect();
    products.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(products)
  }

  async fn product_variants(&mut self, product_id: Uuid) -> Result<Vec<Variant>, StoreError> {
    let mut variants: Vec<Variant> = self
      .work
      .variants
      .values()
      .filter(|v| v.product_id == product_id)
      .cloned()
      .collect();
    variants.sort_by(|a, b| a.size.cmp(&b.size).then_with(|| a.color.cmp(&b.color)));
    Ok(variants)
  }

  async fn variant_for_update(&mut self, id: Uuid) -> Result<Option<Variant>, StoreError> {
    Ok(self.work.variants.get(&id).cloned())
  }

  async fn product_variants_for_update(&mut self, product_id: Uuid) -> Result<Vec<Variant>, StoreError> {
    let mut variants: Vec<Variant> = self
      .work
      .variants
      .values()
      .filter(|v| v.product_id == product_id && v.active)
      .cloned()
      .collect();
    variants.sort_by(|a, b| b.stock.cmp(&a.stock).then(a.id.cmp(&b.id)));
    Ok(variants)
  }

  async fn adjust_variant_stock(&mut self, id: Uuid, delta: i32) -> Result<i32, StoreError> {
    let variant = self
      .work
      .variants
      .get_mut(&id)
      .ok_or(StoreError::RowNotFound("variant"))?;
    let new_stock = variant.stock + delta;
    if new_stock < 0 {
      return Err(StoreError::StockConflict {
        variant_id: id,
        available: variant.stock,
      });
    }
    variant.stock = new_stock;
    Ok(new_stock)
  }

  async fn insert_address(&mut self, address: &Address) -> Result<(), StoreError> {
    self.work.addresses.insert(address.id, address.clone());
    Ok(())
  }

  async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
    self.work.orders.insert(order.id, order.clone());
    Ok(())
  }

  async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), StoreError> {
    self.work.order_items.push(item.clone());
    Ok(())
  }

  async fn order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
    Ok(self.work.orders.get(&id).cloned())
  }

  async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, StoreError> {
    Ok(
      self
        .work
        .order_items
        .iter()
        .filter(|i| i.order_id == order_id)
        .cloned()
        .collect(),
    )
  }

  async fn update_order_state(&mut self, id: Uuid, state: OrderState, active: bool) -> Result<(), StoreError> {
    let order = self.work.orders.get_mut(&id).ok_or(StoreError::RowNotFound("order"))?;
    order.state = state;
    order.active = active;
    Ok(())
  }

  async fn insert_history(&mut self, entry: &StateHistoryEntry) -> Result<(), StoreError> {
    self.work.history.push(entry.clone());
    Ok(())
  }

  async fn order_history(&mut self, order_id: Uuid) -> Result<Vec<StateHistoryEntry>, StoreError> {
    let mut entries: Vec<StateHistoryEntry> = self
      .work
      .history
      .iter()
      .filter(|h| h.order_id == order_id)
      .cloned()
      .collect();
    entries.reverse();
    Ok(entries)
  }

  async fn order_stats(&mut self) -> Result<OrderStats, StoreError> {
    let active = || self.work.orders.values().filter(|o| o.active);
    let mut by_state = HashMap::new();
    for state in OrderState::ALL {
      let count = active().filter(|o| o.state == state).count() as i64;
      by_state.insert(state.as_str().to_string(), count);
    }
    let sold_states = [OrderState::InPreparation, OrderState::Shipped, OrderState::Delivered];
    let total_sold_cents = active()
      .filter(|o| sold_states.contains(&o.state))
      .map(|o| o.total_cents)
      .sum();
    let today = Utc::now().date_naive();
    let orders_today = active().filter(|o| o.created_at.date_naive() == today).count() as i64;
    Ok(OrderStats {
      total_orders: active().count() as i64,
      by_state,
      total_sold_cents,
      orders_today,
    })
  }

  async fn payment(&mut self, id: Uuid) -> Result<Option<Payment>, StoreError> {
    Ok(self.work.payments.iter().find(|p| p.id == id).cloned())
  }

  async fn payment_by_gateway_id(&mut self, gateway_payment_id: &str) -> Result<Option<Payment>, StoreError> {
    Ok(
      self
        .work
        .payments
        .iter()
        .find(|p| p.gateway_payment_id.as_deref() == Some(gateway_payment_id))
        .cloned(),
    )
  }

  async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
    self.work.payments.push(payment.clone());
    Ok(())
  }

  async fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
    let existing = self
      .work
      .payments
      .iter_mut()
      .find(|p| p.id == payment.id)
      .ok_or(StoreError::RowNotFound("payment"))?;
    *existing = payment.clone();
    Ok(())
  }

  async fn list_payments(
    &mut self,
    order_id: Option<Uuid>,
    state: Option<PaymentState>,
  ) -> Result<Vec<Payment>, StoreError> {
    let mut payments: Vec<Payment> = self
      .work
      .payments
      .iter()
      .filter(|p| order_id.map_or(true, |id| p.order_id == id))
      .filter(|p| state.map_or(true, |s| p.state == s))
      .cloned()
      .collect();
    payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(payments)
  }

  async fn commit(self: Box<Self>) -> Result<(), StoreError> {
    let MemorySession { mut guard, work } = *self;
    *guard = work;
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
    Ok(())
  }
}
