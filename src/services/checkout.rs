// src/services/checkout.rs

//! The order aggregator: validates a cart, re-derives prices from the
//! catalog, decrements inventory and persists the order snapshot, all
//! inside one atomic storage session.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Address, Order, OrderItem, OrderState, Product, StateHistoryEntry, Variant};
use crate::storage::{Storage, StorageSession, StoreError};

use super::{commit_or_rollback, Actor};

#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
  pub product_id: Uuid,
  #[serde(default)]
  pub variant_id: Option<Uuid>,
  pub quantity: i32,
  /// What the client believes the unit price is. Informational only: the
  /// authoritative price is re-derived from the catalog and a mismatch
  /// fails the whole order.
  pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactInput {
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
  Pickup,
  HomeDelivery,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
  pub street: String,
  pub number: String,
  #[serde(default)]
  pub unit: Option<String>,
  pub city: String,
  pub province: String,
  pub postal_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingInput {
  pub method: ShippingMethod,
  #[serde(default)]
  pub cost_cents: i64,
  #[serde(default)]
  pub address: Option<AddressInput>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
  pub items: Vec<CartLine>,
  #[serde(default)]
  pub contact: Option<ContactInput>,
  #[serde(default)]
  pub shipping: Option<ShippingInput>,
  #[serde(default)]
  pub notes: Option<String>,
}

/// An order together with its line items, as returned to clients.
#[derive(Debug, Serialize)]
pub struct HydratedOrder {
  #[serde(flatten)]
  pub order: Order,
  pub items: Vec<OrderItem>,
}

#[instrument(name = "service::create_order", skip_all, fields(lines = input.items.len(), user_id = ?actor.user_id))]
pub async fn create_order(
  storage: &dyn Storage,
  input: CreateOrderInput,
  actor: &Actor,
) -> Result<HydratedOrder, AppError> {
  if input.items.is_empty() {
    return Err(AppError::Validation("items must not be empty".to_string()));
  }
  if let Some(shipping) = &input.shipping {
    if shipping.cost_cents < 0 {
      return Err(AppError::Validation("shipping cost cannot be negative".to_string()));
    }
    if shipping.method == ShippingMethod::HomeDelivery && shipping.address.is_none() {
      return Err(AppError::Validation(
        "shipping address is required for home delivery".to_string(),
      ));
    }
  }

  let mut session = storage.begin().await?;
  let result = build_order(session.as_mut(), &input, actor).await;
  let order = commit_or_rollback(session, result).await?;
  info!(order_id = %order.order.id, order_number = %order.order.order_number, total_cents = order.order.total_cents, "Order created");
  Ok(order)
}

async fn build_order(
  session: &mut dyn StorageSession,
  input: &CreateOrderInput,
  actor: &Actor,
) -> Result<HydratedOrder, AppError> {
  let now = Utc::now();
  let order_id = Uuid::new_v4();

  let mut subtotal_cents: i64 = 0;
  let mut items = Vec::with_capacity(input.items.len());
  for (index, line) in input.items.iter().enumerate() {
    let line_no = index + 1;
    if line.quantity <= 0 {
      return Err(AppError::Validation(format!(
        "line {}: invalid quantity {}",
        line_no, line.quantity
      )));
    }

    // Lock the product row for the duration of the transaction so
    // concurrent checkouts competing for the same stock serialize here.
    let product = session
      .product_for_update(line.product_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("line {}: product {} not found", line_no, line.product_id)))?;

    let variant = match line.variant_id {
      Some(variant_id) => {
        let variant = session
          .variant_for_update(variant_id)
          .await?
          .ok_or_else(|| AppError::NotFound(format!("line {}: variant {} not found", line_no, variant_id)))?;
        if variant.product_id != product.id {
          return Err(AppError::Validation(format!(
            "line {}: variant {} does not belong to product {}",
            line_no, variant_id, product.id
          )));
        }
        if !variant.active {
          return Err(AppError::Validation(format!(
            "line {}: variant {} is inactive",
            line_no, variant_id
          )));
        }
        Some(variant)
      }
      None => None,
    };

    // Authoritative price comes from the catalog; the client copy is only
    // cross-checked.
    let unit_price_cents = match &variant {
      Some(v) => v.unit_price_cents(&product),
      None => product.base_price_cents,
    };
    if line.unit_price_cents != unit_price_cents {
      return Err(AppError::Validation(format!(
        "line {}: unit price mismatch for '{}' (expected {} cents, got {})",
        line_no, product.name, unit_price_cents, line.unit_price_cents
      )));
    }

    consume_stock(session, line_no, &product, variant.as_ref(), line.quantity).await?;

    let line_subtotal = i64::from(line.quantity) * unit_price_cents;
    subtotal_cents += line_subtotal;
    items.push(OrderItem {
      id: Uuid::new_v4(),
      order_id,
      product_id: product.id,
      variant_id: variant.as_ref().map(|v| v.id),
      product_name: product.name.clone(),
      quantity: line.quantity,
      unit_price_cents,
      subtotal_cents: line_subtotal,
    });
  }

  let shipping_cost_cents = input.shipping.as_ref().map(|s| s.cost_cents).unwrap_or(0);
  let shipping_address_id = match input.shipping.as_ref().and_then(|s| s.address.as_ref()) {
    Some(address_input) => {
      let address = Address {
        id: Uuid::new_v4(),
        street: address_input.street.clone(),
        number: address_input.number.clone(),
        unit: address_input.unit.clone(),
        city: address_input.city.clone(),
        province: address_input.province.clone(),
        postal_code: address_input.postal_code.clone(),
      };
      session.insert_address(&address).await?;
      Some(address.id)
    }
    None => None,
  };

  let contact = input.contact.clone().unwrap_or_default();
  let order = Order {
    id: order_id,
    order_number: Order::generate_number(now),
    user_id: actor.user_id,
    contact_email: contact.email.or_else(|| actor.email.clone()).unwrap_or_default(),
    contact_phone: contact.phone.unwrap_or_default(),
    subtotal_cents,
    shipping_cost_cents,
    total_cents: subtotal_cents + shipping_cost_cents,
    state: OrderState::InPreparation,
    active: true,
    shipping_address_id,
    notes: input.notes.clone().unwrap_or_default(),
    created_at: now,
  };

  session.insert_order(&order).await?;
  for item in &items {
    session.insert_order_item(item).await?;
  }
  session
    .insert_history(&StateHistoryEntry {
      id: Uuid::new_v4(),
      order_id,
      previous_state: None,
      new_state: order.state,
      changed_by: actor.user_id,
      comment: "order created".to_string(),
      changed_at: now,
    })
    .await?;

  Ok(HydratedOrder { order, items })
}

/// Takes `quantity` units out of inventory. A named variant is decremented
/// directly; otherwise stock is drawn greedily from the product's active
/// variants, most-stocked first.
async fn consume_stock(
  session: &mut dyn StorageSession,
  line_no: usize,
  product: &Product,
  variant: Option<&Variant>,
  quantity: i32,
) -> Result<(), AppError> {
  if let Some(variant) = variant {
    return match session.adjust_variant_stock(variant.id, -quantity).await {
      Ok(_) => Ok(()),
      Err(StoreError::StockConflict { available, .. }) => Err(AppError::Conflict(format!(
        "line {}: insufficient stock for '{}' ({}/{}). Available: {}",
        line_no, product.name, variant.size, variant.color, available
      ))),
      Err(other) => Err(other.into()),
    };
  }

  let variants = session.product_variants_for_update(product.id).await?;
  let available: i64 = variants.iter().map(|v| i64::from(v.stock)).sum();
  if available < i64::from(quantity) {
    return Err(AppError::Conflict(format!(
      "line {}: insufficient stock for '{}'. Available: {}",
      line_no, product.name, available
    )));
  }

  let mut remaining = quantity;
  for variant in &variants {
    if remaining == 0 {
      break;
    }
    let take = remaining.min(variant.stock);
    if take == 0 {
      continue;
    }
    session.adjust_variant_stock(variant.id, -take).await?;
    remaining -= take;
  }
  // The variants are locked, so the availability check above cannot be
  // invalidated mid-loop.
  debug_assert_eq!(remaining, 0);
  Ok(())
}

/// Read-side companion: an order with its line items.
pub async fn fetch_order(storage: &dyn Storage, order_id: Uuid) -> Result<HydratedOrder, AppError> {
  let mut session = storage.begin().await?;
  let result = async {
    let order = session
      .order(order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;
    let items = session.order_items(order_id).await?;
    Ok(HydratedOrder { order, items })
  }
  .await;
  commit_or_rollback(session, result).await
}
