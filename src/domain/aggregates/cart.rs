//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub user: Uuid,
    pub items: Vec<CartItem>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: Uuid,
    pub product: Uuid,
    pub variant: Option<Uuid>,
    pub quantity: i32,
}

impl CartItem {
    pub fn new(product: Uuid, variant: Option<Uuid>, quantity: i32) -> Self {
        Self { id: Uuid::now_v7(), product, variant, quantity }
    }
    pub fn matches(&self, product: Uuid, variant: Option<Uuid>) -> bool { self.product == product && self.variant == variant }
}

impl Cart {
    pub fn empty(user: Uuid, now: DateTime<Utc>) -> Self { Self { user, items: vec![], updated_at: now } }

    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Adds to an existing line for the same product/variant instead of duplicating it.
    pub fn add_item(&mut self, item: CartItem, now: DateTime<Utc>) -> &CartItem {
        let existing = self.items.iter().position(|i| i.matches(item.product, item.variant));
        let idx = match existing {
            Some(idx) => { self.items[idx].quantity += item.quantity; idx }
            None => { self.items.push(item); self.items.len() - 1 }
        };
        self.updated_at = now;
        &self.items[idx]
    }

    /// Ids of the lines an order just bought.
    pub fn ids_matching(&self, bought: &[(Uuid, Option<Uuid>)]) -> Vec<Uuid> {
        self.items.iter().filter(|i| bought.iter().any(|(p, v)| i.matches(*p, *v))).map(|i| i.id).collect()
    }

    pub fn remove_items(&mut self, ids: &[Uuid], now: DateTime<Utc>) -> usize {
        let before = self.items.len();
        self.items.retain(|i| !ids.contains(&i.id));
        self.updated_at = now;
        before - self.items.len()
    }
}
