use halaeats_core::OrderLine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::CheckoutError;

pub const DEFAULT_MAX_LINE_QUANTITY: u32 = 50;

/// Upper bound on a cart subtotal: one million in currency units.
pub const MAX_SUBTOTAL_CENTS: i32 = 100_000_000;

/// Items the customer is checking out with, all from one restaurant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartLine {
    pub dish_id: Uuid,
    pub name: String,
    pub unit_price_cents: i32,
    pub quantity: u32,
}

impl Cart {
    pub fn new(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    /// True when no line has a positive quantity.
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.quantity == 0)
    }

    /// Saturates instead of wrapping; `validate` rejects carts where that matters.
    pub fn subtotal_cents(&self) -> i32 {
        self.checked_subtotal_cents().unwrap_or(i32::MAX)
    }

    pub fn checked_subtotal_cents(&self) -> Option<i32> {
        self.lines.iter().try_fold(0i32, |acc, l| {
            let qty = i32::try_from(l.quantity).ok()?;
            acc.checked_add(l.unit_price_cents.checked_mul(qty)?)
        })
    }

    pub fn validate(&self, max_line_quantity: u32) -> Result<(), CheckoutError> {
        for line in &self.lines {
            if line.quantity > max_line_quantity {
                return Err(CheckoutError::InvalidCart(format!(
                    "{} x{} exceeds the limit of {} per item",
                    line.name, line.quantity, max_line_quantity
                )));
            }
            if line.unit_price_cents < 0 {
                return Err(CheckoutError::InvalidCart(format!(
                    "{} has a negative price",
                    line.name
                )));
            }
        }
        match self.checked_subtotal_cents() {
            Some(subtotal) if subtotal <= MAX_SUBTOTAL_CENTS => Ok(()),
            _ => Err(CheckoutError::InvalidCart("order total is too large".to_string())),
        }
    }

    pub fn to_order_lines(&self) -> Vec<OrderLine> {
        self.lines
            .iter()
            .filter(|l| l.quantity > 0)
            .map(|l| OrderLine {
                dish_id: l.dish_id,
                name: l.name.clone(),
                unit_price_cents: l.unit_price_cents,
                quantity: l.quantity,
            })
            .collect()
    }
}
