use halaeats_core::{DeliveryQuote, OrderType};
use serde::{Deserialize, Serialize};

use crate::cart::Cart;

/// Sales tax in basis points (1% = 100).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaxPolicy {
    pub rate_bps: u32,
}

impl TaxPolicy {
    pub fn new(rate_bps: u32) -> Self {
        Self { rate_bps }
    }

    /// Tax on an amount, rounded half-up to the cent.
    pub fn tax_for(&self, amount_cents: i32) -> i32 {
        let raw = amount_cents as i64 * self.rate_bps as i64;
        ((raw + 5_000) / 10_000) as i32
    }
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self { rate_bps: 1_000 }
    }
}

/// Money breakdown shown on the review step. All amounts are cents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderSummary {
    pub subtotal_cents: i32,
    pub tax_cents: i32,
    pub delivery_fee_cents: i32,
    pub total_cents: i32,
}

impl OrderSummary {
    pub fn from_cart(cart: &Cart, tax: TaxPolicy, delivery_fee_cents: i32) -> Self {
        let subtotal_cents = cart.subtotal_cents();
        let tax_cents = tax.tax_for(subtotal_cents);
        Self {
            subtotal_cents,
            tax_cents,
            delivery_fee_cents,
            total_cents: subtotal_cents + tax_cents + delivery_fee_cents,
        }
    }

    /// The total the customer is charged.
    ///
    /// For delivery with a quote in hand the live quote fee replaces the
    /// summary's own fee: `subtotal + quote.fee + tax`. In every other case
    /// the precomputed `total_cents` is returned as is, so the two only agree
    /// when the summary's fee matches the quote.
    pub fn display_total(&self, order_type: Option<OrderType>, quote: Option<&DeliveryQuote>) -> i32 {
        match (order_type, quote) {
            (Some(OrderType::Delivery), Some(quote)) => {
                self.subtotal_cents + quote.fee_cents + self.tax_cents
            }
            _ => self.total_cents,
        }
    }

    /// Fee component matching [`Self::display_total`].
    pub fn display_delivery_fee(&self, order_type: Option<OrderType>, quote: Option<&DeliveryQuote>) -> i32 {
        match (order_type, quote) {
            (Some(OrderType::Delivery), Some(quote)) => quote.fee_cents,
            _ => self.delivery_fee_cents,
        }
    }
}
