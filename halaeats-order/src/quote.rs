use async_trait::async_trait;
use chrono::Duration;
use halaeats_core::{Address, CoreError, CoreResult, DeliveryQuote, QuoteService};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::ticket::{Generation, Ticket};

#[derive(Debug)]
pub enum QuoteOutcome {
    Applied(DeliveryQuote),
    /// Superseded by a newer request or an address change.
    Stale,
    Failed(CoreError),
}

/// The delivery quote for the currently selected address.
///
/// Changing the address clears the quote and invalidates any request
/// still in flight for the previous address.
#[derive(Debug, Clone, Default)]
pub struct QuoteTracker {
    quote: Option<DeliveryQuote>,
    address_id: Option<Uuid>,
    loading: bool,
    requests: Generation,
}

impl QuoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&DeliveryQuote> {
        self.quote.as_ref()
    }

    /// The quote, if it is still valid for the tracked address.
    pub fn valid(&self) -> Option<&DeliveryQuote> {
        let address_id = self.address_id?;
        self.quote.as_ref().filter(|q| q.is_valid_for(address_id))
    }

    pub fn is_valid(&self) -> bool {
        self.valid().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn address_changed(&mut self, address_id: Option<Uuid>) {
        if self.address_id == address_id {
            return;
        }
        self.address_id = address_id;
        self.quote = None;
        self.loading = false;
        self.requests.bump();
    }

    pub fn begin(&mut self, address_id: Uuid) -> Ticket {
        self.address_changed(Some(address_id));
        self.loading = true;
        self.requests.issue()
    }

    pub fn finish(&mut self, ticket: Ticket, result: CoreResult<DeliveryQuote>) -> QuoteOutcome {
        if !self.requests.is_current(ticket) {
            return QuoteOutcome::Stale;
        }
        self.loading = false;

        match result {
            Ok(quote) if Some(quote.address_id) == self.address_id => {
                self.quote = Some(quote.clone());
                QuoteOutcome::Applied(quote)
            }
            Ok(_) => QuoteOutcome::Stale,
            Err(e) => QuoteOutcome::Failed(e),
        }
    }

    pub fn clear(&mut self) {
        self.address_changed(None);
    }
}

/// Fee table for [`ZoneQuoteService`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    pub base_fee_cents: i32,
    /// Postal-code prefix to fee. The longest matching prefix wins.
    #[serde(default)]
    pub zone_fees: HashMap<String, i32>,
    pub validity_seconds: i64,
    pub estimated_minutes: u32,
    /// Prefixes outside the delivery area.
    #[serde(default)]
    pub excluded_prefixes: Vec<String>,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_fee_cents: 500,
            zone_fees: HashMap::new(),
            validity_seconds: 600,
            estimated_minutes: 40,
            excluded_prefixes: Vec::new(),
        }
    }
}

/// Prices delivery from a static postal-zone table.
pub struct ZoneQuoteService {
    config: QuoteConfig,
}

impl ZoneQuoteService {
    pub fn new(config: QuoteConfig) -> Self {
        Self { config }
    }

    pub fn fee_for_postal_code(&self, postal_code: &str) -> Option<i32> {
        let code = postal_code.trim();
        if self.config.excluded_prefixes.iter().any(|p| code.starts_with(p.as_str())) {
            return None;
        }
        let zone_fee = self
            .config
            .zone_fees
            .iter()
            .filter(|(prefix, _)| code.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, fee)| *fee);
        Some(zone_fee.unwrap_or(self.config.base_fee_cents))
    }
}

#[async_trait]
impl QuoteService for ZoneQuoteService {
    async fn quote_for_address(&self, address: &Address) -> CoreResult<DeliveryQuote> {
        let fee = self.fee_for_postal_code(&address.postal_code).ok_or_else(|| {
            CoreError::Unavailable(format!("no delivery to postal code {}", address.postal_code))
        })?;

        tracing::debug!("Quoted {} cents for address {}", fee, address.id);
        Ok(DeliveryQuote::new(
            address.id,
            fee,
            self.config.estimated_minutes,
            Duration::seconds(self.config.validity_seconds),
        ))
    }
}
