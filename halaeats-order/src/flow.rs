//! Async checkout orchestration.
//!
//! Every operation locks the session to read or flip flags, drops the lock
//! while a collaborator call is in flight, then re-locks to apply the
//! result. Flags set before the await (loading, booking, placing) are what
//! concurrent requests see in the meantime.

use chrono::{DateTime, Duration, Utc};
use halaeats_catalog::SlotService;
use halaeats_core::{
    Address, AddressDraft, AddressService, Notice, Notifier, Order, OrderRepository, OrderType,
    PaymentMethod, PaymentStatus, QuoteService, TracingNotifier,
};
use halaeats_shared::models::events::OrderPlacedEvent;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::address_book::{LoadOutcome, SaveOutcome};
use crate::cart::{Cart, DEFAULT_MAX_LINE_QUANTITY};
use crate::orchestrator::PaymentOrchestrator;
use crate::quote::QuoteOutcome;
use crate::session::{
    BookingOutcome, CheckoutError, CheckoutSession, Placement, SessionView, SlotsOutcome,
};
use crate::steps::{Advance, BlockReason};
use crate::summary::TaxPolicy;

pub type SharedSession = Arc<Mutex<CheckoutSession>>;

/// Live checkout sessions keyed by id, expired after a period of inactivity.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn insert(&self, session: CheckoutSession) -> SharedSession {
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        shared
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove sessions idle for longer than the TTL and return them so the
    /// caller can release what they hold. Sessions currently locked by a
    /// request, or in the middle of paying, are kept.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Vec<SharedSession> {
        let cutoff = now - self.ttl;
        let mut sessions = self.sessions.write().await;
        let expired: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, session)| match session.try_lock() {
                Ok(s) => s.last_active() < cutoff && !s.holds_payment(),
                Err(_) => false,
            })
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| sessions.remove(&id))
            .collect()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::minutes(30))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvanceResult {
    pub outcome: Advance,
    pub session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub session: SessionView,
}

pub struct CheckoutService {
    sessions: Arc<SessionStore>,
    addresses: Arc<dyn AddressService>,
    quotes: Arc<dyn QuoteService>,
    slots: Arc<dyn SlotService>,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<PaymentOrchestrator>,
    notifier: Arc<dyn Notifier>,
    tax: TaxPolicy,
    max_line_quantity: u32,
    events: Option<broadcast::Sender<OrderPlacedEvent>>,
}

impl CheckoutService {
    pub fn new(
        sessions: Arc<SessionStore>,
        addresses: Arc<dyn AddressService>,
        quotes: Arc<dyn QuoteService>,
        slots: Arc<dyn SlotService>,
        orders: Arc<dyn OrderRepository>,
        payments: Arc<PaymentOrchestrator>,
    ) -> Self {
        Self {
            sessions,
            addresses,
            quotes,
            slots,
            orders,
            payments,
            notifier: Arc::new(TracingNotifier),
            tax: TaxPolicy::default(),
            max_line_quantity: DEFAULT_MAX_LINE_QUANTITY,
            events: None,
        }
    }

    pub fn with_tax(mut self, tax: TaxPolicy) -> Self {
        self.tax = tax;
        self
    }

    pub fn with_max_line_quantity(mut self, max_line_quantity: u32) -> Self {
        self.max_line_quantity = max_line_quantity;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<OrderPlacedEvent>) -> Self {
        self.events = Some(events);
        self
    }

    async fn session(&self, id: Uuid, user_id: &str) -> Result<SharedSession, CheckoutError> {
        let shared = self
            .sessions
            .get(id)
            .await
            .ok_or(CheckoutError::SessionNotFound(id))?;
        {
            let mut session = shared.lock().await;
            if session.user_id() != user_id {
                return Err(CheckoutError::SessionNotFound(id));
            }
            session.touch();
        }
        Ok(shared)
    }

    fn fail(&self, session: &mut CheckoutSession, message: String) {
        tracing::error!("Checkout {}: {}", session.id(), message);
        let notice = Notice::error(message);
        session.push_notice(notice.clone());
        self.notifier.notify(notice);
    }

    fn succeed(&self, session: &mut CheckoutSession, message: String) {
        let notice = Notice::success(message);
        session.push_notice(notice.clone());
        self.notifier.notify(notice);
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Open a checkout for a cart and kick off the address and slot loads.
    pub async fn start(
        &self,
        user_id: &str,
        restaurant_id: Uuid,
        cart: Cart,
        payment_methods: Vec<PaymentMethod>,
    ) -> Result<SessionView, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::Incomplete("cart is empty".to_string()));
        }
        cart.validate(self.max_line_quantity)?;
        let session = CheckoutSession::new(user_id, restaurant_id, cart, payment_methods, self.tax);
        let id = session.id();
        self.sessions.insert(session).await;
        tracing::info!("Started checkout {} for user {} at restaurant {}", id, user_id, restaurant_id);

        let (addresses, slots) =
            tokio::join!(self.load_addresses(id, user_id), self.load_slots(id, user_id));
        addresses?;
        slots?;
        self.view(id, user_id).await
    }

    pub async fn view(&self, id: Uuid, user_id: &str) -> Result<SessionView, CheckoutError> {
        let shared = self.session(id, user_id).await?;
        let mut session = shared.lock().await;
        Ok(session.view())
    }

    /// Drop idle sessions and give their booked slots back to the restaurant.
    pub async fn purge_idle_sessions(&self, now: DateTime<Utc>) -> usize {
        let purged = self.sessions.purge_expired(now).await;
        for shared in &purged {
            let booking = shared.lock().await.take_abandoned_booking();
            if let Some(slot_id) = booking {
                self.release(slot_id).await;
            }
        }
        if !purged.is_empty() {
            tracing::info!("Purged {} idle checkout sessions", purged.len());
        }
        purged.len()
    }

    // ========================================================================
    // Addresses and quotes
    // ========================================================================

    /// Reload the user's addresses. Failures leave the list as it was and
    /// surface as a notice.
    pub async fn load_addresses(&self, id: Uuid, user_id: &str) -> Result<(), CheckoutError> {
        let shared = self.session(id, user_id).await?;
        let ticket = shared.lock().await.begin_address_load();

        let result = self.addresses.get_user_addresses(user_id).await;

        let refresh = {
            let mut session = shared.lock().await;
            match session.finish_address_load(ticket, result) {
                LoadOutcome::Loaded { auto_selected } => auto_selected.is_some(),
                LoadOutcome::Stale => {
                    tracing::debug!("Dropped stale address load for checkout {}", id);
                    false
                }
                LoadOutcome::Failed(e) => {
                    self.fail(&mut session, format!("Could not load your addresses: {}", e));
                    false
                }
            }
        };

        if refresh {
            self.refresh_quote_if_delivery(&shared).await;
        }
        Ok(())
    }

    pub async fn save_address(&self, id: Uuid, user_id: &str, draft: AddressDraft) -> Result<SessionView, CheckoutError> {
        draft.validate()?;
        let shared = self.session(id, user_id).await?;

        let existing = {
            let mut session = shared.lock().await;
            session.ensure_open()?;
            session.begin_address_save()?;
            draft.id.filter(|address_id| session.knows_address(*address_id))
        };

        let result = match existing {
            Some(_) => {
                self.addresses
                    .update_address(Address::from_draft(user_id, draft))
                    .await
            }
            None => self.addresses.save_address(user_id, draft).await,
        };

        {
            let mut session = shared.lock().await;
            match session.finish_address_save(result) {
                SaveOutcome::Updated(address) => {
                    self.succeed(&mut session, format!("Updated address {}", address.one_line()))
                }
                SaveOutcome::Added(address) => {
                    self.succeed(&mut session, format!("Added address {}", address.one_line()))
                }
                SaveOutcome::Failed(e) => {
                    self.fail(&mut session, format!("Could not save the address: {}", e));
                    return Err(e.into());
                }
            }
        }

        self.refresh_quote_if_delivery(&shared).await;
        self.view(id, user_id).await
    }

    pub async fn select_address(&self, id: Uuid, user_id: &str, address_id: Uuid) -> Result<SessionView, CheckoutError> {
        let shared = self.session(id, user_id).await?;
        {
            let mut session = shared.lock().await;
            session.ensure_open()?;
            session.select_address(address_id)?;
        }
        self.refresh_quote_if_delivery(&shared).await;
        self.view(id, user_id).await
    }

    /// Ask for a fresh quote for the selected address.
    pub async fn request_quote(&self, id: Uuid, user_id: &str) -> Result<SessionView, CheckoutError> {
        let shared = self.session(id, user_id).await?;
        self.refresh_quote(&shared).await?;
        self.view(id, user_id).await
    }

    async fn refresh_quote_if_delivery(&self, shared: &SharedSession) {
        let wanted = {
            let session = shared.lock().await;
            session.order_type() == Some(OrderType::Delivery)
                && session.addresses().selected().is_some()
                && !session.quote().is_valid()
        };
        if wanted {
            // Failures are already on the session as notices.
            let _ = self.refresh_quote(shared).await;
        }
    }

    async fn refresh_quote(&self, shared: &SharedSession) -> Result<(), CheckoutError> {
        let (ticket, address) = {
            let mut session = shared.lock().await;
            session.ensure_open()?;
            session.begin_quote()?
        };

        let result = self.quotes.quote_for_address(&address).await;

        let mut session = shared.lock().await;
        match session.finish_quote(ticket, result) {
            QuoteOutcome::Applied(quote) => {
                tracing::info!(
                    "Quoted {} cents for address {} on checkout {}",
                    quote.fee_cents,
                    address.id,
                    session.id()
                );
                Ok(())
            }
            QuoteOutcome::Stale => {
                tracing::debug!("Dropped stale quote for checkout {}", session.id());
                Ok(())
            }
            QuoteOutcome::Failed(e) => {
                self.fail(&mut session, format!("Could not get a delivery quote: {}", e));
                Err(e.into())
            }
        }
    }

    // ========================================================================
    // Order type and slots
    // ========================================================================

    pub async fn select_order_type(
        &self,
        id: Uuid,
        user_id: &str,
        order_type: Option<OrderType>,
    ) -> Result<SessionView, CheckoutError> {
        let shared = self.session(id, user_id).await?;
        let released = {
            let mut session = shared.lock().await;
            session.ensure_open()?;
            session.select_order_type(order_type)?
        };
        if let Some(slot_id) = released {
            self.release(slot_id).await;
        }
        self.refresh_quote_if_delivery(&shared).await;
        self.view(id, user_id).await
    }

    pub async fn load_slots(&self, id: Uuid, user_id: &str) -> Result<(), CheckoutError> {
        let shared = self.session(id, user_id).await?;
        let (ticket, restaurant_id) = {
            let mut session = shared.lock().await;
            (session.begin_slots_load(), session.restaurant_id())
        };

        let result = self.slots.list_slots(restaurant_id).await;

        let mut session = shared.lock().await;
        match session.finish_slots_load(ticket, result) {
            SlotsOutcome::Loaded => {}
            SlotsOutcome::Stale => tracing::debug!("Dropped stale slot load for checkout {}", id),
            SlotsOutcome::Failed(e) => {
                self.fail(&mut session, format!("Could not load time slots: {}", e))
            }
        }
        Ok(())
    }

    /// Select a slot and book it. Continue stays disabled until the booking
    /// settles; a second booking request meanwhile is refused.
    pub async fn select_slot(&self, id: Uuid, user_id: &str, slot_id: Uuid) -> Result<SessionView, CheckoutError> {
        let shared = self.session(id, user_id).await?;
        let (previous, booking) = {
            let mut session = shared.lock().await;
            session.ensure_open()?;
            let previous = session.select_slot(slot_id, Utc::now())?;
            (previous, session.begin_booking()?)
        };

        if let Some(previous) = previous {
            self.release(previous).await;
        }

        if let Some(slot_id) = booking {
            let result = self.slots.book_slot(slot_id).await;

            let mut session = shared.lock().await;
            match session.finish_booking(slot_id, result) {
                BookingOutcome::Booked(slot) => {
                    tracing::info!(
                        "Booked slot {} ({}/{}) for checkout {}",
                        slot.id,
                        slot.booked,
                        slot.capacity,
                        id
                    );
                }
                BookingOutcome::Failed(e) => {
                    self.fail(&mut session, format!("Could not book that time slot: {}", e));
                    return Err(e.into());
                }
            }
        }

        self.view(id, user_id).await
    }

    async fn release(&self, slot_id: Uuid) {
        if let Err(e) = self.slots.release_slot(slot_id).await {
            tracing::warn!("Failed to release slot {}: {}", slot_id, e);
        }
    }

    // ========================================================================
    // Payment and steps
    // ========================================================================

    pub async fn select_payment_method(
        &self,
        id: Uuid,
        user_id: &str,
        method_id: Uuid,
    ) -> Result<SessionView, CheckoutError> {
        let shared = self.session(id, user_id).await?;
        let mut session = shared.lock().await;
        session.ensure_open()?;
        session.select_payment_method(method_id)?;
        Ok(session.view())
    }

    pub async fn advance(&self, id: Uuid, user_id: &str) -> Result<AdvanceResult, CheckoutError> {
        let shared = self.session(id, user_id).await?;
        let mut session = shared.lock().await;
        let outcome = session.advance();
        if let Advance::Blocked {
            reason: BlockReason::QuoteUnavailable,
        } = outcome
        {
            self.fail(
                &mut session,
                "Your delivery quote has expired. Refresh it to continue.".to_string(),
            );
        }
        Ok(AdvanceResult {
            outcome,
            session: session.view(),
        })
    }

    pub async fn back(&self, id: Uuid, user_id: &str) -> Result<SessionView, CheckoutError> {
        let shared = self.session(id, user_id).await?;
        let mut session = shared.lock().await;
        session.back();
        Ok(session.view())
    }

    // ========================================================================
    // Place order
    // ========================================================================

    /// Charge the displayed total and persist the order. A retry after a
    /// failed save persists the already-paid order without charging again.
    pub async fn place_order(&self, id: Uuid, user_id: &str) -> Result<PlacedOrder, CheckoutError> {
        let shared = self.session(id, user_id).await?;
        let placement = shared.lock().await.begin_place_order()?;

        let result = match placement {
            Placement::Charge { order, method } => match self.charge(order, &method).await {
                Ok(paid) => {
                    shared.lock().await.record_payment(&paid);
                    self.save(paid).await
                }
                Err(e) => Err(e),
            },
            Placement::SaveOnly(paid) => {
                tracing::info!("Retrying save of paid order {}", paid.id);
                self.save(paid).await
            }
        };

        let mut session = shared.lock().await;
        session.finish_place_order(&result);
        match result {
            Ok(order) => {
                self.succeed(&mut session, format!("Order {} placed", order.id));
                self.publish(&order);
                Ok(PlacedOrder {
                    order,
                    session: session.view(),
                })
            }
            Err(e) => {
                self.fail(&mut session, format!("Could not place your order: {}", e));
                Err(e)
            }
        }
    }

    async fn charge(&self, mut order: Order, method: &PaymentMethod) -> Result<Order, CheckoutError> {
        let intent = self
            .payments
            .charge(order.id, order.total_cents, method)
            .await?;
        if intent.status != PaymentStatus::Succeeded {
            tracing::warn!("Payment for order {} ended as {:?}", order.id, intent.status);
            return Err(CheckoutError::PaymentDeclined);
        }

        order.payment_reference = Some(intent.id);
        Ok(order)
    }

    async fn save(&self, order: Order) -> Result<Order, CheckoutError> {
        if let Err(e) = self.orders.save_order(&order).await {
            tracing::error!("Order {} was paid but could not be saved: {}", order.id, e);
            return Err(e.into());
        }
        tracing::info!(
            "Order {} placed for {} cents ({})",
            order.id,
            order.total_cents,
            order.order_type
        );
        Ok(order)
    }

    fn publish(&self, order: &Order) {
        let Some(events) = &self.events else {
            return;
        };
        let event = OrderPlacedEvent {
            order_id: order.id,
            restaurant_id: order.restaurant_id,
            customer_id: order.customer_id.clone(),
            order_type: order.order_type.as_str().to_string(),
            slot_starts_at: order.slot_starts_at.timestamp(),
            total_cents: order.total_cents,
            timestamp: Utc::now().timestamp(),
        };
        // No subscribers is fine.
        let _ = events.send(event);
    }
}
