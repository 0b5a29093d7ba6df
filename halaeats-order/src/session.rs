use chrono::{DateTime, Utc};
use halaeats_catalog::TimeSlot;
use halaeats_core::{
    Address, CoreError, CoreResult, DeliveryQuote, Notice, Order, OrderStatus, OrderType,
    PaymentMethod,
};
use serde::Serialize;
use uuid::Uuid;

use crate::address_book::{AddressBook, LoadOutcome, SaveOutcome};
use crate::cart::Cart;
use crate::quote::{QuoteOutcome, QuoteTracker};
use crate::steps::{Advance, BlockReason, CheckoutStep, PrimaryAction, StepController};
use crate::summary::{OrderSummary, TaxPolicy};
use crate::ticket::{Generation, Ticket};
use crate::validator::{DeliveryMethodCheck, DeliveryMethodInputs};

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Checkout session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Checkout session {0} has already placed its order")]
    SessionClosed(Uuid),

    #[error("Unknown address: {0}")]
    UnknownAddress(Uuid),

    #[error("Unknown time slot: {0}")]
    UnknownSlot(Uuid),

    #[error("Time slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(Uuid),

    #[error("A {0} is already in progress")]
    Pending(&'static str),

    #[error("Orders can only be placed from the review step")]
    NotAtReview,

    #[error("Checkout incomplete: {0}")]
    Incomplete(String),

    #[error("Invalid cart: {0}")]
    InvalidCart(String),

    #[error("Delivery quote is missing or expired")]
    QuoteExpired,

    #[error("Payment declined")]
    PaymentDeclined,

    #[error(transparent)]
    Service(#[from] CoreError),
}

#[derive(Debug)]
pub enum SlotsOutcome {
    Loaded,
    Stale,
    Failed(CoreError),
}

/// What [`CheckoutSession::begin_place_order`] asks the caller to do.
#[derive(Debug, Clone)]
pub enum Placement {
    Charge { order: Order, method: PaymentMethod },
    /// Payment already went through on an earlier attempt; only the save is left.
    SaveOnly(Order),
}

#[derive(Debug)]
pub enum BookingOutcome {
    Booked(TimeSlot),
    Failed(CoreError),
}

/// Server-side state of one customer's checkout.
///
/// Everything the UI derives (continue enablement, totals, primary action)
/// is a method computed from current fields on each call.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    id: Uuid,
    user_id: String,
    restaurant_id: Uuid,
    cart: Cart,
    tax: TaxPolicy,
    steps: StepController,
    order_type: Option<OrderType>,
    addresses: AddressBook,
    quote: QuoteTracker,
    slots: Vec<TimeSlot>,
    slot_loads: Generation,
    slots_in_flight: u32,
    selected_slot: Option<Uuid>,
    booked_slot: Option<Uuid>,
    booking_pending: bool,
    payment_methods: Vec<PaymentMethod>,
    selected_payment: Option<Uuid>,
    placing: bool,
    paid_order: Option<Order>,
    placed_order: Option<Uuid>,
    notices: Vec<Notice>,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new(
        user_id: impl Into<String>,
        restaurant_id: Uuid,
        cart: Cart,
        payment_methods: Vec<PaymentMethod>,
        tax: TaxPolicy,
    ) -> Self {
        let now = Utc::now();
        let selected_payment = payment_methods
            .iter()
            .find(|m| m.is_default)
            .or_else(|| payment_methods.first())
            .map(|m| m.id);

        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            restaurant_id,
            cart,
            tax,
            steps: StepController::new(),
            order_type: None,
            addresses: AddressBook::new(),
            quote: QuoteTracker::new(),
            slots: Vec::new(),
            slot_loads: Generation::default(),
            slots_in_flight: 0,
            selected_slot: None,
            booked_slot: None,
            booking_pending: false,
            payment_methods,
            selected_payment,
            placing: false,
            paid_order: None,
            placed_order: None,
            notices: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn restaurant_id(&self) -> Uuid {
        self.restaurant_id
    }

    pub fn step(&self) -> CheckoutStep {
        self.steps.current()
    }

    pub fn order_type(&self) -> Option<OrderType> {
        self.order_type
    }

    pub fn addresses(&self) -> &AddressBook {
        &self.addresses
    }

    pub fn quote(&self) -> &QuoteTracker {
        &self.quote
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn selected_slot(&self) -> Option<&TimeSlot> {
        let id = self.selected_slot?;
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn booked_slot(&self) -> Option<Uuid> {
        self.booked_slot
    }

    pub fn is_closed(&self) -> bool {
        self.placed_order.is_some()
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn ensure_open(&self) -> Result<(), CheckoutError> {
        if self.is_closed() {
            Err(CheckoutError::SessionClosed(self.id))
        } else {
            Ok(())
        }
    }

    /// Selections are frozen from the start of placement until the order
    /// is saved, including after a charge whose save failed.
    fn ensure_not_placing(&self) -> Result<(), CheckoutError> {
        if self.placing || self.paid_order.is_some() {
            Err(CheckoutError::Pending("order placement"))
        } else {
            Ok(())
        }
    }

    /// Whether the purge sweep must leave this session alone.
    pub fn holds_payment(&self) -> bool {
        self.placing || self.paid_order.is_some()
    }

    /// Clear the slot of a session being discarded and return its booking
    /// for release. Placed or paid sessions keep their slot.
    pub fn take_abandoned_booking(&mut self) -> Option<Uuid> {
        if self.is_closed() || self.holds_payment() {
            return None;
        }
        self.selected_slot = None;
        self.booked_slot.take()
    }

    // ------------------------------------------------------------------
    // Order type
    // ------------------------------------------------------------------

    /// Change delivery/pickup. A selected slot that does not serve the new
    /// type is dropped; its booking id is returned so the caller can release it.
    pub fn select_order_type(&mut self, order_type: Option<OrderType>) -> Result<Option<Uuid>, CheckoutError> {
        self.ensure_not_placing()?;
        if self.booking_pending {
            return Err(CheckoutError::Pending("slot booking"));
        }
        self.order_type = order_type;

        let keep = match (order_type, self.selected_slot()) {
            (Some(ot), Some(slot)) => slot.supports(ot),
            _ => false,
        };
        if keep {
            return Ok(None);
        }
        self.selected_slot = None;
        Ok(self.booked_slot.take())
    }

    // ------------------------------------------------------------------
    // Addresses
    // ------------------------------------------------------------------

    pub fn select_address(&mut self, address_id: Uuid) -> Result<(), CheckoutError> {
        self.ensure_not_placing()?;
        if !self.addresses.select(address_id) {
            return Err(CheckoutError::UnknownAddress(address_id));
        }
        self.quote.address_changed(Some(address_id));
        Ok(())
    }

    pub fn begin_address_load(&mut self) -> Ticket {
        self.addresses.begin_load()
    }

    pub fn finish_address_load(&mut self, ticket: Ticket, result: CoreResult<Vec<Address>>) -> LoadOutcome {
        let outcome = self.addresses.finish_load(ticket, result);
        self.quote.address_changed(self.addresses.selected_id());
        outcome
    }

    pub fn begin_address_save(&mut self) -> Result<(), CheckoutError> {
        self.ensure_not_placing()?;
        self.addresses.begin_save();
        Ok(())
    }

    pub fn finish_address_save(&mut self, result: CoreResult<Address>) -> SaveOutcome {
        let outcome = self.addresses.finish_save(result);
        self.quote.address_changed(self.addresses.selected_id());
        outcome
    }

    /// Whether a save of this draft id should update rather than create.
    pub fn knows_address(&self, address_id: Uuid) -> bool {
        self.addresses.get(address_id).is_some()
    }

    // ------------------------------------------------------------------
    // Quote
    // ------------------------------------------------------------------

    /// Start a quote request for the selected address.
    pub fn begin_quote(&mut self) -> Result<(Ticket, Address), CheckoutError> {
        self.ensure_not_placing()?;
        let address = self
            .addresses
            .selected()
            .cloned()
            .ok_or_else(|| CheckoutError::Incomplete("select a delivery address first".to_string()))?;
        let ticket = self.quote.begin(address.id);
        Ok((ticket, address))
    }

    pub fn finish_quote(&mut self, ticket: Ticket, result: CoreResult<DeliveryQuote>) -> QuoteOutcome {
        self.quote.finish(ticket, result)
    }

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    pub fn slots_loading(&self) -> bool {
        self.slots_in_flight > 0
    }

    pub fn begin_slots_load(&mut self) -> Ticket {
        self.slots_in_flight += 1;
        self.slot_loads.issue()
    }

    pub fn finish_slots_load(&mut self, ticket: Ticket, result: CoreResult<Vec<TimeSlot>>) -> SlotsOutcome {
        self.slots_in_flight = self.slots_in_flight.saturating_sub(1);
        if !self.slot_loads.is_current(ticket) {
            return SlotsOutcome::Stale;
        }
        match result {
            Ok(slots) => {
                self.slots = slots;
                if let Some(id) = self.selected_slot {
                    if !self.slots.iter().any(|s| s.id == id) {
                        self.selected_slot = None;
                    }
                }
                SlotsOutcome::Loaded
            }
            Err(e) => SlotsOutcome::Failed(e),
        }
    }

    /// Pick a slot. Returns a previous booking that the caller must release.
    pub fn select_slot(&mut self, slot_id: Uuid, now: DateTime<Utc>) -> Result<Option<Uuid>, CheckoutError> {
        self.ensure_not_placing()?;
        if self.booking_pending {
            return Err(CheckoutError::Pending("slot booking"));
        }
        let order_type = self
            .order_type
            .ok_or_else(|| CheckoutError::Incomplete("choose delivery or pickup first".to_string()))?;
        let slot = self
            .slots
            .iter()
            .find(|s| s.id == slot_id)
            .ok_or(CheckoutError::UnknownSlot(slot_id))?;
        if !slot.is_selectable_for(order_type, now) {
            return Err(CheckoutError::SlotUnavailable(format!(
                "slot {} cannot take a {} order",
                slot_id, order_type
            )));
        }

        self.selected_slot = Some(slot_id);
        match self.booked_slot {
            Some(previous) if previous != slot_id => {
                self.booked_slot = None;
                Ok(Some(previous))
            }
            _ => Ok(None),
        }
    }

    /// Start booking the selected slot; continue stays disabled until it settles.
    pub fn begin_booking(&mut self) -> Result<Option<Uuid>, CheckoutError> {
        self.ensure_not_placing()?;
        if self.booking_pending {
            return Err(CheckoutError::Pending("slot booking"));
        }
        let slot_id = self
            .selected_slot
            .ok_or_else(|| CheckoutError::Incomplete("select a time slot first".to_string()))?;
        if self.booked_slot == Some(slot_id) {
            return Ok(None);
        }
        self.booking_pending = true;
        Ok(Some(slot_id))
    }

    pub fn finish_booking(&mut self, slot_id: Uuid, result: CoreResult<TimeSlot>) -> BookingOutcome {
        self.booking_pending = false;
        match result {
            Ok(slot) => {
                if let Some(existing) = self.slots.iter_mut().find(|s| s.id == slot.id) {
                    *existing = slot.clone();
                }
                self.booked_slot = Some(slot_id);
                BookingOutcome::Booked(slot)
            }
            Err(e) => {
                if self.selected_slot == Some(slot_id) {
                    self.selected_slot = None;
                }
                BookingOutcome::Failed(e)
            }
        }
    }

    pub fn booking_pending(&self) -> bool {
        self.booking_pending
    }

    // ------------------------------------------------------------------
    // Payment
    // ------------------------------------------------------------------

    pub fn payment_methods(&self) -> &[PaymentMethod] {
        &self.payment_methods
    }

    pub fn selected_payment_method(&self) -> Option<&PaymentMethod> {
        let id = self.selected_payment?;
        self.payment_methods.iter().find(|m| m.id == id)
    }

    pub fn select_payment_method(&mut self, method_id: Uuid) -> Result<(), CheckoutError> {
        self.ensure_not_placing()?;
        if !self.payment_methods.iter().any(|m| m.id == method_id) {
            return Err(CheckoutError::UnknownPaymentMethod(method_id));
        }
        self.selected_payment = Some(method_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Derived state
    // ------------------------------------------------------------------

    pub fn delivery_inputs(&self) -> DeliveryMethodInputs {
        DeliveryMethodInputs {
            order_type: self.order_type,
            selected_address: self.addresses.selected_id(),
            selected_slot: self.selected_slot,
            slots_loading: self.slots_loading(),
            quote_loading: self.quote.is_loading(),
            booking_pending: self.booking_pending,
            quote_valid: self.quote.is_valid(),
        }
    }

    pub fn delivery_check(&self) -> DeliveryMethodCheck {
        self.delivery_inputs().check()
    }

    pub fn step_ready(&self, step: CheckoutStep) -> bool {
        match step {
            CheckoutStep::DeliveryMethod => !self.delivery_inputs().continue_disabled(),
            CheckoutStep::Address => match self.order_type {
                Some(OrderType::Pickup) => true,
                Some(OrderType::Delivery) => {
                    self.addresses.selected_id().is_some() && !self.addresses.is_loading()
                }
                None => false,
            },
            CheckoutStep::Payment => self.selected_payment_method().is_some(),
            CheckoutStep::Review => self.readiness_problem().is_none() && !self.placing,
        }
    }

    pub fn primary_action(&self) -> PrimaryAction {
        self.steps.primary_action()
    }

    /// Whether the current step's primary button is disabled.
    pub fn continue_disabled(&self) -> bool {
        self.is_closed() || !self.step_ready(self.step())
    }

    pub fn advance(&mut self) -> Advance {
        let current = self.steps.current();
        let ready = !self.is_closed() && self.step_ready(current);

        if ready
            && current == CheckoutStep::DeliveryMethod
            && self.order_type == Some(OrderType::Delivery)
            && !self.quote.is_valid()
        {
            return Advance::Blocked {
                reason: BlockReason::QuoteUnavailable,
            };
        }
        self.steps.advance(ready)
    }

    pub fn back(&mut self) -> bool {
        if self.holds_payment() || self.is_closed() {
            return false;
        }
        self.steps.back()
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary::from_cart(&self.cart, self.tax, 0)
    }

    pub fn display_total(&self) -> i32 {
        self.summary().display_total(self.order_type, self.quote.current())
    }

    pub fn display_delivery_fee(&self) -> i32 {
        self.summary().display_delivery_fee(self.order_type, self.quote.current())
    }

    // ------------------------------------------------------------------
    // Place order
    // ------------------------------------------------------------------

    fn readiness_problem(&self) -> Option<CheckoutError> {
        if self.cart.is_empty() {
            return Some(CheckoutError::Incomplete("cart is empty".to_string()));
        }
        let order_type = match self.order_type {
            Some(ot) => ot,
            None => return Some(CheckoutError::Incomplete("choose delivery or pickup".to_string())),
        };
        if self.selected_slot.is_none() || self.booked_slot != self.selected_slot {
            return Some(CheckoutError::Incomplete("time slot is not booked".to_string()));
        }
        if self.selected_payment_method().is_none() {
            return Some(CheckoutError::Incomplete("select a payment method".to_string()));
        }
        if order_type == OrderType::Delivery {
            if self.addresses.selected().is_none() {
                return Some(CheckoutError::Incomplete("select a delivery address".to_string()));
            }
            if !self.quote.is_valid() {
                return Some(CheckoutError::QuoteExpired);
            }
        }
        None
    }

    /// Validate the whole checkout again and build the order to charge.
    /// Marks a placement as pending; the caller must call
    /// [`Self::finish_place_order`]. After a successful charge whose save
    /// failed, the paid order is handed back for saving instead.
    pub fn begin_place_order(&mut self) -> Result<Placement, CheckoutError> {
        self.ensure_open()?;
        if self.steps.current() != CheckoutStep::Review {
            return Err(CheckoutError::NotAtReview);
        }
        if self.placing {
            return Err(CheckoutError::Pending("order placement"));
        }
        if let Some(order) = self.paid_order.clone() {
            self.placing = true;
            return Ok(Placement::SaveOnly(order));
        }
        if let Some(problem) = self.readiness_problem() {
            return Err(problem);
        }

        let order_type = self
            .order_type
            .ok_or_else(|| CheckoutError::Incomplete("choose delivery or pickup".to_string()))?;
        let slot = self
            .selected_slot()
            .cloned()
            .ok_or_else(|| CheckoutError::Incomplete("time slot is not booked".to_string()))?;
        let method = self
            .selected_payment_method()
            .cloned()
            .ok_or_else(|| CheckoutError::Incomplete("select a payment method".to_string()))?;

        let summary = self.summary();
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer_id: self.user_id.clone(),
            restaurant_id: self.restaurant_id,
            order_type,
            lines: self.cart.to_order_lines(),
            address_id: match order_type {
                OrderType::Delivery => self.addresses.selected_id(),
                OrderType::Pickup => None,
            },
            slot_id: slot.id,
            slot_starts_at: slot.starts_at,
            payment_method: method.display_label(),
            payment_reference: None,
            subtotal_cents: summary.subtotal_cents,
            tax_cents: summary.tax_cents,
            delivery_fee_cents: self.display_delivery_fee(),
            total_cents: self.display_total(),
            status: OrderStatus::Placed,
            created_at: now,
            updated_at: now,
        };

        self.placing = true;
        Ok(Placement::Charge { order, method })
    }

    /// The charge for `order` succeeded; a retry must not charge again.
    pub fn record_payment(&mut self, order: &Order) {
        self.paid_order = Some(order.clone());
    }

    pub fn finish_place_order(&mut self, result: &Result<Order, CheckoutError>) {
        self.placing = false;
        if let Ok(order) = result {
            self.paid_order = None;
            self.placed_order = Some(order.id);
        }
    }

    pub fn placing(&self) -> bool {
        self.placing
    }

    /// Snapshot for the client; pending notices are handed over and cleared.
    pub fn view(&mut self) -> SessionView {
        let summary = self.summary();
        SessionView {
            id: self.id,
            restaurant_id: self.restaurant_id,
            step: self.step(),
            steps: self.steps.steps().to_vec(),
            primary_action: self.primary_action(),
            continue_disabled: self.continue_disabled(),
            delivery_method: self.delivery_check(),
            order_type: self.order_type,
            addresses: self.addresses.addresses().to_vec(),
            selected_address_id: self.addresses.selected_id(),
            addresses_loading: self.addresses.is_loading(),
            quote: self.quote.current().cloned(),
            slots: self.slots.clone(),
            slots_loading: self.slots_loading(),
            selected_slot_id: self.selected_slot,
            booked_slot_id: self.booked_slot,
            booking_pending: self.booking_pending,
            payment_methods: self.payment_methods.clone(),
            selected_payment_method_id: self.selected_payment,
            cart: self.cart.clone(),
            summary,
            delivery_fee_cents: self.display_delivery_fee(),
            total_cents: self.display_total(),
            placing: self.placing,
            placed_order_id: self.placed_order,
            notices: std::mem::take(&mut self.notices),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub step: CheckoutStep,
    pub steps: Vec<CheckoutStep>,
    pub primary_action: PrimaryAction,
    pub continue_disabled: bool,
    pub delivery_method: DeliveryMethodCheck,
    pub order_type: Option<OrderType>,
    pub addresses: Vec<Address>,
    pub selected_address_id: Option<Uuid>,
    pub addresses_loading: bool,
    pub quote: Option<DeliveryQuote>,
    pub slots: Vec<TimeSlot>,
    pub slots_loading: bool,
    pub selected_slot_id: Option<Uuid>,
    pub booked_slot_id: Option<Uuid>,
    pub booking_pending: bool,
    pub payment_methods: Vec<PaymentMethod>,
    pub selected_payment_method_id: Option<Uuid>,
    pub cart: Cart,
    pub summary: OrderSummary,
    pub delivery_fee_cents: i32,
    pub total_cents: i32,
    pub placing: bool,
    pub placed_order_id: Option<Uuid>,
    pub notices: Vec<Notice>,
}
