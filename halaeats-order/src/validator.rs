use halaeats_core::OrderType;
use serde::Serialize;
use uuid::Uuid;

/// Everything the delivery-method step's continue button depends on.
///
/// Built fresh from session state on every read, so the decision never
/// lags behind its inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryMethodInputs {
    pub order_type: Option<OrderType>,
    pub selected_address: Option<Uuid>,
    pub selected_slot: Option<Uuid>,
    pub slots_loading: bool,
    pub quote_loading: bool,
    pub booking_pending: bool,
    pub quote_valid: bool,
}

/// Decision plus the quote state, which is reported but not enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryMethodCheck {
    pub continue_disabled: bool,
    pub quote_valid: bool,
    pub quote_loading: bool,
}

impl DeliveryMethodInputs {
    pub fn continue_disabled(&self) -> bool {
        if self.booking_pending {
            return true;
        }

        let slot_ready = self.selected_slot.is_some() && !self.slots_loading;
        match self.order_type {
            Some(OrderType::Pickup) => !slot_ready,
            // Quote validity is enforced when continue is clicked, not here.
            Some(OrderType::Delivery) => !(self.selected_address.is_some() && slot_ready),
            None => true,
        }
    }

    pub fn check(&self) -> DeliveryMethodCheck {
        DeliveryMethodCheck {
            continue_disabled: self.continue_disabled(),
            quote_valid: self.quote_valid,
            quote_loading: self.quote_loading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every combination of the boolean inputs for one order type.
    fn grid(order_type: Option<OrderType>) -> Vec<DeliveryMethodInputs> {
        let mut out = Vec::new();
        for bits in 0u8..64 {
            out.push(DeliveryMethodInputs {
                order_type,
                selected_address: (bits & 1 != 0).then(Uuid::new_v4),
                selected_slot: (bits & 2 != 0).then(Uuid::new_v4),
                slots_loading: bits & 4 != 0,
                quote_loading: bits & 8 != 0,
                booking_pending: bits & 16 != 0,
                quote_valid: bits & 32 != 0,
            });
        }
        out
    }

    #[test]
    fn test_no_order_type_is_always_disabled() {
        assert!(grid(None).iter().all(|i| i.continue_disabled()));
    }

    #[test]
    fn test_pending_booking_always_disables() {
        for order_type in [None, Some(OrderType::Pickup), Some(OrderType::Delivery)] {
            for inputs in grid(order_type).into_iter().filter(|i| i.booking_pending) {
                assert!(inputs.continue_disabled(), "{:?}", inputs);
            }
        }
    }

    #[test]
    fn test_pickup_needs_slot_and_settled_slots() {
        for inputs in grid(Some(OrderType::Pickup)).into_iter().filter(|i| !i.booking_pending) {
            let enabled = inputs.selected_slot.is_some() && !inputs.slots_loading;
            assert_eq!(!inputs.continue_disabled(), enabled, "{:?}", inputs);
        }
    }

    #[test]
    fn test_delivery_ignores_quote_validity() {
        for inputs in grid(Some(OrderType::Delivery)).into_iter().filter(|i| !i.booking_pending) {
            let enabled = inputs.selected_address.is_some()
                && inputs.selected_slot.is_some()
                && !inputs.slots_loading;
            assert_eq!(!inputs.continue_disabled(), enabled, "{:?}", inputs);
        }
    }

    #[test]
    fn test_check_reports_quote_state() {
        let inputs = DeliveryMethodInputs {
            order_type: Some(OrderType::Delivery),
            selected_address: Some(Uuid::new_v4()),
            selected_slot: Some(Uuid::new_v4()),
            quote_valid: false,
            quote_loading: true,
            ..Default::default()
        };
        let check = inputs.check();
        assert!(!check.continue_disabled);
        assert!(!check.quote_valid);
        assert!(check.quote_loading);
    }
}
