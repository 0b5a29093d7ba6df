use serde::{Deserialize, Serialize};

/// Checkout wizard steps, in the order the customer walks them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    DeliveryMethod,
    Address,
    Payment,
    Review,
}

impl CheckoutStep {
    pub const ALL: [CheckoutStep; 4] = [
        CheckoutStep::DeliveryMethod,
        CheckoutStep::Address,
        CheckoutStep::Payment,
        CheckoutStep::Review,
    ];
}

/// What the primary button of the current step does.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAction {
    Continue,
    PlaceOrder,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The step's own validation is not satisfied.
    StepIncomplete,
    /// Delivery was chosen but there is no valid quote for the address.
    QuoteUnavailable,
}

/// Result of a continue click.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Advance {
    Moved { step: CheckoutStep },
    Blocked { reason: BlockReason },
    AtEnd,
}

/// Tracks the current step. It only moves one step at a time, and only
/// forward when the caller reports the current step ready.
#[derive(Debug, Clone, Default)]
pub struct StepController {
    index: usize,
}

impl StepController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &'static [CheckoutStep] {
        &CheckoutStep::ALL
    }

    pub fn current(&self) -> CheckoutStep {
        CheckoutStep::ALL[self.index]
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == CheckoutStep::ALL.len()
    }

    pub fn primary_action(&self) -> PrimaryAction {
        if self.is_last() {
            PrimaryAction::PlaceOrder
        } else {
            PrimaryAction::Continue
        }
    }

    /// Move to the next step if `ready`. Not being ready is a no-op.
    pub fn advance(&mut self, ready: bool) -> Advance {
        if self.is_last() {
            return Advance::AtEnd;
        }
        if !ready {
            return Advance::Blocked {
                reason: BlockReason::StepIncomplete,
            };
        }
        self.index += 1;
        Advance::Moved { step: self.current() }
    }

    /// Step back once. Returns false on the first step.
    pub fn back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walks_all_steps_in_order() {
        let mut steps = StepController::new();
        assert_eq!(steps.current(), CheckoutStep::DeliveryMethod);
        assert_eq!(steps.primary_action(), PrimaryAction::Continue);

        for expected in [CheckoutStep::Address, CheckoutStep::Payment, CheckoutStep::Review] {
            assert_eq!(steps.advance(true), Advance::Moved { step: expected });
        }

        assert!(steps.is_last());
        assert_eq!(steps.primary_action(), PrimaryAction::PlaceOrder);
        assert_eq!(steps.advance(true), Advance::AtEnd);
        assert_eq!(steps.current(), CheckoutStep::Review);
    }

    #[test]
    fn test_blocked_advance_is_noop() {
        let mut steps = StepController::new();
        assert_eq!(
            steps.advance(false),
            Advance::Blocked { reason: BlockReason::StepIncomplete }
        );
        assert_eq!(steps.current(), CheckoutStep::DeliveryMethod);
    }

    #[test]
    fn test_back_stops_at_first_step() {
        let mut steps = StepController::new();
        assert!(!steps.back());
        steps.advance(true);
        assert!(steps.back());
        assert_eq!(steps.current(), CheckoutStep::DeliveryMethod);
    }
}
