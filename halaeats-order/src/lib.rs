pub mod cart;
pub mod summary;
pub mod steps;
pub mod validator;
pub mod ticket;
pub mod address_book;
pub mod quote;
pub mod session;
pub mod flow;
pub mod orchestrator;
pub mod manager;
pub mod batching;

pub use cart::{Cart, CartLine};
pub use summary::{OrderSummary, TaxPolicy};
pub use steps::{Advance, BlockReason, CheckoutStep, PrimaryAction, StepController};
pub use validator::{DeliveryMethodCheck, DeliveryMethodInputs};
pub use address_book::AddressBook;
pub use quote::{QuoteConfig, QuoteTracker, ZoneQuoteService};
pub use session::{CheckoutError, CheckoutSession, Placement, SessionView};
pub use flow::{AdvanceResult, CheckoutService, PlacedOrder, SessionStore};
pub use orchestrator::{MockPaymentAdapter, PaymentOrchestrator};
pub use manager::{OrderError, OrderManager};
pub use batching::{BatchPlanner, PlannedBatch};
