//! Commerce core: checkout, booking, gift cards, webhook reconciliation,
//! refund orchestration.
//!
//! Everything here is plain business logic over the repository layer —
//! handlers stay thin and payment vendors stay behind the gateway trait.

pub mod booking;
pub mod checkout;
pub mod gift_cards;
pub mod money;
pub mod reconcile;
pub mod refund;

pub use booking::{BookingInput, BookingOutcome};
pub use checkout::{CartItemInput, CheckoutInput, CheckoutOutcome};
pub use gift_cards::GiftCardApplication;
pub use reconcile::ReconcileOutcome;
pub use refund::RefundMode;
