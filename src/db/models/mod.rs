//! Row models and status enums
//!
//! Enums are stored as snake_case TEXT. Status transitions live next to the
//! enums so every mutation path shares one state machine.

pub mod client;
pub mod gift_card;
pub mod order;
pub mod product;
pub mod workshop;

pub use client::Client;
pub use gift_card::{GiftCard, GiftCardStatus, GiftCardTransaction, TransactionKind};
pub use order::{Order, OrderItem, OrderStatus, PaymentStatus, Provider, RefundDetails};
pub use product::Product;
pub use workshop::{Reservation, ReservationStatus, SessionStatus, Workshop, WorkshopSession};
