//! # storefront-core
//!
//! Domain model and storage/auth abstractions for a digital-products
//! storefront with coaching bookings and subscriptions.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      storefront-server                      │
//! │   ┌──────────────┐  ┌──────────────┐  ┌────────────────┐   │
//! │   │   Catalog /  │  │   Payments   │  │  AuthProvider  │   │
//! │   │   Booking    │──│  (checkout,  │──│  (Strategy)    │   │
//! │   │              │  │   webhook)   │  │                │   │
//! │   └──────┬───────┘  └──────┬───────┘  └────────────────┘   │
//! │          └────────┬────────┘                               │
//! │             ┌─────┴─────┐                                  │
//! │             │   Store   │  MemoryStore | Supabase          │
//! │             └───────────┘                                  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The data store is external and owns the schema; nothing here assumes
//! transactions across tables.

pub mod auth;
pub mod booking;
pub mod catalog;
pub mod error;
pub mod model;
pub mod poll;
pub mod store;

pub use auth::{AuthProvider, AuthSession, MemoryAuthProvider, SignUpRequest};
pub use error::{Result, ShopError};
pub use poll::{PollPolicy, VerificationStatus};
pub use store::{
    CartStore, CatalogStore, CoachingStore, MemoryStore, ProfileStore, PurchaseStore, Store,
    SubscriptionStore,
};
