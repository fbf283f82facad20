//! Domain Models
//!
//! Rows as they live in the external data store. Uses `rust_decimal` for all
//! monetary values.

mod cart;
mod catalog;
mod coaching;
mod profile;
mod purchase;
mod subscription;

pub use cart::{Cart, CartItem};
pub use catalog::{Course, CourseTree, Lesson, Product, ProductKind, Section, SectionTree};
pub use coaching::{CoachingService, CoachingSession, SessionStatus};
pub use profile::{AuthUser, Profile, Role};
pub use purchase::{Purchase, PurchaseStatus};
pub use subscription::{CoachingPlan, SubscriptionStatus, UserSubscription};
