//! Storage Abstractions
//!
//! One trait per table group. Implementations live next to their backend:
//! [`MemoryStore`] here for development and tests, the Supabase-backed store
//! in `storefront-runtime`.
//!
//! None of these operations are transactional with respect to each other.
//! Multi-row workflows (course creation, checkout) sequence them explicitly.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    Cart, CoachingPlan, CoachingService, CoachingSession, Course, Lesson, Product, Profile,
    Purchase, Section, UserSubscription,
};

/// Products, courses, sections and lessons
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn insert_product(&self, product: &Product) -> Result<()>;
    async fn update_product(&self, product: &Product) -> Result<()>;
    async fn delete_product(&self, id: Uuid) -> Result<()>;

    async fn list_courses(&self) -> Result<Vec<Course>>;
    async fn get_course(&self, id: Uuid) -> Result<Option<Course>>;
    async fn insert_course(&self, course: &Course) -> Result<()>;
    async fn update_course(&self, course: &Course) -> Result<()>;
    async fn delete_course(&self, id: Uuid) -> Result<()>;

    async fn get_section(&self, id: Uuid) -> Result<Option<Section>>;
    /// Sections of a course ordered by position
    async fn list_sections(&self, course_id: Uuid) -> Result<Vec<Section>>;
    async fn insert_section(&self, section: &Section) -> Result<()>;
    async fn update_section(&self, section: &Section) -> Result<()>;
    async fn delete_section(&self, id: Uuid) -> Result<()>;

    async fn get_lesson(&self, id: Uuid) -> Result<Option<Lesson>>;
    /// Lessons of a section ordered by position
    async fn list_lessons(&self, section_id: Uuid) -> Result<Vec<Lesson>>;
    async fn insert_lesson(&self, lesson: &Lesson) -> Result<()>;
    async fn update_lesson(&self, lesson: &Lesson) -> Result<()>;
    async fn delete_lesson(&self, id: Uuid) -> Result<()>;
}

/// Coaching services, plans and booked sessions
#[async_trait]
pub trait CoachingStore: Send + Sync {
    async fn list_services(&self) -> Result<Vec<CoachingService>>;
    async fn get_service(&self, id: Uuid) -> Result<Option<CoachingService>>;
    async fn insert_service(&self, service: &CoachingService) -> Result<()>;
    async fn update_service(&self, service: &CoachingService) -> Result<()>;
    async fn delete_service(&self, id: Uuid) -> Result<()>;

    async fn list_plans(&self) -> Result<Vec<CoachingPlan>>;
    async fn get_plan(&self, id: Uuid) -> Result<Option<CoachingPlan>>;
    async fn insert_plan(&self, plan: &CoachingPlan) -> Result<()>;
    async fn update_plan(&self, plan: &CoachingPlan) -> Result<()>;
    async fn delete_plan(&self, id: Uuid) -> Result<()>;

    async fn insert_session(&self, session: &CoachingSession) -> Result<()>;
    async fn get_session(&self, id: Uuid) -> Result<Option<CoachingSession>>;
    async fn update_session(&self, session: &CoachingSession) -> Result<()>;
    /// All sessions ordered by scheduled time
    async fn list_sessions(&self) -> Result<Vec<CoachingSession>>;
    async fn list_sessions_for_user(&self, user_id: Uuid) -> Result<Vec<CoachingSession>>;
    /// Session booked through the given checkout session
    async fn find_session_by_checkout(&self, stripe_session_id: &str)
        -> Result<Option<CoachingSession>>;
}

/// Purchase rows
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    async fn insert_purchase(&self, purchase: &Purchase) -> Result<()>;
    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>>;
    async fn update_purchase(&self, purchase: &Purchase) -> Result<()>;
    /// Every purchase row for (user, product), any status
    async fn find_purchases(&self, user_id: Uuid, product_id: Uuid) -> Result<Vec<Purchase>>;
    async fn list_purchases_for_user(&self, user_id: Uuid) -> Result<Vec<Purchase>>;
    async fn list_purchases_by_session(&self, stripe_session_id: &str) -> Result<Vec<Purchase>>;
}

/// User subscriptions
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert, or replace the row with the same `stripe_subscription_id`
    async fn upsert_subscription(&self, subscription: &UserSubscription) -> Result<()>;
    async fn get_subscription(&self, id: Uuid) -> Result<Option<UserSubscription>>;
    async fn find_subscription_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<UserSubscription>>;
    async fn list_subscriptions_for_user(&self, user_id: Uuid) -> Result<Vec<UserSubscription>>;
    async fn update_subscription(&self, subscription: &UserSubscription) -> Result<()>;
}

/// Profiles (one per auth user)
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>>;
    async fn insert_profile(&self, profile: &Profile) -> Result<()>;
    async fn list_profiles(&self) -> Result<Vec<Profile>>;
}

/// Server-side cart mirror
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get_cart(&self, user_id: Uuid) -> Result<Cart>;
    async fn save_cart(&self, user_id: Uuid, cart: &Cart) -> Result<()>;
}

/// Everything the server needs from the data store
pub trait Store:
    CatalogStore + CoachingStore + PurchaseStore + SubscriptionStore + ProfileStore + CartStore
{
}

impl<T> Store for T where
    T: CatalogStore + CoachingStore + PurchaseStore + SubscriptionStore + ProfileStore + CartStore
{
}
