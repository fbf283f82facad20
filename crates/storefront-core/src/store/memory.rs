//! In-memory store (for development and tests)

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CartStore, CatalogStore, CoachingStore, ProfileStore, PurchaseStore, SubscriptionStore};
use crate::error::{Result, ShopError};
use crate::model::{
    Cart, CoachingPlan, CoachingService, CoachingSession, Course, Lesson, Product, Profile,
    Purchase, Section, UserSubscription,
};

#[derive(Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    courses: HashMap<Uuid, Course>,
    sections: HashMap<Uuid, Section>,
    lessons: HashMap<Uuid, Lesson>,
    services: HashMap<Uuid, CoachingService>,
    plans: HashMap<Uuid, CoachingPlan>,
    sessions: HashMap<Uuid, CoachingSession>,
    purchases: HashMap<Uuid, Purchase>,
    subscriptions: HashMap<Uuid, UserSubscription>,
    profiles: HashMap<Uuid, Profile>,
    carts: HashMap<Uuid, Cart>,
}

/// Store backed by process memory. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert_new<T: Clone>(table: &mut HashMap<Uuid, T>, id: Uuid, row: &T, what: &str) -> Result<()> {
    if table.contains_key(&id) {
        return Err(ShopError::Storage(format!("duplicate {what} id {id}")));
    }
    table.insert(id, row.clone());
    Ok(())
}

fn replace<T: Clone>(table: &mut HashMap<Uuid, T>, id: Uuid, row: &T, what: &str) -> Result<()> {
    match table.get_mut(&id) {
        Some(existing) => {
            *existing = row.clone();
            Ok(())
        }
        None => Err(ShopError::NotFound(format!("{what} {id}"))),
    }
}

fn sorted_by_key<T: Clone, K: Ord>(rows: impl Iterator<Item = T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut rows: Vec<T> = rows.collect();
    rows.sort_by_key(|r| key(r));
    rows
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>> {
        let t = self.tables.read().await;
        Ok(sorted_by_key(t.products.values().cloned(), |p| p.created_at))
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        insert_new(&mut self.tables.write().await.products, product.id, product, "product")
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        replace(&mut self.tables.write().await.products, product.id, product, "product")
    }

    async fn delete_product(&self, id: Uuid) -> Result<()> {
        self.tables.write().await.products.remove(&id);
        Ok(())
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let t = self.tables.read().await;
        Ok(sorted_by_key(t.courses.values().cloned(), |c| c.created_at))
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>> {
        Ok(self.tables.read().await.courses.get(&id).cloned())
    }

    async fn insert_course(&self, course: &Course) -> Result<()> {
        insert_new(&mut self.tables.write().await.courses, course.id, course, "course")
    }

    async fn update_course(&self, course: &Course) -> Result<()> {
        replace(&mut self.tables.write().await.courses, course.id, course, "course")
    }

    async fn delete_course(&self, id: Uuid) -> Result<()> {
        self.tables.write().await.courses.remove(&id);
        Ok(())
    }

    async fn get_section(&self, id: Uuid) -> Result<Option<Section>> {
        Ok(self.tables.read().await.sections.get(&id).cloned())
    }

    async fn list_sections(&self, course_id: Uuid) -> Result<Vec<Section>> {
        let t = self.tables.read().await;
        let rows = t.sections.values().filter(|s| s.course_id == course_id).cloned();
        Ok(sorted_by_key(rows, |s| s.position))
    }

    async fn insert_section(&self, section: &Section) -> Result<()> {
        insert_new(&mut self.tables.write().await.sections, section.id, section, "section")
    }

    async fn update_section(&self, section: &Section) -> Result<()> {
        replace(&mut self.tables.write().await.sections, section.id, section, "section")
    }

    async fn delete_section(&self, id: Uuid) -> Result<()> {
        self.tables.write().await.sections.remove(&id);
        Ok(())
    }

    async fn get_lesson(&self, id: Uuid) -> Result<Option<Lesson>> {
        Ok(self.tables.read().await.lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, section_id: Uuid) -> Result<Vec<Lesson>> {
        let t = self.tables.read().await;
        let rows = t.lessons.values().filter(|l| l.section_id == section_id).cloned();
        Ok(sorted_by_key(rows, |l| l.position))
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> Result<()> {
        insert_new(&mut self.tables.write().await.lessons, lesson.id, lesson, "lesson")
    }

    async fn update_lesson(&self, lesson: &Lesson) -> Result<()> {
        replace(&mut self.tables.write().await.lessons, lesson.id, lesson, "lesson")
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<()> {
        self.tables.write().await.lessons.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl CoachingStore for MemoryStore {
    async fn list_services(&self) -> Result<Vec<CoachingService>> {
        let t = self.tables.read().await;
        Ok(sorted_by_key(t.services.values().cloned(), |s| s.name.clone()))
    }

    async fn get_service(&self, id: Uuid) -> Result<Option<CoachingService>> {
        Ok(self.tables.read().await.services.get(&id).cloned())
    }

    async fn insert_service(&self, service: &CoachingService) -> Result<()> {
        insert_new(&mut self.tables.write().await.services, service.id, service, "service")
    }

    async fn update_service(&self, service: &CoachingService) -> Result<()> {
        replace(&mut self.tables.write().await.services, service.id, service, "service")
    }

    async fn delete_service(&self, id: Uuid) -> Result<()> {
        self.tables.write().await.services.remove(&id);
        Ok(())
    }

    async fn list_plans(&self) -> Result<Vec<CoachingPlan>> {
        let t = self.tables.read().await;
        Ok(sorted_by_key(t.plans.values().cloned(), |p| p.price))
    }

    async fn get_plan(&self, id: Uuid) -> Result<Option<CoachingPlan>> {
        Ok(self.tables.read().await.plans.get(&id).cloned())
    }

    async fn insert_plan(&self, plan: &CoachingPlan) -> Result<()> {
        insert_new(&mut self.tables.write().await.plans, plan.id, plan, "plan")
    }

    async fn update_plan(&self, plan: &CoachingPlan) -> Result<()> {
        replace(&mut self.tables.write().await.plans, plan.id, plan, "plan")
    }

    async fn delete_plan(&self, id: Uuid) -> Result<()> {
        self.tables.write().await.plans.remove(&id);
        Ok(())
    }

    async fn insert_session(&self, session: &CoachingSession) -> Result<()> {
        insert_new(&mut self.tables.write().await.sessions, session.id, session, "session")
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<CoachingSession>> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn update_session(&self, session: &CoachingSession) -> Result<()> {
        replace(&mut self.tables.write().await.sessions, session.id, session, "session")
    }

    async fn list_sessions(&self) -> Result<Vec<CoachingSession>> {
        let t = self.tables.read().await;
        Ok(sorted_by_key(t.sessions.values().cloned(), |s| s.scheduled_at))
    }

    async fn list_sessions_for_user(&self, user_id: Uuid) -> Result<Vec<CoachingSession>> {
        let t = self.tables.read().await;
        let rows = t.sessions.values().filter(|s| s.user_id == user_id).cloned();
        Ok(sorted_by_key(rows, |s| s.scheduled_at))
    }

    async fn find_session_by_checkout(
        &self,
        stripe_session_id: &str,
    ) -> Result<Option<CoachingSession>> {
        let t = self.tables.read().await;
        Ok(t.sessions
            .values()
            .find(|s| s.stripe_session_id.as_deref() == Some(stripe_session_id))
            .cloned())
    }
}

#[async_trait]
impl PurchaseStore for MemoryStore {
    async fn insert_purchase(&self, purchase: &Purchase) -> Result<()> {
        insert_new(&mut self.tables.write().await.purchases, purchase.id, purchase, "purchase")
    }

    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>> {
        Ok(self.tables.read().await.purchases.get(&id).cloned())
    }

    async fn update_purchase(&self, purchase: &Purchase) -> Result<()> {
        replace(&mut self.tables.write().await.purchases, purchase.id, purchase, "purchase")
    }

    async fn find_purchases(&self, user_id: Uuid, product_id: Uuid) -> Result<Vec<Purchase>> {
        let t = self.tables.read().await;
        let rows = t
            .purchases
            .values()
            .filter(|p| p.user_id == user_id && p.product_id == product_id)
            .cloned();
        Ok(sorted_by_key(rows, |p| p.created_at))
    }

    async fn list_purchases_for_user(&self, user_id: Uuid) -> Result<Vec<Purchase>> {
        let t = self.tables.read().await;
        let rows = t.purchases.values().filter(|p| p.user_id == user_id).cloned();
        Ok(sorted_by_key(rows, |p| p.created_at))
    }

    async fn list_purchases_by_session(&self, stripe_session_id: &str) -> Result<Vec<Purchase>> {
        let t = self.tables.read().await;
        let rows = t
            .purchases
            .values()
            .filter(|p| p.stripe_session_id.as_deref() == Some(stripe_session_id))
            .cloned();
        Ok(sorted_by_key(rows, |p| p.created_at))
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn upsert_subscription(&self, subscription: &UserSubscription) -> Result<()> {
        let mut t = self.tables.write().await;
        let existing = t
            .subscriptions
            .values()
            .find(|s| s.stripe_subscription_id == subscription.stripe_subscription_id)
            .map(|s| s.id);
        let mut row = subscription.clone();
        if let Some(id) = existing {
            row.id = id;
        }
        t.subscriptions.insert(row.id, row);
        Ok(())
    }

    async fn get_subscription(&self, id: Uuid) -> Result<Option<UserSubscription>> {
        Ok(self.tables.read().await.subscriptions.get(&id).cloned())
    }

    async fn find_subscription_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<UserSubscription>> {
        let t = self.tables.read().await;
        Ok(t.subscriptions
            .values()
            .find(|s| s.stripe_subscription_id == stripe_subscription_id)
            .cloned())
    }

    async fn list_subscriptions_for_user(&self, user_id: Uuid) -> Result<Vec<UserSubscription>> {
        let t = self.tables.read().await;
        let rows = t.subscriptions.values().filter(|s| s.user_id == user_id).cloned();
        Ok(sorted_by_key(rows, |s| s.current_period_start))
    }

    async fn update_subscription(&self, subscription: &UserSubscription) -> Result<()> {
        replace(
            &mut self.tables.write().await.subscriptions,
            subscription.id,
            subscription,
            "subscription",
        )
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        insert_new(&mut self.tables.write().await.profiles, profile.id, profile, "profile")
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let t = self.tables.read().await;
        Ok(sorted_by_key(t.profiles.values().cloned(), |p| p.created_at))
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get_cart(&self, user_id: Uuid) -> Result<Cart> {
        Ok(self.tables.read().await.carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn save_cart(&self, user_id: Uuid, cart: &Cart) -> Result<()> {
        self.tables.write().await.carts.insert(user_id, cart.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PurchaseStatus;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_purchase_lookup_by_session() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let mut purchase = Purchase::pending(user, Uuid::new_v4(), dec!(10), false);
        store.insert_purchase(&purchase).await.unwrap();

        purchase.stripe_session_id = Some("cs_test_1".into());
        purchase.status = PurchaseStatus::Completed;
        store.update_purchase(&purchase).await.unwrap();

        let found = store.list_purchases_by_session("cs_test_1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].is_completed());
        assert!(store.list_purchases_by_session("cs_other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = MemoryStore::new();
        let product = Product::new("Ghost", dec!(1));
        let err = store.update_product(&product).await.unwrap_err();
        assert!(matches!(err, ShopError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_subscription_upsert_keeps_row_id() {
        use crate::model::{SubscriptionStatus, UserSubscription};
        use chrono::Utc;

        let store = MemoryStore::new();
        let now = Utc::now();
        let first = UserSubscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            stripe_subscription_id: "sub_1".into(),
            status: SubscriptionStatus::Active,
            current_period_start: now,
            current_period_end: now,
            sessions_remaining: 4,
        };
        store.upsert_subscription(&first).await.unwrap();

        let mut again = first.clone();
        again.id = Uuid::new_v4();
        again.status = SubscriptionStatus::PastDue;
        store.upsert_subscription(&again).await.unwrap();

        let rows = store.list_subscriptions_for_user(first.user_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, first.id);
        assert_eq!(rows[0].status, SubscriptionStatus::PastDue);
    }
}
