//! PostgREST-backed store

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use storefront_core::model::{
    Cart, CoachingPlan, CoachingService, CoachingSession, Course, Lesson, Product, Profile,
    Purchase, Section, UserSubscription,
};
use storefront_core::{
    CartStore, CatalogStore, CoachingStore, ProfileStore, PurchaseStore, Result, ShopError,
    SubscriptionStore,
};
use uuid::Uuid;

use super::{check_status, http_client, send_json, transport_error, Query, SupabaseConfig};

const PRODUCTS: &str = "products";
const COURSES: &str = "courses";
const SECTIONS: &str = "course_sections";
const LESSONS: &str = "course_lessons";
const SERVICES: &str = "coaching_services";
const PLANS: &str = "coaching_plans";
const SESSIONS: &str = "coaching_sessions";
const PURCHASES: &str = "purchases";
const SUBSCRIPTIONS: &str = "user_subscriptions";
const PROFILES: &str = "profiles";
const CARTS: &str = "carts";

/// Cart row: one JSON document per user
#[derive(Serialize, Deserialize)]
struct CartRow {
    user_id: Uuid,
    items: Cart,
    updated_at: chrono::DateTime<Utc>,
}

/// Store over Supabase tables, authenticated with the service-role key
pub struct PostgrestStore {
    client: Client,
    config: SupabaseConfig,
}

impl PostgrestStore {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            client: http_client(),
            config,
        }
    }

    fn request(&self, method: reqwest::Method, table: &str, query: &Query) -> RequestBuilder {
        self.client
            .request(method, self.config.rest_url(table))
            .query(query.params())
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: Query) -> Result<Vec<T>> {
        send_json(self.request(reqwest::Method::GET, table, &query), table).await
    }

    async fn select_by_id<T: DeserializeOwned>(&self, table: &str, id: Uuid) -> Result<Option<T>> {
        let rows: Vec<T> = self.select(table, Query::new().eq("id", id).limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<()> {
        let request = self
            .request(reqwest::Method::POST, table, &Query::new())
            .header("Prefer", "return=minimal")
            .json(row);
        let response = request.send().await.map_err(transport_error)?;
        check_status(response, table).await?;
        Ok(())
    }

    async fn upsert<T: Serialize + Sync>(&self, table: &str, conflict: &str, row: &T) -> Result<()> {
        let request = self
            .request(reqwest::Method::POST, table, &Query::new().on_conflict(conflict))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row);
        let response = request.send().await.map_err(transport_error)?;
        check_status(response, table).await?;
        Ok(())
    }

    /// Replace the row with `id`; missing rows are `NotFound`
    async fn update<T: Serialize + Sync>(&self, table: &str, id: Uuid, row: &T) -> Result<()> {
        let request = self
            .request(reqwest::Method::PATCH, table, &Query::new().eq("id", id))
            .header("Prefer", "return=representation")
            .json(row);
        let updated: Vec<serde_json::Value> = send_json(request, table).await?;
        if updated.is_empty() {
            return Err(ShopError::NotFound(format!("{table} {id}")));
        }
        Ok(())
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<()> {
        let request = self.request(reqwest::Method::DELETE, table, &Query::new().eq("id", id));
        let response = request.send().await.map_err(transport_error)?;
        check_status(response, table).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgrestStore {
    async fn list_products(&self) -> Result<Vec<Product>> {
        self.select(PRODUCTS, Query::new().order("created_at")).await
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        self.select_by_id(PRODUCTS, id).await
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        self.insert(PRODUCTS, product).await
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        self.update(PRODUCTS, product.id, product).await
    }

    async fn delete_product(&self, id: Uuid) -> Result<()> {
        self.delete(PRODUCTS, id).await
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        self.select(COURSES, Query::new().order("created_at")).await
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>> {
        self.select_by_id(COURSES, id).await
    }

    async fn insert_course(&self, course: &Course) -> Result<()> {
        self.insert(COURSES, course).await
    }

    async fn update_course(&self, course: &Course) -> Result<()> {
        self.update(COURSES, course.id, course).await
    }

    async fn delete_course(&self, id: Uuid) -> Result<()> {
        self.delete(COURSES, id).await
    }

    async fn get_section(&self, id: Uuid) -> Result<Option<Section>> {
        self.select_by_id(SECTIONS, id).await
    }

    async fn list_sections(&self, course_id: Uuid) -> Result<Vec<Section>> {
        self.select(SECTIONS, Query::new().eq("course_id", course_id).order("position"))
            .await
    }

    async fn insert_section(&self, section: &Section) -> Result<()> {
        self.insert(SECTIONS, section).await
    }

    async fn update_section(&self, section: &Section) -> Result<()> {
        self.update(SECTIONS, section.id, section).await
    }

    async fn delete_section(&self, id: Uuid) -> Result<()> {
        self.delete(SECTIONS, id).await
    }

    async fn get_lesson(&self, id: Uuid) -> Result<Option<Lesson>> {
        self.select_by_id(LESSONS, id).await
    }

    async fn list_lessons(&self, section_id: Uuid) -> Result<Vec<Lesson>> {
        self.select(LESSONS, Query::new().eq("section_id", section_id).order("position"))
            .await
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> Result<()> {
        self.insert(LESSONS, lesson).await
    }

    async fn update_lesson(&self, lesson: &Lesson) -> Result<()> {
        self.update(LESSONS, lesson.id, lesson).await
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<()> {
        self.delete(LESSONS, id).await
    }
}

#[async_trait]
impl CoachingStore for PostgrestStore {
    async fn list_services(&self) -> Result<Vec<CoachingService>> {
        self.select(SERVICES, Query::new().order("name")).await
    }

    async fn get_service(&self, id: Uuid) -> Result<Option<CoachingService>> {
        self.select_by_id(SERVICES, id).await
    }

    async fn insert_service(&self, service: &CoachingService) -> Result<()> {
        self.insert(SERVICES, service).await
    }

    async fn update_service(&self, service: &CoachingService) -> Result<()> {
        self.update(SERVICES, service.id, service).await
    }

    async fn delete_service(&self, id: Uuid) -> Result<()> {
        self.delete(SERVICES, id).await
    }

    async fn list_plans(&self) -> Result<Vec<CoachingPlan>> {
        self.select(PLANS, Query::new().order("price")).await
    }

    async fn get_plan(&self, id: Uuid) -> Result<Option<CoachingPlan>> {
        self.select_by_id(PLANS, id).await
    }

    async fn insert_plan(&self, plan: &CoachingPlan) -> Result<()> {
        self.insert(PLANS, plan).await
    }

    async fn update_plan(&self, plan: &CoachingPlan) -> Result<()> {
        self.update(PLANS, plan.id, plan).await
    }

    async fn delete_plan(&self, id: Uuid) -> Result<()> {
        self.delete(PLANS, id).await
    }

    async fn insert_session(&self, session: &CoachingSession) -> Result<()> {
        self.insert(SESSIONS, session).await
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<CoachingSession>> {
        self.select_by_id(SESSIONS, id).await
    }

    async fn update_session(&self, session: &CoachingSession) -> Result<()> {
        self.update(SESSIONS, session.id, session).await
    }

    async fn list_sessions(&self) -> Result<Vec<CoachingSession>> {
        self.select(SESSIONS, Query::new().order("scheduled_at")).await
    }

    async fn list_sessions_for_user(&self, user_id: Uuid) -> Result<Vec<CoachingSession>> {
        self.select(SESSIONS, Query::new().eq("user_id", user_id).order("scheduled_at"))
            .await
    }

    async fn find_session_by_checkout(&self, stripe_session_id: &str) -> Result<Option<CoachingSession>> {
        let rows: Vec<CoachingSession> = self
            .select(SESSIONS, Query::new().eq("stripe_session_id", stripe_session_id).limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl PurchaseStore for PostgrestStore {
    async fn insert_purchase(&self, purchase: &Purchase) -> Result<()> {
        self.insert(PURCHASES, purchase).await
    }

    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>> {
        self.select_by_id(PURCHASES, id).await
    }

    async fn update_purchase(&self, purchase: &Purchase) -> Result<()> {
        self.update(PURCHASES, purchase.id, purchase).await
    }

    async fn find_purchases(&self, user_id: Uuid, product_id: Uuid) -> Result<Vec<Purchase>> {
        let query = Query::new()
            .eq("user_id", user_id)
            .eq("product_id", product_id)
            .order("created_at");
        self.select(PURCHASES, query).await
    }

    async fn list_purchases_for_user(&self, user_id: Uuid) -> Result<Vec<Purchase>> {
        self.select(PURCHASES, Query::new().eq("user_id", user_id).order("created_at"))
            .await
    }

    async fn list_purchases_by_session(&self, stripe_session_id: &str) -> Result<Vec<Purchase>> {
        let query = Query::new()
            .eq("stripe_session_id", stripe_session_id)
            .order("created_at");
        self.select(PURCHASES, query).await
    }
}

#[async_trait]
impl SubscriptionStore for PostgrestStore {
    async fn upsert_subscription(&self, subscription: &UserSubscription) -> Result<()> {
        match self
            .find_subscription_by_stripe_id(&subscription.stripe_subscription_id)
            .await?
        {
            Some(existing) => {
                let mut row = subscription.clone();
                row.id = existing.id;
                self.update(SUBSCRIPTIONS, row.id, &row).await
            }
            None => {
                self.upsert(SUBSCRIPTIONS, "stripe_subscription_id", subscription)
                    .await
            }
        }
    }

    async fn get_subscription(&self, id: Uuid) -> Result<Option<UserSubscription>> {
        self.select_by_id(SUBSCRIPTIONS, id).await
    }

    async fn find_subscription_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<UserSubscription>> {
        let rows: Vec<UserSubscription> = self
            .select(
                SUBSCRIPTIONS,
                Query::new()
                    .eq("stripe_subscription_id", stripe_subscription_id)
                    .limit(1),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_subscriptions_for_user(&self, user_id: Uuid) -> Result<Vec<UserSubscription>> {
        let query = Query::new()
            .eq("user_id", user_id)
            .order("current_period_start");
        self.select(SUBSCRIPTIONS, query).await
    }

    async fn update_subscription(&self, subscription: &UserSubscription) -> Result<()> {
        self.update(SUBSCRIPTIONS, subscription.id, subscription).await
    }
}

#[async_trait]
impl ProfileStore for PostgrestStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.select_by_id(PROFILES, id).await
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        self.insert(PROFILES, profile).await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.select(PROFILES, Query::new().order("created_at")).await
    }
}

#[async_trait]
impl CartStore for PostgrestStore {
    async fn get_cart(&self, user_id: Uuid) -> Result<Cart> {
        let rows: Vec<CartRow> = self
            .select(CARTS, Query::new().eq("user_id", user_id).limit(1))
            .await?;
        Ok(rows.into_iter().next().map(|r| r.items).unwrap_or_default())
    }

    async fn save_cart(&self, user_id: Uuid, cart: &Cart) -> Result<()> {
        let row = CartRow {
            user_id,
            items: cart.clone(),
            updated_at: Utc::now(),
        };
        self.upsert(CARTS, "user_id", &row).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PostgrestStore {
        PostgrestStore::new(SupabaseConfig::new("https://demo.supabase.co", "anon", "service"))
    }

    #[test]
    fn test_request_uses_service_role() {
        let id = Uuid::nil();
        let request = store()
            .request(reqwest::Method::GET, PURCHASES, &Query::new().eq("id", id))
            .build()
            .unwrap();

        assert_eq!(request.headers()["apikey"], "service");
        assert_eq!(request.headers()["authorization"], "Bearer service");
        assert_eq!(
            request.url().as_str(),
            format!("https://demo.supabase.co/rest/v1/purchases?id=eq.{id}")
        );
    }

    #[test]
    fn test_cart_row_shape() {
        let row = CartRow {
            user_id: Uuid::nil(),
            items: Cart::default(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["items"]["items"], serde_json::json!([]));
    }
}
