//! Admin endpoints
//!
//! Every handler takes [`RequireAdmin`]; nothing here re-checks the role.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use storefront_core::booking::{schedule_session, update_session, ScheduleRequest, SessionUpdate};
use storefront_core::catalog::{create_course, delete_course, load_course_tree, NewCourse};
use storefront_core::model::{
    CoachingPlan, CoachingService, CoachingSession, Course, CourseTree, Lesson, Profile, Section,
};
use storefront_core::ShopError;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::RequireAdmin;
use crate::state::AppState;

fn require_name(value: &str, field: &str) -> Result<(), ShopError> {
    if value.trim().is_empty() {
        return Err(ShopError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_price(price: Decimal) -> Result<(), ShopError> {
    if price.is_sign_negative() {
        return Err(ShopError::Validation("price cannot be negative".into()));
    }
    Ok(())
}

// ============================================================================
// Coaching services & plans
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServiceInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_minutes: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlanInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub sessions_per_month: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ServiceInput {
    fn into_service(self, id: Uuid) -> Result<CoachingService, ShopError> {
        require_name(&self.name, "name")?;
        require_price(self.price)?;
        if self.duration_minutes == 0 {
            return Err(ShopError::Validation("duration must be positive".into()));
        }
        Ok(CoachingService {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            price: self.price,
            duration_minutes: self.duration_minutes,
            active: self.active,
        })
    }
}

impl PlanInput {
    fn into_plan(self, id: Uuid) -> Result<CoachingPlan, ShopError> {
        require_name(&self.name, "name")?;
        require_price(self.price)?;
        Ok(CoachingPlan {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            price: self.price,
            sessions_per_month: self.sessions_per_month,
            active: self.active,
        })
    }
}

pub async fn list_services(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> ApiResult<Json<Vec<CoachingService>>> {
    Ok(Json(state.store.list_services().await?))
}

pub async fn create_service(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(input): Json<ServiceInput>,
) -> ApiResult<(StatusCode, Json<CoachingService>)> {
    let service = input.into_service(Uuid::new_v4())?;
    state.store.insert_service(&service).await?;
    tracing::info!(service_id = %service.id, "Created coaching service");
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn update_service(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(input): Json<ServiceInput>,
) -> ApiResult<Json<CoachingService>> {
    let service = input.into_service(id)?;
    state.store.update_service(&service).await?;
    Ok(Json(service))
}

pub async fn delete_service(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete_service(id).await?;
    tracing::info!(service_id = %id, "Deleted coaching service");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_plans(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> ApiResult<Json<Vec<CoachingPlan>>> {
    Ok(Json(state.store.list_plans().await?))
}

pub async fn create_plan(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(input): Json<PlanInput>,
) -> ApiResult<(StatusCode, Json<CoachingPlan>)> {
    let plan = input.into_plan(Uuid::new_v4())?;
    state.store.insert_plan(&plan).await?;
    tracing::info!(plan_id = %plan.id, "Created coaching plan");
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update_plan(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(input): Json<PlanInput>,
) -> ApiResult<Json<CoachingPlan>> {
    let plan = input.into_plan(id)?;
    state.store.update_plan(&plan).await?;
    Ok(Json(plan))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete_plan(id).await?;
    tracing::info!(plan_id = %id, "Deleted coaching plan");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Courses, sections, lessons
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CourseUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SectionInput {
    #[serde(default)]
    pub course_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Deserialize)]
pub struct LessonInput {
    #[serde(default)]
    pub section_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub position: i32,
}

pub async fn list_courses(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> ApiResult<Json<Vec<Course>>> {
    Ok(Json(state.store.list_courses().await?))
}

/// Create the product, course and content in one go
pub async fn create_course_handler(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(input): Json<NewCourse>,
) -> ApiResult<(StatusCode, Json<CourseTree>)> {
    let tree = create_course(state.store.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(tree)))
}

/// Update course and product fields together
pub async fn update_course(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(update): Json<CourseUpdate>,
) -> ApiResult<Json<CourseTree>> {
    let tree = load_course_tree(state.store.as_ref(), id).await?;
    let mut course = tree.course;
    let mut product = tree.product;

    if let Some(title) = update.title {
        require_name(&title, "title")?;
        course.title = title.trim().to_string();
        product.title = course.title.clone();
    }
    if update.description.is_some() {
        course.description = update.description.clone();
        product.description = update.description;
    }
    if let Some(price) = update.price {
        require_price(price)?;
        product.price = price;
    }
    if update.image_url.is_some() {
        product.image_url = update.image_url;
    }
    if let Some(active) = update.active {
        product.active = active;
    }

    state.store.update_product(&product).await?;
    state.store.update_course(&course).await?;
    Ok(Json(load_course_tree(state.store.as_ref(), id).await?))
}

pub async fn delete_course_handler(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    delete_course(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_section(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(input): Json<SectionInput>,
) -> ApiResult<(StatusCode, Json<Section>)> {
    require_name(&input.title, "title")?;
    let course_id = input
        .course_id
        .ok_or_else(|| ShopError::Validation("course_id is required".into()))?;
    if state.store.get_course(course_id).await?.is_none() {
        return Err(ShopError::NotFound(format!("Course {course_id}")).into());
    }

    let section = Section {
        id: Uuid::new_v4(),
        course_id,
        title: input.title.trim().to_string(),
        position: input.position,
    };
    state.store.insert_section(&section).await?;
    Ok((StatusCode::CREATED, Json(section)))
}

pub async fn update_section(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(input): Json<SectionInput>,
) -> ApiResult<Json<Section>> {
    require_name(&input.title, "title")?;
    let mut section = state
        .store
        .get_section(id)
        .await?
        .ok_or_else(|| ShopError::NotFound(format!("Section {id}")))?;
    section.title = input.title.trim().to_string();
    section.position = input.position;
    state.store.update_section(&section).await?;
    Ok(Json(section))
}

/// Delete a section and its lessons
pub async fn delete_section(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    for lesson in state.store.list_lessons(id).await? {
        state.store.delete_lesson(lesson.id).await?;
    }
    state.store.delete_section(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_lesson(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(input): Json<LessonInput>,
) -> ApiResult<(StatusCode, Json<Lesson>)> {
    require_name(&input.title, "title")?;
    let section_id = input
        .section_id
        .ok_or_else(|| ShopError::Validation("section_id is required".into()))?;
    if state.store.get_section(section_id).await?.is_none() {
        return Err(ShopError::NotFound(format!("Section {section_id}")).into());
    }

    let lesson = Lesson {
        id: Uuid::new_v4(),
        section_id,
        title: input.title.trim().to_string(),
        content: input.content,
        video_url: input.video_url,
        position: input.position,
    };
    state.store.insert_lesson(&lesson).await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

pub async fn update_lesson(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(input): Json<LessonInput>,
) -> ApiResult<Json<Lesson>> {
    require_name(&input.title, "title")?;
    let mut lesson = state
        .store
        .get_lesson(id)
        .await?
        .ok_or_else(|| ShopError::NotFound(format!("Lesson {id}")))?;
    lesson.title = input.title.trim().to_string();
    lesson.content = input.content;
    lesson.video_url = input.video_url;
    lesson.position = input.position;
    state.store.update_lesson(&lesson).await?;
    Ok(Json(lesson))
}

pub async fn delete_lesson(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete_lesson(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Sessions & users
// ============================================================================

pub async fn list_sessions(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> ApiResult<Json<Vec<CoachingSession>>> {
    Ok(Json(state.store.list_sessions().await?))
}

/// Schedule a session for a user, optionally drawing on their subscription
pub async fn create_session(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<ScheduleRequest>,
) -> ApiResult<(StatusCode, Json<CoachingSession>)> {
    let session = schedule_session(state.store.as_ref(), request).await?;
    tracing::info!(admin_id = %admin.id, session_id = %session.id, "Admin scheduled session");
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn update_session_handler(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(update): Json<SessionUpdate>,
) -> ApiResult<Json<CoachingSession>> {
    Ok(Json(update_session(state.store.as_ref(), id, update).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> ApiResult<Json<Vec<Profile>>> {
    Ok(Json(state.store.list_profiles().await?))
}
