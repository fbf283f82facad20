use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a product grants once purchased
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    #[default]
    Digital,
    Course,
}

/// A purchasable catalog item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Price in USD
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub kind: ProductKind,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Product {
    pub fn new(title: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            price,
            image_url: None,
            kind: ProductKind::Digital,
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// Course content attached to a `Product` of kind `Course`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub position: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub section_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub position: i32,
}

/// A section with its lessons, ordered by position
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionTree {
    #[serde(flatten)]
    pub section: Section,
    pub lessons: Vec<Lesson>,
}

/// A course with its product row and full content tree
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourseTree {
    pub product: Product,
    pub course: Course,
    pub sections: Vec<SectionTree>,
}

impl CourseTree {
    /// Number of lessons across all sections
    pub fn lesson_count(&self) -> usize {
        self.sections.iter().map(|s| s.lessons.len()).sum()
    }
}
