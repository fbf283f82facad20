//! Course Pipeline
//!
//! A course is a product row, a course row, and its sections and lessons. The
//! data store offers no transaction across these tables, so creation and
//! deletion run as ordered steps with compensation: when a step fails, the
//! steps already applied are undone in reverse order.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ShopError};
use crate::model::{Course, CourseTree, Lesson, Product, ProductKind, Section, SectionTree};
use crate::store::CatalogStore;

/// Input for creating a course
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sections: Vec<NewSection>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewSection {
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<NewLesson>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewLesson {
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl NewCourse {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ShopError::Validation("title is required".into()));
        }
        if self.price < Decimal::ZERO {
            return Err(ShopError::Validation("price must not be negative".into()));
        }
        if self.sections.iter().any(|s| s.title.trim().is_empty()) {
            return Err(ShopError::Validation("section title is required".into()));
        }
        let untitled_lesson = self
            .sections
            .iter()
            .flat_map(|s| s.lessons.iter())
            .any(|l| l.title.trim().is_empty());
        if untitled_lesson {
            return Err(ShopError::Validation("lesson title is required".into()));
        }
        Ok(())
    }
}

/// Load a course with its product and ordered content
pub async fn load_course_tree<S>(store: &S, course_id: Uuid) -> Result<CourseTree>
where
    S: CatalogStore + ?Sized,
{
    let course = store
        .get_course(course_id)
        .await?
        .ok_or_else(|| ShopError::NotFound(format!("Course {course_id}")))?;
    let product = store
        .get_product(course.product_id)
        .await?
        .ok_or_else(|| ShopError::NotFound(format!("Product {}", course.product_id)))?;

    let mut sections = Vec::new();
    for section in store.list_sections(course.id).await? {
        let lessons = store.list_lessons(section.id).await?;
        sections.push(SectionTree { section, lessons });
    }

    Ok(CourseTree { product, course, sections })
}

enum Inserted {
    Product(Uuid),
    Course(Uuid),
    Section(Uuid),
    Lesson(Uuid),
}

async fn undo_inserts<S>(store: &S, applied: Vec<Inserted>)
where
    S: CatalogStore + ?Sized,
{
    for step in applied.into_iter().rev() {
        let result = match step {
            Inserted::Lesson(id) => store.delete_lesson(id).await,
            Inserted::Section(id) => store.delete_section(id).await,
            Inserted::Course(id) => store.delete_course(id).await,
            Inserted::Product(id) => store.delete_product(id).await,
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Course rollback step failed");
        }
    }
}

/// Create product, course, sections and lessons. On failure nothing is left
/// behind (best effort: rollback errors are logged).
pub async fn create_course<S>(store: &S, input: NewCourse) -> Result<CourseTree>
where
    S: CatalogStore + ?Sized,
{
    input.validate()?;

    let mut product = Product::new(input.title.clone(), input.price);
    product.description = input.description.clone();
    product.image_url = input.image_url.clone();
    product.kind = ProductKind::Course;

    let course = Course {
        id: Uuid::new_v4(),
        product_id: product.id,
        title: input.title.clone(),
        description: input.description.clone(),
        created_at: Utc::now(),
    };

    let mut tree = CourseTree {
        product,
        course,
        sections: Vec::new(),
    };
    let mut applied = Vec::new();

    match insert_tree(store, &input, &mut tree, &mut applied).await {
        Ok(()) => {
            tracing::info!(
                course_id = %tree.course.id,
                product_id = %tree.product.id,
                lessons = tree.lesson_count(),
                "Created course"
            );
            Ok(tree)
        }
        Err(e) => {
            tracing::warn!(error = %e, steps = applied.len(), "Course creation failed, rolling back");
            undo_inserts(store, applied).await;
            Err(e)
        }
    }
}

async fn insert_tree<S>(
    store: &S,
    input: &NewCourse,
    tree: &mut CourseTree,
    applied: &mut Vec<Inserted>,
) -> Result<()>
where
    S: CatalogStore + ?Sized,
{
    store.insert_product(&tree.product).await?;
    applied.push(Inserted::Product(tree.product.id));

    store.insert_course(&tree.course).await?;
    applied.push(Inserted::Course(tree.course.id));

    for (position, new_section) in (0_i32..).zip(&input.sections) {
        let section = Section {
            id: Uuid::new_v4(),
            course_id: tree.course.id,
            title: new_section.title.clone(),
            position,
        };
        store.insert_section(&section).await?;
        applied.push(Inserted::Section(section.id));

        let mut lessons = Vec::new();
        for (position, new_lesson) in (0_i32..).zip(&new_section.lessons) {
            let lesson = Lesson {
                id: Uuid::new_v4(),
                section_id: section.id,
                title: new_lesson.title.clone(),
                content: new_lesson.content.clone(),
                video_url: new_lesson.video_url.clone(),
                position,
            };
            store.insert_lesson(&lesson).await?;
            applied.push(Inserted::Lesson(lesson.id));
            lessons.push(lesson);
        }

        tree.sections.push(SectionTree { section, lessons });
    }

    Ok(())
}

enum Deleted {
    Lesson(Lesson),
    Section(Section),
    Course(Course),
    Product(Product),
}

async fn restore_deletes<S>(store: &S, applied: Vec<Deleted>)
where
    S: CatalogStore + ?Sized,
{
    for step in applied.into_iter().rev() {
        let result = match &step {
            Deleted::Product(p) => store.insert_product(p).await,
            Deleted::Course(c) => store.insert_course(c).await,
            Deleted::Section(s) => store.insert_section(s).await,
            Deleted::Lesson(l) => store.insert_lesson(l).await,
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Course restore step failed");
        }
    }
}

/// Delete lessons, then sections, then the course, then its product. If a
/// step fails, rows already deleted are re-inserted.
pub async fn delete_course<S>(store: &S, course_id: Uuid) -> Result<()>
where
    S: CatalogStore + ?Sized,
{
    let tree = load_course_tree(store, course_id).await?;
    let mut applied = Vec::new();

    match delete_tree(store, &tree, &mut applied).await {
        Ok(()) => {
            tracing::info!(course_id = %course_id, "Deleted course");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, steps = applied.len(), "Course deletion failed, restoring");
            restore_deletes(store, applied).await;
            Err(e)
        }
    }
}

async fn delete_tree<S>(store: &S, tree: &CourseTree, applied: &mut Vec<Deleted>) -> Result<()>
where
    S: CatalogStore + ?Sized,
{
    for section in &tree.sections {
        for lesson in &section.lessons {
            store.delete_lesson(lesson.id).await?;
            applied.push(Deleted::Lesson(lesson.clone()));
        }
    }
    for section in &tree.sections {
        store.delete_section(section.section.id).await?;
        applied.push(Deleted::Section(section.section.clone()));
    }
    store.delete_course(tree.course.id).await?;
    applied.push(Deleted::Course(tree.course.clone()));

    store.delete_product(tree.product.id).await?;
    applied.push(Deleted::Product(tree.product.clone()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    fn sample() -> NewCourse {
        NewCourse {
            title: "Rust for Coaches".into(),
            description: None,
            price: dec!(49),
            image_url: None,
            sections: vec![
                NewSection {
                    title: "Basics".into(),
                    lessons: vec![
                        NewLesson { title: "Hello".into(), content: None, video_url: None },
                        NewLesson { title: "Ownership".into(), content: None, video_url: None },
                    ],
                },
                NewSection {
                    title: "Async".into(),
                    lessons: vec![NewLesson { title: "Futures".into(), content: None, video_url: None }],
                },
            ],
        }
    }

    /// Wraps a store and fails one named operation
    struct Faulty {
        inner: MemoryStore,
        fail_on: &'static str,
    }

    impl Faulty {
        fn check(&self, op: &str) -> Result<()> {
            if self.fail_on == op {
                Err(ShopError::Storage(format!("injected failure in {op}")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CatalogStore for Faulty {
        async fn list_products(&self) -> Result<Vec<Product>> { self.inner.list_products().await }
        async fn get_product(&self, id: Uuid) -> Result<Option<Product>> { self.inner.get_product(id).await }
        async fn insert_product(&self, p: &Product) -> Result<()> { self.check("insert_product")?; self.inner.insert_product(p).await }
        async fn update_product(&self, p: &Product) -> Result<()> { self.inner.update_product(p).await }
        async fn delete_product(&self, id: Uuid) -> Result<()> { self.check("delete_product")?; self.inner.delete_product(id).await }
        async fn list_courses(&self) -> Result<Vec<Course>> { self.inner.list_courses().await }
        async fn get_course(&self, id: Uuid) -> Result<Option<Course>> { self.inner.get_course(id).await }
        async fn insert_course(&self, c: &Course) -> Result<()> { self.check("insert_course")?; self.inner.insert_course(c).await }
        async fn update_course(&self, c: &Course) -> Result<()> { self.inner.update_course(c).await }
        async fn delete_course(&self, id: Uuid) -> Result<()> { self.check("delete_course")?; self.inner.delete_course(id).await }
        async fn get_section(&self, id: Uuid) -> Result<Option<Section>> { self.inner.get_section(id).await }
        async fn list_sections(&self, id: Uuid) -> Result<Vec<Section>> { self.inner.list_sections(id).await }
        async fn insert_section(&self, s: &Section) -> Result<()> { self.inner.insert_section(s).await }
        async fn update_section(&self, s: &Section) -> Result<()> { self.inner.update_section(s).await }
        async fn delete_section(&self, id: Uuid) -> Result<()> { self.inner.delete_section(id).await }
        async fn get_lesson(&self, id: Uuid) -> Result<Option<Lesson>> { self.inner.get_lesson(id).await }
        async fn list_lessons(&self, id: Uuid) -> Result<Vec<Lesson>> { self.inner.list_lessons(id).await }
        async fn insert_lesson(&self, l: &Lesson) -> Result<()> { self.check("insert_lesson")?; self.inner.insert_lesson(l).await }
        async fn update_lesson(&self, l: &Lesson) -> Result<()> { self.inner.update_lesson(l).await }
        async fn delete_lesson(&self, id: Uuid) -> Result<()> { self.inner.delete_lesson(id).await }
    }

    #[tokio::test]
    async fn test_create_and_load_course() {
        let store = MemoryStore::new();
        let tree = create_course(&store, sample()).await.unwrap();
        assert_eq!(tree.lesson_count(), 3);
        assert_eq!(tree.product.kind, ProductKind::Course);

        let loaded = load_course_tree(&store, tree.course.id).await.unwrap();
        assert_eq!(loaded.sections.len(), 2);
        assert_eq!(loaded.sections[0].section.title, "Basics");
        assert_eq!(loaded.sections[0].lessons[1].title, "Ownership");
    }

    #[tokio::test]
    async fn test_failed_create_leaves_nothing() {
        let store = Faulty { inner: MemoryStore::new(), fail_on: "insert_lesson" };
        let result = create_course(&store, sample()).await;
        assert!(result.is_err());

        assert!(store.list_products().await.unwrap().is_empty());
        assert!(store.list_courses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_course_removes_tree() {
        let store = MemoryStore::new();
        let tree = create_course(&store, sample()).await.unwrap();
        delete_course(&store, tree.course.id).await.unwrap();

        assert!(store.get_product(tree.product.id).await.unwrap().is_none());
        assert!(store.list_sections(tree.course.id).await.unwrap().is_empty());
        let first_section = tree.sections[0].section.id;
        assert!(store.list_lessons(first_section).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_restores_rows() {
        let store = Faulty { inner: MemoryStore::new(), fail_on: "delete_product" };
        let tree = create_course(&store, sample()).await.unwrap();

        assert!(delete_course(&store, tree.course.id).await.is_err());

        let restored = load_course_tree(&store, tree.course.id).await.unwrap();
        assert_eq!(restored.lesson_count(), 3);
        assert_eq!(restored.sections.len(), 2);
    }

    #[test]
    fn test_validation() {
        let mut input = sample();
        input.price = dec!(-1);
        assert!(matches!(input.validate(), Err(ShopError::Validation(_))));
    }
}
