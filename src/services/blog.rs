use crate::{
    entities::{blog_post, BlogPost},
    errors::ServiceError,
    slug::{generate_slug, slug_candidate},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// How many `-2`, `-3`, ... suffixes to try before giving up on a slug.
const MAX_SLUG_ATTEMPTS: u32 = 100;

/// Blog service. The storefront addresses posts by slug and never sees
/// drafts; the admin surface sees everything and owns slug allocation.
#[derive(Clone)]
pub struct BlogService {
    db: Arc<DatabaseConnection>,
}

impl BlogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_published(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<blog_post::Model>, u64), ServiceError> {
        let page = page.max(1);
        let paginator = BlogPost::find()
            .filter(blog_post::Column::Published.eq(true))
            .order_by_desc(blog_post::Column::CreatedAt)
            .paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let posts = paginator.fetch_page(page - 1).await?;
        Ok((posts, total))
    }

    /// Published post by slug. Drafts are invisible here, so a draft
    /// slug 404s just like a missing one.
    #[instrument(skip(self))]
    pub async fn get_by_slug(&self, slug: &str) -> Result<blog_post::Model, ServiceError> {
        BlogPost::find()
            .filter(blog_post::Column::Slug.eq(slug))
            .filter(blog_post::Column::Published.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Post {} not found", slug)))
    }

    #[instrument(skip(self))]
    pub async fn admin_list(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<blog_post::Model>, u64), ServiceError> {
        let page = page.max(1);
        let paginator = BlogPost::find()
            .order_by_desc(blog_post::Column::CreatedAt)
            .paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let posts = paginator.fetch_page(page - 1).await?;
        Ok((posts, total))
    }

    #[instrument(skip(self))]
    pub async fn admin_get(&self, post_id: Uuid) -> Result<blog_post::Model, ServiceError> {
        BlogPost::find_by_id(post_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Post {} not found", post_id)))
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_post(&self, input: CreatePostInput) -> Result<blog_post::Model, ServiceError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }

        let slug = self.unique_slug(&generate_slug(&title), None).await?;
        let now = Utc::now();
        let model = blog_post::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title),
            slug: Set(slug),
            body: Set(input.body),
            published: Set(input.published.unwrap_or(false)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let post = model.insert(&*self.db).await?;
        info!("Created post {} ({})", post.slug, post.id);
        Ok(post)
    }

    /// Partial update. Slug handling:
    /// - an explicit `slug` in the input wins, normalized and made
    ///   unique
    /// - otherwise a changed title regenerates the slug
    /// - otherwise the slug stays put
    #[instrument(skip(self, input))]
    pub async fn update_post(
        &self,
        post_id: Uuid,
        input: UpdatePostInput,
    ) -> Result<blog_post::Model, ServiceError> {
        let existing = BlogPost::find_by_id(post_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Post {} not found", post_id)))?;

        let new_title = match &input.title {
            Some(raw) => {
                let title = raw.trim().to_string();
                if title.is_empty() {
                    return Err(ServiceError::ValidationError(
                        "Title cannot be empty".to_string(),
                    ));
                }
                Some(title)
            }
            None => None,
        };

        let new_slug = if let Some(explicit) = &input.slug {
            Some(
                self.unique_slug(&generate_slug(explicit), Some(post_id))
                    .await?,
            )
        } else if let Some(title) = &new_title {
            if *title != existing.title {
                Some(self.unique_slug(&generate_slug(title), Some(post_id)).await?)
            } else {
                None
            }
        } else {
            None
        };

        let mut active: blog_post::ActiveModel = existing.into();
        if let Some(title) = new_title {
            active.title = Set(title);
        }
        if let Some(slug) = new_slug {
            active.slug = Set(slug);
        }
        if let Some(body) = input.body {
            active.body = Set(body);
        }
        if let Some(published) = input.published {
            active.published = Set(published);
        }
        active.updated_at = Set(Utc::now());

        let post = active.update(&*self.db).await?;
        Ok(post)
    }

    #[instrument(skip(self))]
    pub async fn delete_post(&self, post_id: Uuid) -> Result<(), ServiceError> {
        let result = BlogPost::delete_by_id(post_id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Post {} not found",
                post_id
            )));
        }
        info!("Deleted post {}", post_id);
        Ok(())
    }

    /// Walks `base`, `base-2`, `base-3`, ... until a free slug turns
    /// up. `exclude_id` lets a post keep its own slug on update.
    async fn unique_slug(
        &self,
        base: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<String, ServiceError> {
        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let candidate = slug_candidate(base, attempt);
            let mut query = BlogPost::find().filter(blog_post::Column::Slug.eq(candidate.clone()));
            if let Some(id) = exclude_id {
                query = query.filter(blog_post::Column::Id.ne(id));
            }
            if query.one(&*self.db).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(ServiceError::Conflict(format!(
            "Could not allocate a unique slug for {}",
            base
        )))
    }
}

/// Input for creating a post
#[derive(Debug, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub body: String,
    pub published: Option<bool>,
}

/// Input for updating a post
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub body: Option<String>,
    pub published: Option<bool>,
}
