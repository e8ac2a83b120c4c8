//! PostgreSQL repository implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select,
};
use uuid::Uuid;

use quill_core::domain::{
    Category, Comment, CommentView, Location, PostSummary, User,
};
use quill_core::error::RepoError;
use quill_core::pagination::{Page, PageRequest};
use quill_core::policy::Visibility;
use quill_core::ports::{
    CategoryRepository, CommentRepository, LocationRepository, PostFilter, PostRepository,
    UserRepository,
};

use super::entity::category::{self, Entity as CategoryEntity};
use super::entity::comment::{self, Entity as CommentEntity};
use super::entity::location::{self, Entity as LocationEntity};
use super::entity::post::{self, Entity as PostEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresBaseRepository, repo_err};

/// PostgreSQL user repository.
pub type PostgresUserRepository = PostgresBaseRepository<UserEntity>;

/// PostgreSQL category repository.
pub type PostgresCategoryRepository = PostgresBaseRepository<CategoryEntity>;

/// PostgreSQL location repository.
pub type PostgresLocationRepository = PostgresBaseRepository<LocationEntity>;

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

/// PostgreSQL comment repository.
pub type PostgresCommentRepository = PostgresBaseRepository<CommentEntity>;

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        tracing::debug!(username, "Finding user by username");

        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(repo_err)?;

        Ok(result.map(Into::into))
    }
}

#[async_trait]
impl CategoryRepository for PostgresCategoryRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let result = CategoryEntity::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&self.db)
            .await
            .map_err(repo_err)?;

        Ok(result.map(Into::into))
    }

    async fn list_all(&self) -> Result<Vec<Category>, RepoError> {
        let result = CategoryEntity::find()
            .order_by_asc(category::Column::Title)
            .all(&self.db)
            .await
            .map_err(repo_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl LocationRepository for PostgresLocationRepository {
    async fn list_all(&self) -> Result<Vec<Location>, RepoError> {
        let result = LocationEntity::find()
            .order_by_asc(location::Column::Name)
            .all(&self.db)
            .await
            .map_err(repo_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }
}

/// `SELECT posts.* FROM posts JOIN categories` narrowed by `filter`.
pub(crate) fn select_posts(filter: PostFilter) -> Select<PostEntity> {
    let mut query = PostEntity::find().inner_join(CategoryEntity);

    if let Visibility::Public { now } = filter.visibility {
        query = query
            .filter(post::Column::IsPublished.eq(true))
            .filter(category::Column::IsPublished.eq(true))
            .filter(post::Column::PubDate.lte(now));
    }
    if let Some(category_id) = filter.category_id {
        query = query.filter(post::Column::CategoryId.eq(category_id));
    }
    if let Some(author_id) = filter.author_id {
        query = query.filter(post::Column::AuthorId.eq(author_id));
    }

    query
        .order_by_desc(post::Column::PubDate)
        .order_by_desc(post::Column::CreatedAt)
}

/// `comment_count` per post, from a grouped `COUNT`.
#[derive(Debug, FromQueryResult)]
pub(crate) struct CommentCount {
    pub post_id: Uuid,
    pub comment_count: i64,
}

impl PostgresPostRepository {
    /// Resolve authors, categories, locations and comment counts in one
    /// query per table.
    async fn summarize(&self, models: Vec<post::Model>) -> Result<Vec<PostSummary>, RepoError> {
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let author_ids: Vec<Uuid> = models.iter().map(|m| m.author_id).collect();
        let category_ids: Vec<Uuid> = models.iter().map(|m| m.category_id).collect();
        let location_ids: Vec<Uuid> = models.iter().filter_map(|m| m.location_id).collect();

        let authors: HashMap<Uuid, String> = UserEntity::find()
            .filter(user::Column::Id.is_in(author_ids))
            .all(&self.db)
            .await
            .map_err(repo_err)?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let categories: HashMap<Uuid, Category> = CategoryEntity::find()
            .filter(category::Column::Id.is_in(category_ids))
            .all(&self.db)
            .await
            .map_err(repo_err)?
            .into_iter()
            .map(|c| (c.id, c.into()))
            .collect();

        let locations: HashMap<Uuid, Location> = if location_ids.is_empty() {
            HashMap::new()
        } else {
            LocationEntity::find()
                .filter(location::Column::Id.is_in(location_ids))
                .all(&self.db)
                .await
                .map_err(repo_err)?
                .into_iter()
                .map(|l| (l.id, l.into()))
                .collect()
        };

        let counts: HashMap<Uuid, i64> = CommentEntity::find()
            .select_only()
            .column(comment::Column::PostId)
            .column_as(comment::Column::Id.count(), "comment_count")
            .filter(comment::Column::PostId.is_in(post_ids))
            .group_by(comment::Column::PostId)
            .into_model::<CommentCount>()
            .all(&self.db)
            .await
            .map_err(repo_err)?
            .into_iter()
            .map(|row| (row.post_id, row.comment_count))
            .collect();

        Ok(models
            .into_iter()
            .filter_map(|model| {
                let category = categories.get(&model.category_id)?.clone();
                let location = model
                    .location_id
                    .and_then(|id| locations.get(&id))
                    .cloned();
                Some(PostSummary {
                    author_username: authors.get(&model.author_id).cloned().unwrap_or_default(),
                    comment_count: counts.get(&model.id).copied().unwrap_or(0) as u64,
                    category,
                    location,
                    post: model.into(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn list(
        &self,
        filter: PostFilter,
        page: PageRequest,
    ) -> Result<Page<PostSummary>, RepoError> {
        tracing::debug!(?filter, page = page.page, "Listing posts");

        let paginator = select_posts(filter).paginate(&self.db, page.per_page);
        let total = paginator.num_items().await.map_err(repo_err)?;
        let models = paginator
            .fetch_page(page.page - 1)
            .await
            .map_err(repo_err)?;

        let items = self.summarize(models).await?;
        Ok(Page::new(items, page, total))
    }

    async fn find_summary(&self, id: Uuid) -> Result<Option<PostSummary>, RepoError> {
        let Some(model) = PostEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(repo_err)?
        else {
            return Ok(None);
        };

        Ok(self.summarize(vec![model]).await?.pop())
    }
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentView>, RepoError> {
        let rows = CommentEntity::find()
            .find_also_related(UserEntity)
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(repo_err)?;

        Ok(rows
            .into_iter()
            .map(|(comment, author)| CommentView {
                author_username: author.map(|u| u.username).unwrap_or_default(),
                comment: comment.into(),
            })
            .collect())
    }

    async fn find_in_post(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<Option<Comment>, RepoError> {
        let result = CommentEntity::find_by_id(comment_id)
            .filter(comment::Column::PostId.eq(post_id))
            .one(&self.db)
            .await
            .map_err(repo_err)?;

        Ok(result.map(Into::into))
    }
}
