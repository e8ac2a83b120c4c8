//! In-memory repositories - used when no database is configured, and in tests.
//!
//! One [`InMemoryStore`] backs every repository port so that cross-table
//! rules (unique usernames and slugs, cascading deletes, comment counts)
//! hold exactly as they do in PostgreSQL. Data is lost on process restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{
    Category, Comment, CommentView, Location, Post, PostSummary, User,
};
use quill_core::error::RepoError;
use quill_core::pagination::{Page, PageRequest};
use quill_core::ports::{
    BaseRepository, CategoryRepository, CommentRepository, LocationRepository, PostFilter,
    PostRepository, UserRepository,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    categories: HashMap<Uuid, Category>,
    locations: HashMap<Uuid, Location>,
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
}

impl Tables {
    fn summarize(&self, post: &Post) -> Option<PostSummary> {
        let category = self.categories.get(&post.category_id)?.clone();
        Some(PostSummary {
            author_username: self
                .users
                .get(&post.author_id)
                .map(|u| u.username.clone())
                .unwrap_or_default(),
            category,
            location: post
                .location_id
                .and_then(|id| self.locations.get(&id))
                .cloned(),
            comment_count: self
                .comments
                .values()
                .filter(|c| c.post_id == post.id)
                .count() as u64,
            post: post.clone(),
        })
    }
}

/// A row type stored in one of the in-memory tables.
trait Stored: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn table(tables: &Tables) -> &HashMap<Uuid, Self>;
    fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self>;

    /// Unique and foreign key checks before a write.
    fn check(&self, _tables: &Tables) -> Result<(), RepoError> {
        Ok(())
    }

    /// Referential actions before the row with `id` is removed.
    fn on_delete(_id: Uuid, _tables: &mut Tables) -> Result<(), RepoError> {
        Ok(())
    }
}

impl Stored for User {
    fn id(&self) -> Uuid {
        self.id
    }
    fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
        &tables.users
    }
    fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
        &mut tables.users
    }

    fn check(&self, tables: &Tables) -> Result<(), RepoError> {
        if tables
            .users
            .values()
            .any(|u| u.username == self.username && u.id != self.id)
        {
            return Err(RepoError::Constraint(format!(
                "username '{}' already exists",
                self.username
            )));
        }
        Ok(())
    }

    fn on_delete(id: Uuid, tables: &mut Tables) -> Result<(), RepoError> {
        let post_ids: Vec<Uuid> = tables
            .posts
            .values()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        tables.posts.retain(|_, p| p.author_id != id);
        tables
            .comments
            .retain(|_, c| c.author_id != id && !post_ids.contains(&c.post_id));
        Ok(())
    }
}

impl Stored for Category {
    fn id(&self) -> Uuid {
        self.id
    }
    fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
        &tables.categories
    }
    fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
        &mut tables.categories
    }

    fn check(&self, tables: &Tables) -> Result<(), RepoError> {
        if tables
            .categories
            .values()
            .any(|c| c.slug == self.slug && c.id != self.id)
        {
            return Err(RepoError::Constraint(format!(
                "slug '{}' already exists",
                self.slug
            )));
        }
        Ok(())
    }

    fn on_delete(id: Uuid, tables: &mut Tables) -> Result<(), RepoError> {
        if tables.posts.values().any(|p| p.category_id == id) {
            return Err(RepoError::Constraint(
                "category is still referenced by posts".to_string(),
            ));
        }
        Ok(())
    }
}

impl Stored for Location {
    fn id(&self) -> Uuid {
        self.id
    }
    fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
        &tables.locations
    }
    fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
        &mut tables.locations
    }

    fn on_delete(id: Uuid, tables: &mut Tables) -> Result<(), RepoError> {
        for post in tables.posts.values_mut() {
            if post.location_id == Some(id) {
                post.location_id = None;
            }
        }
        Ok(())
    }
}

impl Stored for Post {
    fn id(&self) -> Uuid {
        self.id
    }
    fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
        &tables.posts
    }
    fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
        &mut tables.posts
    }

    fn check(&self, tables: &Tables) -> Result<(), RepoError> {
        if !tables.users.contains_key(&self.author_id) {
            return Err(RepoError::Constraint("author does not exist".to_string()));
        }
        if !tables.categories.contains_key(&self.category_id) {
            return Err(RepoError::Constraint("category does not exist".to_string()));
        }
        if let Some(location_id) = self.location_id {
            if !tables.locations.contains_key(&location_id) {
                return Err(RepoError::Constraint("location does not exist".to_string()));
            }
        }
        Ok(())
    }

    fn on_delete(id: Uuid, tables: &mut Tables) -> Result<(), RepoError> {
        tables.comments.retain(|_, c| c.post_id != id);
        Ok(())
    }
}

impl Stored for Comment {
    fn id(&self) -> Uuid {
        self.id
    }
    fn table(tables: &Tables) -> &HashMap<Uuid, Self> {
        &tables.comments
    }
    fn table_mut(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
        &mut tables.comments
    }

    fn check(&self, tables: &Tables) -> Result<(), RepoError> {
        if !tables.users.contains_key(&self.author_id) {
            return Err(RepoError::Constraint("author does not exist".to_string()));
        }
        if !tables.posts.contains_key(&self.post_id) {
            return Err(RepoError::Constraint("post does not exist".to_string()));
        }
        Ok(())
    }
}

/// In-memory backing store for every repository port.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<T: Stored> BaseRepository<T, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, RepoError> {
        let tables = self.tables.read().await;
        Ok(T::table(&tables).get(&id).cloned())
    }

    async fn create(&self, entity: T) -> Result<T, RepoError> {
        let mut tables = self.tables.write().await;
        if T::table(&tables).contains_key(&entity.id()) {
            return Err(RepoError::Constraint("Entity already exists".to_string()));
        }
        entity.check(&tables)?;
        T::table_mut(&mut tables).insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn update(&self, entity: T) -> Result<T, RepoError> {
        let mut tables = self.tables.write().await;
        if !T::table(&tables).contains_key(&entity.id()) {
            return Err(RepoError::NotFound);
        }
        entity.check(&tables)?;
        T::table_mut(&mut tables).insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if !T::table(&tables).contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        T::on_delete(id, &mut tables)?;
        T::table_mut(&mut tables).remove(&id);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }
}

#[async_trait]
impl CategoryRepository for InMemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Category>, RepoError> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }
}

#[async_trait]
impl LocationRepository for InMemoryStore {
    async fn list_all(&self) -> Result<Vec<Location>, RepoError> {
        let tables = self.tables.read().await;
        let mut locations: Vec<Location> = tables.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }
}

#[async_trait]
impl PostRepository for InMemoryStore {
    async fn list(
        &self,
        filter: PostFilter,
        page: PageRequest,
    ) -> Result<Page<PostSummary>, RepoError> {
        let tables = self.tables.read().await;

        let mut matching: Vec<&Post> = tables
            .posts
            .values()
            .filter(|p| filter.category_id.is_none_or(|id| p.category_id == id))
            .filter(|p| filter.author_id.is_none_or(|id| p.author_id == id))
            .filter(|p| {
                tables
                    .categories
                    .get(&p.category_id)
                    .is_some_and(|c| filter.visibility.admits(p, c))
            })
            .collect();
        matching.sort_by(|a, b| {
            b.pub_date
                .cmp(&a.pub_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.per_page as usize)
            .filter_map(|p| tables.summarize(p))
            .collect();

        Ok(Page::new(items, page, total))
    }

    async fn find_summary(&self, id: Uuid) -> Result<Option<PostSummary>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.get(&id).and_then(|p| tables.summarize(p)))
    }
}

#[async_trait]
impl CommentRepository for InMemoryStore {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentView>, RepoError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<&Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .collect();
        comments.sort_by_key(|c| c.created_at);

        Ok(comments
            .into_iter()
            .map(|c| CommentView {
                author_username: tables
                    .users
                    .get(&c.author_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
                comment: c.clone(),
            })
            .collect())
    }

    async fn find_in_post(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<Option<Comment>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .get(&comment_id)
            .filter(|c| c.post_id == post_id)
            .cloned())
    }
}
