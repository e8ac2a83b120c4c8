use std::sync::Arc;

use actix_web::{App, http::StatusCode, http::header, test, web};
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use quill_core::domain::{Category, Comment, Location, Post, User};
use quill_core::ports::{Clock, FixedClock};
use quill_infra::{Argon2PasswordService, JwtConfig, JwtTokenService};
use quill_shared::dto::{
    AuthResponse, CategoryPageResponse, PageResponse, PostDetailResponse, PostResponse,
    ProfileResponse,
};

use super::configure_app;
use crate::observability::RequestIdMiddleware;
use crate::state::AppState;

struct Fixture {
    state: AppState,
    clock: Arc<FixedClock>,
}

macro_rules! app {
    ($fixture:expr) => {
        test::init_service(
            App::new()
                .wrap(RequestIdMiddleware)
                .app_data(web::Data::new($fixture.state.clone()))
                .configure(configure_app),
        )
        .await
    };
}

impl Fixture {
    fn new(posts_per_page: u64) -> Self {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let tokens = Arc::new(JwtTokenService::new(JwtConfig {
            secret: "handler-test-secret".to_string(),
            expiration_hours: 1,
            issuer: "quill-test".to_string(),
        }));
        let passwords = Arc::new(Argon2PasswordService::with_cost(1024, 1, 1).unwrap());
        let state = AppState::in_memory(tokens, passwords, clock.clone(), posts_per_page);
        Self { state, clock }
    }

    async fn user(&self, username: &str) -> (User, String) {
        self.user_with(username, false).await
    }

    async fn user_with(&self, username: &str, staff: bool) -> (User, String) {
        let hash = self.state.passwords.hash("correct horse").unwrap();
        let mut user = User::new(username.to_string(), format!("{username}@example.com"), hash);
        if staff {
            user = user.staff();
        }
        let user = self.state.users.create(user).await.unwrap();
        let token = self
            .state
            .tokens
            .generate_token(user.id, &user.username, user.roles())
            .unwrap();
        (user, format!("Bearer {token}"))
    }

    async fn category(&self, slug: &str, published: bool) -> Category {
        let mut category = Category::new(slug.to_uppercase(), slug.to_string(), String::new());
        category.is_published = published;
        self.state.categories.create(category).await.unwrap()
    }

    /// A post dated `days` from the fixture's now.
    async fn post(&self, author: &User, category: &Category, title: &str, days: i64) -> Post {
        let pub_date = self.clock.now() + Duration::days(days);
        let post = Post::new(
            author.id,
            category.id,
            title.to_string(),
            "Body".to_string(),
            pub_date,
        );
        self.state.posts.create(post).await.unwrap()
    }

    async fn hidden_post(&self, author: &User, category: &Category, title: &str) -> Post {
        let mut post = self.post(author, category, title, -1).await;
        post.is_published = false;
        self.state.posts.update(post).await.unwrap()
    }
}

fn titles(page: &PageResponse<PostResponse>) -> Vec<&str> {
    page.items.iter().map(|p| p.title.as_str()).collect()
}

fn location_of<B>(resp: &actix_web::dev::ServiceResponse<B>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[actix_web::test]
async fn test_feed_hides_unpublished_future_and_hidden_category_posts() {
    let fx = Fixture::new(10);
    let (alice, _) = fx.user("alice").await;
    let travel = fx.category("travel", true).await;
    let drafts = fx.category("drafts", false).await;

    fx.post(&alice, &travel, "visible", -1).await;
    fx.post(&alice, &travel, "tomorrow", 1).await;
    fx.post(&alice, &drafts, "in hidden category", -1).await;
    fx.hidden_post(&alice, &travel, "unpublished").await;

    let app = app!(fx);
    let req = test::TestRequest::get().uri("/").to_request();
    let page: PageResponse<PostResponse> = test::call_and_read_body_json(&app, req).await;

    assert_eq!(titles(&page), vec!["visible"]);
    assert_eq!(page.total, 1);
}

#[actix_web::test]
async fn test_feed_is_ordered_newest_first_with_comment_counts() {
    let fx = Fixture::new(10);
    let (alice, _) = fx.user("alice").await;
    let travel = fx.category("travel", true).await;

    let old = fx.post(&alice, &travel, "old", -3).await;
    fx.post(&alice, &travel, "newest", -1).await;
    fx.post(&alice, &travel, "middle", -2).await;
    fx.state
        .comments
        .create(Comment::new(old.id, alice.id, "first!".to_string()))
        .await
        .unwrap();

    let app = app!(fx);
    let req = test::TestRequest::get().uri("/").to_request();
    let page: PageResponse<PostResponse> = test::call_and_read_body_json(&app, req).await;

    assert_eq!(titles(&page), vec!["newest", "middle", "old"]);
    assert_eq!(page.items[2].comment_count, 1);
    assert_eq!(page.items[0].comment_count, 0);
}

#[actix_web::test]
async fn test_future_post_appears_once_its_date_passes() {
    let fx = Fixture::new(10);
    let (alice, _) = fx.user("alice").await;
    let travel = fx.category("travel", true).await;
    fx.post(&alice, &travel, "tomorrow", 1).await;

    let app = app!(fx);
    let req = test::TestRequest::get().uri("/").to_request();
    let page: PageResponse<PostResponse> = test::call_and_read_body_json(&app, req).await;
    assert!(page.items.is_empty());

    fx.clock.advance(Duration::days(1));

    let req = test::TestRequest::get().uri("/").to_request();
    let page: PageResponse<PostResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(titles(&page), vec!["tomorrow"]);
}

#[actix_web::test]
async fn test_feed_pagination_and_out_of_range_pages() {
    let fx = Fixture::new(2);
    let (alice, _) = fx.user("alice").await;
    let travel = fx.category("travel", true).await;
    for day in 1..=3 {
        fx.post(&alice, &travel, &format!("post {day}"), -day).await;
    }

    let app = app!(fx);
    let req = test::TestRequest::get().uri("/?page=2").to_request();
    let page: PageResponse<PostResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(titles(&page), vec!["post 3"]);
    assert_eq!(page.num_pages, 2);
    assert!(page.has_previous);
    assert!(!page.has_next);

    for uri in [
        "/?page=3",
        "/?page=0",
        "/?page=last",
        "/?page=18446744073709551615",
        "/?page=18446744073709551616",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[actix_web::test]
async fn test_huge_page_numbers_are_not_found_on_every_listing() {
    let fx = Fixture::new(2);
    let (alice, alice_auth) = fx.user("alice").await;
    let travel = fx.category("travel", true).await;
    fx.post(&alice, &travel, "trip", -1).await;

    let app = app!(fx);
    for uri in [
        "/category/travel/?page=18446744073709551615",
        "/profile/alice/?page=18446744073709551615",
        "/?page=9223372036854775807",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");

        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header((header::AUTHORIZATION, alice_auth.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[actix_web::test]
async fn test_empty_feed_first_page_is_ok() {
    let fx = Fixture::new(10);
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/").to_request();
    let page: PageResponse<PostResponse> = test::call_and_read_body_json(&app, req).await;

    assert!(page.items.is_empty());
    assert_eq!(page.num_pages, 1);
}

#[actix_web::test]
async fn test_category_listing() {
    let fx = Fixture::new(10);
    let (alice, _) = fx.user("alice").await;
    let travel = fx.category("travel", true).await;
    let food = fx.category("food", true).await;
    let drafts = fx.category("drafts", false).await;

    fx.post(&alice, &travel, "trip", -1).await;
    fx.post(&alice, &travel, "next trip", 2).await;
    fx.post(&alice, &food, "soup", -1).await;
    fx.post(&alice, &drafts, "secret", -1).await;

    let app = app!(fx);
    let req = test::TestRequest::get().uri("/category/travel/").to_request();
    let body: CategoryPageResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.category.slug, "travel");
    assert_eq!(titles(&body.posts), vec!["trip"]);

    for uri in ["/category/drafts/", "/category/missing/"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[actix_web::test]
async fn test_profile_shows_everything_to_owner_only() {
    let fx = Fixture::new(10);
    let (alice, alice_auth) = fx.user("alice").await;
    let (_, bob_auth) = fx.user("bob").await;
    let travel = fx.category("travel", true).await;
    let drafts = fx.category("drafts", false).await;

    fx.post(&alice, &travel, "public", -1).await;
    fx.post(&alice, &travel, "scheduled", 1).await;
    fx.post(&alice, &drafts, "in draft category", -2).await;
    fx.hidden_post(&alice, &travel, "unpublished").await;

    let app = app!(fx);

    let req = test::TestRequest::get()
        .uri("/profile/alice/")
        .insert_header((header::AUTHORIZATION, alice_auth))
        .to_request();
    let own: ProfileResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(own.posts.total, 4);
    assert_eq!(own.profile.email.as_deref(), Some("alice@example.com"));

    let req = test::TestRequest::get()
        .uri("/profile/alice/")
        .insert_header((header::AUTHORIZATION, bob_auth))
        .to_request();
    let other: ProfileResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(titles(&other.posts), vec!["public"]);
    assert!(other.profile.email.is_none());

    let req = test::TestRequest::get().uri("/profile/alice/").to_request();
    let anonymous: ProfileResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(titles(&anonymous.posts), vec!["public"]);

    let req = test::TestRequest::get().uri("/profile/nobody/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_detail_of_hidden_post_is_visible_to_author_only() {
    let fx = Fixture::new(10);
    let (alice, alice_auth) = fx.user("alice").await;
    let (_, bob_auth) = fx.user("bob").await;
    let travel = fx.category("travel", true).await;
    let post = fx.hidden_post(&alice, &travel, "unpublished").await;
    let uri = format!("/posts/{}/", post.id);

    let app = app!(fx);

    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header((header::AUTHORIZATION, alice_auth))
        .to_request();
    let detail: PostDetailResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail.post.title, "unpublished");

    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header((header::AUTHORIZATION, bob_auth))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri(&uri).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_detail_lists_comments_oldest_first_and_hides_unpublished_location() {
    let fx = Fixture::new(10);
    let (alice, _) = fx.user("alice").await;
    let (bob, _) = fx.user("bob").await;
    let travel = fx.category("travel", true).await;

    let mut hidden = Location::new("Atlantis".to_string());
    hidden.is_published = false;
    let hidden = fx.state.locations.create(hidden).await.unwrap();

    let mut post = fx.post(&alice, &travel, "trip", -1).await;
    post.location_id = Some(hidden.id);
    let post = fx.state.posts.update(post).await.unwrap();

    let mut first = Comment::new(post.id, bob.id, "first".to_string());
    first.created_at = Utc::now() - Duration::minutes(5);
    fx.state.comments.create(first).await.unwrap();
    fx.state
        .comments
        .create(Comment::new(post.id, alice.id, "second".to_string()))
        .await
        .unwrap();

    let app = app!(fx);
    let req = test::TestRequest::get()
        .uri(&format!("/posts/{}/", post.id))
        .to_request();
    let detail: PostDetailResponse = test::call_and_read_body_json(&app, req).await;

    let texts: Vec<_> = detail.comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(detail.comments[0].author, "bob");
    assert!(detail.post.location.is_none());
}

#[actix_web::test]
async fn test_create_post_redirects_to_profile() {
    let fx = Fixture::new(10);
    let (alice, alice_auth) = fx.user("alice").await;
    let travel = fx.category("travel", true).await;

    let app = app!(fx);
    let req = test::TestRequest::post()
        .uri("/posts/create/")
        .insert_header((header::AUTHORIZATION, alice_auth))
        .set_json(serde_json::json!({
            "title": "Hello",
            "text": "World",
            "category_id": travel.id,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location_of(&resp), "/profile/alice/");

    let req = test::TestRequest::get().uri("/").to_request();
    let page: PageResponse<PostResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(titles(&page), vec!["Hello"]);
    assert_eq!(page.items[0].author, alice.username);
}

#[actix_web::test]
async fn test_create_post_validation_and_auth() {
    let fx = Fixture::new(10);
    let (_, alice_auth) = fx.user("alice").await;

    let app = app!(fx);
    let form = serde_json::json!({
        "title": "",
        "text": "World",
        "category_id": Uuid::new_v4(),
    });

    let req = test::TestRequest::post()
        .uri("/posts/create/")
        .insert_header((header::AUTHORIZATION, alice_auth.clone()))
        .set_json(&form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let detail = body["detail"].as_str().unwrap_or_default();
    assert!(detail.contains("title:"), "{detail}");
    assert!(detail.contains("category_id:"), "{detail}");

    let req = test::TestRequest::post()
        .uri("/posts/create/")
        .set_json(&form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/posts/create/")
        .insert_header((header::AUTHORIZATION, alice_auth))
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_non_author_delete_redirects_and_keeps_post() {
    let fx = Fixture::new(10);
    let (alice, _) = fx.user("alice").await;
    let (_, bob_auth) = fx.user("bob").await;
    let travel = fx.category("travel", true).await;
    let post = fx.post(&alice, &travel, "mine", -1).await;

    let app = app!(fx);
    for method in [test::TestRequest::get(), test::TestRequest::post()] {
        let req = method
            .uri(&format!("/posts/{}/delete/", post.id))
            .insert_header((header::AUTHORIZATION, bob_auth.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location_of(&resp), format!("/posts/{}/", post.id));
    }

    assert!(fx.state.posts.find_by_id(post.id).await.unwrap().is_some());
}

#[actix_web::test]
async fn test_author_edits_and_deletes_post() {
    let fx = Fixture::new(10);
    let (alice, alice_auth) = fx.user("alice").await;
    let (bob, _) = fx.user("bob").await;
    let travel = fx.category("travel", true).await;
    let post = fx.post(&alice, &travel, "draft title", -1).await;
    fx.state
        .comments
        .create(Comment::new(post.id, bob.id, "nice".to_string()))
        .await
        .unwrap();

    let app = app!(fx);
    let req = test::TestRequest::post()
        .uri(&format!("/posts/{}/edit/", post.id))
        .insert_header((header::AUTHORIZATION, alice_auth.clone()))
        .set_json(serde_json::json!({
            "title": "final title",
            "text": "Body",
            "category_id": travel.id,
            "pub_date": post.pub_date,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location_of(&resp), format!("/posts/{}/", post.id));

    let updated = fx.state.posts.find_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(updated.title, "final title");
    assert_eq!(updated.author_id, alice.id);

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{}/delete/", post.id))
        .insert_header((header::AUTHORIZATION, alice_auth))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location_of(&resp), "/");

    assert!(fx.state.posts.find_by_id(post.id).await.unwrap().is_none());
    assert!(fx.state.comments.list_for_post(post.id).await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_edit_missing_post_is_not_found() {
    let fx = Fixture::new(10);
    let (_, alice_auth) = fx.user("alice").await;

    let app = app!(fx);
    let req = test::TestRequest::get()
        .uri(&format!("/posts/{}/edit/", Uuid::new_v4()))
        .insert_header((header::AUTHORIZATION, alice_auth))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_comment_submission() {
    let fx = Fixture::new(10);
    let (alice, _) = fx.user("alice").await;
    let (_, bob_auth) = fx.user("bob").await;
    let travel = fx.category("travel", true).await;
    let post = fx.post(&alice, &travel, "trip", -1).await;
    let uri = format!("/posts/{}/comment/", post.id);

    let app = app!(fx);
    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header((header::AUTHORIZATION, bob_auth.clone()))
        .set_json(serde_json::json!({ "text": "   " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location_of(&resp), format!("/posts/{}/", post.id));
    assert!(fx.state.comments.list_for_post(post.id).await.unwrap().is_empty());

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header((header::AUTHORIZATION, bob_auth))
        .set_json(serde_json::json!({ "text": "Lovely" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let comments = fx.state.comments.list_for_post(post.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author_username, "bob");

    let req = test::TestRequest::post()
        .uri(&uri)
        .set_json(serde_json::json!({ "text": "anonymous" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_comment_with_null_or_non_string_text_redirects_without_saving() {
    let fx = Fixture::new(10);
    let (alice, alice_auth) = fx.user("alice").await;
    let travel = fx.category("travel", true).await;
    let post = fx.post(&alice, &travel, "trip", -1).await;
    let uri = format!("/posts/{}/comment/", post.id);

    let app = app!(fx);
    for body in [
        serde_json::json!({ "text": null }),
        serde_json::json!({ "text": 7 }),
        serde_json::json!({}),
    ] {
        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header((header::AUTHORIZATION, alice_auth.clone()))
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND, "{body}");
        assert_eq!(location_of(&resp), format!("/posts/{}/", post.id));
    }

    assert!(fx.state.comments.list_for_post(post.id).await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_content_created_through_handlers_uses_the_service_clock() {
    let fx = Fixture::new(10);
    let (_, alice_auth) = fx.user("alice").await;
    let travel = fx.category("travel", true).await;
    let now = fx.clock.now();

    let app = app!(fx);
    let req = test::TestRequest::post()
        .uri("/auth/registration/")
        .set_json(serde_json::json!({
            "username": "carol",
            "email": "carol@example.com",
            "password": "long enough",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let carol = fx.state.users.find_by_username("carol").await.unwrap().unwrap();
    assert_eq!(carol.created_at, now);
    assert_eq!(carol.updated_at, now);

    let req = test::TestRequest::post()
        .uri("/posts/create/")
        .insert_header((header::AUTHORIZATION, alice_auth.clone()))
        .set_json(serde_json::json!({
            "title": "Hello",
            "text": "World",
            "category_id": travel.id,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::get().uri("/").to_request();
    let page: PageResponse<PostResponse> = test::call_and_read_body_json(&app, req).await;
    let post_id = page.items[0].id;
    let post = fx.state.posts.find_by_id(post_id).await.unwrap().unwrap();
    assert_eq!(post.created_at, now);

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{post_id}/comment/"))
        .insert_header((header::AUTHORIZATION, alice_auth))
        .set_json(serde_json::json!({ "text": "first" }))
        .to_request();
    test::call_service(&app, req).await;
    let comments = fx.state.comments.list_for_post(post_id).await.unwrap();
    assert_eq!(comments[0].comment.created_at, now);
}

#[actix_web::test]
async fn test_comment_on_missing_post_is_not_found() {
    let fx = Fixture::new(10);
    let (_, auth) = fx.user("alice").await;

    let app = app!(fx);
    let req = test::TestRequest::post()
        .uri(&format!("/posts/{}/comment/", Uuid::new_v4()))
        .insert_header((header::AUTHORIZATION, auth))
        .set_json(serde_json::json!({ "text": "hello" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_non_author_cannot_touch_comment() {
    let fx = Fixture::new(10);
    let (alice, alice_auth) = fx.user("alice").await;
    let (bob, _) = fx.user("bob").await;
    let travel = fx.category("travel", true).await;
    let post = fx.post(&alice, &travel, "trip", -1).await;
    let comment = fx
        .state
        .comments
        .create(Comment::new(post.id, bob.id, "original".to_string()))
        .await
        .unwrap();

    let app = app!(fx);
    let edit_uri = format!("/posts/{}/edit_comment/{}/", post.id, comment.id);
    let delete_uri = format!("/posts/{}/delete_comment/{}/", post.id, comment.id);

    let requests = [
        test::TestRequest::get().uri(&edit_uri),
        test::TestRequest::post()
            .uri(&edit_uri)
            .set_json(serde_json::json!({ "text": "hijacked" })),
        test::TestRequest::get().uri(&delete_uri),
        test::TestRequest::post().uri(&delete_uri),
    ];
    for req in requests {
        let req = req
            .insert_header((header::AUTHORIZATION, alice_auth.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location_of(&resp), format!("/posts/{}/", post.id));
    }

    let comments = fx.state.comments.list_for_post(post.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].comment.text, "original");
}

#[actix_web::test]
async fn test_author_edits_and_deletes_comment() {
    let fx = Fixture::new(10);
    let (alice, _) = fx.user("alice").await;
    let (bob, bob_auth) = fx.user("bob").await;
    let travel = fx.category("travel", true).await;
    let post = fx.post(&alice, &travel, "trip", -1).await;
    let other = fx.post(&alice, &travel, "other", -2).await;
    let comment = fx
        .state
        .comments
        .create(Comment::new(post.id, bob.id, "tpyo".to_string()))
        .await
        .unwrap();

    let app = app!(fx);
    let edit_uri = format!("/posts/{}/edit_comment/{}/", post.id, comment.id);

    let req = test::TestRequest::post()
        .uri(&edit_uri)
        .insert_header((header::AUTHORIZATION, bob_auth.clone()))
        .set_json(serde_json::json!({ "text": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri(&edit_uri)
        .insert_header((header::AUTHORIZATION, bob_auth.clone()))
        .set_json(serde_json::json!({ "text": "typo" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let comments = fx.state.comments.list_for_post(post.id).await.unwrap();
    assert_eq!(comments[0].comment.text, "typo");

    // Addressed through the wrong post.
    let req = test::TestRequest::get()
        .uri(&format!("/posts/{}/edit_comment/{}/", other.id, comment.id))
        .insert_header((header::AUTHORIZATION, bob_auth.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{}/delete_comment/{}/", post.id, comment.id))
        .insert_header((header::AUTHORIZATION, bob_auth))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location_of(&resp), format!("/posts/{}/", post.id));
    assert!(fx.state.comments.list_for_post(post.id).await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_unknown_route_and_malformed_id_are_not_found() {
    let fx = Fixture::new(10);
    let app = app!(fx);

    let req = test::TestRequest::get()
        .uri("/no/such/page/")
        .insert_header(("x-request-id", "trace-123"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        resp.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("trace-123")
    );
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["request_id"], "trace-123");

    let req = test::TestRequest::get().uri("/posts/5/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_register_login_and_me() {
    let fx = Fixture::new(10);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/auth/registration/")
        .set_json(serde_json::json!({
            "username": "carol",
            "email": "carol@example.com",
            "password": "long enough",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/auth/registration/")
        .set_json(serde_json::json!({
            "username": "carol",
            "email": "other@example.com",
            "password": "long enough",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/auth/login/")
        .set_json(serde_json::json!({ "username": "carol", "password": "wrong password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/auth/login/")
        .set_json(serde_json::json!({ "username": "carol", "password": "long enough" }))
        .to_request();
    let auth: AuthResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(auth.token_type, "Bearer");

    let req = test::TestRequest::get()
        .uri("/auth/me/")
        .insert_header((
            header::AUTHORIZATION,
            format!("Bearer {}", auth.access_token),
        ))
        .to_request();
    let me: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["username"], "carol");
    assert_eq!(me["email"], "carol@example.com");
    assert!(me.get("password_hash").is_none());
}

#[actix_web::test]
async fn test_register_rejects_bad_fields() {
    let fx = Fixture::new(10);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/auth/registration/")
        .set_json(serde_json::json!({
            "username": "no spaces allowed",
            "email": "nope",
            "password": "short",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: serde_json::Value = test::read_body_json(resp).await;
    let detail = body["detail"].as_str().unwrap_or_default();
    for field in ["username:", "email:", "password:"] {
        assert!(detail.contains(field), "{detail}");
    }
}

#[actix_web::test]
async fn test_edit_profile_renames_and_detects_conflicts() {
    let fx = Fixture::new(10);
    let (alice, alice_auth) = fx.user("alice").await;
    fx.user("bob").await;

    let app = app!(fx);
    let req = test::TestRequest::post()
        .uri("/edit_profile/")
        .insert_header((header::AUTHORIZATION, alice_auth.clone()))
        .set_json(serde_json::json!({ "username": "bob", "email": "a@example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/edit_profile/")
        .insert_header((header::AUTHORIZATION, alice_auth))
        .set_json(serde_json::json!({
            "username": "alicia",
            "first_name": "Alice",
            "email": "alicia@example.com",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location_of(&resp), "/profile/alicia/");

    let user = fx.state.users.find_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(user.username, "alicia");
    assert_eq!(user.first_name, "Alice");
}

#[actix_web::test]
async fn test_comment_edit_form_shows_author_name_after_rename() {
    let fx = Fixture::new(10);
    let (alice, alice_auth) = fx.user("alice").await;
    let travel = fx.category("travel", true).await;
    let post = fx.post(&alice, &travel, "trip", -1).await;
    let comment = fx
        .state
        .comments
        .create(Comment::new(post.id, alice.id, "hi".to_string()))
        .await
        .unwrap();

    let app = app!(fx);
    let req = test::TestRequest::post()
        .uri("/edit_profile/")
        .insert_header((header::AUTHORIZATION, alice_auth.clone()))
        .set_json(serde_json::json!({ "username": "alicia", "email": "alicia@example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::get()
        .uri(&format!("/posts/{}/edit_comment/{}/", post.id, comment.id))
        .insert_header((header::AUTHORIZATION, alice_auth))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["author"], "alicia");
}

#[actix_web::test]
async fn test_token_of_deleted_account_is_unauthorized() {
    let fx = Fixture::new(10);
    let (alice, alice_auth) = fx.user("alice").await;
    let travel = fx.category("travel", true).await;
    fx.state.users.delete(alice.id).await.unwrap();

    let app = app!(fx);
    let req = test::TestRequest::post()
        .uri("/posts/create/")
        .insert_header((header::AUTHORIZATION, alice_auth))
        .set_json(serde_json::json!({
            "title": "Hello",
            "text": "World",
            "category_id": travel.id,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_password_change() {
    let fx = Fixture::new(10);
    let (_, auth) = fx.user("alice").await;
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/auth/password_change/")
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .set_json(serde_json::json!({
            "old_password": "not it",
            "new_password": "another secret",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/auth/password_change/")
        .insert_header((header::AUTHORIZATION, auth))
        .set_json(serde_json::json!({
            "old_password": "correct horse",
            "new_password": "another secret",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::post()
        .uri("/auth/login/")
        .set_json(serde_json::json!({ "username": "alice", "password": "another secret" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_admin_routes_require_staff() {
    let fx = Fixture::new(10);
    let (_, user_auth) = fx.user("alice").await;
    let (_, staff_auth) = fx.user_with("root", true).await;

    let app = app!(fx);
    let form = serde_json::json!({ "title": "Travel", "slug": "travel" });

    let req = test::TestRequest::post()
        .uri("/admin/categories/")
        .insert_header((header::AUTHORIZATION, user_auth))
        .set_json(&form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/admin/categories/")
        .insert_header((header::AUTHORIZATION, staff_auth.clone()))
        .set_json(&form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/admin/categories/")
        .insert_header((header::AUTHORIZATION, staff_auth.clone()))
        .set_json(&form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/admin/categories/")
        .insert_header((header::AUTHORIZATION, staff_auth))
        .set_json(serde_json::json!({ "title": "Bad", "slug": "not a slug" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn test_demoted_staff_token_is_forbidden() {
    let fx = Fixture::new(10);
    let (root, staff_auth) = fx.user_with("root", true).await;

    let app = app!(fx);
    let req = test::TestRequest::get()
        .uri("/admin/categories/")
        .insert_header((header::AUTHORIZATION, staff_auth.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let mut demoted = root;
    demoted.is_staff = false;
    fx.state.users.update(demoted).await.unwrap();

    for uri in ["/admin/categories/", "/admin/locations/"] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header((header::AUTHORIZATION, staff_auth.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{uri}");
    }
}

#[actix_web::test]
async fn test_admin_category_delete_is_refused_while_in_use() {
    let fx = Fixture::new(10);
    let (alice, _) = fx.user("alice").await;
    let (_, staff_auth) = fx.user_with("root", true).await;
    let travel = fx.category("travel", true).await;
    let empty = fx.category("empty", true).await;
    fx.post(&alice, &travel, "trip", -1).await;

    let app = app!(fx);
    let req = test::TestRequest::delete()
        .uri(&format!("/admin/categories/{}/", travel.id))
        .insert_header((header::AUTHORIZATION, staff_auth.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::delete()
        .uri(&format!("/admin/categories/{}/", empty.id))
        .insert_header((header::AUTHORIZATION, staff_auth))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn test_admin_unpublishing_category_hides_its_posts() {
    let fx = Fixture::new(10);
    let (alice, _) = fx.user("alice").await;
    let (_, staff_auth) = fx.user_with("root", true).await;
    let travel = fx.category("travel", true).await;
    fx.post(&alice, &travel, "trip", -1).await;

    let app = app!(fx);
    let req = test::TestRequest::post()
        .uri(&format!("/admin/categories/{}/", travel.id))
        .insert_header((header::AUTHORIZATION, staff_auth))
        .set_json(serde_json::json!({
            "title": "Travel",
            "slug": "travel",
            "is_published": false,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/").to_request();
    let page: PageResponse<PostResponse> = test::call_and_read_body_json(&app, req).await;
    assert!(page.items.is_empty());
}

#[actix_web::test]
async fn test_bootstrap_admin_is_idempotent() {
    let fx = Fixture::new(10);
    let admin = crate::config::AdminBootstrap {
        username: "root".to_string(),
        password: "super secret".to_string(),
        email: "root@example.com".to_string(),
    };

    fx.state.bootstrap_admin(&admin).await.unwrap();
    fx.state.bootstrap_admin(&admin).await.unwrap();

    let user = fx.state.users.find_by_username("root").await.unwrap().unwrap();
    assert!(user.is_staff);
    assert!(user.roles().contains(&"admin".to_string()));
}

#[actix_web::test]
async fn test_health_reports_in_memory_storage() {
    let fx = Fixture::new(10);
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/health/").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "in-memory");
}
