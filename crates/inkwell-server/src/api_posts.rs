//! Post and category API handlers.
//!
//! Provides:
//! - `GET /posts` and `GET /posts/{id}`
//! - `POST /posts` (201) and `PUT /posts/{id}` (full replace)
//! - `POST /posts/seed` (destructive fixture reset)
//! - `GET /categories`

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path,
    },
    http::StatusCode,
    Json,
};
use inkwell_posts::{
    create_post, get_post, list_categories, list_posts, seed_posts, update_post, Category,
    NewPost, Post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for `POST /posts` and `PUT /posts/{id}`.
///
/// Every field is optional at the JSON level so that a missing `title` or
/// `category_name` is answered with a 400 naming the field.
#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_name: Option<String>,
}

impl From<PostRequest> for NewPost {
    fn from(req: PostRequest) -> Self {
        NewPost {
            title: req.title,
            description: req.description,
            category_name: req.category_name,
        }
    }
}

/// Response body for `POST /posts/seed`.
#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub status: &'static str,
    /// Number of fixture posts inserted.
    pub count: usize,
}

fn post_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn post_body(payload: Result<Json<PostRequest>, JsonRejection>) -> Result<NewPost, ApiError> {
    payload
        .map(|Json(req)| req.into())
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// GET /posts
pub async fn list_posts_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let posts = with_conn(&state, list_posts).await?;
    Ok(Json(posts))
}

/// GET /posts/{id}
pub async fn get_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Post>, ApiError> {
    let id = post_id(path)?;
    let post = with_conn(&state, move |conn| get_post(conn, id)).await?;
    Ok(Json(post))
}

/// POST /posts
pub async fn create_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<PostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let input = post_body(payload)?;
    let post = with_conn(&state, move |conn| create_post(conn, &input)).await?;

    tracing::info!(
        post_id = post.id,
        category_id = post.category.id,
        "post created"
    );
    Ok((StatusCode::CREATED, Json(post)))
}

/// PUT /posts/{id}
///
/// Replaces title, description and category. A missing description is
/// stored as empty.
pub async fn update_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<PostRequest>, JsonRejection>,
) -> Result<Json<Post>, ApiError> {
    let id = post_id(path)?;
    let input = post_body(payload)?;
    let post = with_conn(&state, move |conn| update_post(conn, id, &input)).await?;

    tracing::info!(
        post_id = post.id,
        category_id = post.category.id,
        "post updated"
    );
    Ok(Json(post))
}

/// POST /posts/seed
///
/// Deletes every post, then inserts the fixture set.
pub async fn seed_posts_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<SeedResponse>, ApiError> {
    let count = with_conn(&state, seed_posts).await?;

    tracing::warn!(count, "all posts replaced with fixture data");
    Ok(Json(SeedResponse {
        status: "seeded",
        count,
    }))
}

/// GET /categories
pub async fn list_categories_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = with_conn(&state, list_categories).await?;
    Ok(Json(categories))
}
