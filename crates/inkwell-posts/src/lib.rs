//! Post and category storage for Inkwell.
//!
//! Owns the two entity kinds of the blog: [`Category`] and [`Post`]. Every
//! post references exactly one category; categories are never written
//! directly but resolved by name on each post write (find-or-create), so
//! a name maps to at most one category row.
//!
//! All operations take a borrowed [`rusqlite::Connection`]. Callers decide
//! where the connection comes from (normally a pooled connection held for
//! the duration of one request).

mod error;
mod model;
mod seed;
mod store;

pub use error::PostError;
pub use model::{
    validate, Category, NewPost, Post, ValidPost, MAX_CATEGORY_NAME_LEN, MAX_DESCRIPTION_LEN,
    MAX_TITLE_LEN,
};
pub use seed::seed_posts;
pub use store::{create_post, get_post, list_categories, list_posts, update_post};
