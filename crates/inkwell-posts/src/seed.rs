//! Fixture data for demos and local development.

use rusqlite::Connection;

use crate::error::PostError;
use crate::model::ValidPost;
use crate::store::{insert_post, write_transaction};

/// Fixture posts as `(title, description, category)`.
const FIXTURES: &[(&str, &str, &str)] = &[
    (
        "Getting started with Rust",
        "Ownership, borrowing and the first cargo project.",
        "Tech",
    ),
    (
        "Embedded databases",
        "Why a single SQLite file is often enough.",
        "Tech",
    ),
    (
        "A slower morning",
        "Notes on keeping weekday routines small.",
        "Life",
    ),
    (
        "Sourdough, week three",
        "The starter finally doubled overnight.",
        "Food",
    ),
];

/// Deletes every post and inserts the fixture set.
///
/// Runs in one transaction. Categories are kept and reused by name, so
/// seeding repeatedly never duplicates them. Returns the number of posts
/// inserted.
pub fn seed_posts(conn: &Connection) -> Result<usize, PostError> {
    let tx = write_transaction(conn)?;

    let removed = tx.execute("DELETE FROM posts", [])?;

    for (title, description, category) in FIXTURES {
        insert_post(
            &tx,
            &ValidPost {
                title: (*title).to_string(),
                description: (*description).to_string(),
                category_name: (*category).to_string(),
            },
        )?;
    }

    tx.commit()?;

    tracing::debug!(removed, inserted = FIXTURES.len(), "seeded posts");
    Ok(FIXTURES.len())
}
