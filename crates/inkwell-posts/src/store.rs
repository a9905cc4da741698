//! Persistence operations for posts and categories.
//!
//! Writes validate their input before touching the database, then run in a
//! single transaction: category resolution and the post row commit together
//! or not at all. Categories are resolved by exact name through
//! [`find_or_create_category`]; the UNIQUE constraint on `categories.name`
//! guarantees concurrent writers converge on one row per name.

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use crate::error::PostError;
use crate::model::{validate, Category, NewPost, Post, ValidPost};

const POST_COLUMNS: &str = "SELECT p.id, p.title, p.description, p.created_at, c.id, c.name
     FROM posts p
     JOIN categories c ON c.id = p.category_id";

/// Lists every post with its category, ordered by id.
pub fn list_posts(conn: &Connection) -> Result<Vec<Post>, PostError> {
    let mut stmt = conn.prepare(&format!("{POST_COLUMNS} ORDER BY p.id ASC"))?;
    let rows = stmt.query_map([], map_row_to_post)?;
    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

/// Retrieves a post by id.
///
/// # Errors
///
/// Returns `PostError::NotFound` when no post has this id.
pub fn get_post(conn: &Connection, id: i64) -> Result<Post, PostError> {
    conn.query_row(
        &format!("{POST_COLUMNS} WHERE p.id = ?1"),
        [id],
        map_row_to_post,
    )
    .optional()?
    .ok_or(PostError::NotFound(id))
}

/// Creates a post, resolving its category by name.
///
/// # Errors
///
/// Returns `PostError::Validation` before any write when `title` or
/// `category_name` is missing or empty.
pub fn create_post(conn: &Connection, input: &NewPost) -> Result<Post, PostError> {
    let valid = validate(input)?;

    let tx = write_transaction(conn)?;
    let post = insert_post(&tx, &valid)?;
    tx.commit()?;

    Ok(post)
}

/// Replaces a post's title, description and category.
///
/// The category binding only changes when the requested name differs from
/// the current one; `created_at` is never modified.
///
/// # Errors
///
/// Returns `PostError::Validation` for invalid input (checked first) and
/// `PostError::NotFound` when no post has this id. Nothing is written in
/// either case.
pub fn update_post(conn: &Connection, id: i64, input: &NewPost) -> Result<Post, PostError> {
    let valid = validate(input)?;

    let tx = write_transaction(conn)?;
    let current = get_post(&tx, id)?;

    let category = if current.category.name == valid.category_name {
        current.category
    } else {
        find_or_create_category(&tx, &valid.category_name)?
    };

    tx.execute(
        "UPDATE posts SET title = ?1, description = ?2, category_id = ?3 WHERE id = ?4",
        params![valid.title, valid.description, category.id, id],
    )?;
    tx.commit()?;

    Ok(Post {
        id,
        title: valid.title,
        description: valid.description,
        category,
        created_at: current.created_at,
    })
}

/// Begins an IMMEDIATE transaction so the write lock is taken up front and
/// contending writers wait on `busy_timeout` instead of failing on upgrade.
pub(crate) fn write_transaction(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

/// Lists every category, ordered by id.
pub fn list_categories(conn: &Connection) -> Result<Vec<Category>, PostError> {
    let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY id ASC")?;
    let rows = stmt.query_map([], map_row_to_category)?;
    let mut categories = Vec::new();
    for row in rows {
        categories.push(row?);
    }
    Ok(categories)
}

/// Looks up a category by exact name, inserting it when absent.
pub(crate) fn find_or_create_category(
    conn: &Connection,
    name: &str,
) -> Result<Category, PostError> {
    match find_category(conn, name)? {
        Some(category) => Ok(category),
        None => create_category(conn, name),
    }
}

/// Inserts `name` unless a row with that name already exists, then returns
/// whichever row holds the name.
///
/// A concurrent writer may commit the same name between the caller's lookup
/// and this insert; the conflict clause turns that into a no-op.
fn create_category(conn: &Connection, name: &str) -> Result<Category, PostError> {
    let inserted = conn.execute(
        "INSERT INTO categories (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        [name],
    )?;
    if inserted > 0 {
        tracing::debug!(category = name, "created category");
    }

    find_category(conn, name)?.ok_or(PostError::Database(rusqlite::Error::QueryReturnedNoRows))
}

fn find_category(conn: &Connection, name: &str) -> Result<Option<Category>, PostError> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM categories WHERE name = ?1",
            [name],
            map_row_to_category,
        )
        .optional()?)
}

/// Inserts a validated post. The caller owns the surrounding transaction.
pub(crate) fn insert_post(conn: &Connection, post: &ValidPost) -> Result<Post, PostError> {
    let category = find_or_create_category(conn, &post.category_name)?;
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    let id: i64 = conn.query_row(
        "INSERT INTO posts (title, description, category_id, created_at)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id",
        params![post.title, post.description, category.id, created_at],
        |row| row.get(0),
    )?;

    Ok(Post {
        id,
        title: post.title.clone(),
        description: post.description.clone(),
        category,
        created_at,
    })
}

fn map_row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        category: Category {
            id: row.get(4)?,
            name: row.get(5)?,
        },
    })
}

fn map_row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}
