//! Post and category records, plus write-side validation.

use serde::{Deserialize, Serialize};

use crate::error::PostError;

/// Maximum length of a post title, in characters.
pub const MAX_TITLE_LEN: usize = 256;
/// Maximum length of a category name, in characters.
pub const MAX_CATEGORY_NAME_LEN: usize = 64;
/// Maximum length of a post description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 16 * 1024;

/// A post category. Names are unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    /// Database-assigned id.
    pub id: i64,
    /// Unique category name.
    pub name: String,
}

/// A stored blog post with its resolved category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    /// Database-assigned id.
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: Category,
    /// Creation timestamp (RFC 3339, UTC). Never changes after insert.
    pub created_at: String,
}

/// Write input for creating or fully replacing a post.
///
/// Fields are optional so that an absent value is reported as a validation
/// failure naming the field, the same as an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewPost {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_name: Option<String>,
}

impl NewPost {
    /// Convenience constructor with every field present.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category_name: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            category_name: Some(category_name.into()),
        }
    }
}

/// A [`NewPost`] whose fields passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPost {
    pub title: String,
    pub description: String,
    pub category_name: String,
}

/// Validates and normalizes a write request.
///
/// Title and category name are trimmed and must be non-empty. A missing
/// description becomes the empty string. The first failing field is reported.
///
/// # Errors
///
/// Returns `PostError::Validation` naming the offending field.
pub fn validate(input: &NewPost) -> Result<ValidPost, PostError> {
    let title = required("title", input.title.as_deref(), MAX_TITLE_LEN)?;
    let category_name = required(
        "category_name",
        input.category_name.as_deref(),
        MAX_CATEGORY_NAME_LEN,
    )?;

    let description = input.description.clone().unwrap_or_default();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(PostError::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }

    Ok(ValidPost {
        title,
        description,
        category_name,
    })
}

fn required(field: &str, value: Option<&str>, max_len: usize) -> Result<String, PostError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(PostError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > max_len {
        return Err(PostError::Validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(value.to_string())
}
