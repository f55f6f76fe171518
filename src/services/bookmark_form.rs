//! Rules applied to the add-bookmark form before a create request is issued.

use crate::types::bookmark::NewBookmark;
use crate::types::errors::ValidationError;

/// Scheme prepended to URLs entered without one.
pub const DEFAULT_SCHEME: &str = "https://";

/// Trims and validates the form fields and normalizes the URL.
///
/// Both fields must be non-empty after trimming. A URL without a
/// `scheme://` prefix gets [`DEFAULT_SCHEME`] prepended.
pub fn prepare(user_id: &str, title: &str, url: &str) -> Result<NewBookmark, ValidationError> {
    let title = title.trim();
    let url = url.trim();

    if title.is_empty() || url.is_empty() {
        return Err(ValidationError::MissingFields);
    }

    Ok(NewBookmark {
        user_id: user_id.to_string(),
        title: title.to_string(),
        url: normalize_url(url)?,
    })
}

/// Prepends [`DEFAULT_SCHEME`] unless the URL already names a scheme.
pub fn normalize_url(url: &str) -> Result<String, ValidationError> {
    if url.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidUrl(url.to_string()));
    }

    if has_scheme(url) {
        Ok(url.to_string())
    } else {
        Ok(format!("{}{}", DEFAULT_SCHEME, url))
    }
}

/// `scheme ":" "//"` where scheme is `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`.
fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
