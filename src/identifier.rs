//! Identifier validation for names spliced into SQL++ statements.

use crate::error::{NlqError, Result};
use lazy_static::lazy_static;
use regex::Regex;

const MAX_IDENTIFIER_LEN: usize = 255;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
}

/// Allow-list check for a dataverse name: ASCII alphanumerics and underscore only.
///
/// Every statement that embeds a dataverse name goes through this first, so
/// the name can never close a string literal or start a second statement.
pub fn validate_dataverse_name(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(NlqError::InvalidIdentifier(
            "dataverse name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(NlqError::InvalidIdentifier(format!(
            "dataverse name exceeds {} characters",
            MAX_IDENTIFIER_LEN
        )));
    }
    if !IDENTIFIER.is_match(name) {
        return Err(NlqError::InvalidIdentifier(format!(
            "dataverse name '{}' may only contain letters, digits and underscores",
            name
        )));
    }
    Ok(name)
}
