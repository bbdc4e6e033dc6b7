//! Collection access validation.
//!
//! Every search, delete, and index path resolves its scope through
//! [`AccessGuard`]; no component accepts a raw caller-supplied collection
//! name. Isolation rests on the `user_{userId}_` name prefix, enforced here
//! and nowhere else.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::AccessError;
use crate::services::store::CollectionStore;

/// The validated set of collections one retrieval operation may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// A single named collection.
    Single(String),
    /// Every collection owned by the user at resolution time.
    All {
        user_id: String,
        collections: Vec<String>,
    },
}

impl Scope {
    /// Whether a collection name falls inside this scope.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Scope::Single(own) => own == name,
            Scope::All { collections, .. } => collections.iter().any(|c| c == name),
        }
    }

    /// The single scoped collection, if the scope is not cross-collection.
    pub fn single(&self) -> Option<&str> {
        match self {
            Scope::Single(name) => Some(name),
            Scope::All { .. } => None,
        }
    }

    pub fn collection_count(&self) -> usize {
        match self {
            Scope::Single(_) => 1,
            Scope::All { collections, .. } => collections.len(),
        }
    }
}

/// Namespace prefix owned by a user.
pub fn user_prefix(user_id: &str) -> String {
    format!("user_{}_", user_id)
}

/// Full collection name for a user's document.
pub fn document_collection_name(user_id: &str, safe_filename: &str) -> String {
    format!("user_{}_doc_{}", user_id, safe_filename)
}

/// Strip the user/doc prefix back off a collection name for display.
pub fn document_name(user_id: &str, collection_name: &str) -> String {
    collection_name
        .strip_prefix(&format!("user_{}_doc_", user_id))
        .unwrap_or(collection_name)
        .to_string()
}

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]").expect("valid regex"));
static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("valid regex"));

/// Normalize a filename into the collection identifier namespace: drop the
/// PDF extension, replace anything outside `[A-Za-z0-9._-]`, collapse
/// underscore runs, trim `_`/`.` from the ends, pad short or empty results
/// and cap the length at 50 characters.
pub fn safe_filename(filename: &str) -> String {
    let mut name = filename.to_string();
    for ext in [".pdf", ".PDF"] {
        if let Some(stripped) = name.strip_suffix(ext) {
            name = stripped.to_string();
        }
    }

    let name = UNSAFE_CHARS.replace_all(&name, "_");
    let name = UNDERSCORE_RUNS.replace_all(&name, "_");
    let mut name = name.trim_matches(|c| c == '_' || c == '.').to_string();

    if name.is_empty() {
        name = "document".to_string();
    }
    if !name.chars().next().is_some_and(char::is_alphanumeric) {
        name = format!("doc_{}", name);
    }
    if !name.chars().last().is_some_and(char::is_alphanumeric) {
        name = format!("{}_doc", name);
    }
    if name.len() > 50 {
        name.truncate(50);
    }
    if name.len() < 3 {
        name = format!("doc_{}", name);
    }
    name
}

/// Validation gate in front of the collection store.
#[derive(Clone)]
pub struct AccessGuard {
    store: Arc<dyn CollectionStore>,
}

impl AccessGuard {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self { store }
    }

    /// Validate a caller-supplied collection name, or resolve the
    /// all-collections scope when none was supplied.
    ///
    /// A name outside the caller's namespace is rejected with
    /// [`AccessError::Denied`] whether or not it exists.
    pub async fn authorize(
        &self,
        user_id: &str,
        requested: Option<&str>,
    ) -> Result<Scope, AccessError> {
        let user_id = validate_user_id(user_id)?;

        match requested {
            Some(name) => {
                self.check(user_id, name)?;
                Ok(Scope::Single(name.to_string()))
            }
            None => {
                let collections = self.store.list(&user_prefix(user_id)).await?;
                Ok(Scope::All {
                    user_id: user_id.to_string(),
                    collections,
                })
            }
        }
    }

    /// Pure prefix check, no store round-trip. Used where the collection
    /// name is already known to exist (delete, feedback) as well as by
    /// `authorize`.
    pub fn check(&self, user_id: &str, collection_name: &str) -> Result<(), AccessError> {
        let user_id = validate_user_id(user_id)?;
        if collection_name.starts_with(&user_prefix(user_id)) {
            Ok(())
        } else {
            tracing::warn!(
                user_id,
                collection = collection_name,
                "rejected out-of-namespace collection access"
            );
            Err(AccessError::Denied {
                collection: collection_name.to_string(),
            })
        }
    }
}

fn validate_user_id(user_id: &str) -> Result<&str, AccessError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(AccessError::InvalidUser);
    }
    Ok(trimmed)
}
