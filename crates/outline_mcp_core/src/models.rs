use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::validation::SEARCH_DEFAULT_LIMIT;

pub type Timestamp = DateTime<Utc>;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Collection {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub permission: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub sharing: bool,
    pub index: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub sort: CollectionSort,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollectionSort {
    #[serde(deserialize_with = "null_default")]
    pub field: String,
    #[serde(deserialize_with = "null_default")]
    pub direction: String,
}

impl Default for CollectionSort {
    fn default() -> Self {
        Self {
            field: "title".to_string(),
            direction: "asc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub title: String,
    #[serde(deserialize_with = "null_default")]
    pub text: String,
    pub url_id: Option<String>,
    pub collection_id: Option<String>,
    pub parent_document_id: Option<String>,
    pub published_at: Option<Timestamp>,
    pub archived_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub created_by: Option<User>,
    pub updated_by: Option<User>,
    pub emoji: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub template: bool,
    #[serde(deserialize_with = "null_default")]
    pub full_width: bool,
    #[serde(deserialize_with = "null_default")]
    pub revision: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub is_admin: bool,
    #[serde(deserialize_with = "null_default")]
    pub is_suspended: bool,
    pub created_at: Option<Timestamp>,
}

/// Point-in-time snapshot of a document. Never mutated once the remote
/// service has created it.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Revision {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub document_id: String,
    pub title: Option<String>,
    pub text: Option<String>,
    pub created_at: Option<Timestamp>,
    pub created_by: Option<User>,
    pub collection_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SearchResult {
    #[serde(deserialize_with = "null_default")]
    pub ranking: f64,
    #[serde(deserialize_with = "null_default")]
    pub context: String,
    #[serde(deserialize_with = "null_default")]
    pub document: Document,
}

/// Treats an explicit `null` like a missing key.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Every property name the response entities read, in their camelCase form.
fn response_field_names() -> &'static BTreeSet<String> {
    static NAMES: OnceLock<BTreeSet<String>> = OnceLock::new();
    NAMES.get_or_init(|| {
        let samples = [
            serde_json::to_value(Collection::default()),
            serde_json::to_value(Document::default()),
            serde_json::to_value(User::default()),
            serde_json::to_value(Revision::default()),
            serde_json::to_value(SearchResult::default()),
        ];
        let mut names = BTreeSet::new();
        for sample in samples.iter().flatten() {
            collect_keys(sample, &mut names);
        }
        names
    })
}

fn collect_keys(value: &Value, names: &mut BTreeSet<String>) {
    if let Value::Object(fields) = value {
        for (key, nested) in fields {
            names.insert(key.clone());
            collect_keys(nested, names);
        }
    }
}

/// Rewrites object keys that differ from a known entity property only by
/// ASCII case (`Id`, `CollectionID`) to the property's camelCase name, at
/// every depth. An exactly-named key wins over a case variant.
pub fn canonicalize_keys(value: Value) -> Value {
    match value {
        Value::Object(fields) => {
            let known = response_field_names();
            let mut canonical = Map::with_capacity(fields.len());
            for (key, nested) in fields {
                let nested = canonicalize_keys(nested);
                if known.contains(&key) {
                    canonical.insert(key, nested);
                    continue;
                }
                match known.iter().find(|name| name.eq_ignore_ascii_case(&key)) {
                    Some(name) => {
                        if !canonical.contains_key(name) {
                            canonical.insert(name.clone(), nested);
                        }
                    }
                    None => {
                        canonical.insert(key, nested);
                    }
                }
            }
            Value::Object(canonical)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize_keys).collect()),
        other => other,
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharing: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    pub title: String,
    pub text: String,
    pub collection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_width: Option<bool>,
}

/// Partial update; only the fields that are set reach the wire.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_width: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocumentsRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_drafts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet_min_words: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet_max_words: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl SearchDocumentsRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            include_archived: Some(false),
            include_drafts: Some(true),
            limit: Some(SEARCH_DEFAULT_LIMIT),
            ..Self::default()
        }
    }
}
