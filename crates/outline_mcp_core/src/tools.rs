//! Tool catalog exposed by the protocol server.
//!
//! Every tool answers with a pretty-printed JSON document. Client failures
//! are part of that document (`success: false`); only unknown tool names and
//! malformed arguments escape as [`ToolError`].

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::client::OutlineClient;
use crate::error::{ErrorKind, OutlineError};
use crate::models::{
    CreateCollectionRequest, CreateDocumentRequest, Document, Revision, SearchDocumentsRequest,
    UpdateDocumentRequest,
};
use crate::transport::{CancelToken, Transport};
use crate::validation::{PERMISSION_READ_WRITE, SEARCH_DEFAULT_LIMIT};

const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "list_collections",
            description: "List all available collections in Outline with their IDs, names, descriptions, and metadata.",
            input_schema: object_schema(json!({}), &[]),
        },
        ToolSpec {
            name: "create_collection",
            description: "Create a new collection. Collections group documents under shared permissions.",
            input_schema: object_schema(
                json!({
                    "name": string_prop("Collection name"),
                    "description": string_prop("Optional description for the collection"),
                    "icon": string_prop("Optional emoji icon; named icons are not supported"),
                    "color": string_prop("Optional color in hex format, e.g. #4E5C6E"),
                    "permission": {
                        "type": "string",
                        "enum": ["read", "read_write"],
                        "description": "Permission level (default: read_write)"
                    }
                }),
                &["name"],
            ),
        },
        ToolSpec {
            name: "search_documents",
            description: "Search documents by query. Returns matches with context snippets and rankings.",
            input_schema: object_schema(
                json!({
                    "query": string_prop("Search query string"),
                    "collectionId": string_prop("Optional collection ID to limit search scope"),
                    "includeArchived": bool_prop("Include archived documents (default: false)"),
                    "includeDrafts": bool_prop("Include draft documents (default: true)"),
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 100,
                        "description": "Maximum number of results (default: 25)"
                    }
                }),
                &["query"],
            ),
        },
        ToolSpec {
            name: "get_document",
            description: "Retrieve a document by ID, including its full Markdown content and metadata.",
            input_schema: object_schema(
                json!({ "documentId": string_prop("The ID of the document to retrieve") }),
                &["documentId"],
            ),
        },
        ToolSpec {
            name: "create_document",
            description: "Create a new Markdown document in a collection.",
            input_schema: object_schema(
                json!({
                    "title": string_prop("Document title"),
                    "text": string_prop("Document content in Markdown"),
                    "collectionId": string_prop("Collection that will hold the document"),
                    "parentDocumentId": string_prop("Optional parent document for nesting"),
                    "publish": bool_prop("Publish immediately (default: true)"),
                    "icon": string_prop("Optional emoji icon"),
                    "color": string_prop("Optional color in hex format"),
                    "fullWidth": bool_prop("Display the document in full width (default: false)")
                }),
                &["title", "text", "collectionId"],
            ),
        },
        ToolSpec {
            name: "update_document",
            description: "Update the title, content, publish state, or styling of an existing document.",
            input_schema: object_schema(
                json!({
                    "documentId": string_prop("The ID of the document to update"),
                    "title": string_prop("New document title"),
                    "text": string_prop("New document content in Markdown"),
                    "append": bool_prop("Append text instead of replacing (default: false)"),
                    "publish": bool_prop("Whether to publish the document"),
                    "icon": string_prop("Optional emoji icon"),
                    "color": string_prop("Optional color in hex format"),
                    "fullWidth": bool_prop("Display the document in full width")
                }),
                &["documentId"],
            ),
        },
        ToolSpec {
            name: "delete_document",
            description: "Move a document to trash, or delete it permanently. Permanent deletion cannot be undone.",
            input_schema: object_schema(
                json!({
                    "documentId": string_prop("The ID of the document to delete"),
                    "permanent": bool_prop("Delete permanently instead of moving to trash (default: false)")
                }),
                &["documentId"],
            ),
        },
        ToolSpec {
            name: "list_revisions",
            description: "List the revision history of a document with timestamps and authors.",
            input_schema: object_schema(
                json!({ "documentId": string_prop("The document whose revisions to list") }),
                &["documentId"],
            ),
        },
        ToolSpec {
            name: "get_revision",
            description: "Retrieve the full content and metadata of a single revision.",
            input_schema: object_schema(
                json!({ "revisionId": string_prop("The ID of the revision to retrieve") }),
                &["revisionId"],
            ),
        },
        ToolSpec {
            name: "restore_revision",
            description: "Restore a document to a previous revision. A new revision is created; history is kept.",
            input_schema: object_schema(
                json!({
                    "documentId": string_prop("The ID of the document to restore"),
                    "revisionId": string_prop("The revision to restore to"),
                    "collectionId": string_prop("Optional collection to move the document into")
                }),
                &["documentId", "revisionId"],
            ),
        },
    ]
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn string_prop(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn bool_prop(description: &str) -> Value {
    json!({ "type": "boolean", "description": description })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCollectionArgs {
    name: String,
    description: Option<String>,
    icon: Option<String>,
    color: Option<String>,
    permission: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    query: String,
    collection_id: Option<String>,
    #[serde(default)]
    include_archived: bool,
    #[serde(default = "default_true")]
    include_drafts: bool,
    #[serde(default = "default_search_limit")]
    limit: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentArgs {
    document_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocumentArgs {
    title: String,
    text: String,
    collection_id: String,
    parent_document_id: Option<String>,
    #[serde(default = "default_true")]
    publish: bool,
    icon: Option<String>,
    color: Option<String>,
    #[serde(default)]
    full_width: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateDocumentArgs {
    document_id: String,
    title: Option<String>,
    text: Option<String>,
    #[serde(default)]
    append: bool,
    publish: Option<bool>,
    icon: Option<String>,
    color: Option<String>,
    full_width: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteDocumentArgs {
    document_id: String,
    #[serde(default)]
    permanent: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevisionArgs {
    revision_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestoreArgs {
    document_id: String,
    revision_id: String,
    collection_id: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_search_limit() -> i64 {
    SEARCH_DEFAULT_LIMIT
}

/// Run one tool and render its JSON answer. `arguments` may be `null` for
/// tools without parameters.
pub fn call_tool<T: Transport>(
    client: &OutlineClient<T>,
    name: &str,
    arguments: Value,
    cancel: &CancelToken,
) -> Result<String, ToolError> {
    tracing::debug!(tool = name, "tool call");
    let outcome = match name {
        "list_collections" => list_collections(client, cancel),
        "create_collection" => create_collection(client, parse_args(name, arguments)?, cancel),
        "search_documents" => search_documents(client, parse_args(name, arguments)?, cancel),
        "get_document" => get_document(client, parse_args(name, arguments)?, cancel),
        "create_document" => create_document(client, parse_args(name, arguments)?, cancel),
        "update_document" => update_document(client, parse_args(name, arguments)?, cancel),
        "delete_document" => Ok(delete_document(client, parse_args(name, arguments)?, cancel)),
        "list_revisions" => list_revisions(client, parse_args(name, arguments)?, cancel),
        "get_revision" => get_revision(client, parse_args(name, arguments)?, cancel),
        "restore_revision" => restore_revision(client, parse_args(name, arguments)?, cancel),
        _ => return Err(ToolError::UnknownTool(name.to_string())),
    };

    let rendered = match outcome {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(tool = name, kind = ?error.kind(), "tool failed: {error}");
            render_failure(&error)
        }
    };
    Ok(pretty(&rendered))
}

fn parse_args<A: DeserializeOwned>(tool: &str, arguments: Value) -> Result<A, ToolError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|source| ToolError::InvalidArguments {
        tool: tool.to_string(),
        source,
    })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Failure document for a client error. Optional fields only appear when the
/// error kind carries them.
pub fn render_failure(error: &OutlineError) -> Value {
    let tag = match error.kind() {
        ErrorKind::Validation => "validation_error",
        ErrorKind::Authentication => "authentication_error",
        ErrorKind::NotFound => "not_found",
        ErrorKind::RateLimit => "rate_limit_exceeded",
        ErrorKind::Api => error.error_code().unwrap_or("api_error"),
        ErrorKind::Timeout => "timeout",
        ErrorKind::Network => "network_error",
    };

    let mut failure = Map::new();
    failure.insert("success".into(), json!(false));
    failure.insert("error".into(), json!(tag));
    failure.insert("message".into(), json!(error.to_string()));
    if let Some(details) = error.field_errors() {
        failure.insert("details".into(), json!(details));
    }
    if let Some(status) = error
        .status_code()
        .filter(|_| error.kind() != ErrorKind::Validation)
    {
        failure.insert("statusCode".into(), json!(status));
    }
    if let Some(retry_after) = error.retry_after() {
        failure.insert("retryAfter".into(), json!(retry_after));
    }
    if let Some(hint) = error.hint() {
        failure.insert("hint".into(), json!(hint));
    }
    Value::Object(failure)
}

type ToolResult = crate::error::Result<Value>;

fn list_collections<T: Transport>(client: &OutlineClient<T>, cancel: &CancelToken) -> ToolResult {
    let collections = client.list_collections(cancel)?;
    let rows: Vec<Value> = collections
        .iter()
        .map(|collection| {
            json!({
                "id": collection.id,
                "name": collection.name,
                "description": collection.description,
                "icon": collection.icon,
                "color": collection.color,
                "permission": collection.permission,
                "createdAt": collection.created_at,
                "updatedAt": collection.updated_at,
            })
        })
        .collect();
    Ok(Value::Array(rows))
}

fn create_collection<T: Transport>(
    client: &OutlineClient<T>,
    args: CreateCollectionArgs,
    cancel: &CancelToken,
) -> ToolResult {
    let request = CreateCollectionRequest {
        name: args.name,
        description: args.description,
        icon: args.icon,
        color: args.color,
        permission: Some(
            args.permission
                .unwrap_or_else(|| PERMISSION_READ_WRITE.to_string()),
        ),
        sharing: None,
    };
    let collection = client.create_collection(&request, cancel)?;
    Ok(json!({
        "success": true,
        "id": collection.id,
        "name": collection.name,
        "description": collection.description,
        "icon": collection.icon,
        "color": collection.color,
        "permission": collection.permission,
        "createdAt": collection.created_at,
        "url": format!("{}/collection/{}", client.base_url(), collection.id),
    }))
}

fn search_documents<T: Transport>(
    client: &OutlineClient<T>,
    args: SearchArgs,
    cancel: &CancelToken,
) -> ToolResult {
    let mut request = SearchDocumentsRequest::new(args.query);
    request.collection_id = args.collection_id;
    request.include_archived = Some(args.include_archived);
    request.include_drafts = Some(args.include_drafts);
    request.limit = Some(args.limit);

    let results = client.search_documents(request, cancel)?;
    let rows: Vec<Value> = results
        .iter()
        .map(|result| {
            json!({
                "ranking": result.ranking,
                "context": result.context,
                "document": {
                    "id": result.document.id,
                    "title": result.document.title,
                    "urlId": result.document.url_id,
                    "collectionId": result.document.collection_id,
                    "createdAt": result.document.created_at,
                    "updatedAt": result.document.updated_at,
                },
            })
        })
        .collect();
    Ok(Value::Array(rows))
}

fn get_document<T: Transport>(
    client: &OutlineClient<T>,
    args: DocumentArgs,
    cancel: &CancelToken,
) -> ToolResult {
    let document = client.get_document(&args.document_id, cancel)?;
    Ok(json!({
        "id": document.id,
        "title": document.title,
        "text": document.text,
        "urlId": document.url_id,
        "collectionId": document.collection_id,
        "parentDocumentId": document.parent_document_id,
        "publishedAt": document.published_at,
        "createdAt": document.created_at,
        "updatedAt": document.updated_at,
        "createdBy": document.created_by.as_ref().map(|user| &user.name),
        "updatedBy": document.updated_by.as_ref().map(|user| &user.name),
        "icon": document.icon,
        "emoji": document.emoji,
        "color": document.color,
        "template": document.template,
        "fullWidth": document.full_width,
        "revision": document.revision,
    }))
}

fn create_document<T: Transport>(
    client: &OutlineClient<T>,
    args: CreateDocumentArgs,
    cancel: &CancelToken,
) -> ToolResult {
    let request = CreateDocumentRequest {
        title: args.title,
        text: args.text,
        collection_id: args.collection_id,
        parent_document_id: args.parent_document_id,
        publish: Some(args.publish),
        icon: args.icon,
        color: args.color,
        full_width: Some(args.full_width),
        ..CreateDocumentRequest::default()
    };
    let document = client.create_document(&request, cancel)?;
    Ok(json!({
        "success": true,
        "id": document.id,
        "title": document.title,
        "urlId": document.url_id,
        "collectionId": document.collection_id,
        "parentDocumentId": document.parent_document_id,
        "publishedAt": document.published_at,
        "createdAt": document.created_at,
        "icon": document.icon,
        "color": document.color,
        "fullWidth": document.full_width,
        "url": document_url(client, &document),
    }))
}

fn update_document<T: Transport>(
    client: &OutlineClient<T>,
    args: UpdateDocumentArgs,
    cancel: &CancelToken,
) -> ToolResult {
    let request = UpdateDocumentRequest {
        title: args.title,
        text: args.text,
        append: Some(args.append),
        publish: args.publish,
        icon: args.icon,
        color: args.color,
        full_width: args.full_width,
        ..UpdateDocumentRequest::default()
    };
    let document = client.update_document(&args.document_id, &request, cancel)?;
    Ok(json!({
        "success": true,
        "id": document.id,
        "title": document.title,
        "urlId": document.url_id,
        "collectionId": document.collection_id,
        "publishedAt": document.published_at,
        "updatedAt": document.updated_at,
        "icon": document.icon,
        "color": document.color,
        "fullWidth": document.full_width,
        "revision": document.revision,
        "url": document_url(client, &document),
    }))
}

fn delete_document<T: Transport>(
    client: &OutlineClient<T>,
    args: DeleteDocumentArgs,
    cancel: &CancelToken,
) -> Value {
    let success = client.delete_document(&args.document_id, args.permanent, cancel);
    let message = match (success, args.permanent) {
        (false, _) => "Document could not be deleted",
        (true, true) => "Document permanently deleted",
        (true, false) => "Document moved to trash",
    };
    json!({
        "success": success,
        "documentId": args.document_id,
        "permanent": args.permanent,
        "message": message,
    })
}

fn list_revisions<T: Transport>(
    client: &OutlineClient<T>,
    args: DocumentArgs,
    cancel: &CancelToken,
) -> ToolResult {
    let revisions = client.list_revisions(&args.document_id, cancel)?;
    let rows: Vec<Value> = revisions.iter().map(revision_summary).collect();
    Ok(json!({
        "documentId": args.document_id,
        "totalRevisions": rows.len(),
        "revisions": rows,
    }))
}

fn revision_summary(revision: &Revision) -> Value {
    json!({
        "id": revision.id,
        "documentId": revision.document_id,
        "title": revision.title,
        "createdAt": revision.created_at,
        "createdBy": revision.created_by.as_ref().map(|user| &user.name),
        "createdByEmail": revision.created_by.as_ref().and_then(|user| user.email.as_ref()),
        "collectionId": revision.collection_id,
        "preview": revision.text.as_deref().map(preview),
    })
}

fn get_revision<T: Transport>(
    client: &OutlineClient<T>,
    args: RevisionArgs,
    cancel: &CancelToken,
) -> ToolResult {
    let revision = client.get_revision(&args.revision_id, cancel)?;
    let author = revision.created_by.as_ref();
    Ok(json!({
        "id": revision.id,
        "documentId": revision.document_id,
        "title": revision.title,
        "text": revision.text,
        "createdAt": revision.created_at,
        "createdBy": {
            "id": author.map(|user| &user.id),
            "name": author.map(|user| &user.name),
            "email": author.and_then(|user| user.email.as_ref()),
        },
        "collectionId": revision.collection_id,
    }))
}

fn restore_revision<T: Transport>(
    client: &OutlineClient<T>,
    args: RestoreArgs,
    cancel: &CancelToken,
) -> ToolResult {
    let document = client.restore_document(
        &args.document_id,
        &args.revision_id,
        args.collection_id.as_deref(),
        cancel,
    )?;
    Ok(json!({
        "success": true,
        "documentId": args.document_id,
        "revisionId": args.revision_id,
        "document": {
            "id": document.id,
            "title": document.title,
            "urlId": document.url_id,
            "collectionId": document.collection_id,
            "updatedAt": document.updated_at,
            "revision": document.revision,
            "url": document_url(client, &document),
        },
        "message": format!("Document successfully restored to revision {}", args.revision_id),
    }))
}

fn document_url<T: Transport>(client: &OutlineClient<T>, document: &Document) -> String {
    format!(
        "{}/doc/{}",
        client.base_url(),
        document.url_id.as_deref().unwrap_or(&document.id)
    )
}

/// First 100 characters, with `...` when anything was cut.
fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
