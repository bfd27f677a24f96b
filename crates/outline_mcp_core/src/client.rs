use serde::Serialize;
use serde_json::json;

use crate::config::{ClientConfig, normalize_base_url};
use crate::envelope::{
    COLLECTION_FIELDS, COLLECTION_LIST_FIELDS, DOCUMENT_FIELDS, Envelope, REVISION_FIELDS,
    REVISION_LIST_FIELDS, SEARCH_RESULT_FIELDS,
};
use crate::error::{OutlineError, Result};
use crate::models::{
    Collection, CreateCollectionRequest, CreateDocumentRequest, Document, Revision,
    SearchDocumentsRequest, SearchResult, UpdateDocumentRequest,
};
use crate::transport::{CancelToken, HttpTransport, Transport, TransportError};
use crate::validation::{
    PERMISSION_READ_WRITE, validate_create_collection, validate_create_document,
    validate_search, validate_update_document,
};

/// Outline REST client. Holds no per-call state, so a shared reference can be
/// used from several threads at once.
pub struct OutlineClient<T: Transport = HttpTransport> {
    base_url: String,
    transport: T,
}

impl OutlineClient<HttpTransport> {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(&config.base_url, transport))
    }
}

impl<T: Transport> OutlineClient<T> {
    pub fn with_transport(base_url: &str, transport: T) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn list_collections(&self, cancel: &CancelToken) -> Result<Vec<Collection>> {
        let envelope = self.post("collections.list", &json!({}), cancel)?;
        envelope.list(COLLECTION_LIST_FIELDS)
    }

    /// Permission defaults to `read_write` on the wire when the caller leaves it unset.
    pub fn create_collection(
        &self,
        request: &CreateCollectionRequest,
        cancel: &CancelToken,
    ) -> Result<Collection> {
        validate_create_collection(request)?;
        let mut payload = request.clone();
        if payload.permission.is_none() {
            payload.permission = Some(PERMISSION_READ_WRITE.to_string());
        }
        let envelope = self.post("collections.create", &payload, cancel)?;
        require(
            envelope.single(COLLECTION_FIELDS)?,
            "Failed to create collection: API returned null data",
        )
    }

    pub fn search_documents(
        &self,
        mut request: SearchDocumentsRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<SearchResult>> {
        validate_search(&mut request)?;
        let envelope = self.post("documents.search", &request, cancel)?;
        envelope.list(SEARCH_RESULT_FIELDS)
    }

    pub fn get_document(&self, document_id: &str, cancel: &CancelToken) -> Result<Document> {
        if document_id.trim().is_empty() {
            return Err(OutlineError::invalid_field(
                "documentId",
                "Document ID is required",
            ));
        }
        let envelope = self.post("documents.info", &json!({ "id": document_id }), cancel)?;
        envelope
            .single(DOCUMENT_FIELDS)?
            .ok_or_else(|| OutlineError::not_found("Document", document_id))
    }

    pub fn create_document(
        &self,
        request: &CreateDocumentRequest,
        cancel: &CancelToken,
    ) -> Result<Document> {
        validate_create_document(request)?;
        let envelope = self.post("documents.create", request, cancel)?;
        require(
            envelope.single(DOCUMENT_FIELDS)?,
            "Failed to create document: API returned null data",
        )
    }

    pub fn update_document(
        &self,
        document_id: &str,
        request: &UpdateDocumentRequest,
        cancel: &CancelToken,
    ) -> Result<Document> {
        validate_update_document(document_id, request)?;
        let payload = DocumentUpdatePayload {
            id: document_id,
            update: request,
        };
        let envelope = self.post("documents.update", &payload, cancel)?;
        require(
            envelope.single(DOCUMENT_FIELDS)?,
            format!("Failed to update document {document_id}: API returned null data"),
        )
    }

    /// Boolean form of [`OutlineClient::try_delete_document`]. Any failure,
    /// including "already deleted", collapses to `false`; the underlying error
    /// is emitted as a warning event.
    pub fn delete_document(&self, document_id: &str, permanent: bool, cancel: &CancelToken) -> bool {
        match self.try_delete_document(document_id, permanent, cancel) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    document_id,
                    permanent,
                    kind = ?error.kind(),
                    status = ?error.status_code(),
                    "document delete failed: {error}"
                );
                false
            }
        }
    }

    pub fn try_delete_document(
        &self,
        document_id: &str,
        permanent: bool,
        cancel: &CancelToken,
    ) -> Result<()> {
        self.post(
            "documents.delete",
            &json!({ "id": document_id, "permanent": permanent }),
            cancel,
        )?;
        Ok(())
    }

    pub fn list_revisions(&self, document_id: &str, cancel: &CancelToken) -> Result<Vec<Revision>> {
        let envelope = self.post(
            "revisions.list",
            &json!({ "documentId": document_id }),
            cancel,
        )?;
        envelope.first_non_empty_list(REVISION_LIST_FIELDS)
    }

    pub fn get_revision(&self, revision_id: &str, cancel: &CancelToken) -> Result<Revision> {
        let envelope = self.post("revisions.info", &json!({ "id": revision_id }), cancel)?;
        envelope
            .single(REVISION_FIELDS)?
            .ok_or_else(|| OutlineError::not_found("Revision", revision_id))
    }

    /// Restoring appends a new revision; history is never rewritten.
    pub fn restore_document(
        &self,
        document_id: &str,
        revision_id: &str,
        collection_id: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<Document> {
        let payload = RestorePayload {
            id: document_id,
            revision_id,
            collection_id,
        };
        let envelope = self.post("documents.restore", &payload, cancel)?;
        require(
            envelope.single(DOCUMENT_FIELDS)?,
            format!("Failed to restore document {document_id} to revision {revision_id}"),
        )
    }

    fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        cancel: &CancelToken,
    ) -> Result<Envelope> {
        let payload = serde_json::to_string(body).map_err(|error| OutlineError::Api {
            message: format!("Failed to serialize request for {endpoint}"),
            status: 500,
            code: Some("serialization_failed".to_string()),
            body: Some(error.to_string()),
        })?;

        tracing::debug!(endpoint, "outline api request");
        let reply = match self.transport.post_json(endpoint, payload, cancel) {
            Ok(reply) => reply,
            Err(error) => {
                let error = map_transport_error(error);
                tracing::warn!(endpoint, "outline api transport failure: {error}");
                return Err(error);
            }
        };

        if !reply.is_success() {
            tracing::warn!(
                endpoint,
                status = reply.status,
                body = %reply.body,
                "outline api response failed"
            );
            return Err(OutlineError::from_status(reply.status, endpoint, &reply.body));
        }

        tracing::debug!(endpoint, status = reply.status, "outline api response ok");
        Envelope::parse(&reply.body)
    }
}

#[derive(Serialize)]
struct DocumentUpdatePayload<'a> {
    id: &'a str,
    #[serde(flatten)]
    update: &'a UpdateDocumentRequest,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RestorePayload<'a> {
    id: &'a str,
    revision_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection_id: Option<&'a str>,
}

fn require<T>(value: Option<T>, message: impl Into<String>) -> Result<T> {
    value.ok_or_else(|| OutlineError::null_response(message))
}

fn map_transport_error(error: TransportError) -> OutlineError {
    match error {
        TransportError::Timeout(detail) => OutlineError::Timeout { detail },
        TransportError::Cancelled => OutlineError::Timeout {
            detail: "request cancelled by caller".to_string(),
        },
        TransportError::Network(detail) => OutlineError::Network { detail },
    }
}
