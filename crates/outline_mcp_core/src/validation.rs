//! Local request checks run before any network call.
//!
//! Each rule is independent. A request's violations are gathered into one
//! field map and reported together as a single validation error.

use crate::error::{FieldErrors, OutlineError, Result};
use crate::models::{
    CreateCollectionRequest, CreateDocumentRequest, SearchDocumentsRequest, UpdateDocumentRequest,
};

pub const NAME_MIN_LENGTH: usize = 1;
pub const NAME_MAX_LENGTH: usize = 255;
pub const CONTENT_MAX_LENGTH: usize = 10_000_000;

pub const SEARCH_MIN_LIMIT: i64 = 1;
pub const SEARCH_MAX_LIMIT: i64 = 100;
pub const SEARCH_DEFAULT_LIMIT: i64 = 25;

pub const PERMISSION_READ: &str = "read";
pub const PERMISSION_READ_WRITE: &str = "read_write";
pub const PERMISSIONS: [&str; 2] = [PERMISSION_READ, PERMISSION_READ_WRITE];

const COLOR_MESSAGE: &str = "Color must be in hex format: #RRGGBB (e.g., #FF5733)";
const ICON_MESSAGE: &str = "Use null for no icon, or provide a single emoji character. Named icons like 'BEAKER' are not supported.";

pub fn is_valid_name(name: Option<&str>) -> bool {
    let Some(name) = name else {
        return false;
    };
    let length = name.trim().chars().count();
    (NAME_MIN_LENGTH..=NAME_MAX_LENGTH).contains(&length)
}

pub fn is_valid_content(text: Option<&str>) -> bool {
    text.is_none_or(|text| text.chars().count() <= CONTENT_MAX_LENGTH)
}

pub fn is_valid_permission(permission: Option<&str>) -> bool {
    permission.is_none_or(|permission| {
        PERMISSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(permission))
    })
}

pub fn is_valid_color(color: Option<&str>) -> bool {
    let Some(color) = non_blank(color) else {
        return true;
    };
    match color.strip_prefix('#') {
        Some(hex) => hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Outline accepts a literal emoji or nothing. Named icons such as `BEAKER`
/// are rejected.
///
/// This is a coarse heuristic rather than a Unicode emoji check: all-uppercase
/// or all-alphanumeric values are rejected and anything else passes through
/// for the server to judge.
pub fn is_valid_icon(icon: Option<&str>) -> bool {
    let Some(icon) = non_blank(icon) else {
        return true;
    };
    let all_upper = icon.chars().all(char::is_uppercase);
    let all_alphanumeric = icon.chars().all(char::is_alphanumeric);
    !(all_upper || all_alphanumeric)
}

pub fn normalize_search_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(value) if value >= SEARCH_MIN_LIMIT => value.min(SEARCH_MAX_LIMIT),
        _ => SEARCH_DEFAULT_LIMIT,
    }
}

pub fn validate_create_collection(request: &CreateCollectionRequest) -> Result<()> {
    let mut errors = Violations::default();
    if !is_valid_name(Some(&request.name)) {
        errors.add("name", name_message("Name", true));
    }
    if !is_valid_permission(request.permission.as_deref()) {
        errors.add(
            "permission",
            format!("Permission must be one of: {}", PERMISSIONS.join(", ")),
        );
    }
    check_style(&mut errors, request.color.as_deref(), request.icon.as_deref());
    errors.finish("CreateCollectionRequest")
}

pub fn validate_create_document(request: &CreateDocumentRequest) -> Result<()> {
    let mut errors = Violations::default();
    if !is_valid_name(Some(&request.title)) {
        errors.add("title", name_message("Title", true));
    }
    if !is_valid_content(Some(&request.text)) {
        errors.add("text", content_message());
    }
    if request.collection_id.trim().is_empty() {
        errors.add("collectionId", "Collection ID is required");
    }
    check_style(&mut errors, request.color.as_deref(), request.icon.as_deref());
    errors.finish("CreateDocumentRequest")
}

pub fn validate_update_document(document_id: &str, request: &UpdateDocumentRequest) -> Result<()> {
    let mut errors = Violations::default();
    if document_id.trim().is_empty() {
        errors.add("documentId", "Document ID is required");
    }
    if request.title.is_some() && !is_valid_name(request.title.as_deref()) {
        errors.add("title", name_message("Title", false));
    }
    if !is_valid_content(request.text.as_deref()) {
        errors.add("text", content_message());
    }
    check_style(&mut errors, request.color.as_deref(), request.icon.as_deref());
    errors.finish("UpdateDocumentRequest")
}

/// Checks the query and clamps the limit in place. The limit never fails.
pub fn validate_search(request: &mut SearchDocumentsRequest) -> Result<()> {
    let mut errors = Violations::default();
    if request.query.trim().is_empty() {
        errors.add("query", "Search query is required");
    }
    request.limit = Some(normalize_search_limit(request.limit));
    errors.finish("SearchDocumentsRequest")
}

#[derive(Default)]
struct Violations(FieldErrors);

impl Violations {
    fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    fn finish(self, request_name: &str) -> Result<()> {
        if self.0.is_empty() {
            return Ok(());
        }
        Err(OutlineError::validation(
            format!("Validation failed for {request_name}"),
            self.0,
        ))
    }
}

fn check_style(errors: &mut Violations, color: Option<&str>, icon: Option<&str>) {
    if !is_valid_color(color) {
        errors.add("color", COLOR_MESSAGE);
    }
    if !is_valid_icon(icon) {
        errors.add("icon", ICON_MESSAGE);
    }
}

fn name_message(label: &str, required: bool) -> String {
    if required {
        format!(
            "{label} is required and must be between {NAME_MIN_LENGTH} and {NAME_MAX_LENGTH} characters"
        )
    } else {
        format!("{label} must be between {NAME_MIN_LENGTH} and {NAME_MAX_LENGTH} characters")
    }
}

fn content_message() -> String {
    format!("Text content exceeds maximum length of {CONTENT_MAX_LENGTH} characters")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(name: &str) -> CreateCollectionRequest {
        CreateCollectionRequest {
            name: name.to_string(),
            ..CreateCollectionRequest::default()
        }
    }

    fn field_errors(error: OutlineError) -> FieldErrors {
        error.field_errors().cloned().expect("validation error")
    }

    #[test]
    fn color_accepts_only_six_hex_digits_after_hash() {
        for valid in [None, Some(""), Some("  "), Some("#FF5733"), Some("#000000"), Some("#ff5733")] {
            assert!(is_valid_color(valid), "{valid:?} should be valid");
        }
        for invalid in ["FF5733", "#FF57", "#FF573333", "#GGGGGG", "#FF573"] {
            assert!(!is_valid_color(Some(invalid)), "{invalid} should be invalid");
        }
    }

    #[test]
    fn name_length_bounds() {
        assert!(is_valid_name(Some("A")));
        assert!(is_valid_name(Some("Valid Name")));
        assert!(is_valid_name(Some(&"x".repeat(255))));
        assert!(is_valid_name(Some("  padded  ")));
        assert!(!is_valid_name(Some(&"x".repeat(256))));
        assert!(!is_valid_name(Some("")));
        assert!(!is_valid_name(Some("   ")));
        assert!(!is_valid_name(None));
    }

    #[test]
    fn icon_heuristic_rejects_named_icons() {
        assert!(is_valid_icon(None));
        assert!(is_valid_icon(Some("")));
        assert!(is_valid_icon(Some("📚")));
        assert!(is_valid_icon(Some("🚀")));
        assert!(!is_valid_icon(Some("BEAKER")));
        assert!(!is_valid_icon(Some("beaker")));
        assert!(!is_valid_icon(Some("icon42")));
    }

    #[test]
    fn permission_is_case_insensitive() {
        assert!(is_valid_permission(None));
        assert!(is_valid_permission(Some("read")));
        assert!(is_valid_permission(Some("READ_WRITE")));
        assert!(!is_valid_permission(Some("admin")));
        assert!(!is_valid_permission(Some("")));
    }

    #[test]
    fn content_limit() {
        assert!(is_valid_content(None));
        assert!(is_valid_content(Some("")));
        assert!(is_valid_content(Some(&"a".repeat(CONTENT_MAX_LENGTH))));
        assert!(!is_valid_content(Some(&"a".repeat(CONTENT_MAX_LENGTH + 1))));
    }

    #[test]
    fn search_limit_normalization() {
        assert_eq!(normalize_search_limit(None), 25);
        assert_eq!(normalize_search_limit(Some(0)), 25);
        assert_eq!(normalize_search_limit(Some(-1)), 25);
        assert_eq!(normalize_search_limit(Some(1)), 1);
        assert_eq!(normalize_search_limit(Some(25)), 25);
        assert_eq!(normalize_search_limit(Some(100)), 100);
        assert_eq!(normalize_search_limit(Some(150)), 100);
    }

    #[test]
    fn collection_name_bounds_drive_name_error() {
        assert!(validate_create_collection(&collection("Engineering")).is_ok());
        assert!(validate_create_collection(&collection(&"n".repeat(255))).is_ok());

        let too_long = "n".repeat(256);
        for bad in ["", too_long.as_str()] {
            let errors = field_errors(validate_create_collection(&collection(bad)).unwrap_err());
            assert!(errors.contains_key("name"));
            assert_eq!(errors.len(), 1);
        }
    }

    #[test]
    fn collection_errors_accumulate_across_fields() {
        let request = CreateCollectionRequest {
            name: String::new(),
            icon: Some("BEAKER".to_string()),
            color: Some("red".to_string()),
            permission: Some("owner".to_string()),
            ..CreateCollectionRequest::default()
        };
        let error = validate_create_collection(&request).unwrap_err();
        assert_eq!(error.to_string(), "Validation failed for CreateCollectionRequest");
        let errors = field_errors(error);
        let fields: Vec<_> = errors.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["color", "icon", "name", "permission"]);
        assert_eq!(
            errors["permission"],
            vec!["Permission must be one of: read, read_write"]
        );
    }

    #[test]
    fn create_document_requires_collection_id() {
        let request = CreateDocumentRequest {
            title: "Doc".to_string(),
            text: "body".to_string(),
            collection_id: "   ".to_string(),
            ..CreateDocumentRequest::default()
        };
        let errors = field_errors(validate_create_document(&request).unwrap_err());
        assert_eq!(errors["collectionId"], vec!["Collection ID is required"]);
    }

    #[test]
    fn update_only_checks_fields_that_are_present() {
        assert!(validate_update_document("doc-1", &UpdateDocumentRequest::default()).is_ok());

        let request = UpdateDocumentRequest {
            title: Some("  ".to_string()),
            ..UpdateDocumentRequest::default()
        };
        let errors = field_errors(validate_update_document("", &request).unwrap_err());
        assert!(errors.contains_key("documentId"));
        assert_eq!(
            errors["title"],
            vec!["Title must be between 1 and 255 characters"]
        );
    }

    #[test]
    fn search_normalizes_limit_in_place() {
        let mut request = SearchDocumentsRequest {
            query: "deploy".to_string(),
            limit: Some(150),
            ..SearchDocumentsRequest::default()
        };
        validate_search(&mut request).expect("valid search");
        assert_eq!(request.limit, Some(100));

        let mut request = SearchDocumentsRequest {
            query: "deploy".to_string(),
            ..SearchDocumentsRequest::default()
        };
        validate_search(&mut request).expect("valid search");
        assert_eq!(request.limit, Some(25));
    }

    #[test]
    fn search_requires_query_but_still_normalizes() {
        let mut request = SearchDocumentsRequest {
            query: " ".to_string(),
            limit: Some(0),
            ..SearchDocumentsRequest::default()
        };
        let errors = field_errors(validate_search(&mut request).unwrap_err());
        assert!(errors.contains_key("query"));
        assert_eq!(request.limit, Some(25));
    }
}
