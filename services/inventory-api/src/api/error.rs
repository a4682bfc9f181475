use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stockroom_idformat::FormatError;

use crate::identifiers::Resolution;

#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub code: String,
    pub request_id: String,
    pub retryable: bool,
    /// What the user should do next, for identifier assignment failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ProblemDetails {
    fn new(status: StatusCode, code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        let title = status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string();
        Self {
            r#type: format!("https://stockroom.dev/problems/{code}"),
            title,
            status: status.as_u16(),
            detail: detail.into(),
            instance: None,
            code,
            request_id: "unknown".to_string(),
            retryable: false,
            resolution: None,
            details: None,
        }
    }

    fn set_request_id(&mut self, request_id: impl Into<String>) {
        let request_id = request_id.into();
        self.request_id = request_id.clone();
        if self.instance.is_none() {
            self.instance = Some(request_id);
        }
    }

    fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = Some(resolution);
        self.retryable = resolution == Resolution::TryAgain;
    }

    fn set_details(&mut self, details: Vec<FieldError>) {
        self.details = Some(details);
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub problem: Box<ProblemDetails>,
}

impl ApiError {
    fn with_status(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CONFLICT, code, message)
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, code, message)
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, code, message)
    }

    pub fn service_unavailable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, code, message)
    }

    /// A rejected format, pointing at the offending element.
    pub fn invalid_format(e: &FormatError) -> Self {
        Self::bad_request(e.code(), e.to_string()).with_details(vec![FieldError {
            field: format!("format[{}]", e.index),
            message: e.source.to_string(),
        }])
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.problem.set_request_id(request_id);
        self
    }

    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.problem.set_details(details);
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.problem.set_resolution(resolution);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.problem)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use stockroom_idformat::{IdentifierFormat, RawFormatElement};

    use super::*;

    #[test]
    fn invalid_format_names_the_element() {
        let err = IdentifierFormat::validate(vec![
            RawFormatElement::literal("A"),
            RawFormatElement {
                kind: "emoji".to_string(),
                value: None,
                min_width: None,
            },
        ])
        .unwrap_err();

        let api = ApiError::invalid_format(&err).with_request_id("req_1");
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.problem.code, "invalid_element");
        assert_eq!(api.problem.instance.as_deref(), Some("req_1"));
        let details = api.problem.details.as_ref().unwrap();
        assert_eq!(details[0].field, "format[1]");
    }

    #[test]
    fn try_again_resolution_is_retryable() {
        let api = ApiError::conflict("duplicate_identifier", "taken")
            .with_resolution(Resolution::TryAgain);
        let body = serde_json::to_value(&*api.problem).unwrap();
        assert_eq!(body["retryable"], true);
        assert_eq!(body["resolution"], "try-again");

        let api = ApiError::service_unavailable("counter_unavailable", "down")
            .with_resolution(Resolution::ContactAdministrator);
        assert!(!api.problem.retryable);
    }
}
