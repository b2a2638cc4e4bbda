use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::error;

use crate::errors::{CoreError, CoreErrorKind};

pub fn status_for(kind: CoreErrorKind) -> StatusCode {
    match kind {
        CoreErrorKind::NotFound => StatusCode::NOT_FOUND,
        CoreErrorKind::Validation => StatusCode::BAD_REQUEST,
        CoreErrorKind::Conflict => StatusCode::CONFLICT,
        CoreErrorKind::Inconsistency | CoreErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Error body: `{"detail": ..., "code": ...}` plus any structured fields.
impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());
        if status.is_server_error() {
            match std::error::Error::source(&self) {
                Some(source) => error!("{} (caused by: {})", self, source),
                None => error!("{}", self),
            }
        }

        let mut body = Map::new();
        if let Some(fields) = self.fields() {
            for (key, value) in fields {
                body.insert(key.clone(), json!(value));
            }
        }
        body.insert("detail".to_string(), json!(self.message()));
        body.insert("code".to_string(), json!(self.kind().code()));

        (status, Json(Value::Object(body))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn not_found_body_carries_fields() {
        let response = CoreError::not_found("StoryJob", "abc").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["detail"], "StoryJob not found");
        assert_eq!(body["entity"], "StoryJob");
        assert_eq!(body["id"], "abc");
    }

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(status_for(CoreErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(CoreErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(CoreErrorKind::Inconsistency),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
