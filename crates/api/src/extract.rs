//! Request extractors whose rejections render as [`AppError`] JSON bodies.
//!
//! Drop-in replacements for `axum::Json`, `Query` and `Path`. Axum's own
//! rejections are plain text; these report `VALIDATION_ERROR` like every
//! other client error.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AppError;

/// JSON body extractor and response.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query string extractor.
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Path parameter extractor.
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header::CONTENT_TYPE},
        routing::{get, post},
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize, Serialize)]
    struct Greeting {
        name: String,
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/greet",
                post(|Json(body): Json<Greeting>| async move { Json(body) }),
            )
            .route(
                "/search",
                get(|Query(query): Query<Greeting>| async move { query.name }),
            )
            .route("/items/{id}", get(|Path(id): Path<i32>| async move { id.to_string() }))
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    fn assert_validation_error(status: StatusCode, body: &serde_json::Value) {
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorCode"], "VALIDATION_ERROR");
        assert_eq!(body["statusCode"], 400);
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_valid_json_round_trips() {
        let (status, body) = send(
            Request::post("/greet")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name":"Ada"}"#))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ada");
    }

    #[tokio::test]
    async fn test_malformed_json_is_json_error() {
        let (status, body) = send(
            Request::post("/greet")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
        assert_validation_error(status, &body);

        let (status, body) = send(
            Request::post("/greet")
                .body(Body::from(r#"{"name":"Ada"}"#))
                .unwrap(),
        )
        .await;
        assert_validation_error(status, &body);
    }

    #[tokio::test]
    async fn test_missing_query_is_json_error() {
        let (status, body) = send(Request::get("/search").body(Body::empty()).unwrap()).await;
        assert_validation_error(status, &body);
    }

    #[tokio::test]
    async fn test_bad_path_is_json_error() {
        let (status, body) =
            send(Request::get("/items/abc").body(Body::empty()).unwrap()).await;
        assert_validation_error(status, &body);
    }
}
