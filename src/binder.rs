//! Request binding: body and query decoding into typed records.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{header::CONTENT_TYPE, request::Parts, StatusCode},
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Body decoded from JSON or `application/x-www-form-urlencoded`,
/// chosen by Content-Type
#[derive(Debug, Clone)]
pub struct Bound<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Bound<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| {
                value
                    .to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded")
            })
            .unwrap_or(false);

        if is_form {
            let Form(value) = Form::<T>::from_request(req, state).await.map_err(|rejection| {
                tracing::debug!("Form binding failed: {}", rejection);
                body_rejection(rejection.status())
            })?;
            Ok(Bound(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
                tracing::debug!("JSON binding failed: {}", rejection);
                body_rejection(rejection.status())
            })?;
            Ok(Bound(value))
        }
    }
}

fn body_rejection(status: StatusCode) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Request body exceeds the size limit")
    } else {
        ApiError::bad_request("Invalid input")
    }
}

/// Query string decoded into `T`
#[derive(Debug, Clone)]
pub struct BoundQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for BoundQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::debug!("Query binding failed: {}", rejection);
                ApiError::bad_request("Invalid query parameters")
            })?;
        Ok(BoundQuery(value))
    }
}

/// Parse a numeric path id
pub fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ApiError::bad_request("Invalid user ID"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        name: String,
        #[serde(default)]
        email: String,
    }

    fn request(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = axum::http::Request::builder().method("POST").uri("/users");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn binds_json_and_form() {
        let Bound(json) = Bound::<Payload>::from_request(
            request(Some("application/json"), r#"{"name":"Ana","email":"ana@example.com"}"#),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(json.email, "ana@example.com");

        let Bound(form) = Bound::<Payload>::from_request(
            request(Some("application/x-www-form-urlencoded"), "name=Ana+Lima&email=a%40b.io"),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(form.name, "Ana Lima");
        assert_eq!(form.email, "a@b.io");
    }

    #[tokio::test]
    async fn bad_bodies_are_invalid_input() {
        for (ct, body) in [
            (Some("application/json"), "{not json"),
            (Some("application/json"), r#"{"email":"x@y.io"}"#),
            (None, r#"{"name":"Ana"}"#),
        ] {
            let err = Bound::<Payload>::from_request(request(ct, body), &()).await.unwrap_err();
            assert_eq!(err.message(), "Invalid input");
        }
    }

    #[tokio::test]
    async fn oversized_bodies_are_payload_too_large() {
        use axum::{extract::DefaultBodyLimit, response::IntoResponse, routing::post, Router};
        use tower::ServiceExt;

        async fn bind(result: Result<Bound<Payload>, ApiError>) -> axum::response::Response {
            match result {
                Ok(Bound(payload)) => payload.name.into_response(),
                Err(err) => err.into_response(),
            }
        }

        let router = Router::new()
            .route("/users", post(bind))
            .layer(DefaultBodyLimit::max(16));

        let long_name = "x".repeat(64);
        let json_body = format!(r#"{{"name":"{}"}}"#, long_name);
        let form_body = format!("name={}", long_name);

        for (ct, body) in [
            ("application/json", json_body),
            ("application/x-www-form-urlencoded", form_body),
        ] {
            let req = axum::http::Request::builder()
                .method("POST")
                .uri("/users")
                .header(CONTENT_TYPE, ct)
                .body(Body::from(body))
                .unwrap();
            let res = router.clone().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE, "content type {}", ct);
        }
    }

    #[test]
    fn parse_id_rejects_non_numeric() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert!(parse_id("abc").is_err());
        assert!(parse_id("-1").is_err());
    }
}
