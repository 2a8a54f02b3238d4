use axum::{
    Json,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{Error, Result as StoreResult};

pub const CODE_OK: i32 = 0;
pub const CODE_ERR: i32 = 1;
/// Not an HTTP redirect: the login URL travels in `data`.
pub const CODE_REDIRECT: i32 = 302;
pub const CODE_DANGER_PASSWORD: i32 = 12001;

/// Standard response body. Every endpoint answers HTTP 200 with one of these;
/// callers inspect `code`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: i32,
    pub msg: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            code: CODE_OK,
            msg: "succ".to_string(),
            data,
        }
    }
}

impl Envelope<Value> {
    #[must_use]
    pub fn ok() -> Self {
        Self::success(Value::Null)
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// API error rendered as a non-zero envelope.
#[derive(Debug)]
pub struct ApiError {
    pub code: i32,
    pub msg: String,
    pub data: Value,
}

impl ApiError {
    #[must_use]
    pub fn new(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: Value::Null,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(CODE_ERR, message)
    }

    /// Malformed body or path parameter.
    #[must_use]
    pub fn invalid_parameter(detail: impl std::fmt::Display) -> Self {
        Self::new(CODE_ERR, format!("invalid parameter: {detail}"))
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CODE_ERR, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CODE_ERR, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(CODE_ERR, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CODE_ERR, message)
    }

    #[must_use]
    pub fn redirect(url: String) -> Self {
        Self::new(CODE_REDIRECT, "").with_data(url)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        Envelope {
            code: self.code,
            msg: self.msg,
            data: self.data,
        }
        .into_response()
    }
}

/// JSON body extractor whose rejection is an envelope instead of a 4xx.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::invalid_parameter(rejection.body_text())),
        }
    }
}

/// Extension trait for converting store results to API errors with a custom message.
/// Failures other than not-found are logged before conversion.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| match e {
            Error::NotFound => ApiError::not_found(message),
            e => {
                tracing::error!(error = %e, "{message}");
                ApiError::internal(message)
            }
        })
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_is_http_200_envelope() {
        let response = ApiError::bad_request("template error").into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["code"], 1);
        assert_eq!(body["msg"], "template error");
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_redirect_carries_url_in_data() {
        let body = body_json(ApiError::redirect("http://x/user/login".to_string()).into_response()).await;
        assert_eq!(body["code"], 302);
        assert_eq!(body["data"], "http://x/user/login");
    }

    #[test]
    fn test_store_not_found_maps_to_message() {
        let result: StoreResult<()> = Err(Error::NotFound);
        let err = result.api_err("table not found").unwrap_err();
        assert_eq!(err.code, CODE_ERR);
        assert_eq!(err.msg, "table not found");
    }
}
