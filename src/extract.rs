use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::AppError;

/// ValidatedJson
///
/// Drop-in replacement for `axum::Json` on request bodies. The body is deserialized
/// and then run through the `validator` derive, so a handler only ever sees a
/// well-formed payload. Malformed JSON and failed validation are both 400s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Caller address for the activity log: the first `x-forwarded-for` hop, then
/// `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|value| value.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}
