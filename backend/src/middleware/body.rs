//! Request body extractor for lifecycle actions whose body may be omitted

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON body that falls back to `T::default()` only when the request has no
/// body at all. A body that is present but does not deserialize is rejected
/// with `VALIDATION_ERROR`.
#[derive(Debug, Clone, Default)]
pub struct OptionalJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::ValidationError(rejection.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(T::default()));
        }

        Json::<T>::from_bytes(&bytes)
            .map(|Json(value)| OptionalJson(value))
            .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::orders::ReceiveOrderInput;
    use crate::services::stocktaking::CompleteStocktakingInput;
    use axum::body::Body;

    fn request(body: &'static str) -> Request {
        Request::builder()
            .method("PATCH")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_body_uses_default() {
        let OptionalJson(input) = OptionalJson::<ReceiveOrderInput>::from_request(request(""), &())
            .await
            .unwrap();
        assert!(input.items.is_empty());

        let OptionalJson(input) =
            OptionalJson::<CompleteStocktakingInput>::from_request(request("  \n"), &())
                .await
                .unwrap();
        assert!(input.apply_differences);
    }

    #[tokio::test]
    async fn test_partial_receipt_is_kept() {
        let body = r#"{"items":[{"item_id":"6f1c4f5e-1b0a-4c1e-9a55-3c2f3f0d8a11","quantity":2}]}"#;
        let OptionalJson(input) = OptionalJson::<ReceiveOrderInput>::from_request(request(body), &())
            .await
            .unwrap();
        assert_eq!(input.items.len(), 1);
        assert_eq!(input.items[0].quantity, 2);
    }

    /// A malformed receipt must not turn into a full receipt
    #[tokio::test]
    async fn test_malformed_receipt_rejected() {
        let body = r#"{"items":[{"item_id":"6f1c4f5e-1b0a-4c1e-9a55-3c2f3f0d8a11","quantity":"2"}]}"#;
        let result = OptionalJson::<ReceiveOrderInput>::from_request(request(body), &()).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    /// A malformed completion must not default to applying differences
    #[tokio::test]
    async fn test_malformed_completion_rejected() {
        let body = r#"{"apply_differences":"no"}"#;
        let result = OptionalJson::<CompleteStocktakingInput>::from_request(request(body), &()).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        let result = OptionalJson::<CompleteStocktakingInput>::from_request(request("{"), &()).await;
        assert!(result.is_err());
    }
}
