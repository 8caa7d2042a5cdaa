//! JSON body extractor that runs [`Validate`] before the handler sees it.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use relay_core::Validate;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Like [`Json`], but rejects with an [`ApiError`] body on malformed or
/// invalid input.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection: JsonRejection| {
                ApiError::invalid_format("body", "a JSON document")
                    .with_details(serde_json::json!({ "reason": rejection.body_text() }))
            })?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use axum::{body::Body, http::header};
    use relay_core::MessageDto;

    fn json_request(body: &'static str) -> Result<Request, String> {
        Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|e| e.to_string())
    }

    #[tokio::test]
    async fn test_valid_body() -> Result<(), String> {
        let request = json_request(r#"{"message":"hi","sendNotification":true}"#)?;
        let ValidatedJson(dto) = ValidatedJson::<MessageDto>::from_request(request, &())
            .await
            .map_err(|e| e.message)?;
        assert_eq!(dto.message, "hi");
        assert!(dto.send_notification);
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_message_fails_validation() -> Result<(), String> {
        let request = json_request(r#"{"message":"   "}"#)?;
        let err = ValidatedJson::<MessageDto>::from_request(request, &()).await.err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::MissingField));
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_body() -> Result<(), String> {
        let request = json_request("{not json")?;
        let err = ValidatedJson::<MessageDto>::from_request(request, &()).await.err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::InvalidFormat));
        Ok(())
    }
}
