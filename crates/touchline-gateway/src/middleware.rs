use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Deserialize)]
struct ChatBody {
    question: String,
}

/// Extractor for a chat request body with a non-empty `question`.
///
/// Malformed JSON and empty questions are both rejected with 422.
pub struct ValidQuestion(pub String);

impl<S> FromRequest<S> for ValidQuestion
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<ChatBody>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::validation(e.body_text()))?;
        if body.question.is_empty() {
            return Err(ApiError::validation("question must be at least 1 character"));
        }
        Ok(Self(body.question))
    }
}
