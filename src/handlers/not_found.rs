use crate::error::AppError;
use actix_web::HttpResponse;

/// Fallback for every unmatched route and method.
pub async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound("Not found".to_string()))
}
