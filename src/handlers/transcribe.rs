//! # Transcription Endpoint
//!
//! `POST /transcribe` takes a `multipart/form-data` body with one file part,
//! saves the file, runs the transcription tool on it and answers with the
//! tool's JSON transcript.
//!
//! ## Responses:
//! - `200` `application/json`: the transcript file, byte for byte
//! - `400` `text/plain`: not multipart, no file part, or an unparseable part
//! - `500` `text/plain`: the tool left no transcript (exit code, stdout and
//!   stderr are in the body), or something failed on our side
//!
//! ## Example:
//! ```text
//! curl -F "file=@clip.mp3" http://localhost:5001/transcribe
//! ```

use crate::error::AppError;
use crate::middleware::RequestId;
use crate::multipart;
use crate::state::AppState;
use actix_web::http::header::{self, ContentType};
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use tracing::info;

pub async fn transcribe(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let request_id = req.extensions().get::<RequestId>().map(|id| id.0);
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let result = async {
        let file = multipart::decode(content_type, &body)?;
        info!(
            request_id = ?request_id,
            filename = %file.filename,
            size_bytes = file.bytes.len(),
            "Received upload"
        );
        state.pipeline.run(file).await?.into_transcript()
    }
    .await;

    match result {
        Ok(transcript) => Ok(HttpResponse::Ok()
            .insert_header(ContentType::json())
            .body(transcript)),
        Err(err) => {
            err.log();
            Err(err)
        }
    }
}
