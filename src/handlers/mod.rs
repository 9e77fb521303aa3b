pub mod not_found;
pub mod transcribe;

pub use not_found::*;
pub use transcribe::*;

use actix_web::web;

/// Register the service's routes.
///
/// `/transcribe` only answers POST; every other method on it, and every other
/// path, gets a plain-text 404. Matching looks at the path only, so
/// `/transcribe?x=1` still reaches the handler.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/transcribe")
            .route(web::post().to(transcribe))
            .default_service(web::to(not_found)),
    )
    .default_service(web::to(not_found));
}
