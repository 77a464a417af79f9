use lambda_http::{http::StatusCode, Body, Error, Response};

use super::host::MediaHost;
use super::model::{ArtifactUpdate, NewArtifact};
use super::service;
use crate::http::{error_response, no_content, parse_body, respond};
use crate::pagination::PageRequest;
use crate::store::Store;

/// HTTP Handler: POST /images
pub async fn create_artifact_handler(
    store: &dyn Store,
    media: &dyn MediaHost,
    owner_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: NewArtifact = match parse_body(body) {
        Ok(req) => req,
        Err(e) => return error_response(&e),
    };
    respond(
        StatusCode::CREATED,
        service::create_artifact(store, media, owner_id, req).await,
    )
}

/// HTTP Handler: GET /images/{id}
pub async fn get_artifact_handler(store: &dyn Store, artifact_id: &str) -> Result<Response<Body>, Error> {
    respond(StatusCode::OK, service::get_artifact(store, artifact_id).await)
}

/// HTTP Handler: PATCH /images/{id}
pub async fn update_artifact_handler(
    store: &dyn Store,
    media: &dyn MediaHost,
    acting_id: &str,
    artifact_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let update: ArtifactUpdate = match parse_body(body) {
        Ok(update) => update,
        Err(e) => return error_response(&e),
    };
    respond(
        StatusCode::OK,
        service::update_artifact(store, media, acting_id, artifact_id, update).await,
    )
}

/// HTTP Handler: DELETE /images/{id}
pub async fn delete_artifact_handler(
    store: &dyn Store,
    acting_id: &str,
    artifact_id: &str,
) -> Result<Response<Body>, Error> {
    match service::delete_artifact(store, acting_id, artifact_id).await {
        Ok(_) => no_content(),
        Err(e) => error_response(&e),
    }
}

/// HTTP Handler: GET /users/me/images
pub async fn list_owner_artifacts_handler(
    store: &dyn Store,
    owner_id: &str,
    page: PageRequest,
) -> Result<Response<Body>, Error> {
    respond(
        StatusCode::OK,
        service::list_owner_artifacts(store, owner_id, page).await,
    )
}
