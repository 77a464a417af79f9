use lambda_http::{http::StatusCode, Body, Error, Response};

use super::service;
use crate::http::respond;
use crate::store::Store;

/// HTTP Handler: GET /users/me
pub async fn get_me_handler(store: &dyn Store, account_id: &str) -> Result<Response<Body>, Error> {
    respond(StatusCode::OK, service::get_account(store, account_id).await)
}
