use std::collections::HashSet;

use aivana_atoms::http::respond;
use aivana_atoms::media::MediaHost;
use aivana_atoms::pagination::{paginate, PageRequest, DEFAULT_PAGE_SIZE};
use aivana_atoms::store::ArtifactFilter;
use aivana_atoms::{AppError, Store};
use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::types::{GalleryPage, GalleryQuery};

/// Upper bound on locators taken from one media-host search.
pub const SEARCH_RESULT_CAP: u32 = 500;

/// Search expression scoped to the upload folder.
pub fn search_expression(folder: &str, query: &str) -> String {
    format!("folder={} AND {}", folder, query)
}

/// Public gallery, newest first. A search narrows it to the artifacts whose
/// locators the media host matched.
pub async fn browse(
    store: &dyn Store,
    media: &dyn MediaHost,
    query: GalleryQuery,
) -> Result<GalleryPage, AppError> {
    let req = PageRequest::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    )?;

    let filter = match query.search.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => {
            let ids = media
                .search(&search_expression(media.folder(), q), SEARCH_RESULT_CAP)
                .await?;
            tracing::debug!(query = q, hits = ids.len(), "gallery search");
            ArtifactFilter::PublicIds(ids.into_iter().collect::<HashSet<_>>())
        }
        _ => ArtifactFilter::All,
    };

    let artifacts = store.list_artifacts(&filter).await?;
    let saved_images = store.count_artifacts().await?;
    Ok(GalleryPage {
        page: paginate(artifacts, req),
        saved_images,
    })
}

/// HTTP Handler: GET /gallery
pub async fn browse_handler(
    store: &dyn Store,
    media: &dyn MediaHost,
    search: Option<&str>,
    page: Option<&str>,
    limit: Option<&str>,
) -> Result<Response<Body>, Error> {
    let result = async {
        let req = PageRequest::from_query(page, limit)?;
        browse(
            store,
            media,
            GalleryQuery {
                search: search.map(String::from),
                page: Some(req.page),
                limit: Some(req.limit),
            },
        )
        .await
    }
    .await;
    respond(StatusCode::OK, result)
}
