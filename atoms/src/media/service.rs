use chrono::Utc;

use super::guard::ensure_owner;
use super::host::MediaHost;
use super::model::{Artifact, ArtifactUpdate, NewArtifact};
use crate::pagination::{paginate, Page, PageRequest};
use crate::store::{ArtifactFilter, Store};
use crate::AppError;

pub const UNTITLED: &str = "Untitled Image";

enum Source {
    Hosted { public_id: String, secure_url: String },
    Remote(String),
}

/// "Add": stores a new artifact for `owner_id`, uploading the source first
/// when no media-host locator is supplied.
pub async fn create_artifact(
    store: &dyn Store,
    media: &dyn MediaHost,
    owner_id: &str,
    req: NewArtifact,
) -> Result<Artifact, AppError> {
    req.transformation.validate()?;

    let title = match req.title {
        Some(t) if t.trim().is_empty() => return Err(AppError::validation("title must not be blank")),
        Some(t) => t.trim().to_string(),
        None => UNTITLED.to_string(),
    };

    // Validate the input before touching any remote service.
    let source = match (req.public_id, req.secure_url, req.url) {
        (Some(public_id), Some(secure_url), _) if !public_id.is_empty() && !secure_url.is_empty() => {
            Source::Hosted { public_id, secure_url }
        }
        (_, _, Some(url)) if !url.trim().is_empty() => Source::Remote(url),
        _ => {
            return Err(AppError::validation(
                "need either public_id and secure_url of an uploaded image, or a url to upload",
            ))
        }
    };

    if store.get_account(owner_id).await?.is_none() {
        return Err(AppError::not_found("account", owner_id));
    }

    let (public_id, secure_url, mut width, mut height) = match source {
        Source::Hosted { public_id, secure_url } => (public_id, secure_url, None, None),
        Source::Remote(url) => {
            let uploaded = media.upload(&url).await?;
            tracing::info!(public_id = %uploaded.public_id, "📎 source uploaded to media host");
            (uploaded.public_id, uploaded.secure_url, uploaded.width, uploaded.height)
        }
    };
    width = req.width.or(width);
    height = req.height.or(height);

    let now = Utc::now();
    let artifact = Artifact {
        artifact_id: uuid::Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        title,
        transformation_url: media.variant_url(&public_id, &req.transformation, width, height),
        public_id,
        secure_url,
        transformation: req.transformation,
        width,
        height,
        created_at: now,
        updated_at: now,
    };

    store.put_artifact(&artifact).await?;
    tracing::info!(
        artifact_id = %artifact.artifact_id,
        owner_id,
        kind = ?artifact.transformation.kind(),
        "✅ artifact created"
    );
    Ok(artifact)
}

pub async fn get_artifact(store: &dyn Store, artifact_id: &str) -> Result<Artifact, AppError> {
    store
        .get_artifact(artifact_id)
        .await?
        .ok_or_else(|| AppError::not_found("artifact", artifact_id))
}

/// "Update": only the owner may change an artifact.
pub async fn update_artifact(
    store: &dyn Store,
    media: &dyn MediaHost,
    acting_id: &str,
    artifact_id: &str,
    update: ArtifactUpdate,
) -> Result<Artifact, AppError> {
    let mut artifact = get_artifact(store, artifact_id).await?;
    ensure_owner(acting_id, &artifact)?;

    if let Some(title) = update.title {
        if title.trim().is_empty() {
            return Err(AppError::validation("title must not be blank"));
        }
        artifact.title = title.trim().to_string();
    }
    if let Some(transformation) = update.transformation {
        transformation.validate()?;
        artifact.transformation = transformation;
    }
    if update.width.is_some() {
        artifact.width = update.width;
    }
    if update.height.is_some() {
        artifact.height = update.height;
    }

    artifact.transformation_url = media.variant_url(
        &artifact.public_id,
        &artifact.transformation,
        artifact.width,
        artifact.height,
    );
    artifact.updated_at = Utc::now();

    store.update_artifact(&artifact, acting_id).await?;
    tracing::info!(artifact_id, "artifact updated");
    Ok(artifact)
}

/// Deletes an artifact after the same ownership check updates get.
pub async fn delete_artifact(store: &dyn Store, acting_id: &str, artifact_id: &str) -> Result<Artifact, AppError> {
    let artifact = get_artifact(store, artifact_id).await?;
    ensure_owner(acting_id, &artifact)?;

    let deleted = store.delete_artifact(artifact_id, acting_id).await?;
    tracing::info!(artifact_id, "🗑️ artifact deleted");
    Ok(deleted)
}

pub async fn list_owner_artifacts(
    store: &dyn Store,
    owner_id: &str,
    req: PageRequest,
) -> Result<Page<Artifact>, AppError> {
    req.validate()?;
    let artifacts = store
        .list_artifacts(&ArtifactFilter::Owner(owner_id.to_string()))
        .await?;
    Ok(paginate(artifacts, req))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::host::UploadedMedia;
    use crate::media::model::{AspectRatio, Transformation};
    use crate::store::MemoryStore;
    use crate::users::{create_account, NewAccount};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingHost {
        uploads: AtomicUsize,
    }

    #[async_trait]
    impl MediaHost for RecordingHost {
        async fn upload(&self, source_url: &str) -> Result<UploadedMedia, AppError> {
            let n = self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(UploadedMedia {
                public_id: format!("aivana/upload-{}", n),
                secure_url: source_url.to_string(),
                width: Some(640),
                height: Some(480),
            })
        }

        async fn search(&self, _expression: &str, _max_results: u32) -> Result<Vec<String>, AppError> {
            Ok(Vec::new())
        }

        fn variant_url(
            &self,
            public_id: &str,
            transformation: &Transformation,
            _width: Option<u32>,
            _height: Option<u32>,
        ) -> String {
            format!("https://variants/{:?}/{}", transformation.kind(), public_id)
        }

        fn folder(&self) -> &str {
            "aivana"
        }
    }

    async fn setup() -> (MemoryStore, RecordingHost) {
        let store = MemoryStore::new();
        for id in ["user_a", "user_b"] {
            create_account(
                &store,
                NewAccount {
                    account_id: id.into(),
                    email: format!("{}@example.com", id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        (store, RecordingHost::default())
    }

    fn uploaded(title: Option<&str>) -> NewArtifact {
        NewArtifact {
            title: title.map(String::from),
            public_id: Some("aivana/sunset".into()),
            secure_url: Some("https://cdn/sunset.jpg".into()),
            url: None,
            transformation: Transformation::Restore,
            width: None,
            height: None,
        }
    }

    #[tokio::test]
    async fn create_uses_existing_locator_without_uploading() {
        let (store, host) = setup().await;
        let artifact = create_artifact(&store, &host, "user_a", uploaded(Some(" Sunset ")))
            .await
            .unwrap();
        assert_eq!(artifact.title, "Sunset");
        assert_eq!(artifact.transformation_url, "https://variants/Restore/aivana/sunset");
        assert_eq!(host.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(get_artifact(&store, &artifact.artifact_id).await.unwrap(), artifact);
    }

    #[tokio::test]
    async fn create_uploads_a_source_url() {
        let (store, host) = setup().await;
        let req = NewArtifact {
            title: None,
            public_id: None,
            secure_url: None,
            url: Some("https://example.com/cat.png".into()),
            transformation: Transformation::Fill {
                aspect_ratio: AspectRatio::Square,
            },
            width: None,
            height: Some(999),
        };
        let artifact = create_artifact(&store, &host, "user_a", req).await.unwrap();
        assert_eq!(artifact.title, UNTITLED);
        assert_eq!(artifact.public_id, "aivana/upload-0");
        assert_eq!((artifact.width, artifact.height), (Some(640), Some(999)));
    }

    #[tokio::test]
    async fn create_validates_before_uploading() {
        let (store, host) = setup().await;
        let mut req = uploaded(None);
        req.public_id = None;
        assert!(matches!(
            create_artifact(&store, &host, "user_a", req).await,
            Err(AppError::Validation(_))
        ));

        assert!(matches!(
            create_artifact(&store, &host, "user_a", uploaded(Some("   "))).await,
            Err(AppError::Validation(_))
        ));

        assert!(matches!(
            create_artifact(&store, &host, "nobody", uploaded(None)).await,
            Err(AppError::NotFound { .. })
        ));
        assert_eq!(host.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn only_the_owner_updates() {
        let (store, host) = setup().await;
        let artifact = create_artifact(&store, &host, "user_a", uploaded(Some("Mine")))
            .await
            .unwrap();

        let attempt = ArtifactUpdate {
            title: Some("Stolen".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_artifact(&store, &host, "user_b", &artifact.artifact_id, attempt.clone()).await,
            Err(AppError::Unauthorized { .. })
        ));
        assert_eq!(get_artifact(&store, &artifact.artifact_id).await.unwrap(), artifact);

        let updated = update_artifact(
            &store,
            &host,
            "user_a",
            &artifact.artifact_id,
            ArtifactUpdate {
                title: Some("Renamed".into()),
                transformation: Some(Transformation::RemoveBackground),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(
            updated.transformation_url,
            "https://variants/RemoveBackground/aivana/sunset"
        );
        assert!(updated.updated_at >= artifact.updated_at);
    }

    #[tokio::test]
    async fn only_the_owner_deletes() {
        let (store, host) = setup().await;
        let artifact = create_artifact(&store, &host, "user_a", uploaded(None)).await.unwrap();

        assert!(matches!(
            delete_artifact(&store, "user_b", &artifact.artifact_id).await,
            Err(AppError::Unauthorized { .. })
        ));
        // still retrievable by its owner
        assert_eq!(get_artifact(&store, &artifact.artifact_id).await.unwrap(), artifact);

        delete_artifact(&store, "user_a", &artifact.artifact_id).await.unwrap();
        assert!(matches!(
            get_artifact(&store, &artifact.artifact_id).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn owner_listing_is_paginated() {
        let (store, host) = setup().await;
        for i in 0..11 {
            create_artifact(&store, &host, "user_a", uploaded(Some(format!("a{}", i).as_str())))
                .await
                .unwrap();
        }
        create_artifact(&store, &host, "user_b", uploaded(None)).await.unwrap();

        let second = list_owner_artifacts(&store, "user_a", PageRequest::new(2, 9).unwrap())
            .await
            .unwrap();
        assert_eq!(second.total, 11);
        assert_eq!(second.total_pages, 2);
        assert_eq!(second.data.len(), 2);
        assert!(second.data.iter().all(|a| a.owner_id == "user_a"));
    }
}
