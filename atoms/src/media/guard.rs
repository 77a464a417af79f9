use super::model::Artifact;
use crate::AppError;

/// Only the owning account may mutate or delete an artifact.
pub fn ensure_owner(acting_id: &str, artifact: &Artifact) -> Result<(), AppError> {
    if artifact.owner_id == acting_id {
        Ok(())
    } else {
        tracing::warn!(
            artifact_id = %artifact.artifact_id,
            acting_id,
            "ownership check failed"
        );
        Err(AppError::forbidden(format!(
            "artifact {} belongs to another account",
            artifact.artifact_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::model::Transformation;
    use chrono::Utc;

    fn artifact(owner: &str) -> Artifact {
        Artifact {
            artifact_id: "img-1".into(),
            owner_id: owner.into(),
            title: "t".into(),
            public_id: "aivana/p".into(),
            secure_url: "https://x/p".into(),
            transformation_url: "https://x/p".into(),
            transformation: Transformation::Restore,
            width: None,
            height: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_passes_others_fail() {
        let a = artifact("user_a");
        assert!(ensure_owner("user_a", &a).is_ok());
        assert!(matches!(
            ensure_owner("user_b", &a),
            Err(AppError::Unauthorized { authenticated: true, .. })
        ));
        // exact match only
        assert!(ensure_owner("USER_A", &a).is_err());
        assert!(ensure_owner("", &a).is_err());
    }
}
