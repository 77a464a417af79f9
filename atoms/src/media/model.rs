use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One uploaded, optionally transformed image owned by a single account.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Artifact {
    pub artifact_id: String,
    pub owner_id: String,
    pub title: String,
    /// Opaque locator of the binary on the media host
    pub public_id: String,
    pub secure_url: String,
    pub transformation_url: String,
    pub transformation: Transformation,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    Restore,
    RemoveBackground,
    Fill,
    Remove,
    Recolor,
}

impl TransformationKind {
    /// Credits debited each time a transformation of this kind is applied.
    pub const fn credit_fee(self) -> i64 {
        match self {
            TransformationKind::Restore => 1,
            TransformationKind::RemoveBackground => 1,
            TransformationKind::Fill => 1,
            TransformationKind::Remove => 1,
            TransformationKind::Recolor => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "9:16")]
    Phone,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Phone => "9:16",
        }
    }

    /// Output size for a generative fill at this ratio.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1000, 1000),
            AspectRatio::Portrait => (1000, 1334),
            AspectRatio::Phone => (1000, 1778),
        }
    }
}

/// Transformation parameters, keyed by kind. Each variant carries only the
/// parameters its kind accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transformation {
    Restore,
    RemoveBackground,
    Fill {
        aspect_ratio: AspectRatio,
    },
    Remove {
        prompt: String,
        #[serde(default)]
        remove_shadow: bool,
    },
    Recolor {
        prompt: String,
        to: String,
        #[serde(default)]
        multiple: bool,
    },
}

impl Transformation {
    pub fn kind(&self) -> TransformationKind {
        match self {
            Transformation::Restore => TransformationKind::Restore,
            Transformation::RemoveBackground => TransformationKind::RemoveBackground,
            Transformation::Fill { .. } => TransformationKind::Fill,
            Transformation::Remove { .. } => TransformationKind::Remove,
            Transformation::Recolor { .. } => TransformationKind::Recolor,
        }
    }

    pub fn credit_fee(&self) -> i64 {
        self.kind().credit_fee()
    }

    /// Prompt-driven kinds need something to look for.
    pub fn validate(&self) -> Result<(), crate::AppError> {
        match self {
            Transformation::Remove { prompt, .. } if prompt.trim().is_empty() => Err(
                crate::AppError::validation("remove needs a prompt naming the object"),
            ),
            Transformation::Recolor { prompt, .. } if prompt.trim().is_empty() => Err(
                crate::AppError::validation("recolor needs a prompt naming the object"),
            ),
            Transformation::Recolor { to, .. } if to.trim().is_empty() => {
                Err(crate::AppError::validation("recolor needs a target color"))
            }
            _ => Ok(()),
        }
    }
}

/// "Add" submission. Either an already uploaded `public_id` + `secure_url`,
/// or a source `url` the media host should ingest.
#[derive(Debug, Deserialize, Clone)]
pub struct NewArtifact {
    pub title: Option<String>,
    pub public_id: Option<String>,
    pub secure_url: Option<String>,
    pub url: Option<String>,
    pub transformation: Transformation,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// "Update" submission.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ArtifactUpdate {
    pub title: Option<String>,
    pub transformation: Option<Transformation>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transformation_is_tagged_by_type() {
        let t: Transformation = serde_json::from_str(
            r##"{"type":"recolor","prompt":"car","to":"#ff0000"}"##,
        )
        .unwrap();
        assert_eq!(
            t,
            Transformation::Recolor {
                prompt: "car".into(),
                to: "#ff0000".into(),
                multiple: false
            }
        );

        let fill: Transformation =
            serde_json::from_str(r#"{"type":"fill","aspect_ratio":"9:16"}"#).unwrap();
        assert_eq!(fill.kind(), TransformationKind::Fill);
    }

    #[test]
    fn parameters_of_another_kind_are_rejected() {
        // fill without a ratio is not a valid fill
        assert!(serde_json::from_str::<Transformation>(r#"{"type":"fill","prompt":"x"}"#).is_err());
        assert!(serde_json::from_str::<Transformation>(r#"{"type":"blur"}"#).is_err());
    }

    #[test]
    fn empty_prompts_fail_validation() {
        let t = Transformation::Remove {
            prompt: "  ".into(),
            remove_shadow: false,
        };
        assert!(t.validate().is_err());
        assert!(Transformation::Restore.validate().is_ok());
    }
}
