//! On-disk model artifacts, one per target
//!
//! Artifacts are bincode-encoded behind a small envelope carrying a format
//! version. Writes go to a temporary file that is renamed into place, so a
//! crash mid-write leaves the previous artifact intact.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

use super::{ModelRegistry, TrainedModel};
use crate::domain::Target;
use crate::error::ForecastError;
use crate::forecast::features::FeatureSchema;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Artifact {
    format_version: u32,
    model: TrainedModel,
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, target: Target) -> PathBuf {
        self.dir.join(format!("{target}.model"))
    }

    /// Persist `model` as its target's artifact, replacing any previous one
    pub fn save(&self, model: &TrainedModel) -> Result<PathBuf, ForecastError> {
        let target = model.target();
        fs::create_dir_all(&self.dir)?;

        let envelope = Artifact {
            format_version: FORMAT_VERSION,
            model: model.clone(),
        };
        let bytes = bincode::serialize(&envelope).map_err(|e| ForecastError::Artifact {
            target,
            reason: format!("failed to serialize model: {e}"),
        })?;

        let path = self.path_for(target);
        let tmp = self.dir.join(format!(".{target}.model.tmp"));
        fs::write(&tmp, &bytes)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(
            target = %target,
            model_id = model.model_id(),
            path = %path.display(),
            bytes = bytes.len(),
            "Saved model artifact"
        );
        Ok(path)
    }

    /// Load a target's artifact, if one exists.
    ///
    /// The recorded schema must equal `expected`; an artifact trained on a
    /// different feature layout is refused rather than served.
    pub fn load(
        &self,
        target: Target,
        expected: &FeatureSchema,
    ) -> Result<Option<TrainedModel>, ForecastError> {
        let path = self.path_for(target);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(target = %target, path = %path.display(), "No model artifact");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let artifact: Artifact =
            bincode::deserialize(&bytes).map_err(|e| ForecastError::Artifact {
                target,
                reason: format!("failed to deserialize {}: {e}", path.display()),
            })?;
        if artifact.format_version != FORMAT_VERSION {
            return Err(ForecastError::Artifact {
                target,
                reason: format!(
                    "unsupported artifact format {} (expected {FORMAT_VERSION})",
                    artifact.format_version
                ),
            });
        }
        if artifact.model.target() != target {
            return Err(ForecastError::Artifact {
                target,
                reason: format!("artifact holds a {} model", artifact.model.target()),
            });
        }
        expected.ensure_matches(artifact.model.schema())?;

        Ok(Some(artifact.model))
    }

    /// Publish every stored artifact into `registry`; returns the targets loaded
    pub async fn load_into(
        &self,
        registry: &ModelRegistry,
        expected: &FeatureSchema,
    ) -> Result<Vec<Target>, ForecastError> {
        let mut loaded = Vec::new();
        for target in Target::iter() {
            match self.load(target, expected)? {
                Some(model) => {
                    registry.publish(model).await;
                    loaded.push(target);
                }
                None => warn!(target = %target, "No stored model; target will be unavailable"),
            }
        }
        Ok(loaded)
    }
}
