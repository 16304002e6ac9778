use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::detection::domain::face_locator::FaceLocator;
use crate::shared::cascade_resolver::{self, CascadeResolveError};
use crate::shared::constants::{
    FRONTAL_ALT_CASCADE_NAME, FRONTAL_CASCADE_NAME, PROFILE_CASCADE_NAME,
};

use super::haar_cascade::{CascadeError, HaarCascade};

#[derive(Error, Debug)]
pub enum LocatorLoadError {
    #[error("cannot resolve {name}: {source}")]
    Resolve {
        name: &'static str,
        #[source]
        source: CascadeResolveError,
    },
    #[error("cannot load {name}: {source}")]
    Load {
        name: &'static str,
        #[source]
        source: CascadeError,
    },
}

/// Builds the three-cascade locator, resolving each cascade from the cache,
/// then `bundled_dir`, then the network.
///
/// Loaded once per process; the locator is cheap to clone and share.
pub fn create_face_locator(bundled_dir: Option<&Path>) -> Result<FaceLocator, LocatorLoadError> {
    let load = |name: &'static str| -> Result<Arc<HaarCascade>, LocatorLoadError> {
        let path = cascade_resolver::resolve(name, bundled_dir)
            .map_err(|source| LocatorLoadError::Resolve { name, source })?;
        let cascade =
            HaarCascade::load(&path).map_err(|source| LocatorLoadError::Load { name, source })?;
        log::info!(
            "Loaded {name} ({} stages) from {}",
            cascade.stage_count(),
            path.display()
        );
        Ok(Arc::new(cascade))
    };

    Ok(FaceLocator::new(
        load(FRONTAL_CASCADE_NAME)?,
        load(FRONTAL_ALT_CASCADE_NAME)?,
        load(PROFILE_CASCADE_NAME)?,
    ))
}

/// Loads the locator from an explicit directory without touching the cache
/// or the network.
pub fn load_face_locator_from(dir: &Path) -> Result<FaceLocator, LocatorLoadError> {
    let load = |name: &'static str| -> Result<Arc<HaarCascade>, LocatorLoadError> {
        HaarCascade::load(&dir.join(name))
            .map(Arc::new)
            .map_err(|source| LocatorLoadError::Load { name, source })
    };
    Ok(FaceLocator::new(
        load(FRONTAL_CASCADE_NAME)?,
        load(FRONTAL_ALT_CASCADE_NAME)?,
        load(PROFILE_CASCADE_NAME)?,
    ))
}
