//! JSON landmark tracks recorded by an external face-mesh detector.
//!
//! Format: `{ "frames": { "<frame index>": [[x, y], ...] } }` with points in
//! normalized image coordinates. Frames without a face are simply omitted.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::face_mesh::FaceMesh;

#[derive(Error, Debug)]
pub enum LandmarkFileError {
    #[error("failed to read landmark file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid landmark file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid frame index '{0}' in landmark file")]
    FrameIndex(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LandmarkTrack {
    frames: HashMap<String, FaceMesh>,
}

impl LandmarkTrack {
    /// Converts the string-keyed JSON map into a frame-index lookup.
    pub fn into_cache(self) -> Result<HashMap<usize, FaceMesh>, LandmarkFileError> {
        self.frames
            .into_iter()
            .map(|(key, mesh)| {
                key.trim()
                    .parse::<usize>()
                    .map(|index| (index, mesh))
                    .map_err(|_| LandmarkFileError::FrameIndex(key))
            })
            .collect()
    }
}

pub fn load(path: &Path) -> Result<HashMap<usize, FaceMesh>, LandmarkFileError> {
    let json = fs::read_to_string(path).map_err(|source| LandmarkFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let track: LandmarkTrack =
        serde_json::from_str(&json).map_err(|source| LandmarkFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let cache = track.into_cache()?;
    log::debug!("Loaded landmarks for {} frames from {}", cache.len(), path.display());
    Ok(cache)
}
