//! Episode files: one simulated batch of views per file.
//!
//! An episode file is a JSON array of six positional arrays:
//!
//! ```text
//! [latents[n][t][d], distances[n], azimuths[n], elevations[n], unused[n], targets[n][3]]
//! ```
//!
//! The fifth array is carried by the file format but never read.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::debug;

use crate::error::{DatasetError, Result};

#[derive(Deserialize)]
struct RawEpisode(
    Vec<Vec<Vec<f32>>>,
    Vec<f32>,
    Vec<f32>,
    Vec<f32>,
    IgnoredAny,
    Vec<[f32; 3]>,
);

/// Aligned per-sample arrays of one episode file.
///
/// All arrays share the same leading (sample) dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    /// Latent sequences, `[n][t][d]`.
    pub latents: Vec<Vec<Vec<f32>>>,

    /// Camera distances, `[n]`.
    pub distances: Vec<f32>,

    /// Camera azimuths, `[n]`.
    pub azimuths: Vec<f32>,

    /// Camera elevations, `[n]`.
    pub elevations: Vec<f32>,

    /// End-effector targets, `[n][3]`.
    pub targets: Vec<[f32; 3]>,
}

impl EpisodeRecord {
    /// Number of samples in the episode.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if the episode holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Latent dimensionality `d`, if any sample exists.
    #[must_use]
    pub fn latent_dim(&self) -> Option<usize> {
        self.latents
            .first()
            .and_then(|seq| seq.first())
            .map(Vec::len)
    }

    /// Checks that all arrays are aligned and every latent sequence has the
    /// same `[t][d]` shape with `t >= 1`, `d >= 1`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::MalformedEpisode`] describing the first
    /// inconsistency.
    pub fn validate(&self, path: &Path) -> Result<()> {
        let n = self.targets.len();
        let lengths = [
            ("latents", self.latents.len()),
            ("distances", self.distances.len()),
            ("azimuths", self.azimuths.len()),
            ("elevations", self.elevations.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(DatasetError::malformed(
                    path,
                    format!("{name} has {len} samples, targets has {n}"),
                ));
            }
        }

        let Some(first) = self.latents.first() else {
            return Ok(());
        };
        let steps = first.len();
        let dim = first.first().map_or(0, Vec::len);
        if steps == 0 || dim == 0 {
            return Err(DatasetError::malformed(path, "latent sequences are empty"));
        }
        for (i, seq) in self.latents.iter().enumerate() {
            if seq.len() != steps || seq.iter().any(|step| step.len() != dim) {
                return Err(DatasetError::malformed(
                    path,
                    format!("latent {i} is not [{steps}][{dim}]"),
                ));
            }
        }

        Ok(())
    }

    /// Loads and validates one episode file.
    ///
    /// # Errors
    ///
    /// - [`DatasetError::EpisodeNotFound`] if the file does not exist
    /// - [`DatasetError::MalformedEpisode`] if it does not hold six aligned
    ///   arrays
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DatasetError::EpisodeNotFound(path.to_path_buf()),
            _ => DatasetError::io(path, &e),
        })?;

        let RawEpisode(latents, distances, azimuths, elevations, _, targets) =
            serde_json::from_slice(&bytes)
                .map_err(|e| DatasetError::malformed(path, e.to_string()))?;

        let record = Self {
            latents,
            distances,
            azimuths,
            elevations,
            targets,
        };
        record.validate(path)?;
        debug!(path = %path.display(), samples = record.len(), "loaded episode");
        Ok(record)
    }

    /// Writes the episode in the six-array layout.
    ///
    /// The unused slot holds each sample's index.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Io`] if the file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let indices: Vec<usize> = (0..self.len()).collect();
        let value = (
            &self.latents,
            &self.distances,
            &self.azimuths,
            &self.elevations,
            indices,
            &self.targets,
        );
        let json = serde_json::to_vec(&value)
            .map_err(|e| DatasetError::malformed(path, e.to_string()))?;
        fs::write(path, json).map_err(|e| DatasetError::io(path, &e))
    }
}

/// Lists the episode files of a directory in file-name order.
///
/// Subdirectories are skipped.
///
/// # Errors
///
/// Returns [`DatasetError::EpisodeNotFound`] if `dir` does not exist.
pub fn list_episodes(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(DatasetError::EpisodeNotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| DatasetError::io(dir, &e))? {
        let entry = entry.map_err(|e| DatasetError::io(dir, &e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Loads every episode file in `dir`.
///
/// # Errors
///
/// Propagates the first listing or loading failure.
pub fn load_episodes(dir: impl AsRef<Path>) -> Result<Vec<EpisodeRecord>> {
    list_episodes(dir)?
        .iter()
        .map(EpisodeRecord::load)
        .collect()
}
