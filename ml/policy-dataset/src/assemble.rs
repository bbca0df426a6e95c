//! Dataset assembly: concatenate episodes, normalize camera channels, build
//! inputs for the selected camera mode.
//!
//! Order of operations:
//!
//! 1. concatenate every episode along the sample axis
//! 2. min-max normalize distance, azimuth, elevation over the whole set
//! 3. fixed camera: keep samples whose camera matches the first sample's;
//!    variable camera: append the three normalized scalars to the latent
//! 4. debug: subsample to a handful of samples

use std::path::Path;

use policy_types::{CameraParams, CameraStats};
use rand::SeedableRng;
use rand::seq::index;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::episode::{EpisodeRecord, load_episodes};
use crate::error::{DatasetError, Result};
use crate::sample::PolicyDataset;

/// Which camera setup the policy is trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// Single camera pose; the input is the latent alone.
    Fixed,

    /// Varying camera; the input is the latent plus three camera scalars.
    #[default]
    Variable,
}

impl CameraMode {
    /// Number of extra input channels this mode appends to the latent.
    #[must_use]
    pub const fn extra_inputs(&self) -> usize {
        match self {
            Self::Fixed => 0,
            Self::Variable => 3,
        }
    }
}

/// How fixed-camera filtering compares a sample with the first sample.
///
/// Under [`CameraMatch::Exact`] the first sample always matches itself, so
/// the filtered set is never empty for non-empty input. Only
/// [`CameraMatch::Crossed`] can yield an empty set: when the first sample's
/// azimuth differs from its elevation and no sample carries the swapped
/// pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraMatch {
    /// Each channel is compared with the same channel of the first sample.
    #[default]
    Exact,

    /// Distance against distance, elevation against the first azimuth, and
    /// azimuth against the first elevation. Reproduces reference runs made
    /// with the crossed comparison.
    Crossed,
}

impl CameraMatch {
    /// Returns true if `cam` is kept when `reference` is the first sample.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn matches(&self, cam: CameraParams, reference: CameraParams) -> bool {
        match self {
            Self::Exact => cam == reference,
            Self::Crossed => {
                cam.distance == reference.distance
                    && cam.elevation == reference.azimuth
                    && cam.azimuth == reference.elevation
            }
        }
    }
}

/// Which time step of each latent sequence becomes the sample's latent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LatentStep {
    /// Step 0, matching the episodes produced by the current encoder.
    #[default]
    First,

    /// An explicit step.
    Index(usize),
}

impl LatentStep {
    const fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Index(i) => i,
        }
    }
}

/// Configuration for [`assemble`].
///
/// # Example
///
/// ```
/// use policy_dataset::{AssemblyConfig, CameraMode};
///
/// let config = AssemblyConfig::new(CameraMode::Fixed).with_debug(true).with_seed(7);
/// assert_eq!(config.debug_samples, 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Fixed or variable camera.
    pub camera_mode: CameraMode,

    /// Comparison used in fixed-camera mode.
    #[serde(default)]
    pub camera_match: CameraMatch,

    /// Latent time step to keep.
    #[serde(default)]
    pub latent_step: LatentStep,

    /// Subsample to `debug_samples` samples.
    pub debug: bool,

    /// Sample count in debug mode.
    pub debug_samples: usize,

    /// Seed for debug subsampling.
    pub seed: Option<u64>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self::new(CameraMode::default())
    }
}

impl AssemblyConfig {
    /// Default debug sample count.
    pub const DEBUG_SAMPLES: usize = 10;

    /// Creates a config for `camera_mode` with all other options at defaults.
    #[must_use]
    pub const fn new(camera_mode: CameraMode) -> Self {
        Self {
            camera_mode,
            camera_match: CameraMatch::Exact,
            latent_step: LatentStep::First,
            debug: false,
            debug_samples: Self::DEBUG_SAMPLES,
            seed: None,
        }
    }

    /// Sets the fixed-camera comparison.
    #[must_use]
    pub const fn with_camera_match(mut self, camera_match: CameraMatch) -> Self {
        self.camera_match = camera_match;
        self
    }

    /// Sets the latent step.
    #[must_use]
    pub const fn with_latent_step(mut self, step: LatentStep) -> Self {
        self.latent_step = step;
        self
    }

    /// Enables or disables debug subsampling.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Column-wise concatenation of every episode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EpisodeColumns {
    /// Latent at the selected step, one row per sample.
    pub latents: Vec<Vec<f32>>,

    /// Camera distances.
    pub distances: Vec<f32>,

    /// Camera azimuths.
    pub azimuths: Vec<f32>,

    /// Camera elevations.
    pub elevations: Vec<f32>,

    /// Target positions.
    pub targets: Vec<[f32; 3]>,
}

impl EpisodeColumns {
    /// Concatenates episodes along the sample axis, keeping latent step
    /// `step` of each sequence.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::MalformedEpisode`] if the step is out of range
    /// or episodes disagree on latent width.
    pub fn concat(episodes: &[EpisodeRecord], step: LatentStep) -> Result<Self> {
        let total: usize = episodes.iter().map(EpisodeRecord::len).sum();
        let mut cols = Self {
            latents: Vec::with_capacity(total),
            distances: Vec::with_capacity(total),
            azimuths: Vec::with_capacity(total),
            elevations: Vec::with_capacity(total),
            targets: Vec::with_capacity(total),
        };

        let step = step.index();
        let mut latent_dim = None;
        for (ep_idx, ep) in episodes.iter().enumerate() {
            let label = format!("episode #{ep_idx}");
            for seq in &ep.latents {
                let latent = seq.get(step).ok_or_else(|| {
                    DatasetError::malformed(
                        &label,
                        format!("latent step {step} out of range ({} steps)", seq.len()),
                    )
                })?;
                match latent_dim {
                    None => latent_dim = Some(latent.len()),
                    Some(d) if d != latent.len() => {
                        return Err(DatasetError::malformed(
                            &label,
                            format!("latent width {} differs from {d}", latent.len()),
                        ));
                    }
                    Some(_) => {}
                }
                cols.latents.push(latent.clone());
            }
            cols.distances.extend_from_slice(&ep.distances);
            cols.azimuths.extend_from_slice(&ep.azimuths);
            cols.elevations.extend_from_slice(&ep.elevations);
            cols.targets.extend_from_slice(&ep.targets);
        }

        Ok(cols)
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Camera parameters of sample `i`.
    #[must_use]
    pub fn camera(&self, i: usize) -> Option<CameraParams> {
        Some(CameraParams::new(
            *self.distances.get(i)?,
            *self.azimuths.get(i)?,
            *self.elevations.get(i)?,
        ))
    }

    /// Min-max normalizes each camera channel in place over all samples.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::DegenerateRange`] if any channel has
    /// `max == min` and [`DatasetError::NonFiniteCamera`] if any value is
    /// `NaN` or infinite.
    pub fn normalize_cameras(&mut self) -> Result<CameraStats> {
        let stats = CameraStats::from_channels(&self.distances, &self.azimuths, &self.elevations)?;
        stats.distance.normalize_all(&mut self.distances);
        stats.azimuth.normalize_all(&mut self.azimuths);
        stats.elevation.normalize_all(&mut self.elevations);
        debug!(?stats, "normalized camera channels");
        Ok(stats)
    }
}

/// Keeps the samples whose camera matches the first sample's camera.
///
/// Inputs are the bare latents. Returns an empty dataset when the columns
/// are empty or nothing matches.
#[must_use]
pub fn filter_fixed_camera(cols: &EpisodeColumns, rule: CameraMatch) -> PolicyDataset {
    let input_dim = cols.latents.first().map_or(0, Vec::len);
    let mut out = PolicyDataset::new(input_dim);
    let Some(reference) = cols.camera(0) else {
        return out;
    };

    for (i, (latent, target)) in cols.latents.iter().zip(&cols.targets).enumerate() {
        let keep = cols.camera(i).is_some_and(|cam| rule.matches(cam, reference));
        if keep {
            // Widths were checked in `concat`.
            let _ = out.push(latent, *target);
        }
    }
    out
}

/// Builds `latent ++ [distance, azimuth, elevation]` inputs for every sample.
///
/// # Errors
///
/// Returns [`DatasetError::ShapeMismatch`] if latent widths differ.
pub fn with_camera_inputs(cols: &EpisodeColumns) -> Result<PolicyDataset> {
    let latent_dim = cols.latents.first().map_or(0, Vec::len);
    let mut out = PolicyDataset::new(latent_dim + CameraMode::Variable.extra_inputs());
    let mut row = Vec::with_capacity(out.input_dim());
    for (i, (latent, target)) in cols.latents.iter().zip(&cols.targets).enumerate() {
        let cam = cols.camera(i).ok_or(DatasetError::IndexOutOfBounds {
            index: i,
            len: cols.len(),
        })?;
        row.clear();
        row.extend_from_slice(latent);
        row.extend_from_slice(&cam.to_array());
        out.push(&row, *target)?;
    }
    Ok(out)
}

/// Picks `count` sample indices within `[0, len)`.
///
/// Indices are unique when `len >= count`; smaller datasets are sampled
/// with replacement so the result always has `count` entries.
///
/// # Errors
///
/// Returns [`DatasetError::EmptyDataset`] if `len == 0`.
pub fn debug_indices(len: usize, count: usize, rng: &mut impl Rng) -> Result<Vec<usize>> {
    if len == 0 {
        return Err(DatasetError::EmptyDataset);
    }
    if len >= count {
        Ok(index::sample(rng, len, count).into_vec())
    } else {
        Ok((0..count).map(|_| rng.gen_range(0..len)).collect())
    }
}

/// Subsamples `dataset` for quick debugging runs.
///
/// # Errors
///
/// Returns [`DatasetError::EmptyDataset`] if `dataset` is empty.
pub fn subsample_debug(
    dataset: &PolicyDataset,
    count: usize,
    seed: Option<u64>,
) -> Result<PolicyDataset> {
    let mut rng = seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
    let indices = debug_indices(dataset.len(), count, &mut rng)?;
    dataset.select(&indices)
}

/// Builds the dataset from already-loaded episodes.
///
/// # Errors
///
/// - [`DatasetError::EmptyDataset`] if the episodes hold no samples
/// - [`DatasetError::DegenerateRange`] if a camera channel is constant
/// - [`DatasetError::MalformedEpisode`] if latent shapes disagree
pub fn assemble_episodes(
    episodes: &[EpisodeRecord],
    config: &AssemblyConfig,
) -> Result<PolicyDataset> {
    let mut cols = EpisodeColumns::concat(episodes, config.latent_step)?;
    if cols.is_empty() {
        return Err(DatasetError::EmptyDataset);
    }
    cols.normalize_cameras()?;

    let dataset = match config.camera_mode {
        CameraMode::Fixed => filter_fixed_camera(&cols, config.camera_match),
        CameraMode::Variable => with_camera_inputs(&cols)?,
    };
    info!(
        samples = dataset.len(),
        input_dim = dataset.input_dim(),
        mode = ?config.camera_mode,
        "assembled dataset"
    );

    if config.debug {
        let subset = subsample_debug(&dataset, config.debug_samples, config.seed)?;
        info!(samples = subset.len(), "debug subsample");
        return Ok(subset);
    }
    Ok(dataset)
}

/// Loads every episode file under `dir` and assembles the dataset.
///
/// # Errors
///
/// Propagates episode loading errors and [`assemble_episodes`] errors.
pub fn assemble(dir: impl AsRef<Path>, config: &AssemblyConfig) -> Result<PolicyDataset> {
    let dir = dir.as_ref();
    let episodes = load_episodes(dir)?;
    info!(dir = %dir.display(), files = episodes.len(), "loaded episodes");
    assemble_episodes(&episodes, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn episode(cams: &[(f32, f32, f32)], offset: f32) -> EpisodeRecord {
        EpisodeRecord {
            latents: cams
                .iter()
                .enumerate()
                .map(|(i, _)| vec![vec![offset + i as f32, 1.0], vec![-1.0, -1.0]])
                .collect(),
            distances: cams.iter().map(|c| c.0).collect(),
            azimuths: cams.iter().map(|c| c.1).collect(),
            elevations: cams.iter().map(|c| c.2).collect(),
            targets: cams
                .iter()
                .enumerate()
                .map(|(i, _)| [offset + i as f32, 0.0, 0.0])
                .collect(),
        }
    }

    #[test]
    fn concat_keeps_first_step_and_sums_lengths() {
        let a = episode(&[(1.0, 0.0, 0.0), (2.0, 1.0, 1.0)], 0.0);
        let b = episode(&[(3.0, 2.0, 2.0)], 10.0);
        let cols = EpisodeColumns::concat(&[a, b], LatentStep::First).unwrap();

        assert_eq!(cols.len(), 3);
        assert_eq!(cols.latents[2], vec![10.0, 1.0]);
        assert_eq!(cols.distances, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn concat_selects_explicit_step() {
        let a = episode(&[(1.0, 0.0, 0.0)], 0.0);
        let cols = EpisodeColumns::concat(&[a.clone()], LatentStep::Index(1)).unwrap();
        assert_eq!(cols.latents[0], vec![-1.0, -1.0]);

        let err = EpisodeColumns::concat(&[a], LatentStep::Index(2)).unwrap_err();
        assert!(matches!(err, DatasetError::MalformedEpisode { .. }));
    }

    #[test]
    fn normalization_is_global_not_per_file() {
        let a = episode(&[(1.0, 0.0, 10.0), (2.0, 5.0, 20.0)], 0.0);
        let b = episode(&[(5.0, 10.0, 30.0)], 0.0);
        let mut cols = EpisodeColumns::concat(&[a, b], LatentStep::First).unwrap();
        cols.normalize_cameras().unwrap();

        assert_relative_eq!(cols.distances[0], 0.0);
        assert_relative_eq!(cols.distances[1], 0.25);
        assert_relative_eq!(cols.distances[2], 1.0);
        assert_relative_eq!(cols.azimuths[1], 0.5);
        assert_relative_eq!(cols.elevations[1], 0.5);
    }

    #[test]
    fn normalization_degenerate_channel_fails() {
        let a = episode(&[(1.0, 3.0, 0.0), (2.0, 3.0, 1.0)], 0.0);
        let mut cols = EpisodeColumns::concat(&[a], LatentStep::First).unwrap();
        let err = cols.normalize_cameras().unwrap_err();
        assert!(matches!(err, DatasetError::DegenerateRange(_)));
    }

    #[test]
    fn normalization_non_finite_channel_fails() {
        let a = episode(&[(1.0, 3.0, 0.0), (f32::NAN, 4.0, 1.0)], 0.0);
        let mut cols = EpisodeColumns::concat(&[a], LatentStep::First).unwrap();
        let err = cols.normalize_cameras().unwrap_err();
        assert!(matches!(err, DatasetError::NonFiniteCamera(ref c) if c == "camera distance"));
    }

    #[test]
    fn fixed_camera_exact_keeps_matching_samples() {
        let a = episode(
            &[
                (0.0, 0.0, 1.0),
                (1.0, 1.0, 0.0),
                (0.0, 0.0, 1.0),
                (0.0, 1.0, 0.0),
            ],
            0.0,
        );
        let cols = EpisodeColumns::concat(&[a], LatentStep::First).unwrap();
        let data = filter_fixed_camera(&cols, CameraMatch::Exact);

        assert_eq!(data.len(), 2);
        assert_eq!(data.input_dim(), 2);
        assert_eq!(data.target(0), Some([0.0, 0.0, 0.0]));
        assert_eq!(data.target(1), Some([2.0, 0.0, 0.0]));
    }

    #[test]
    fn fixed_camera_crossed_rule_swaps_channels() {
        // First camera: azimuth 0, elevation 1. The crossed rule keeps
        // samples with elevation == 0 and azimuth == 1.
        let a = episode(
            &[
                (0.0, 0.0, 1.0),
                (0.0, 1.0, 0.0),
                (0.0, 0.0, 1.0),
            ],
            0.0,
        );
        let cols = EpisodeColumns::concat(&[a], LatentStep::First).unwrap();
        let data = filter_fixed_camera(&cols, CameraMatch::Crossed);

        assert_eq!(data.len(), 1);
        assert_eq!(data.target(0), Some([1.0, 0.0, 0.0]));
    }

    #[test]
    fn fixed_camera_exact_keeps_at_least_the_first_sample() {
        let a = episode(&[(0.0, 0.0, 0.0), (1.0, 1.0, 1.0)], 0.0);
        let cols = EpisodeColumns::concat(&[a], LatentStep::First).unwrap();
        let data = filter_fixed_camera(&cols, CameraMatch::Exact);
        assert_eq!(data.len(), 1);
        assert_eq!(data.target(0), Some([0.0, 0.0, 0.0]));
    }

    #[test]
    fn fixed_camera_crossed_without_swapped_pair_is_empty() {
        // Azimuth 0 and elevation 1 on the first sample; nobody has the
        // swapped pair, the first sample included.
        let a = episode(&[(0.0, 0.0, 1.0), (0.0, 0.0, 1.0), (1.0, 2.0, 3.0)], 0.0);
        let cols = EpisodeColumns::concat(&[a], LatentStep::First).unwrap();
        let data = filter_fixed_camera(&cols, CameraMatch::Crossed);
        assert!(data.is_empty());
        assert_eq!(data.input_dim(), 2);
    }

    #[test]
    fn fixed_camera_empty_columns() {
        let data = filter_fixed_camera(&EpisodeColumns::default(), CameraMatch::Exact);
        assert!(data.is_empty());
    }

    #[test]
    fn variable_camera_appends_three_scalars() {
        let a = episode(&[(0.0, 0.5, 1.0), (1.0, 0.25, 0.0)], 0.0);
        let cols = EpisodeColumns::concat(&[a], LatentStep::First).unwrap();
        let data = with_camera_inputs(&cols).unwrap();

        assert_eq!(data.input_dim(), 5);
        assert_eq!(data.input(0), Some(&[0.0, 1.0, 0.0, 0.5, 1.0][..]));
        assert_eq!(data.input(1), Some(&[1.0, 1.0, 1.0, 0.25, 0.0][..]));
    }

    #[test]
    fn debug_indices_unique_and_bounded() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for len in [10, 11, 50, 1000] {
            let mut idx = debug_indices(len, 10, &mut rng).unwrap();
            assert_eq!(idx.len(), 10);
            assert!(idx.iter().all(|&i| i < len));
            idx.sort_unstable();
            idx.dedup();
            assert_eq!(idx.len(), 10);
        }
    }

    #[test]
    fn debug_indices_small_dataset_still_returns_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let idx = debug_indices(3, 10, &mut rng).unwrap();
        assert_eq!(idx.len(), 10);
        assert!(idx.iter().all(|&i| i < 3));
    }

    #[test]
    fn debug_indices_empty() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(matches!(
            debug_indices(0, 10, &mut rng),
            Err(DatasetError::EmptyDataset)
        ));
    }

    #[test]
    fn assemble_episodes_variable_debug() {
        let cams: Vec<(f32, f32, f32)> = (0..40)
            .map(|i| (i as f32, (i % 7) as f32, (i % 5) as f32))
            .collect();
        let ep = episode(&cams, 0.0);
        let config = AssemblyConfig::new(CameraMode::Variable)
            .with_debug(true)
            .with_seed(11);

        let data = assemble_episodes(&[ep], &config).unwrap();
        assert_eq!(data.len(), 10);
        assert_eq!(data.input_dim(), 5);
        for (input, _) in data.iter() {
            assert!(input[2..].iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn assemble_episodes_empty() {
        let err = assemble_episodes(&[], &AssemblyConfig::default()).unwrap_err();
        assert!(matches!(err, DatasetError::EmptyDataset));
    }

    #[test]
    fn assembly_config_serialization() {
        let config = AssemblyConfig::new(CameraMode::Fixed)
            .with_camera_match(CameraMatch::Crossed)
            .with_latent_step(LatentStep::Index(2));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("crossed"));
        let parsed: AssemblyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
