//! PNG rendering of epoch reports.
//!
//! Plots are drawn straight into an [`RgbImage`]: prediction scatters,
//! latent histograms and loss curves. There are no labels; train is blue,
//! validation orange.

use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};
use tracing::debug;

use crate::error::{Result, TrainingError};
use crate::metrics::TrainingMetrics;
use crate::report::{EpochReport, EpochReporter, LatentStats, PositionSet};

/// Side of one square plot panel, in pixels.
pub const PANEL: u32 = 240;

const MARGIN: u32 = 16;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GUIDE: Rgb<u8> = Rgb([190, 190, 190]);

/// Colour of training series.
pub const TRAIN: Rgb<u8> = Rgb([31, 119, 180]);

/// Colour of validation series.
pub const VAL: Rgb<u8> = Rgb([255, 127, 14]);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    min: f32,
    max: f32,
}

impl Bounds {
    /// Range of the finite values. Flat or empty input gets a unit span.
    fn of(values: impl IntoIterator<Item = f32>) -> Self {
        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if min > max {
            Self { min: 0.0, max: 1.0 }
        } else if max - min <= f32::EPSILON {
            Self {
                min: min - 0.5,
                max: max + 0.5,
            }
        } else {
            Self { min, max }
        }
    }

    fn fraction(self, v: f32) -> f32 {
        ((v - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

type Pixel = (i64, i64);

struct Canvas {
    img: RgbImage,
}

impl Canvas {
    fn new(panels: u32) -> Self {
        Self {
            img: RgbImage::from_pixel(PANEL * panels.max(1), PANEL, BACKGROUND),
        }
    }

    /// Pixel of `(fx, fy)` in `[0, 1]^2` inside `panel`, y pointing up.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn pixel(panel: u32, fx: f32, fy: f32) -> Pixel {
        let span = (PANEL - 2 * MARGIN) as f32;
        let x = panel * PANEL + MARGIN + (fx.clamp(0.0, 1.0) * span).round() as u32;
        let y = PANEL - MARGIN - (fy.clamp(0.0, 1.0) * span).round() as u32;
        (i64::from(x), i64::from(y))
    }

    fn put(&mut self, (x, y): Pixel, color: Rgb<u8>) {
        if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
            if x < self.img.width() && y < self.img.height() {
                self.img.put_pixel(x, y, color);
            }
        }
    }

    fn line(&mut self, from: Pixel, to: Pixel, color: Rgb<u8>) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put((x, y), color);
            if (x, y) == to {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn marker(&mut self, (x, y): Pixel, color: Rgb<u8>) {
        for dx in -1..=1 {
            for dy in -1..=1 {
                self.put((x + dx, y + dy), color);
            }
        }
    }

    fn fill(&mut self, low: Pixel, high: Pixel, color: Rgb<u8>) {
        for x in low.0.min(high.0)..=low.0.max(high.0) {
            for y in low.1.min(high.1)..=low.1.max(high.1) {
                self.put((x, y), color);
            }
        }
    }

    fn axes(&mut self, panel: u32) {
        let origin = Self::pixel(panel, 0.0, 0.0);
        self.line(origin, Self::pixel(panel, 1.0, 0.0), AXIS);
        self.line(origin, Self::pixel(panel, 0.0, 1.0), AXIS);
    }
}

/// Target (horizontal) against predicted (vertical) position, one panel per
/// axis, over the identity diagonal.
#[must_use]
pub fn scatter_image(sets: &[(&PositionSet, Rgb<u8>)]) -> RgbImage {
    let mut canvas = Canvas::new(3);
    for (axis, panel) in (0..3).zip(0u32..) {
        let bounds = Bounds::of(sets.iter().flat_map(|(set, _)| {
            set.predicted
                .iter()
                .chain(&set.target)
                .map(move |p| p[axis])
        }));
        canvas.line(
            Canvas::pixel(panel, 0.0, 0.0),
            Canvas::pixel(panel, 1.0, 1.0),
            GUIDE,
        );
        canvas.axes(panel);
        for (set, color) in sets {
            for (predicted, target) in set.predicted.iter().zip(&set.target) {
                let at = Canvas::pixel(
                    panel,
                    bounds.fraction(target[axis]),
                    bounds.fraction(predicted[axis]),
                );
                canvas.marker(at, *color);
            }
        }
    }
    canvas.img
}

/// Histogram bars of each latent dimension, one panel per dimension.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn histogram_image(stats: &[LatentStats]) -> RgbImage {
    let panels = u32::try_from(stats.len()).unwrap_or(u32::MAX / PANEL);
    let mut canvas = Canvas::new(panels);
    for (dim, panel) in stats.iter().zip(0u32..) {
        canvas.axes(panel);
        let bins = dim.histogram.len().max(1) as f32;
        let tallest = dim.histogram.iter().copied().max().unwrap_or(0).max(1) as f32;
        for (i, &count) in dim.histogram.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let left = i as f32 / bins;
            let right = (i + 1) as f32 / bins;
            canvas.fill(
                Canvas::pixel(panel, left, 0.0),
                Canvas::pixel(panel, right, count as f32 / tallest),
                TRAIN,
            );
        }
    }
    canvas.img
}

/// Train and validation curves over epochs on a shared scale.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn curves_image(train: &[f32], val: &[f32]) -> RgbImage {
    let mut canvas = Canvas::new(1);
    canvas.axes(0);
    let bounds = Bounds::of(train.iter().chain(val).copied());
    let epochs = train.len().max(val.len());
    let x = |i: usize| {
        if epochs > 1 {
            i as f32 / (epochs - 1) as f32
        } else {
            0.5
        }
    };

    for (series, color) in [(train, TRAIN), (val, VAL)] {
        let mut previous = None;
        for (i, &v) in series.iter().enumerate() {
            if !v.is_finite() {
                previous = None;
                continue;
            }
            let at = Canvas::pixel(0, x(i), bounds.fraction(v));
            if let Some(from) = previous {
                canvas.line(from, at, color);
            }
            canvas.marker(at, color);
            previous = Some(at);
        }
    }
    canvas.img
}

/// Writes PNG plots into a directory, overwriting them every epoch.
///
/// Files: `train_scatter.png`, `val_scatter.png`, `full_scatter.png`,
/// `latents_distribution.png`, `avg_mse.png`, `avg_log_mse.png`.
#[derive(Debug, Clone)]
pub struct PngReporter {
    dir: PathBuf,
}

impl PngReporter {
    /// Creates a reporter writing into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Artifact`] if `dir` cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| TrainingError::artifact(&dir, e))?;
        Ok(Self { dir })
    }

    /// Output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn save(&self, name: &str, img: &RgbImage) -> Result<()> {
        let path = self.dir.join(name);
        img.save_with_format(&path, ImageFormat::Png)
            .map_err(|e| TrainingError::artifact(&path, e))
    }
}

impl EpochReporter for PngReporter {
    fn report(&mut self, report: &EpochReport, metrics: &TrainingMetrics) -> Result<()> {
        self.save("train_scatter.png", &scatter_image(&[(&report.train, TRAIN)]))?;
        self.save("val_scatter.png", &scatter_image(&[(&report.val, VAL)]))?;
        self.save(
            "full_scatter.png",
            &scatter_image(&[(&report.train, TRAIN), (&report.val, VAL)]),
        )?;
        self.save(
            "latents_distribution.png",
            &histogram_image(&LatentStats::per_dimension(&report.latents)),
        )?;

        let train = metrics.train_losses();
        let val = metrics.val_losses();
        self.save("avg_mse.png", &curves_image(&train, &val))?;
        let ln = |v: &[f32]| -> Vec<f32> { v.iter().map(|x| x.ln()).collect() };
        self.save("avg_log_mse.png", &curves_image(&ln(&train), &ln(&val)))?;

        debug!(epoch = report.epoch, dir = %self.dir.display(), "wrote epoch plots");
        Ok(())
    }
}
