use egui::Color32;
use thiserror::Error;

use crate::store::WorkoutRecord;

/// Marker area per unit of normalized calorie intensity.
pub const SIZE_SCALE: f64 = 100.0;

/// Errors from the calories-versus-distance computation.
#[derive(Debug, Error, PartialEq)]
pub enum PlotError {
    #[error("no data available for calculation")]
    NoData,

    #[error("calculation error: {0}")]
    Computation(String),
}

/// One marker of the calories-versus-distance scatter plot.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub distance: f64,
    pub calories: f64,
    /// Marker area, `SIZE_SCALE * normalized`.
    pub size: f64,
    /// Calorie intensity rescaled to `[0, 1]`, drives the color scale.
    pub normalized: f64,
}

/// Rescale calorie values linearly to `[0, 1]`.
///
/// When every value is identical the whole set maps to `1.0` instead of
/// dividing by a zero range.
pub fn normalize_calories(calories: &[f64]) -> Vec<f64> {
    let Some(min) = calories.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = calories.iter().copied().fold(min, f64::max);

    if min == max {
        vec![1.0; calories.len()]
    } else {
        calories.iter().map(|c| (c - min) / (max - min)).collect()
    }
}

/// Turn the full record set into scatter markers: x = distance, y = calories,
/// with normalized calories encoded as both marker size and color value.
///
/// Markers come back in ascending-calorie order; that affects draw order
/// only. An empty set is [`PlotError::NoData`], surfaced to the user as a
/// warning rather than a crash.
pub fn calorie_distance_scatter(records: &[WorkoutRecord]) -> Result<Vec<ScatterPoint>, PlotError> {
    if records.is_empty() {
        return Err(PlotError::NoData);
    }

    let mut pairs: Vec<(f64, f64)> = records
        .iter()
        .map(|r| (r.distance, r.calories as f64))
        .collect();

    // Inserts are validated, but legacy rows can still hold junk.
    for (distance, calories) in &pairs {
        if !distance.is_finite() || !calories.is_finite() {
            return Err(PlotError::Computation(format!(
                "non-numeric stored values: distance {distance}, calories {calories}"
            )));
        }
    }

    pairs.sort_by(|a, b| a.1.total_cmp(&b.1));

    let calories: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let normalized = normalize_calories(&calories);

    Ok(pairs
        .iter()
        .zip(normalized)
        .map(|(&(distance, calories), normalized)| ScatterPoint {
            distance,
            calories,
            size: SIZE_SCALE * normalized,
            normalized,
        })
        .collect())
}

/// Viridis color for a normalized value, used by the colorbar.
pub fn scale_color(normalized: f64) -> Color32 {
    let c = colorous::VIRIDIS.eval_continuous(normalized.clamp(0.0, 1.0));
    Color32::from_rgb(c.r, c.g, c.b)
}

/// Marker fill for a normalized value, drawn half transparent.
pub fn point_color(normalized: f64) -> Color32 {
    let c = scale_color(normalized);
    Color32::from_rgba_unmultiplied(c.r(), c.g(), c.b(), 128)
}
