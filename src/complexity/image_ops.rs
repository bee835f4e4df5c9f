//! Raster measurements behind the complexity scores.
//!
//! Pure-Rust equivalents of the OpenCV pipeline: Otsu binarization,
//! Canny edges, wide-kernel morphological opening for line extraction,
//! and contour heuristics. Opening a binary image with a 1×N segment
//! keeps exactly the foreground runs of length ≥ N, so the line masks
//! are computed as run-length filters instead of erode+dilate passes.

use std::path::Path;

use image::GrayImage;
use imageproc::contours::{find_contours, Contour};
use imageproc::edges::canny;
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

use crate::error::TriageError;

/// Canny hysteresis thresholds.
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

/// Minimum pixel run treated as a table rule line.
const LINE_KERNEL_LEN: u32 = 40;

/// Scale constant mapping intersection density to [0,1].
const TABLE_NORMALIZATION: f32 = 1000.0;

/// Contours smaller than this (in px²) are noise.
const MIN_CONTOUR_AREA: f64 = 100.0;

/// Area divisor for contour-density normalization.
const CONTOUR_NORMALIZATION: f32 = 10_000.0;

/// Cap on the quadratic nesting scan.
const MAX_NESTING_CONTOURS: usize = 512;

/// Polygon-approximation tolerance as a fraction of the perimeter.
const APPROX_EPSILON_RATIO: f64 = 0.02;

/// Load an image as 8-bit grayscale. Zero-area images are rejected so
/// downstream normalizations never divide by zero.
pub fn load_grayscale(path: &Path) -> Result<GrayImage, TriageError> {
    let gray = image::open(path)?.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(TriageError::Input(format!(
            "image has zero area: {}",
            path.display()
        )));
    }
    Ok(gray)
}

/// Otsu's threshold level: maximizes between-class variance over the
/// 256-bin histogram.
pub fn otsu_level(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total = gray.width() as u64 * gray.height() as u64;
    let weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut best_level = 0u8;
    let mut best_variance = 0.0f64;
    let mut background_weight = 0u64;
    let mut background_sum = 0.0f64;

    for level in 0..256usize {
        background_weight += histogram[level];
        if background_weight == 0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0 {
            break;
        }

        background_sum += level as f64 * histogram[level] as f64;
        let mean_background = background_sum / background_weight as f64;
        let mean_foreground = (weighted_sum - background_sum) / foreground_weight as f64;
        let diff = mean_background - mean_foreground;
        let variance = background_weight as f64 * foreground_weight as f64 * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }

    best_level
}

/// Binary ink mask: pixels at or below the Otsu level become 255.
pub fn ink_mask(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    let mut mask = GrayImage::new(gray.width(), gray.height());
    for (source, target) in gray.pixels().zip(mask.pixels_mut()) {
        target.0[0] = if source.0[0] <= level { 255 } else { 0 };
    }
    mask
}

/// Fraction of foreground (ink) pixels after Otsu binarization,
/// scaled ×2 since text pages rarely exceed 50% ink. Clamped to [0,1].
pub fn text_density(gray: &GrayImage) -> f32 {
    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let mask = ink_mask(gray);
    let ink = mask.pixels().filter(|p| p.0[0] > 0).count();
    ((ink as f32 / total as f32) * 2.0).min(1.0)
}

/// Density of grid intersections between long horizontal and long
/// vertical edge runs, normalized by image area. Clamped to [0,1].
pub fn table_complexity(gray: &GrayImage) -> f32 {
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    let horizontal = horizontal_line_mask(&edges, LINE_KERNEL_LEN);
    let vertical = vertical_line_mask(&edges, LINE_KERNEL_LEN);

    let intersections = horizontal
        .pixels()
        .zip(vertical.pixels())
        .filter(|(h, v)| h.0[0] > 0 && v.0[0] > 0)
        .count();

    let area = gray.width() as f32 * gray.height() as f32;
    if area == 0.0 {
        return 0.0;
    }
    ((intersections as f32 / area) * TABLE_NORMALIZATION).min(1.0)
}

/// Keep only horizontal foreground runs of length ≥ `min_len`.
fn horizontal_line_mask(mask: &GrayImage, min_len: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let mut run_start = 0u32;
        let mut run_len = 0u32;
        for x in 0..=width {
            let on = x < width && mask.get_pixel(x, y).0[0] > 0;
            if on {
                if run_len == 0 {
                    run_start = x;
                }
                run_len += 1;
            } else {
                if run_len >= min_len {
                    for fill in run_start..run_start + run_len {
                        out.put_pixel(fill, y, image::Luma([255]));
                    }
                }
                run_len = 0;
            }
        }
    }
    out
}

/// Keep only vertical foreground runs of length ≥ `min_len`.
fn vertical_line_mask(mask: &GrayImage, min_len: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    for x in 0..width {
        let mut run_start = 0u32;
        let mut run_len = 0u32;
        for y in 0..=height {
            let on = y < height && mask.get_pixel(x, y).0[0] > 0;
            if on {
                if run_len == 0 {
                    run_start = y;
                }
                run_len += 1;
            } else {
                if run_len >= min_len {
                    for fill in run_start..run_start + run_len {
                        out.put_pixel(x, fill, image::Luma([255]));
                    }
                }
                run_len = 0;
            }
        }
    }
    out
}

/// Weighted blend of contour density, nesting depth, and shape
/// irregularity over the ink mask. Clamped to [0,1].
pub fn structure_complexity(gray: &GrayImage) -> f32 {
    let mask = ink_mask(gray);
    let contours = find_contours::<u32>(&mask);

    let areas: Vec<f64> = contours.iter().map(|c| contour_area(&c.points)).collect();
    let significant: Vec<&Contour<u32>> = contours
        .iter()
        .zip(&areas)
        .filter(|(_, &area)| area > MIN_CONTOUR_AREA)
        .map(|(contour, _)| contour)
        .collect();

    let image_area = gray.width() as f32 * gray.height() as f32;
    if image_area == 0.0 {
        return 0.0;
    }
    let density = significant.len() as f32 / (image_area / CONTOUR_NORMALIZATION);

    let nesting = nesting_complexity(&contours, &areas);
    let shape = shape_complexity(&significant);

    (density * 0.5 + nesting * 0.3 + shape * 0.2).min(1.0)
}

/// Signed shoelace area of a closed pixel contour.
fn contour_area(points: &[Point<u32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut doubled = 0.0f64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        doubled += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    (doubled / 2.0).abs()
}

fn bounding_box(points: &[Point<u32>]) -> (u32, u32, u32, u32) {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    (min_x, min_y, max_x, max_y)
}

/// Fraction of contour pairs where the smaller contour sits inside the
/// larger one's bounding box. Quadratic, so the scan is capped.
fn nesting_complexity(contours: &[Contour<u32>], areas: &[f64]) -> f32 {
    if contours.is_empty() {
        return 0.0;
    }
    let limit = contours.len().min(MAX_NESTING_CONTOURS);
    let boxes: Vec<_> = contours[..limit]
        .iter()
        .map(|c| bounding_box(&c.points))
        .collect();

    let mut nested = 0usize;
    for i in 0..limit {
        for j in 0..limit {
            if i == j || areas[i] >= areas[j] {
                continue;
            }
            let (ix0, iy0, ix1, iy1) = boxes[i];
            let (jx0, jy0, jx1, jy1) = boxes[j];
            if ix0 >= jx0 && iy0 >= jy0 && ix1 <= jx1 && iy1 <= jy1 {
                nested += 1;
            }
        }
    }

    (nested as f32 / limit as f32).min(1.0)
}

/// Mean per-contour irregularity: approximated-polygon vertex count
/// plus bounding-box aspect ratio, each normalized and averaged.
fn shape_complexity(contours: &[&Contour<u32>]) -> f32 {
    if contours.is_empty() {
        return 0.0;
    }

    let mut scores = Vec::with_capacity(contours.len());
    for contour in contours {
        let perimeter = arc_length(&contour.points);
        let epsilon = APPROX_EPSILON_RATIO * perimeter;
        let approx = approximate_polygon_dp(&contour.points, epsilon, true);
        let vertex_complexity = (approx.len() as f32 / 20.0).min(1.0);

        let (x0, y0, x1, y1) = bounding_box(&contour.points);
        let w = x1.saturating_sub(x0).max(1) as f32;
        let h = y1.saturating_sub(y0).max(1) as f32;
        let aspect = w.max(h) / w.min(h);
        let aspect_complexity = (aspect / 10.0).min(1.0);

        scores.push((vertex_complexity + aspect_complexity) / 2.0);
    }

    scores.iter().sum::<f32>() / scores.len() as f32
}

/// Closed polyline length of a contour.
fn arc_length(points: &[Point<u32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut length = 0.0f64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let dx = a.x as f64 - b.x as f64;
        let dy = a.y as f64 - b.y as f64;
        length += (dx * dx + dy * dy).sqrt();
    }
    length
}

/// Brightness statistics for analysis metadata.
pub fn brightness_stats(gray: &GrayImage) -> (f32, f32, u8, u8) {
    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return (0.0, 0.0, 0, 0);
    }

    let mut sum = 0.0f64;
    let mut min = u8::MAX;
    let mut max = 0u8;
    for pixel in gray.pixels() {
        let v = pixel.0[0];
        sum += v as f64;
        min = min.min(v);
        max = max.max(v);
    }
    let mean = sum / total as f64;

    let variance: f64 = gray
        .pixels()
        .map(|p| {
            let d = p.0[0] as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / total as f64;

    (mean as f32, variance.sqrt() as f32, min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White canvas with a black grid of `lines` horizontal and
    /// vertical rules.
    fn grid_image(size: u32, lines: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(size, size, image::Luma([255]));
        let step = size / (lines + 1);
        for i in 1..=lines {
            let pos = i * step;
            for t in 0..size {
                img.put_pixel(t, pos, image::Luma([0]));
                img.put_pixel(pos, t, image::Luma([0]));
            }
        }
        img
    }

    fn blank_image(size: u32) -> GrayImage {
        GrayImage::from_pixel(size, size, image::Luma([255]))
    }

    #[test]
    fn blank_image_has_no_table_structure() {
        let img = blank_image(200);
        assert_eq!(table_complexity(&img), 0.0);
        assert_eq!(text_density(&img), 0.0);
    }

    #[test]
    fn grid_image_scores_table_complexity() {
        let img = grid_image(200, 4);
        assert!(table_complexity(&img) > 0.0);
    }

    #[test]
    fn grid_scores_higher_than_blank() {
        let grid = grid_image(200, 6);
        let blank = blank_image(200);
        assert!(table_complexity(&grid) > table_complexity(&blank));
        assert!(text_density(&grid) > text_density(&blank));
    }

    #[test]
    fn density_is_clamped() {
        let black = GrayImage::from_pixel(50, 50, image::Luma([0]));
        // Uniform image: Otsu cannot split, treat as no usable signal.
        let d = text_density(&black);
        assert!((0.0..=1.0).contains(&d));
    }

    #[test]
    fn otsu_separates_bimodal_histogram() {
        let mut img = GrayImage::from_pixel(10, 10, image::Luma([220]));
        for y in 0..10 {
            for x in 0..5 {
                img.put_pixel(x, y, image::Luma([30]));
            }
        }
        let level = otsu_level(&img);
        assert!(level >= 30 && level < 220);
    }

    #[test]
    fn structure_scores_within_bounds() {
        for img in [blank_image(120), grid_image(120, 3)] {
            let s = structure_complexity(&img);
            assert!((0.0..=1.0).contains(&s), "structure score {s} out of range");
        }
    }

    #[test]
    fn shoelace_area_of_square() {
        let points = vec![
            Point::new(0u32, 0u32),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(contour_area(&points), 100.0);
    }
}
