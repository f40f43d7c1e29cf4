//! Dominant-color extraction.
//!
//! k-means in RGB space over the 256-edge thumbnail, k-means++ seeding,
//! at most 100 iterations. Each centroid is converted to HSL and mapped
//! onto the fixed 11-name palette (black, white, gray, red, orange,
//! yellow, green, blue, purple, pink, brown).

use crate::catalog::model::ColorSample;
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MAX_COLORS: usize = 5;
const MAX_ITERATIONS: usize = 100;

/// Seed for the k-means++ draw. Fixed so palettes are reproducible
/// across runs of the same catalog.
const KMEANS_SEED: u64 = 0x5eed_0fc0_1045;

/// Extract up to five dominant colors from a thumbnail.
pub fn extract_palette(thumb: &RgbImage) -> Vec<ColorSample> {
    let pixels: Vec<[f64; 3]> = thumb
        .pixels()
        .map(|p| [p.0[0] as f64, p.0[1] as f64, p.0[2] as f64])
        .collect();
    if pixels.is_empty() {
        return Vec::new();
    }

    let k = MAX_COLORS.min(distinct_cap(&pixels));
    let (centroids, assignments) = kmeans(&pixels, k);

    let mut counts = vec![0usize; centroids.len()];
    for &a in &assignments {
        counts[a] += 1;
    }
    let total = pixels.len() as f64;

    let mut samples: Vec<(usize, [f64; 3])> = centroids
        .into_iter()
        .enumerate()
        .filter(|(i, _)| counts[*i] > 0)
        .map(|(i, c)| (counts[i], c))
        .collect();
    samples.sort_by(|a, b| b.0.cmp(&a.0));

    samples
        .into_iter()
        .enumerate()
        .map(|(rank, (count, c))| {
            let r = c[0].round().clamp(0.0, 255.0) as u8;
            let g = c[1].round().clamp(0.0, 255.0) as u8;
            let b = c[2].round().clamp(0.0, 255.0) as u8;
            let (hue, saturation, lightness) = rgb_to_hsl(r, g, b);
            ColorSample {
                rank: rank as u8,
                r,
                g,
                b,
                hue,
                saturation,
                lightness,
                weight: count as f64 / total,
                name: color_name(hue, saturation, lightness).to_string(),
            }
        })
        .collect()
}

/// Cheap upper bound on distinct colors so k never exceeds what the
/// image can support (a flat image must yield a single cluster).
fn distinct_cap(pixels: &[[f64; 3]]) -> usize {
    let mut seen = std::collections::HashSet::new();
    for p in pixels {
        seen.insert([p[0] as u8, p[1] as u8, p[2] as u8]);
        if seen.len() > MAX_COLORS {
            return MAX_COLORS;
        }
    }
    seen.len().max(1)
}

fn kmeans(pixels: &[[f64; 3]], k: usize) -> (Vec<[f64; 3]>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(KMEANS_SEED);
    let mut centroids = seed_plus_plus(pixels, k, &mut rng);
    let mut assignments = vec![0usize; pixels.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, p) in pixels.iter().enumerate() {
            let nearest = nearest_centroid(p, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![[0f64; 3]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (i, p) in pixels.iter().enumerate() {
            let a = assignments[i];
            for d in 0..3 {
                sums[a][d] += p[d];
            }
            counts[a] += 1;
        }
        for (c, centroid) in centroids.iter_mut().enumerate() {
            if counts[c] > 0 {
                for d in 0..3 {
                    centroid[d] = sums[c][d] / counts[c] as f64;
                }
            }
        }
    }

    (centroids, assignments)
}

/// k-means++: first centroid uniform, then each next proportional to
/// squared distance from the nearest chosen centroid.
fn seed_plus_plus(pixels: &[[f64; 3]], k: usize, rng: &mut StdRng) -> Vec<[f64; 3]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(pixels[rng.gen_range(0..pixels.len())]);

    while centroids.len() < k {
        let dists: Vec<f64> = pixels
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| dist_sq(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = dists.iter().sum();
        if total <= f64::EPSILON {
            // all remaining pixels coincide with a centroid
            break;
        }
        let mut target = rng.gen::<f64>() * total;
        let mut chosen = pixels.len() - 1;
        for (i, d) in dists.iter().enumerate() {
            target -= d;
            if target <= 0.0 {
                chosen = i;
                break;
            }
        }
        centroids.push(pixels[chosen]);
    }
    centroids
}

fn nearest_centroid(p: &[f64; 3], centroids: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = dist_sq(p, c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

fn dist_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

/// RGB (0-255) to HSL: hue in degrees [0,360), saturation and lightness
/// normalised to [0,1].
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if (max - r).abs() < f64::EPSILON {
        ((g - b) / d).rem_euclid(6.0)
    } else if (max - g).abs() < f64::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    } * 60.0;

    (h.rem_euclid(360.0), s, l)
}

/// Map an HSL triple onto the 11-name palette.
///
/// Achromatic thresholds first (black/white/gray), then brown as a dark
/// warm hue, then hue sectors.
pub fn color_name(hue: f64, saturation: f64, lightness: f64) -> &'static str {
    if lightness < 0.12 {
        return "black";
    }
    if lightness > 0.92 {
        return "white";
    }
    if saturation < 0.12 {
        return "gray";
    }
    if (15.0..70.0).contains(&hue) && lightness < 0.35 {
        return "brown";
    }
    match hue {
        h if h < 15.0 || h >= 345.0 => {
            if lightness > 0.72 {
                "pink"
            } else {
                "red"
            }
        }
        h if h < 45.0 => "orange",
        h if h < 70.0 => "yellow",
        h if h < 170.0 => "green",
        h if h < 255.0 => "blue",
        h if h < 290.0 => "purple",
        _ => "pink",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn flat(r: u8, g: u8, b: u8) -> RgbImage {
        RgbImage::from_pixel(32, 32, Rgb([r, g, b]))
    }

    #[test]
    fn test_flat_image_yields_single_full_weight_color() {
        let palette = extract_palette(&flat(200, 30, 30));
        assert_eq!(palette.len(), 1);
        assert_eq!(palette[0].rank, 0);
        assert!((palette[0].weight - 1.0).abs() < 1e-9);
        assert_eq!(palette[0].name, "red");
    }

    #[test]
    fn test_two_tone_image_splits_weight() {
        let img = RgbImage::from_fn(32, 32, |x, _| {
            if x < 16 {
                Rgb([250, 10, 10])
            } else {
                Rgb([10, 10, 250])
            }
        });
        let palette = extract_palette(&img);
        assert_eq!(palette.len(), 2);
        let weights: f64 = palette.iter().map(|c| c.weight).sum();
        assert!((weights - 1.0).abs() < 1e-9, "weights must sum to 1");
        for c in &palette {
            assert!((c.weight - 0.5).abs() < 0.05, "even split expected, got {}", c.weight);
        }
        let names: Vec<&str> = palette.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"red"));
        assert!(names.contains(&"blue"));
    }

    #[test]
    fn test_weights_sum_to_one_on_noisy_image() {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
        });
        let palette = extract_palette(&img);
        assert!(!palette.is_empty() && palette.len() <= 5);
        let sum: f64 = palette.iter().map(|c| c.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        // ranks are dense and ordered by weight
        for (i, c) in palette.iter().enumerate() {
            assert_eq!(c.rank as usize, i);
            if i > 0 {
                assert!(palette[i - 1].weight >= c.weight);
            }
        }
    }

    #[test]
    fn test_palette_is_deterministic() {
        let img = RgbImage::from_fn(48, 48, |x, y| Rgb([(x * 5) as u8, 100, (y * 5) as u8]));
        let a = extract_palette(&img);
        let b = extract_palette(&img);
        assert_eq!(a, b);
    }

    #[test]
    fn test_rgb_to_hsl_primaries() {
        let (h, s, l) = rgb_to_hsl(255, 0, 0);
        assert!(h.abs() < 1e-9 && s > 0.99 && (l - 0.5).abs() < 1e-9);
        let (h, _, _) = rgb_to_hsl(0, 255, 0);
        assert!((h - 120.0).abs() < 1e-9);
        let (h, _, _) = rgb_to_hsl(0, 0, 255);
        assert!((h - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_color_names_cover_the_eleven() {
        assert_eq!(color_name(0.0, 0.0, 0.05), "black");
        assert_eq!(color_name(0.0, 0.0, 0.95), "white");
        assert_eq!(color_name(100.0, 0.05, 0.5), "gray");
        assert_eq!(color_name(0.0, 0.9, 0.45), "red");
        assert_eq!(color_name(30.0, 0.9, 0.5), "orange");
        assert_eq!(color_name(30.0, 0.9, 0.25), "brown");
        assert_eq!(color_name(60.0, 0.9, 0.5), "yellow");
        assert_eq!(color_name(120.0, 0.9, 0.5), "green");
        assert_eq!(color_name(220.0, 0.9, 0.5), "blue");
        assert_eq!(color_name(270.0, 0.9, 0.5), "purple");
        assert_eq!(color_name(320.0, 0.9, 0.5), "pink");
        assert_eq!(color_name(0.0, 0.9, 0.8), "pink");
    }
}
