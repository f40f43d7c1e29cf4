//! 64-bit perceptual hash.
//!
//! The image is reduced to 32x32 grayscale, transformed with a 2D
//! DCT-II, and the top-left 8x8 coefficient block (minus the DC term)
//! is compared against its median. Two hashes within Hamming distance
//! 15 are considered similar by the cluster analyzer.

use image::DynamicImage;

const DCT_SIZE: usize = 32;
const BLOCK: usize = 8;

/// Compute the perceptual hash of an already-decoded image.
pub fn perceptual_hash(img: &DynamicImage) -> u64 {
    let gray = img
        .resize_exact(
            DCT_SIZE as u32,
            DCT_SIZE as u32,
            image::imageops::FilterType::Lanczos3,
        )
        .to_luma8();

    let mut pixels = [[0f64; DCT_SIZE]; DCT_SIZE];
    for (x, y, p) in gray.enumerate_pixels() {
        pixels[y as usize][x as usize] = p.0[0] as f64;
    }

    let coeffs = dct_2d(&pixels);

    // Top-left 8x8 block, skipping the DC term at (0,0).
    let mut block = [0f64; BLOCK * BLOCK - 1];
    let mut i = 0;
    for (y, row) in coeffs.iter().take(BLOCK).enumerate() {
        for (x, &c) in row.iter().take(BLOCK).enumerate() {
            if x == 0 && y == 0 {
                continue;
            }
            block[i] = c;
            i += 1;
        }
    }

    let median = median_of(&block);

    let mut hash: u64 = 0;
    for (bit, &c) in block.iter().enumerate() {
        if c > median {
            hash |= 1u64 << bit;
        }
    }
    hash
}

/// Hamming distance between two 64-bit hashes.
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn median_of(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// 2D DCT-II, rows then columns. 32x32 is small enough that the direct
/// O(n^3) form beats setting up an FFT.
fn dct_2d(input: &[[f64; DCT_SIZE]; DCT_SIZE]) -> [[f64; DCT_SIZE]; DCT_SIZE] {
    let table = cosine_table();

    let mut rows = [[0f64; DCT_SIZE]; DCT_SIZE];
    for y in 0..DCT_SIZE {
        for u in 0..DCT_SIZE {
            let mut sum = 0f64;
            for (x, cos_row) in table.iter().enumerate() {
                sum += input[y][x] * cos_row[u];
            }
            rows[y][u] = sum;
        }
    }

    let mut out = [[0f64; DCT_SIZE]; DCT_SIZE];
    for u in 0..DCT_SIZE {
        for v in 0..DCT_SIZE {
            let mut sum = 0f64;
            for (y, cos_row) in table.iter().enumerate() {
                sum += rows[y][u] * cos_row[v];
            }
            out[v][u] = sum;
        }
    }
    out
}

/// table[x][u] = cos(pi * (2x + 1) * u / (2 * N))
fn cosine_table() -> [[f64; DCT_SIZE]; DCT_SIZE] {
    let mut table = [[0f64; DCT_SIZE]; DCT_SIZE];
    for (x, row) in table.iter_mut().enumerate() {
        for (u, cell) in row.iter_mut().enumerate() {
            *cell = (std::f64::consts::PI * (2 * x + 1) as f64 * u as f64
                / (2 * DCT_SIZE) as f64)
                .cos();
        }
    }
    table
}

pub fn to_hex(hash: u64) -> String {
    format!("{:016x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn gradient_image() -> DynamicImage {
        let img = RgbImage::from_fn(128, 128, |x, y| {
            image::Rgb([(x * 2) as u8, (y * 2) as u8, ((x + y) / 2) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn flat_image(value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, image::Rgb([value; 3])))
    }

    #[test]
    fn test_hash_is_deterministic() {
        let img = gradient_image();
        assert_eq!(perceptual_hash(&img), perceptual_hash(&img));
    }

    #[test]
    fn test_identical_images_have_distance_zero() {
        let a = perceptual_hash(&gradient_image());
        let b = perceptual_hash(&gradient_image());
        assert_eq!(hamming(a, b), 0);
    }

    #[test]
    fn test_resized_copy_stays_close() {
        let img = gradient_image();
        let smaller = img.resize_exact(96, 96, image::imageops::FilterType::Lanczos3);
        let d = hamming(perceptual_hash(&img), perceptual_hash(&smaller));
        assert!(d <= 5, "resized copy should be near-identical, distance {}", d);
    }

    #[test]
    fn test_unrelated_images_are_far() {
        let gradient = perceptual_hash(&gradient_image());
        let checker = {
            let img = RgbImage::from_fn(128, 128, |x, y| {
                if (x / 8 + y / 8) % 2 == 0 {
                    image::Rgb([255, 255, 255])
                } else {
                    image::Rgb([0, 0, 0])
                }
            });
            perceptual_hash(&DynamicImage::ImageRgb8(img))
        };
        assert!(
            hamming(gradient, checker) > 15,
            "gradient vs checkerboard must not cluster"
        );
    }

    #[test]
    fn test_flat_images_hash_without_panic() {
        // all-equal coefficients: median comparison must not divide by zero
        let h = perceptual_hash(&flat_image(128));
        // no bit can exceed the 63 AC positions
        assert_eq!(h >> 63, 0);
    }

    #[test]
    fn test_hex_roundtrip() {
        let h = perceptual_hash(&gradient_image());
        let hex = to_hex(h);
        assert_eq!(hex.len(), 16);
        assert_eq!(u64::from_str_radix(&hex, 16).unwrap(), h);
    }

    #[test]
    fn test_hamming_counts_bits() {
        assert_eq!(hamming(0, 0), 0);
        assert_eq!(hamming(0b1011, 0b1000), 2);
        assert_eq!(hamming(u64::MAX, 0), 64);
    }
}
