use common_types::{Error, Result};
use image::imageops::FilterType;
use image::GenericImageView;

const DOWNSAMPLE: usize = 32;
const DCT_BLOCK: usize = 8;

/// Computes a fixed-width hex perceptual hash: grayscale 32x32 downsample,
/// 8x8 DCT low-frequency coefficients compared against their median
/// (spec.md §4.2, §9 Open Questions — parameters fixed here so any
/// implementation matching them stays interoperable with stored hashes).
pub fn perceptual_hash(bytes: &[u8]) -> Result<String> {
    let img = image::load_from_memory(bytes).map_err(|e| Error::Internal(e.to_string()))?;
    let gray = img
        .resize_exact(DOWNSAMPLE as u32, DOWNSAMPLE as u32, FilterType::Lanczos3)
        .grayscale();

    let mut pixels = [[0f64; DOWNSAMPLE]; DOWNSAMPLE];
    for y in 0..DOWNSAMPLE as u32 {
        for x in 0..DOWNSAMPLE as u32 {
            let px = gray.get_pixel(x, y);
            pixels[y as usize][x as usize] = f64::from(px.0[0]);
        }
    }

    let dct = dct_2d(&pixels);

    // Low-frequency 8x8 block, DC term (0,0) excluded from the median.
    let mut coeffs = Vec::with_capacity(DCT_BLOCK * DCT_BLOCK - 1);
    for row in dct.iter().take(DCT_BLOCK) {
        for &v in row.iter().take(DCT_BLOCK) {
            coeffs.push(v);
        }
    }
    let dc = coeffs.remove(0);
    let median = median_of(&coeffs);

    let mut bits: u64 = 0;
    bits |= u64::from(dc > median) << 63;
    for (i, &v) in coeffs.iter().enumerate() {
        if v > median {
            bits |= 1u64 << (62 - i);
        }
    }

    Ok(format!("{bits:016x}"))
}

fn median_of(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Naive separable 2D DCT-II. `DOWNSAMPLE` is small (32x32) so an O(n^3)
/// implementation (n^2 outputs, n-term sums) is fast enough without a
/// dedicated FFT/DCT crate.
fn dct_2d(input: &[[f64; DOWNSAMPLE]; DOWNSAMPLE]) -> Vec<Vec<f64>> {
    let n = DOWNSAMPLE;
    let mut rows = vec![vec![0f64; n]; n];
    for (y, row) in input.iter().enumerate() {
        rows[y] = dct_1d(row);
    }

    let mut out = vec![vec![0f64; n]; n];
    for x in 0..n {
        let col: Vec<f64> = rows.iter().map(|r| r[x]).collect();
        let transformed = dct_1d(&col);
        for (y, v) in transformed.into_iter().enumerate() {
            out[y][x] = v;
        }
    }
    out
}

fn dct_1d(input: &[f64]) -> Vec<f64> {
    let n = input.len();
    let mut output = vec![0f64; n];
    for (k, out_k) in output.iter_mut().enumerate() {
        let mut sum = 0f64;
        for (i, &x) in input.iter().enumerate() {
            sum += x * ((std::f64::consts::PI / n as f64) * (i as f64 + 0.5) * k as f64).cos();
        }
        let scale = if k == 0 {
            (1.0 / n as f64).sqrt()
        } else {
            (2.0 / n as f64).sqrt()
        };
        *out_k = sum * scale;
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_test_jpeg(fill: u8) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(64, 64, image::Rgb([fill, fill, fill]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[test]
    fn identical_bytes_yield_identical_hash() {
        let bytes = encode_test_jpeg(120);
        let h1 = perceptual_hash(&bytes).unwrap();
        let h2 = perceptual_hash(&bytes).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_is_fixed_width_hex() {
        let bytes = encode_test_jpeg(200);
        let hash = perceptual_hash(&bytes).unwrap();
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn garbage_bytes_return_error_not_panic() {
        assert!(perceptual_hash(b"not an image").is_err());
    }
}
