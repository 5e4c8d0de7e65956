use common_types::{Error, Result};
use fast_image_resize as fr;
use image::{DynamicImage, GenericImageView};
use std::num::NonZeroU32;

const MAX_DIM: u32 = 400;

/// Fits the image within a 400x400 bounding box preserving aspect ratio,
/// converts to RGB, and encodes WebP.
pub fn make_thumbnail(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).map_err(|e| Error::Internal(e.to_string()))?;
    let (src_w, src_h) = img.dimensions();
    let (dst_w, dst_h) = fit_within(src_w, src_h, MAX_DIM);

    let rgb = img.to_rgb8();
    let src_w_nz = NonZeroU32::new(src_w).ok_or_else(|| Error::Internal("zero-width image".into()))?;
    let src_h_nz = NonZeroU32::new(src_h).ok_or_else(|| Error::Internal("zero-height image".into()))?;
    let src_image = fr::Image::from_vec_u8(
        src_w_nz,
        src_h_nz,
        rgb.into_raw(),
        fr::PixelType::U8x3,
    )
    .map_err(|e| Error::Internal(e.to_string()))?;

    let dst_w_nz = NonZeroU32::new(dst_w).unwrap_or(src_w_nz);
    let dst_h_nz = NonZeroU32::new(dst_h).unwrap_or(src_h_nz);
    let mut dst_image = fr::Image::new(dst_w_nz, dst_h_nz, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| Error::Internal(e.to_string()))?;

    let resized = image::RgbImage::from_raw(dst_w_nz.get(), dst_h_nz.get(), dst_image.buffer().to_vec())
        .ok_or_else(|| Error::Internal("failed to rebuild resized image buffer".into()))?;

    let encoder = webp::Encoder::from_rgb(&resized, dst_w_nz.get(), dst_h_nz.get());
    let encoded = encoder.encode(80.0);
    Ok(encoded.to_vec())
}

fn fit_within(w: u32, h: u32, max_dim: u32) -> (u32, u32) {
    if w <= max_dim && h <= max_dim {
        return (w.max(1), h.max(1));
    }
    let scale = f64::from(max_dim) / f64::from(w.max(h));
    let new_w = ((f64::from(w) * scale).round() as u32).max(1);
    let new_h = ((f64::from(h) * scale).round() as u32).max(1);
    (new_w, new_h)
}

#[must_use]
pub fn to_rgb(img: &DynamicImage) -> image::RgbImage {
    img.to_rgb8()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_within_preserves_aspect_ratio_landscape() {
        assert_eq!(fit_within(2000, 1000, 400), (400, 200));
    }

    #[test]
    fn fit_within_preserves_aspect_ratio_portrait() {
        assert_eq!(fit_within(1000, 2000, 400), (200, 400));
    }

    #[test]
    fn fit_within_leaves_small_images_unchanged() {
        assert_eq!(fit_within(100, 50, 400), (100, 50));
    }

    #[test]
    fn make_thumbnail_produces_webp_bytes() {
        let img = image::RgbImage::from_pixel(800, 600, image::Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let thumb = make_thumbnail(&buf).unwrap();
        assert!(!thumb.is_empty());
        // RIFF....WEBP header
        assert_eq!(&thumb[0..4], b"RIFF");
        assert_eq!(&thumb[8..12], b"WEBP");
    }
}
