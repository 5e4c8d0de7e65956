//! C2 — Image Utilities: magic-byte detection, EXIF extraction, perceptual
//! hashing, and thumbnailing, as specified in spec.md §4.2.

mod detect;
mod exif;
mod phash;
mod thumbnail;

pub use detect::detect_image_type;
pub use exif::extract_exif;
pub use phash::perceptual_hash;
pub use thumbnail::make_thumbnail;
