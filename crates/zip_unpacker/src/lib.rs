//! C3 — ZIP Unpacker: stream-safe flat extraction of nested image
//! archives, per spec.md §4.3.

use common_types::{Error, Result};
use image_ops::detect_image_type;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const MAX_NESTING_DEPTH: u32 = 3;
const CONTAINER_MAX_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// One extracted entry: a logical name (nested names joined with `::`),
/// a detected mime, and the path of the materialized file on disk.
#[derive(Debug, Clone)]
pub struct ExtractedEntry {
    pub logical_name: String,
    pub mime: String,
    pub path: PathBuf,
}

/// Streams entries out of a ZIP archive into `out_dir`, never holding all
/// entries in memory simultaneously. Rejects entries above
/// `max_entry_bytes`, recursively descends into nested zips up to depth 3,
/// and rejects containers above 5 GiB.
pub fn extract_images(
    archive_path: &Path,
    out_dir: &Path,
    max_entry_bytes: u64,
) -> Result<Vec<ExtractedEntry>> {
    let container_len = std::fs::metadata(archive_path)
        .map_err(|e| Error::ArchiveInvalid(e.to_string()))?
        .len();
    if container_len > CONTAINER_MAX_BYTES {
        return Err(Error::ArchiveInvalid(format!(
            "container exceeds {CONTAINER_MAX_BYTES} bytes"
        )));
    }

    std::fs::create_dir_all(out_dir).map_err(|e| Error::Internal(e.to_string()))?;

    let mut results = Vec::new();
    extract_recursive(archive_path, "", out_dir, max_entry_bytes, 0, &mut results)?;
    Ok(results)
}

fn extract_recursive(
    archive_path: &Path,
    name_prefix: &str,
    out_dir: &Path,
    max_entry_bytes: u64,
    depth: u32,
    results: &mut Vec<ExtractedEntry>,
) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| Error::ArchiveInvalid(e.to_string()))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| Error::ArchiveInvalid(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::ArchiveInvalid(e.to_string()))?;

        if entry.is_dir() {
            continue;
        }

        let entry_name = entry.name().to_string();
        let logical_name = if name_prefix.is_empty() {
            entry_name.clone()
        } else {
            format!("{name_prefix}::{entry_name}")
        };

        // Reject by declared size before reading.
        if entry.size() > max_entry_bytes {
            tracing::warn!(entry = %logical_name, size = entry.size(), "zip entry exceeds max_entry_bytes, skipping");
            continue;
        }

        let is_nested_zip = entry_name.to_lowercase().ends_with(".zip");

        let safe_name = sanitize_entry_name(&entry_name);
        let out_path = out_dir.join(format!("{i}_{safe_name}"));
        let mut out_file =
            std::fs::File::create(&out_path).map_err(|e| Error::Internal(e.to_string()))?;

        let mut limited = entry.by_ref().take(max_entry_bytes + 1);
        let copied = std::io::copy(&mut limited, &mut out_file)
            .map_err(|e| Error::ArchiveInvalid(e.to_string()))?;
        drop(out_file);

        if copied > max_entry_bytes {
            tracing::warn!(entry = %logical_name, "zip entry read exceeded max_entry_bytes, discarding");
            let _ = std::fs::remove_file(&out_path);
            continue;
        }

        if is_nested_zip {
            if depth + 1 > MAX_NESTING_DEPTH {
                tracing::warn!(entry = %logical_name, "nested zip exceeds max depth, skipping");
                let _ = std::fs::remove_file(&out_path);
                continue;
            }
            let nested_out_dir = out_dir.join(format!("{i}_nested"));
            extract_recursive(
                &out_path,
                &logical_name,
                &nested_out_dir,
                max_entry_bytes,
                depth + 1,
                results,
            )?;
            let _ = std::fs::remove_file(&out_path);
            continue;
        }

        let mut head = Vec::new();
        {
            let mut probe = std::fs::File::open(&out_path).map_err(|e| Error::Internal(e.to_string()))?;
            let mut buf = [0u8; 64];
            let n = probe.read(&mut buf).unwrap_or(0);
            head.extend_from_slice(&buf[..n]);
        }

        match detect_image_type(&entry_name, &head) {
            Some(mime) => results.push(ExtractedEntry {
                logical_name,
                mime: mime.to_string(),
                path: out_path,
            }),
            None => {
                let _ = std::fs::remove_file(&out_path);
            }
        }
    }

    if depth == 0 && results.is_empty() {
        tracing::warn!("archive contained no decodeable images");
    }

    Ok(())
}

/// Keeps extracted filenames inside `out_dir`: strips path separators and
/// `..` components so a crafted entry name cannot escape the temp
/// directory (zip-slip).
fn sanitize_entry_name(name: &str) -> String {
    name.replace(['/', '\\'], "_").replace("..", "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_zip_with_entries(entries: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut writer = zip::ZipWriter::new(file.reopen().unwrap());
        let options: zip::write::FileOptions<()> =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        file
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(10, 10, image::Rgb([1, 2, 3]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn skips_non_image_entries() {
        let png = png_bytes();
        let zip_file = make_zip_with_entries(&[("c.png", &png), ("d.txt", b"not an image")]);
        let out = tempfile::tempdir().unwrap();
        let entries = extract_images(zip_file.path(), out.path(), 50 * 1024 * 1024).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].logical_name, "c.png");
    }

    #[test]
    fn rejects_entries_over_max_size() {
        let big = vec![0u8; 200];
        let zip_file = make_zip_with_entries(&[("big.bin", &big)]);
        let out = tempfile::tempdir().unwrap();
        let entries = extract_images(zip_file.path(), out.path(), 100).unwrap();
        assert!(entries.is_empty());
    }
}
