use chrono::NaiveDateTime;
use common_types::Exif as ExifRecord;
use exif::{In, Reader, Tag, Value};

/// Extracts EXIF metadata. Any missing field is left `None`; any decode
/// error yields an empty record — this never propagates an error, per
/// spec.md §4.2.
#[must_use]
pub fn extract_exif(bytes: &[u8]) -> ExifRecord {
    let Ok(exif) = Reader::new().read_from_container(&mut std::io::Cursor::new(bytes)) else {
        return ExifRecord::default();
    };

    let taken_at = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))
        .and_then(|f| f.display_value().to_string().parse::<NaiveDateTime>().ok())
        .or_else(|| {
            exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)
                .and_then(|f| parse_exif_datetime(&f.display_value().to_string()))
        });

    let gps_lat = read_gps_coord(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S");
    let gps_lng = read_gps_coord(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W");

    let camera_make = exif
        .get_field(Tag::Make, In::PRIMARY)
        .map(|f| f.display_value().to_string().trim().to_string());
    let camera_model = exif
        .get_field(Tag::Model, In::PRIMARY)
        .map(|f| f.display_value().to_string().trim().to_string());

    let width = exif
        .get_field(Tag::PixelXDimension, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0));
    let height = exif
        .get_field(Tag::PixelYDimension, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0));

    ExifRecord {
        taken_at,
        gps_lat,
        gps_lng,
        camera_make,
        camera_model,
        width,
        height,
    }
}

fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()
}

fn read_gps_coord(exif: &exif::Exif, coord_tag: Tag, ref_tag: Tag, negative_ref: &str) -> Option<f64> {
    let field = exif.get_field(coord_tag, In::PRIMARY)?;
    let Value::Rational(ref rationals) = field.value else {
        return None;
    };
    if rationals.len() < 3 {
        return None;
    }
    let degrees = rationals[0].to_f64();
    let minutes = rationals[1].to_f64();
    let seconds = rationals[2].to_f64();
    let mut decimal = degrees + minutes / 60.0 + seconds / 3600.0;

    if let Some(reference) = exif.get_field(ref_tag, In::PRIMARY) {
        let r = reference.display_value().to_string();
        if r.trim_matches('"') == negative_ref {
            decimal = -decimal;
        }
    }
    Some(decimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_exif_yields_empty_record_not_error() {
        let record = extract_exif(b"not an image at all");
        assert!(record.taken_at.is_none());
        assert!(record.gps_lat.is_none());
        assert!(record.camera_make.is_none());
    }
}
