use base64::Engine;

use crate::error::UploadError;

pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/jpg"];

pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

pub fn validate_image(mime_type: &str, size: u64, max_bytes: u64) -> Result<(), UploadError> {
    if !ALLOWED_MIME_TYPES.contains(&mime_type) {
        return Err(UploadError::UnsupportedType(mime_type.to_string()));
    }
    if size > max_bytes {
        return Err(UploadError::TooLarge { size, limit_mb: max_bytes / (1024 * 1024) });
    }
    Ok(())
}

pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Splits a base64 data URL into its mime type and decoded payload.
pub fn parse_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload).ok()?;
    Some((mime.to_string(), bytes))
}

pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), UploadError> {
    let format = image::guess_format(bytes).map_err(|e| UploadError::Decode(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(|e| UploadError::Decode(e.to_string()))?;
    Ok((img.width(), img.height()))
}

#[cfg(test)]
pub(crate) fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sizes_read_like_the_upload_panel() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
    }

    #[test]
    fn rejects_wrong_type_and_oversize() {
        let max = 10 * 1024 * 1024;
        assert!(validate_image("image/png", 1024, max).is_ok());
        assert_eq!(
            validate_image("image/gif", 1024, max),
            Err(UploadError::UnsupportedType("image/gif".into()))
        );
        assert_eq!(
            validate_image("image/jpeg", max + 1, max).unwrap_err().to_string(),
            "File size must be less than 10MB"
        );
    }

    #[test]
    fn data_url_survives_parse() {
        let url = to_data_url("image/png", b"\x89PNG");
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(parse_data_url(&url), Some(("image/png".to_string(), b"\x89PNG".to_vec())));
        assert_eq!(parse_data_url("https://example.com/a.png"), None);
    }

    #[test]
    fn reads_png_dimensions() {
        assert_eq!(image_dimensions(&tiny_png(3, 2)), Ok((3, 2)));
        assert!(image_dimensions(b"not an image").is_err());
    }
}
