use base64::{engine::general_purpose, Engine as _};
use std::path::Path;
use thiserror::Error;

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Error)]
pub enum ImageInputError {
    #[error("failed to read image file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid file format; allowed formats: {}", ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedFormat,
    #[error("malformed data URL")]
    MalformedDataUrl,
    #[error("invalid base64 image data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("empty image data")]
    Empty,
}

/// Raw image bytes plus the media type they were declared or detected as.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

fn has_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl ImageInput {
    pub async fn from_path(path: &Path) -> Result<Self, ImageInputError> {
        if !has_allowed_extension(path) {
            return Err(ImageInputError::UnsupportedFormat);
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ImageInputError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_bytes(bytes)
    }

    /// Accepts `data:<mime>;base64,<payload>` or a bare base64 payload.
    pub fn from_data_url(data: &str) -> Result<Self, ImageInputError> {
        let data = data.trim();
        if data.is_empty() {
            return Err(ImageInputError::Empty);
        }

        let (declared, payload) = match data.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or(ImageInputError::MalformedDataUrl)?;
                let mime = header.split(';').next().unwrap_or_default().trim();
                let declared = (!mime.is_empty()).then(|| mime.to_lowercase());
                (declared, payload)
            }
            None => (None, data),
        };

        let bytes = general_purpose::STANDARD.decode(payload.trim())?;
        let mut input = Self::from_bytes(bytes)?;
        if let Some(mime) = declared {
            input.media_type = mime;
        }
        Ok(input)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageInputError> {
        if bytes.is_empty() {
            return Err(ImageInputError::Empty);
        }
        let media_type = sniff_media_type(&bytes).to_string();
        Ok(Self { bytes, media_type })
    }
}

/// Detects common image formats by their magic bytes. Unknown data is labelled JPEG.
pub fn sniff_media_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}
