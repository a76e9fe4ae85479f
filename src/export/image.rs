use std::io::Cursor;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use image::ImageFormat;
use thiserror::Error;

use crate::services::{fetch_remote, BlobStore, StorageError};

/// Standard alphabet, padding optional.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] StorageError),

    #[error("not a supported image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("no image bytes")]
    Empty,
}

/// Where a `dokumen_pendukung` value points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRef<'a> {
    Remote(&'a str),
    Inline(&'a str),
    Stored(&'a str),
}

impl<'a> ImageRef<'a> {
    pub fn classify(value: &'a str, has_store: bool) -> Self {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            ImageRef::Remote(value)
        } else if let Some((_, payload)) = value.split_once("base64,") {
            ImageRef::Inline(payload)
        } else if let Some((_, payload)) = value.split_once(',') {
            ImageRef::Inline(payload)
        } else if has_store && value.contains('/') {
            ImageRef::Stored(value)
        } else {
            ImageRef::Inline(value)
        }
    }
}

pub fn is_base64_data_url(value: &str) -> bool {
    value.starts_with("data:") && value.contains("base64,")
}

/// File extension and MIME type for an uploaded data URL.
pub fn data_url_kind(value: &str) -> (&'static str, &'static str) {
    let header = value.get(..20).unwrap_or(value).to_ascii_lowercase();
    if header.starts_with("data:image/jpeg") || header.starts_with("data:image/jpg") {
        ("jpg", "image/jpeg")
    } else if header.starts_with("data:image/webp") {
        ("webp", "image/webp")
    } else if header.starts_with("data:image/gif") {
        ("gif", "image/gif")
    } else {
        ("png", "image/png")
    }
}

/// Decode the base64 payload of a data URL or bare base64 string.
pub fn decode_base64_payload(value: &str) -> Result<Vec<u8>, ImageError> {
    let payload = match ImageRef::classify(value, false) {
        ImageRef::Inline(payload) => payload,
        ImageRef::Remote(url) | ImageRef::Stored(url) => url,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = LENIENT_BASE64.decode(compact)?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    Ok(bytes)
}

/// An image validated and normalised to PNG, ready for embedding.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PreparedImage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        let img = image::load_from_memory(bytes)?;
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(Self {
            png,
            width: img.width(),
            height: img.height(),
        })
    }

    /// Height in EMU that keeps the aspect ratio at the given width.
    pub fn scaled_height(&self, width_emu: u32) -> u32 {
        if self.width == 0 {
            return width_emu;
        }
        let height = u64::from(width_emu) * u64::from(self.height) / u64::from(self.width);
        u32::try_from(height).unwrap_or(u32::MAX)
    }
}

/// Turns `dokumen_pendukung` values into embeddable images.
pub struct ImageResolver<'a> {
    http: &'a reqwest::Client,
    store: Option<&'a dyn BlobStore>,
}

impl<'a> ImageResolver<'a> {
    pub fn new(http: &'a reqwest::Client, store: Option<&'a dyn BlobStore>) -> Self {
        Self { http, store }
    }

    pub async fn resolve(&self, value: &str) -> Result<PreparedImage, ImageError> {
        let bytes = match ImageRef::classify(value, self.store.is_some()) {
            ImageRef::Remote(url) => fetch_remote(self.http, url).await?,
            ImageRef::Inline(_) => decode_base64_payload(value)?,
            ImageRef::Stored(key) => match self.store {
                Some(store) => match store.get(key).await {
                    Ok(bytes) => bytes,
                    // Bare base64 may contain '/', so fall back to decoding it.
                    Err(_) => decode_base64_payload(key)?,
                },
                None => decode_base64_payload(key)?,
            },
        };
        PreparedImage::from_bytes(&bytes)
    }
}
