//! Data-URL values carried by signature and stamp fields

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataUrlError {
    #[error("value is not a data URL")]
    NotDataUrl,

    #[error("data URL has no payload separator")]
    MissingPayload,

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
}

/// Image codec selected from the declared MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    mime: String,
    data: Vec<u8>,
}

impl DataUrl {
    /// Parse `data:<mime>[;base64],<payload>`
    pub fn parse(uri: &str) -> Result<Self, DataUrlError> {
        let rest = uri.strip_prefix("data:").ok_or(DataUrlError::NotDataUrl)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUrlError::MissingPayload)?;

        let mime = header
            .split(';')
            .next()
            .filter(|m| !m.is_empty())
            .unwrap_or("text/plain")
            .to_ascii_lowercase();

        let data = if header.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
            STANDARD
                .decode(payload.trim())
                .map_err(|e| DataUrlError::InvalidBase64(e.to_string()))?
        } else {
            payload.as_bytes().to_vec()
        };

        Ok(Self { mime, data })
    }

    /// Build a base64 data URL
    pub fn encode(mime: &str, data: &[u8]) -> String {
        format!("data:{};base64,{}", mime, STANDARD.encode(data))
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// PNG when the MIME names png, JPEG for jpeg/jpg, otherwise none
    pub fn image_format(&self) -> Option<ImageFormat> {
        if !self.mime.starts_with("image/") {
            return None;
        }
        if self.mime.contains("png") {
            Some(ImageFormat::Png)
        } else if self.mime.contains("jpeg") || self.mime.contains("jpg") {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_png_data_url() {
        let url = DataUrl::parse("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(url.mime(), "image/png");
        assert_eq!(url.image_format(), Some(ImageFormat::Png));
        assert_eq!(&url.data()[1..4], b"PNG");
    }

    #[test]
    fn test_parse_jpeg_variants() {
        let jpeg = DataUrl::parse("data:image/jpeg;base64,/9j/").unwrap();
        assert_eq!(jpeg.image_format(), Some(ImageFormat::Jpeg));
        let jpg = DataUrl::parse("data:image/jpg;base64,/9j/").unwrap();
        assert_eq!(jpg.image_format(), Some(ImageFormat::Jpeg));
    }

    #[test]
    fn test_rejects_non_data_url() {
        assert_eq!(DataUrl::parse("hello"), Err(DataUrlError::NotDataUrl));
        assert_eq!(
            DataUrl::parse("data:image/png;base64"),
            Err(DataUrlError::MissingPayload)
        );
    }

    #[test]
    fn test_rejects_bad_base64() {
        let err = DataUrl::parse("data:image/png;base64,@@@@").unwrap_err();
        assert!(matches!(err, DataUrlError::InvalidBase64(_)));
    }

    #[test]
    fn test_non_image_mime_has_no_format() {
        let url = DataUrl::parse("data:text/plain,hello").unwrap();
        assert_eq!(url.data(), b"hello");
        assert_eq!(url.image_format(), None);
    }

    #[test]
    fn test_encode_then_parse() {
        let encoded = DataUrl::encode("image/png", &[1, 2, 3]);
        assert!(encoded.starts_with("data:image/png;base64,"));
        assert_eq!(DataUrl::parse(&encoded).unwrap().data(), &[1, 2, 3]);
    }
}
