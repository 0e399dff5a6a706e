use crate::config::ValidationConfig;
use bytes::Bytes;
use std::path::Path;
use thiserror::Error;

/// Name of the multipart field that carries the image.
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub content: Bytes,
    pub content_type: Option<String>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No {0} file provided")]
    MissingField(&'static str),
    #[error("Empty image file provided")]
    EmptyPayload,
    #[error("Unsupported file extension '{extension}', allowed: {allowed}")]
    UnsupportedExtension { extension: String, allowed: String },
}

/// Cheap checks run before any decoding.
///
/// The extension allow-list only filters out obvious mistakes. An allowed
/// extension says nothing about the content, the decoder has the last word.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    enforce_extension: bool,
    allowed_extensions: Vec<String>,
}

impl RequestValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            enforce_extension: config.enforce_extension,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Same checks minus the extension allow-list, for uploads whose
    /// filename the service chose itself.
    pub fn without_extension_filter(&self) -> Self {
        Self {
            enforce_extension: false,
            ..self.clone()
        }
    }

    pub fn validate(&self, upload: Option<UploadRequest>) -> Result<UploadRequest, ValidationError> {
        let upload = upload.ok_or(ValidationError::MissingField(IMAGE_FIELD))?;

        if upload.content.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }

        if self.enforce_extension {
            let extension = final_extension(&upload.filename);
            if !self.allowed_extensions.contains(&extension) {
                return Err(ValidationError::UnsupportedExtension {
                    extension,
                    allowed: self.allowed_extensions.join(", "),
                });
            }
        }

        Ok(upload)
    }
}

fn final_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, content: &'static [u8]) -> Option<UploadRequest> {
        Some(UploadRequest {
            filename: filename.to_string(),
            content: Bytes::from_static(content),
            content_type: Some("image/jpeg".to_string()),
        })
    }

    fn validator() -> RequestValidator {
        RequestValidator::new(&ValidationConfig::default())
    }

    #[test]
    fn test_missing_field() {
        assert_eq!(
            validator().validate(None).unwrap_err(),
            ValidationError::MissingField("image")
        );
    }

    #[test]
    fn test_empty_payload_is_checked_before_extension() {
        assert_eq!(
            validator().validate(upload("empty.exe", b"")).unwrap_err(),
            ValidationError::EmptyPayload
        );
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert!(validator().validate(upload("cat.JPG", b"data")).is_ok());
        assert!(validator().validate(upload("cat.Jpeg", b"data")).is_ok());
        assert!(validator().validate(upload("cat.png", b"data")).is_ok());
    }

    #[test]
    fn test_only_final_extension_counts() {
        let err = validator()
            .validate(upload("photo.jpg.exe", b"data"))
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnsupportedExtension { ref extension, .. } if extension == "exe"
        ));

        assert!(validator().validate(upload("rabbit.html.jpg", b"data")).is_ok());
    }

    #[test]
    fn test_missing_extension_is_rejected() {
        assert!(matches!(
            validator().validate(upload("README", b"data")),
            Err(ValidationError::UnsupportedExtension { .. })
        ));
    }

    #[test]
    fn test_long_filename_passes_through_unchanged() {
        let name = format!("{}.jpg", "a".repeat(300));
        let validated = validator().validate(upload(&name, b"data")).unwrap();
        assert_eq!(validated.filename, name);
    }

    #[test]
    fn test_filtering_can_be_disabled() {
        let validator = RequestValidator::new(&ValidationConfig {
            enforce_extension: false,
            allowed_extensions: vec![],
        });
        assert!(validator.validate(upload("photo.jpg.exe", b"data")).is_ok());
        assert_eq!(
            validator.validate(upload("photo.exe", b"")).unwrap_err(),
            ValidationError::EmptyPayload
        );
    }

    #[test]
    fn test_configured_extensions_are_normalized() {
        let validator = RequestValidator::new(&ValidationConfig {
            enforce_extension: true,
            allowed_extensions: vec![".WebP".into()],
        });
        assert!(validator.validate(upload("x.webp", b"data")).is_ok());
        assert!(validator.validate(upload("x.png", b"data")).is_err());
    }
}
