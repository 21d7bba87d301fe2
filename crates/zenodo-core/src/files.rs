//! In-memory files handed to upload calls

use std::path::Path;

use crate::http::builder::{MultipartForm, OCTET_STREAM_CONTENT_TYPE};
use crate::{Error, Result};

/// Multipart field name the deposit API expects uploads under
pub const UPLOAD_FIELD: &str = "file";

/// Named binary content with an optional MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            data: data.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Read a file from disk, naming the blob after the file
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Io {
                message: format!("Path has no usable file name: {}", path.display()),
                source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
            })?
            .to_string();
        let data = tokio::fs::read(path).await.map_err(|e| Error::Io {
            message: format!("Failed to read {}: {}", path.display(), e),
            source: e,
        })?;
        Ok(Self::new(name, data))
    }

    /// MIME type, `application/octet-stream` when unknown
    pub fn mime_type_or_default(&self) -> &str {
        self.mime_type
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(OCTET_STREAM_CONTENT_TYPE)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Single-file multipart form under the `file` field
    pub fn to_multipart(&self) -> MultipartForm {
        MultipartForm::new().file(
            UPLOAD_FIELD,
            self.name.clone(),
            self.mime_type_or_default(),
            self.data.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mime_type() {
        let blob = FileBlob::new("a.bin", vec![1, 2, 3]);
        assert_eq!(blob.mime_type_or_default(), "application/octet-stream");
        assert_eq!(blob.with_mime_type("text/plain").mime_type_or_default(), "text/plain");
    }

    #[test]
    fn test_multipart_form() {
        let blob = FileBlob::new("a.txt", "hello").with_mime_type("text/plain");
        let form = blob.to_multipart();
        let part = &form.parts()[0];
        assert_eq!(part.field, "file");
        assert_eq!(part.file_name, "a.txt");
        assert_eq!(part.mime_type, "text/plain");
        assert_eq!(part.data, b"hello");
    }

    #[tokio::test]
    async fn test_from_path() {
        let path = std::env::temp_dir().join(format!("zenodo-core-blob-{}.txt", std::process::id()));
        tokio::fs::write(&path, b"on disk").await.unwrap();

        let blob = FileBlob::from_path(&path).await.unwrap();
        assert_eq!(blob.data, b"on disk");
        assert!(blob.name.starts_with("zenodo-core-blob-"));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_from_missing_path() {
        let result = FileBlob::from_path("/definitely/not/here.txt").await;
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
