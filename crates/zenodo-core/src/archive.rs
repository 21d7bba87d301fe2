//! Zip archival of several files into one upload

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::files::FileBlob;
use crate::{Error, Result};

/// Largest archive Zenodo accepts (50 GiB)
pub const MAX_ARCHIVE_SIZE: u64 = 50 * 1024 * 1024 * 1024;

pub const ZIP_MIME_TYPE: &str = "application/zip";

/// Zip `files` into a single blob named `{name}.zip`
pub fn zip_files(files: &[FileBlob], name: &str) -> Result<FileBlob> {
    zip_files_with_limit(files, name, MAX_ARCHIVE_SIZE)
}

pub(crate) fn zip_files_with_limit(files: &[FileBlob], name: &str, limit: u64) -> Result<FileBlob> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for file in files {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(file.data.len() as u64 >= u32::MAX as u64);
        writer
            .start_file(file.name.as_str(), options)
            .map_err(|e| archive_error(format!("Failed to add {} to archive", file.name), e))?;
        writer.write_all(&file.data).map_err(|e| {
            archive_error(format!("Failed to write {} into archive", file.name), e)
        })?;
    }

    let data = writer
        .finish()
        .map_err(|e| archive_error("Failed to finish archive".to_string(), e))?
        .into_inner();

    if data.len() as u64 > limit {
        return Err(Error::Archive {
            message: format!(
                "Zip file exceeds Zenodo's 50GB limit ({} bytes)",
                data.len()
            ),
            source: None,
        });
    }

    Ok(FileBlob::new(format!("{}.zip", name), data).with_mime_type(ZIP_MIME_TYPE))
}

fn archive_error<E>(message: String, source: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::Archive {
        message: format!("{}: {}", message, source),
        source: Some(anyhow::anyhow!(source)),
    }
}
