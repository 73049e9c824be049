//! Zip bundle of a run's downloaded images.

use std::io::{Cursor, Write};

use loci_core::{Error, Result};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::pipeline::DownloadedImage;

/// File name offered for the bundle download.
pub const ARCHIVE_FILE_NAME: &str = "downloaded_images.zip";

/// Build an in-memory zip with one `<name>.jpg` entry per image.
///
/// JPEGs do not compress further, so entries are stored.
pub fn build_archive(images: &[DownloadedImage]) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

    for image in images {
        let data = std::fs::read(&image.path)?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file(image.file_name(), options)
            .map_err(|e| Error::Archive(e.to_string()))?;
        zip.write_all(&data)?;
    }

    let cursor = zip.finish().map_err(|e| Error::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}
