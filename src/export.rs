//! Download artifacts: single files and the zip bundle.

use crate::buffers::{BufferKind, SourceBuffers};
use crate::error::Result;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ARCHIVE_NAME: &str = "sandbox-files.zip";
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// A file ready to hand to a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExport {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileExport {
    /// Write into `dir` under the artifact's own name.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// One buffer as its own file.
pub fn export_file(buffers: &SourceBuffers, kind: BufferKind) -> FileExport {
    FileExport {
        file_name: kind.file_name().to_string(),
        content_type: kind.content_type().to_string(),
        bytes: buffers.get(kind).as_bytes().to_vec(),
    }
}

/// All three buffers bundled into `sandbox-files.zip`.
pub fn export_archive(buffers: &SourceBuffers) -> Result<FileExport> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for kind in BufferKind::ALL {
        writer.start_file(kind.file_name(), options)?;
        writer.write_all(buffers.get(kind).as_bytes())?;
    }

    let bytes = writer.finish()?.into_inner();
    tracing::debug!(size = bytes.len(), "built archive");

    Ok(FileExport {
        file_name: ARCHIVE_NAME.to_string(),
        content_type: ARCHIVE_CONTENT_TYPE.to_string(),
        bytes,
    })
}
