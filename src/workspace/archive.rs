/*!
ZIP import and export of project files.
*/
use std::io::{Cursor, Read, Write};

use zip::{write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::project::SourceFile;

pub const EXPORT_ZIP_NAME: &str = "project-files.zip";

/// Most bytes an imported archive may unpack to, all entries together.
pub const MAX_IMPORT_BYTES: u64 = 8 * 1024 * 1024;

/**
Every non-directory entry in the archive, in archive order. Contents
that aren't valid UTF-8 are decoded lossily.

Sizes recorded in the archive aren't trusted; extraction stops with an
error once the entries add up to more than `MAX_IMPORT_BYTES`.
*/
pub fn read_zip(bytes: &[u8]) -> Result<Vec<SourceFile>, String> {
    log::trace!("read_zip( [ {} bytes ] ) called.", bytes.len());

    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| format!("Unable to read ZIP archive: {}", &e))?;

    let mut files: Vec<SourceFile> = Vec::new();
    let mut remaining = MAX_IMPORT_BYTES;
    for n in 0..archive.len() {
        let mut entry = archive.by_index(n)
            .map_err(|e| format!("Unable to read ZIP entry {}: {}", &n, &e))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_owned();

        let mut raw: Vec<u8> = Vec::new();
        let n_read = (&mut entry).take(remaining + 1).read_to_end(&mut raw)
            .map_err(|e| format!("Unable to extract {:?}: {}", &name, &e))?;
        let n_read = n_read as u64;
        if n_read > remaining {
            log::warn!("ZIP import stopped at {:?}: over {} bytes.", &name, MAX_IMPORT_BYTES);
            return Err(format!(
                "Archive unpacks to more than {} bytes", MAX_IMPORT_BYTES
            ));
        }
        remaining -= n_read;

        files.push(SourceFile::new(name, String::from_utf8_lossy(&raw)));
    }

    Ok(files)
}

pub fn write_zip(files: &[SourceFile]) -> Result<Vec<u8>, String> {
    log::trace!("write_zip( [ {} files ] ) called.", files.len());

    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default()
        .compression_method(CompressionMethod::Deflated);

    for f in files.iter() {
        zw.start_file(f.filename.as_str(), opts)
            .map_err(|e| format!("Unable to add {:?} to archive: {}", &f.filename, &e))?;
        zw.write_all(f.contents.as_bytes())
            .map_err(|e| format!("Unable to write {:?} to archive: {}", &f.filename, &e))?;
    }

    let cursor = zw.finish()
        .map_err(|e| format!("Unable to finish archive: {}", &e))?;
    Ok(cursor.into_inner())
}
