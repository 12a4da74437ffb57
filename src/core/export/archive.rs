//! Archive packaging
//!
//! Packs `export.bin` and `export.sig` into a fresh, uniquely named deflate
//! zip. The intermediates are removed once the archive is complete.

use crate::core::export::format::{EXPORT_BIN_FILE_NAME, EXPORT_SIG_FILE_NAME};
use crate::domain::{Result, TekError};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ARCHIVE_PREFIX: &str = "diagnosis_keys-";
pub const ARCHIVE_SUFFIX: &str = ".zip";

fn add_member(writer: &mut ZipWriter<File>, name: &str, source: &Path) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(name, options)?;
    let mut file = File::open(source)?;
    io::copy(&mut file, writer)?;
    Ok(())
}

/// Writes `<dir>/diagnosis_keys-XXXX.zip` holding exactly the two artifacts
///
/// Returns the archive's absolute path. An existing archive is never
/// overwritten; a failure leaves no archive behind.
pub fn archive_export(bin_path: &Path, sig_path: &Path, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let temp = tempfile::Builder::new()
        .prefix(ARCHIVE_PREFIX)
        .suffix(ARCHIVE_SUFFIX)
        .tempfile_in(dir)?;

    let mut writer = ZipWriter::new(temp.reopen()?);
    add_member(&mut writer, EXPORT_BIN_FILE_NAME, bin_path)?;
    add_member(&mut writer, EXPORT_SIG_FILE_NAME, sig_path)?;
    writer.finish()?;

    let (_, path) = temp
        .keep()
        .map_err(|e| TekError::Archive(format!("Failed to keep archive: {e}")))?;

    fs::remove_file(bin_path)?;
    fs::remove_file(sig_path)?;

    Ok(fs::canonicalize(path)?)
}
