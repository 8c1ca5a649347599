//! Writers for analysis outputs consumed by external renderers.

use crate::Result;
use dpol_core::EventBatch;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Creates the parent directory of `path` if needed.
///
/// `create_dir_all` tolerates concurrent creation, so parallel workers can
/// write into disjoint subtrees of one output root.
fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Writes `value` as pretty-printed JSON, creating parent directories.
///
/// # Errors
/// Returns an error if the file cannot be created or the value cannot be encoded.
pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Writer for per-stage momentum arrays.
pub struct StageFileWriter {
    writer: BufWriter<File>,
}

impl StageFileWriter {
    /// Creates a new file writer, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Writes the six momentum columns as CSV.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_batch_csv(&mut self, batch: &EventBatch) -> Result<()> {
        writeln!(self.writer, "pxp,pyp,pzp,pxn,pyn,pzn")?;
        for (p, n) in batch.iter() {
            writeln!(
                self.writer,
                "{},{},{},{},{},{}",
                p.px, p.py, p.pz, n.px, n.py, n.pz
            )?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
