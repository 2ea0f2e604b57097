use super::{CreateSnafu, ReportError, SerializeSnafu, WriteSnafu};
use crate::record::RecordRow;
use snafu::ResultExt;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const EMPTY_ARRAY: &[u8] = b"[\n]\n";
const CLOSING: &[u8] = b"\n]\n";

/// A JSON array on disk that parses after every append.
///
/// The closing bracket is always present; appending overwrites it in place
/// with `,` + the new element + a fresh closing bracket.
pub struct JsonArrayReport {
    path: PathBuf,
    file: File,
    /// Offset just past the last element (or the opening bracket).
    body_end: u64,
    count: usize,
}

impl JsonArrayReport {
    pub fn create(path: &Path) -> Result<Self, ReportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(CreateSnafu { path })?;
        }
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .context(CreateSnafu { path })?;
        file.write_all(EMPTY_ARRAY).context(WriteSnafu { path })?;
        file.sync_data().context(WriteSnafu { path })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            body_end: 1,
            count: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn append(&mut self, row: &RecordRow) -> Result<(), ReportError> {
        let object = serde_json::to_string_pretty(row).context(SerializeSnafu)?;
        let mut element = String::with_capacity(object.len() + 64);
        if self.count > 0 {
            element.push(',');
        }
        for line in object.lines() {
            element.push_str("\n  ");
            element.push_str(line);
        }

        let path = self.path.as_path();
        self.file
            .seek(SeekFrom::Start(self.body_end))
            .context(WriteSnafu { path })?;
        self.file
            .write_all(element.as_bytes())
            .context(WriteSnafu { path })?;
        self.file.write_all(CLOSING).context(WriteSnafu { path })?;
        let body_end = self.body_end + element.len() as u64;
        self.file
            .set_len(body_end + CLOSING.len() as u64)
            .context(WriteSnafu { path })?;
        self.file.sync_data().context(WriteSnafu { path })?;

        self.body_end = body_end;
        self.count += 1;
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(), ReportError> {
        let path = self.path.as_path();
        self.file.flush().context(WriteSnafu { path })?;
        self.file.sync_all().context(WriteSnafu { path })
    }
}
