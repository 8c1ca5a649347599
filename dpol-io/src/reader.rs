//! Memory-mapped readers for the raw ASCII event files.
//!
//! Both layouts start with two header lines (an info line and a column
//! header) followed by whitespace-separated numeric columns:
//!
//! | layout | columns |
//! |---|---|
//! | discrete impact parameter | `event_no pxp pyp pzp pxn pyn pzn` |
//! | random reaction plane | `event_no pxp pyp pzp pxn pyn pzn b rpphi_deg` |
//!
//! Lines with too few columns or non-numeric fields are skipped.

use crate::Result;
use dpol_core::Momentum;
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

const HEADER_LINES: usize = 2;
const DISCRETE_COLUMNS: usize = 7;
const RANDOM_PLANE_COLUMNS: usize = 9;

/// A memory-mapped text file.
pub struct MappedTextFile {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedTextFile {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// File contents as text. Invalid UTF-8 is replaced, which makes the
    /// affected lines fail numeric parsing.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.mmap[..])
    }
}

/// Iterates over the data lines of a raw file: the two header lines are
/// skipped, as are blank lines.
pub fn data_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .skip(HEADER_LINES)
        .filter(|line| !line.trim().is_empty())
}

/// One parsed row of the discrete impact-parameter layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscreteRecord {
    pub event_no: i64,
    pub proton: Momentum,
    pub neutron: Momentum,
}

/// One parsed row of the random reaction-plane layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomPlaneRecord {
    pub event_no: i64,
    pub proton: Momentum,
    pub neutron: Momentum,
    /// Impact parameter [fm].
    pub b: f64,
    /// Reaction-plane angle [deg].
    pub rpphi_deg: f64,
}

/// Parses `event_no` and the six momentum components from the leading columns.
fn parse_momenta(fields: &[&str]) -> Option<(i64, Momentum, Momentum)> {
    let event_no = fields[0].parse::<i64>().ok()?;
    let mut values = [0.0_f64; 6];
    for (slot, field) in values.iter_mut().zip(&fields[1..DISCRETE_COLUMNS]) {
        *slot = field.parse::<f64>().ok()?;
    }
    Some((
        event_no,
        Momentum::new(values[0], values[1], values[2]),
        Momentum::new(values[3], values[4], values[5]),
    ))
}

/// Parses a data line of the discrete impact-parameter layout.
///
/// Returns `None` for lines with fewer than seven columns or unparseable
/// values. Extra trailing columns are ignored.
#[must_use]
pub fn parse_discrete_line(line: &str) -> Option<DiscreteRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < DISCRETE_COLUMNS {
        return None;
    }
    let (event_no, proton, neutron) = parse_momenta(&fields)?;
    Some(DiscreteRecord {
        event_no,
        proton,
        neutron,
    })
}

/// Parses a data line of the random reaction-plane layout.
///
/// Returns `None` for lines with fewer than nine columns or unparseable
/// values.
#[must_use]
pub fn parse_random_plane_line(line: &str) -> Option<RandomPlaneRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < RANDOM_PLANE_COLUMNS {
        return None;
    }
    let (event_no, proton, neutron) = parse_momenta(&fields)?;
    Some(RandomPlaneRecord {
        event_no,
        proton,
        neutron,
        b: fields[7].parse().ok()?,
        rpphi_deg: fields[8].parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_discrete_line() {
        let rec = parse_discrete_line("  12  10.5 -3.0 620.0   -8.25 4.0 590.5").unwrap();
        assert_eq!(rec.event_no, 12);
        assert_eq!(rec.proton, Momentum::new(10.5, -3.0, 620.0));
        assert_eq!(rec.neutron, Momentum::new(-8.25, 4.0, 590.5));

        assert!(parse_discrete_line("12 10.5 -3.0 620.0 -8.25 4.0").is_none());
        assert!(parse_discrete_line("12 10.5 abc 620.0 -8.25 4.0 590.5").is_none());
        assert!(parse_discrete_line("1.5 10.5 3.0 620.0 -8.25 4.0 590.5").is_none());
    }

    #[test]
    fn test_parse_random_plane_line() {
        let rec =
            parse_random_plane_line("3 1.0 2.0 3.0 4.0 5.0 6.0 7.25 123.5").unwrap();
        assert_eq!(rec.event_no, 3);
        assert!((rec.b - 7.25).abs() < f64::EPSILON);
        assert!((rec.rpphi_deg - 123.5).abs() < f64::EPSILON);

        assert!(parse_random_plane_line("3 1.0 2.0 3.0 4.0 5.0 6.0 7.25").is_none());
        assert!(parse_random_plane_line("3 1.0 2.0 3.0 4.0 5.0 6.0 7.25 x").is_none());
    }

    #[test]
    fn test_data_lines_skip_headers_and_blanks() {
        let text = "info line\nno px py pz\n1 a\n\n   \n2 b\n";
        let lines: Vec<&str> = data_lines(text).collect();
        assert_eq!(lines, vec!["1 a", "2 b"]);
    }

    #[test]
    fn test_mapped_text_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "header\ncolumns\n0 1 2 3 4 5 6\n").unwrap();
        file.flush().unwrap();

        let mapped = MappedTextFile::open(file.path()).unwrap();
        assert!(!mapped.is_empty());
        let text = mapped.text();
        let records: Vec<_> = data_lines(&text).filter_map(parse_discrete_line).collect();
        assert_eq!(records.len(), 1);
        assert_relative_eq!(records[0].neutron.pz, 6.0);
    }
}
