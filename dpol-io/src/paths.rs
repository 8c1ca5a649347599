//! Data-root layout.
//!
//! ```text
//! <root>/z_pol/b_discrete/d+{target}E{energy}g{gamma}{znp|zpn}/dbreakbNN.dat
//! <root>/y_pol/phi_random/d+{target}E{energy}g{gamma}{ynp|ypn}/dbreak.dat
//! ```

use crate::{Error, Result};
use dpol_core::{DatasetLayout, PolarizationVariant};
use std::fmt;
use std::path::{Path, PathBuf};

/// Root directory of the raw QMD event tree.
///
/// Passed explicitly to every source; nothing is resolved from the
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRoot {
    root: PathBuf,
}

impl DataRoot {
    /// Wraps a root directory.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns true if the root directory exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Checks that the root directory is present.
    ///
    /// # Errors
    /// Returns [`Error::MissingData`] if the directory does not exist.
    pub fn require(&self) -> Result<&Path> {
        if self.exists() {
            Ok(&self.root)
        } else {
            Err(Error::MissingData(self.root.clone()))
        }
    }

    /// Directory holding all datasets of one layout.
    #[must_use]
    pub fn layout_dir(&self, layout: DatasetLayout) -> PathBuf {
        match layout {
            DatasetLayout::DiscreteImpact => self.root.join("z_pol").join("b_discrete"),
            DatasetLayout::RandomReactionPlane => self.root.join("y_pol").join("phi_random"),
        }
    }

    /// Folder of a single dataset.
    #[must_use]
    pub fn dataset_dir(&self, key: &DatasetKey) -> PathBuf {
        self.layout_dir(key.variant.pol_type.layout())
            .join(key.folder_name())
    }
}

/// Identity of one raw dataset folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetKey {
    pub target: String,
    pub energy: String,
    pub gamma: String,
    pub variant: PolarizationVariant,
}

impl DatasetKey {
    pub fn new(
        target: impl Into<String>,
        energy: impl Into<String>,
        gamma: impl Into<String>,
        variant: PolarizationVariant,
    ) -> Self {
        Self {
            target: target.into(),
            energy: energy.into(),
            gamma: gamma.into(),
            variant,
        }
    }

    /// Folder name, e.g. `d+Pb208E190g050znp`.
    #[must_use]
    pub fn folder_name(&self) -> String {
        format!(
            "d+{}E{}g{}{}",
            self.target, self.energy, self.gamma, self.variant
        )
    }

    /// Parses a folder name of the form `d+{target}E{energy}g{gamma}{pol}`.
    ///
    /// The energy and gamma fields are the rightmost all-digit groups, so
    /// targets that themselves contain an `E` or a `g` still parse.
    #[must_use]
    pub fn parse_folder_name(name: &str) -> Option<Self> {
        let body = name.strip_prefix("d+")?;
        if body.len() < 3 || !body.is_char_boundary(body.len() - 3) {
            return None;
        }
        let (rest, pol) = body.split_at(body.len() - 3);
        let variant: PolarizationVariant = pol.parse().ok()?;

        let (rest, gamma) = split_digit_suffix(rest, 'g')?;
        let (target, energy) = split_digit_suffix(rest, 'E')?;
        let target_ok = !target.is_empty()
            && target
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !target_ok {
            return None;
        }
        Some(Self::new(target, energy, gamma, variant))
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.folder_name())
    }
}

/// Splits `s` at the last `sep` that is followed only by ASCII digits.
fn split_digit_suffix(s: &str, sep: char) -> Option<(&str, &str)> {
    let idx = s.rfind(sep)?;
    let digits = &s[idx + sep.len_utf8()..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((&s[..idx], digits))
}
