//! Discovery of the datasets present under a data root.

use crate::paths::{DataRoot, DatasetKey};
use crate::Result;
use dpol_core::PolarizationType;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;

/// Index of dataset folders found under a [`DataRoot`].
#[derive(Debug, Clone, Default)]
pub struct DatasetCatalog {
    folders: BTreeMap<PolarizationType, Vec<String>>,
}

impl DatasetCatalog {
    /// Scans the data root for dataset folders.
    ///
    /// `pol_type` restricts the scan to one layout. Layout directories that
    /// do not exist are simply absent from the catalog.
    ///
    /// # Errors
    /// Returns an error if an existing layout directory cannot be read.
    pub fn scan(root: &DataRoot, pol_type: Option<PolarizationType>) -> Result<Self> {
        let mut folders = BTreeMap::new();
        for pol in [PolarizationType::Z, PolarizationType::Y] {
            if pol_type.is_some_and(|wanted| wanted != pol) {
                continue;
            }
            let dir = root.layout_dir(pol.layout());
            if !dir.is_dir() {
                continue;
            }
            let mut names = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            names.sort();
            folders.insert(pol, names);
        }
        Ok(Self { folders })
    }

    /// Folder names found for a polarization layout, sorted.
    #[must_use]
    pub fn folders(&self, pol_type: PolarizationType) -> &[String] {
        self.folders.get(&pol_type).map_or(&[][..], Vec::as_slice)
    }

    /// Parsed dataset keys; folders whose names do not parse are skipped.
    pub fn datasets(&self) -> impl Iterator<Item = DatasetKey> + '_ {
        self.folders
            .values()
            .flatten()
            .filter_map(|name| DatasetKey::parse_folder_name(name))
    }

    /// All targets present, sorted and de-duplicated.
    #[must_use]
    pub fn targets(&self) -> Vec<String> {
        self.datasets()
            .map(|key| key.target)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// All gamma labels present, optionally restricted to one target.
    #[must_use]
    pub fn gammas(&self, target: Option<&str>) -> Vec<String> {
        self.datasets()
            .filter(|key| target.is_none_or(|t| key.target == t))
            .map(|key| key.gamma)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
