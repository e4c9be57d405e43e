//! Edit-manifest serialization.
//!
//! The edit directory holds one image per edited frame plus a single
//! `edit.json` manifest mapping the stringified frame index to the image's
//! relative path and the patch coordinates the edit was produced at.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// File name of the manifest inside an edit directory.
pub const MANIFEST_FILE: &str = "edit.json";

/// One manifest entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Image path relative to the edit directory.
    pub file_path: String,

    /// Patch top-left `[x, y]` the edit was produced at.
    pub patches: [u32; 2],
}

/// The full manifest, keyed by stringified frame index.
///
/// BTreeMap keeps the on-disk JSON ordered, which makes reruns diffable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditManifest {
    records: BTreeMap<String, ManifestRecord>,
}

impl EditManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for a frame.
    pub fn insert(&mut self, frame_index: usize, record: ManifestRecord) {
        self.records.insert(frame_index.to_string(), record);
    }

    pub fn get(&self, frame_index: usize) -> Option<&ManifestRecord> {
        self.records.get(&frame_index.to_string())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records as `(frame_index, record)`.
    ///
    /// Keys that do not parse as frame indices are skipped; they cannot have
    /// been written by [`EditManifest::insert`].
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ManifestRecord)> {
        self.records
            .iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v)))
    }

    /// Load `edit.json` from an edit directory.
    pub fn load(dir: &Path) -> Result<Self, std::io::Error> {
        let file = File::open(dir.join(MANIFEST_FILE))?;
        serde_json::from_reader(BufReader::new(file)).map_err(std::io::Error::from)
    }

    /// Write `edit.json` into an edit directory, replacing any prior file.
    pub fn save(&self, dir: &Path) -> Result<(), std::io::Error> {
        let file = File::create(dir.join(MANIFEST_FILE))?;
        serde_json::to_writer(BufWriter::new(file), self).map_err(std::io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut manifest = EditManifest::new();
        manifest.insert(
            7,
            ManifestRecord {
                file_path: "00007.png".into(),
                patches: [0, 0],
            },
        );
        manifest.insert(
            12,
            ManifestRecord {
                file_path: "00012.png".into(),
                patches: [144, 287],
            },
        );

        manifest.save(dir.path()).unwrap();
        let loaded = EditManifest::load(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.get(12).unwrap().patches, [144, 287]);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut manifest = EditManifest::new();
        let rec = |x| ManifestRecord {
            file_path: "00003.png".into(),
            patches: [x, 0],
        };
        manifest.insert(3, rec(1));
        manifest.insert(3, rec(2));
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get(3).unwrap().patches, [2, 0]);
    }
}
