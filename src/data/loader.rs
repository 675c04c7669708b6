// ============================================================
// Layer 4 — CIFAR-10 Loader
// ============================================================
// Downloads and parses the CIFAR-10 binary distribution.
//
// The archive (cifar-10-binary.tar.gz) unpacks to:
//   cifar-10-batches-bin/
//     data_batch_1.bin ... data_batch_5.bin   ← 50 000 train images
//     test_batch.bin                          ← 10 000 test images
//     batches.meta.txt                        ← one class name per line
//
// Every .bin file is a flat sequence of 10 000 fixed-size records:
//   [label: 1 byte] [red: 1024 bytes] [green: 1024] [blue: 1024]
// i.e. a 32x32 image in channel-first order, exactly the layout
// LabeledImage uses, so parsing is a straight copy.
//
// The download happens at most once: prepare() checks for the
// unpacked files first. Everything downstream (threads, devices)
// starts only after prepare() has returned, which is the
// "download barrier" of the run.
//
// Reference: https://www.cs.toronto.edu/~kriz/cifar.html

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tar::Archive;

use crate::domain::image::LabeledImage;
use crate::domain::traits::ImageSource;
use crate::infra::download::download_bytes;

const CIFAR10_URL:  &str = "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz";
const BATCH_DIR:    &str = "cifar-10-batches-bin";
const META_FILE:    &str = "batches.meta.txt";
const TRAIN_FILES:  [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_FILE:    &str = "test_batch.bin";

pub const IMAGE_SIDE:  u32   = 32;
pub const NUM_CLASSES: usize = 10;
const PIXELS_PER_IMAGE: usize = 3 * (IMAGE_SIDE * IMAGE_SIDE) as usize;
const RECORD_LEN:       usize = 1 + PIXELS_PER_IMAGE;

/// Reads CIFAR-10 from `<root>/cifar-10-batches-bin`.
/// Implements the ImageSource trait from Layer 3.
pub struct Cifar10Source {
    root: PathBuf,
}

impl Cifar10Source {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn batch_dir(&self) -> PathBuf {
        self.root.join(BATCH_DIR)
    }

    /// True when every file we read is already on disk
    pub fn is_prepared(&self) -> bool {
        let dir = self.batch_dir();
        TRAIN_FILES
            .iter()
            .chain([TEST_FILE, META_FILE].iter())
            .all(|f| dir.join(f).is_file())
    }

    fn read_files(&self, names: &[&str]) -> Result<Vec<LabeledImage>> {
        let dir = self.batch_dir();
        let mut images = Vec::new();
        for name in names {
            let path = dir.join(name);
            let bytes = fs::read(&path)
                .with_context(|| format!("Cannot read '{}'", path.display()))?;
            let batch = parse_records(&bytes)
                .with_context(|| format!("Malformed CIFAR-10 file '{}'", path.display()))?;
            tracing::debug!("Loaded {} images from {}", batch.len(), name);
            images.extend(batch);
        }
        Ok(images)
    }
}

impl ImageSource for Cifar10Source {
    fn prepare(&self) -> Result<()> {
        if self.is_prepared() {
            tracing::info!("CIFAR-10 already present in '{}'", self.root.display());
            return Ok(());
        }

        fs::create_dir_all(&self.root)
            .with_context(|| format!("Cannot create data dir '{}'", self.root.display()))?;

        tracing::info!("Downloading CIFAR-10 into '{}'", self.root.display());
        let bytes = download_bytes(CIFAR10_URL, "cifar-10-binary.tar.gz")?;
        unpack_tar_gz(&bytes, &self.root)?;

        if !self.is_prepared() {
            bail!(
                "CIFAR-10 archive unpacked into '{}' but expected files are missing",
                self.root.display()
            );
        }
        Ok(())
    }

    fn classes(&self) -> Result<Vec<String>> {
        let path = self.batch_dir().join(META_FILE);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read class names from '{}'", path.display()))?;
        let classes = parse_class_names(&text);
        if classes.len() != NUM_CLASSES {
            bail!("Expected {} class names, found {}", NUM_CLASSES, classes.len());
        }
        Ok(classes)
    }

    fn train_split(&self) -> Result<Vec<LabeledImage>> {
        self.read_files(&TRAIN_FILES)
    }

    fn test_split(&self) -> Result<Vec<LabeledImage>> {
        self.read_files(&[TEST_FILE])
    }
}

/// Unpack a gzip-compressed tarball into `dest`
fn unpack_tar_gz(bytes: &[u8], dest: &Path) -> Result<()> {
    if !bytes.starts_with(&[0x1f, 0x8b]) {
        bail!("Downloaded {} bytes are not a gzip archive", bytes.len());
    }
    let mut archive = Archive::new(GzDecoder::new(bytes));
    archive
        .unpack(dest)
        .with_context(|| format!("Cannot unpack archive into '{}'", dest.display()))
}

/// Parse a buffer of CIFAR-10 binary records.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<LabeledImage>> {
    if bytes.len() % RECORD_LEN != 0 {
        bail!(
            "length {} is not a multiple of the record size {}",
            bytes.len(),
            RECORD_LEN
        );
    }

    bytes
        .chunks_exact(RECORD_LEN)
        .enumerate()
        .map(|(i, record)| {
            let label = record[0] as usize;
            if label >= NUM_CLASSES {
                bail!("record {} has label {} (expected < {})", i, label, NUM_CLASSES);
            }
            Ok(LabeledImage::new(
                record[1..].to_vec(),
                IMAGE_SIDE,
                IMAGE_SIDE,
                label,
            ))
        })
        .collect()
}

/// One class per non-empty line
pub fn parse_class_names(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}
