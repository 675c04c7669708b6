// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer only talks to these traits, so the
// CIFAR-10 reader can be swapped for another labelled image
// source without touching the training workflow.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::image::LabeledImage;

// ─── ImageSource ──────────────────────────────────────────────────────────────
/// Any component that can provide a labelled train/test split.
///
/// Implementations:
///   - Cifar10Source → the CIFAR-10 binary distribution
pub trait ImageSource {
    /// Make sure the raw data is available locally (downloading if needed).
    /// Must be called, and must complete, before any split is read.
    fn prepare(&self) -> Result<()>;

    /// Human-readable class names, indexed by label
    fn classes(&self) -> Result<Vec<String>>;

    /// The training split
    fn train_split(&self) -> Result<Vec<LabeledImage>>;

    /// The held-out evaluation split
    fn test_split(&self) -> Result<Vec<LabeledImage>>;
}
