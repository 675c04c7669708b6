// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the CIFAR-10 archive to per-device tensors.
//
// The pipeline flows in this order:
//
//   cifar-10-binary.tar.gz
//       │
//       ▼
//   Cifar10Source     → downloads once, parses binary records
//       │
//       ▼
//   ImageDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   DataLoader        → shuffles (train only), groups global batches
//       │
//       ▼
//   ShardBatcher      → splits each batch per device, applies
//                       the transform Pipeline, builds tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Downloads and parses the CIFAR-10 binary distribution
pub mod loader;

/// Resize / crop / normalise pipelines
pub mod transform;

/// Implements Burn's Dataset trait for labelled images
pub mod dataset;

/// Splits a global batch into per-device slices
pub mod shard;

/// Implements Burn's Batcher trait, one tensor pair per device
pub mod batcher;
