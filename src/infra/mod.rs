// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   config.rs   — YAML config loading, device list parsing
//
//   download.rs — Network fetches through Burn's downloader,
//                 failures turned into errors
//
//   memory.rs   — Peak resident memory of the process (sysinfo)
//
//   plot.rs     — Loss / accuracy / learning-rate curves drawn
//                 into a single JPEG with the `image` crate
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// YAML configuration loader
pub mod config;

/// Dataset and weight downloads
pub mod download;

/// Process memory sampling
pub mod memory;

/// Training curves image
pub mod plot;
