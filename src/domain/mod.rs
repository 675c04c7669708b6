// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that describe a training run:
// what a labelled image is, what a run records, and what a
// data source must provide.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A single labelled image in channel-first layout
pub mod image;

// Per-epoch and per-step series recorded during training
pub mod history;

// Core abstractions (traits) that other layers implement
pub mod traits;
