// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model, optimizer and device code lives here.
//
//   model.rs      — ResNet-50 with bottleneck blocks, field names
//                   matching the torchvision layout
//
//   pretrained.rs — Downloads the ImageNet weights and loads them
//                   through burn-import's PyTorch recorder
//
//   scheduler.rs  — Linear warmup + cosine decay, one value per
//                   optimizer step
//
//   parallel.rs   — Device group, per-device forward/backward on
//                   scoped threads, gradient reduction on rank 0
//
//   trainer.rs    — Epoch loop: SGD steps, evaluation, history
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            He et al. (2016) Deep Residual Learning
//            Goyal et al. (2017) Accurate, Large Minibatch SGD

/// ResNet-50 architecture
pub mod model;

/// torchvision weights download + import
pub mod pretrained;

/// Learning rate schedules
pub mod scheduler;

/// Multi-device training and evaluation steps
pub mod parallel;

/// Full training loop with per-epoch evaluation
pub mod trainer;
