// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Synchronous data-parallel train + evaluation loop.
//
//   - Training uses Autodiff<Wgpu>, one Wgpu device per rank
//   - model.valid() returns the model on the inner backend, so the
//     evaluation batcher builds inner-backend tensors
//   - The configured batch size is the GLOBAL batch; the batcher
//     splits it across the devices of the group
//   - The learning rate is recorded BEFORE each optimizer step,
//     the scheduler advances right after it
//
// Reference: Burn Book §5, Loshchilov & Hutter (2017) SGDR

use anyhow::{bail, Result};
use burn::{
    backend::wgpu::{Wgpu, WgpuDevice},
    backend::Autodiff,
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, momentum::MomentumConfig, Optimizer, SgdConfig},
    tensor::backend::AutodiffBackend,
};
use std::{path::Path, time::Instant};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::ShardBatcher, dataset::ImageDataset, transform::Pipeline};
use crate::domain::history::{EpochMetrics, RunSummary, TrainingHistory};
use crate::infra::memory::MemoryTracker;
use crate::ml::{
    model::ResNet,
    parallel::{eval_step, train_step, DeviceGroup, StepStats},
    pretrained,
    scheduler::{CosineWarmup, Scheduler},
};

type MyBackend = Autodiff<Wgpu>;

/// Resolve the configured device indices to Wgpu devices.
/// An empty list means the default device only.
pub fn wgpu_devices(indices: &[usize]) -> Vec<WgpuDevice> {
    if indices.is_empty() {
        return vec![WgpuDevice::default()];
    }
    indices.iter().map(|&i| WgpuDevice::DiscreteGpu(i)).collect()
}

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: ImageDataset,
    val_dataset:   ImageDataset,
    weights:       Option<&Path>,
) -> Result<RunSummary> {
    let group = DeviceGroup::new(wgpu_devices(&cfg.device))?;
    tracing::info!("Using {} WGPU device(s): {:?}", group.world_size(), group.devices());

    let model: ResNet<MyBackend> = pretrained::resnet50(cfg.num_classes, weights, group.primary())?;
    train_loop(cfg, model, group, train_dataset, val_dataset)
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    mut model:     ResNet<B>,
    group:         DeviceGroup<B::Device>,
    train_dataset: ImageDataset,
    val_dataset:   ImageDataset,
) -> Result<RunSummary> {
    if cfg.batch_size % group.world_size() != 0 {
        bail!(
            "batch_size {} is not divisible by the {} devices",
            cfg.batch_size, group.world_size()
        );
    }

    let steps_per_epoch = train_dataset.full_batches(cfg.batch_size);
    if steps_per_epoch == 0 {
        bail!(
            "Training split has {} samples, fewer than one batch of {}",
            train_dataset.sample_count(), cfg.batch_size
        );
    }
    let total_steps = steps_per_epoch * cfg.epochs;
    if let Some((w, h)) = train_dataset.image_size() {
        tracing::info!(
            "Input {}x{} → train crop {} (from {}), eval {}",
            w, h, cfg.crop_size, cfg.train_resize, cfg.eval_resize,
        );
    }
    tracing::info!(
        "{} train / {} eval samples, {} steps per epoch, {} per device",
        train_dataset.sample_count(), val_dataset.sample_count(),
        steps_per_epoch, cfg.batch_size / group.world_size(),
    );

    // ── SGD with weight decay ─────────────────────────────────────────────────
    // g = g + wd * θ
    // v = μ * v + g       (only with momentum)
    // θ = θ - lr * v
    let momentum  = cfg.momentum.map(|m| MomentumConfig::new().with_momentum(m).with_dampening(0.0));
    let optim_cfg = SgdConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(cfg.weight_decay as f32)))
        .with_momentum(momentum);
    let mut optim = optim_cfg.init::<B, ResNet<B>>();

    let mut scheduler = Scheduler::new(CosineWarmup::new(cfg.lr, cfg.warmup_steps, total_steps));

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    // Single-threaded loader: one partition, so exactly one partial batch
    // per epoch. num_workers sizes the batcher's transform pool instead.
    let train_batcher = ShardBatcher::<B>::new(
        group.devices().to_vec(),
        Pipeline::train(cfg.train_resize, cfg.crop_size),
    )
    .with_seed(cfg.seed)
    .with_workers(cfg.num_workers)?;
    let train_loader = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .build(train_dataset);

    // ── Evaluation data loader (InnerBackend, no autodiff) ────────────────────
    let val_batcher = ShardBatcher::<B::InnerBackend>::new(
        group.devices().to_vec(),
        Pipeline::eval(cfg.eval_resize),
    )
    .with_workers(cfg.num_workers)?;
    let val_loader = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .build(val_dataset);

    let mut history = TrainingHistory::new();
    let mut memory  = MemoryTracker::new();
    memory.sample();
    let start = Instant::now();

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_stats = StepStats::default();

        for (iter, batch) in train_loader.iter().enumerate() {
            // Trailing partial batch is dropped
            if batch.size < cfg.batch_size {
                continue;
            }

            let lr = scheduler.current_lr();
            history.record_lr(lr);

            let out = train_step(&model, &group, batch)?;
            model = optim.step(lr, model, out.grads);
            scheduler.step();

            if iter % cfg.log_interval.max(1) == 0 {
                tracing::info!(
                    "epoch: {}, iter: {}, iter loss: {:.4}, iter acc: {:.4}, lr: {:.6}",
                    epoch, iter, out.stats.mean_loss(), out.stats.accuracy(), lr,
                );
            }
            train_stats.merge(out.stats);
        }

        // ── Evaluation phase ──────────────────────────────────────────────────
        // model.valid() → ResNet<B::InnerBackend>, batch norm uses running stats
        let model_valid = model.valid();
        let mut val_stats = StepStats::default();

        for batch in val_loader.iter() {
            val_stats.merge(eval_step(&model_valid, &group, batch)?);
        }

        let metrics = EpochMetrics::new(
            epoch,
            train_stats.mean_loss(),
            train_stats.accuracy(),
            val_stats.mean_loss(),
            val_stats.accuracy(),
        );

        if metrics.is_improvement(history.best_val_acc().unwrap_or(0.0)) {
            tracing::info!("New best val acc {:.4} at epoch {}", metrics.val_acc, epoch);
        }

        println!(
            "Epoch {:>3}/{} | train_acc={:.4} | train_loss={:.4} | val_acc={:.4} | val_loss={:.4}",
            epoch, cfg.epochs, metrics.train_acc, metrics.train_loss, metrics.val_acc, metrics.val_loss,
        );
        history.record_epoch(metrics);

        memory.sample();
        println!("memory allocated: {:.2}G", memory.peak_bytes() as f64 / 1e9);
    }

    let duration_secs = start.elapsed().as_secs();
    tracing::info!("Training complete after {} optimizer steps", scheduler.steps_taken());

    Ok(RunSummary {
        history,
        peak_memory_bytes: memory.peak_bytes(),
        duration_secs,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, NdArray};

    use crate::domain::image::LabeledImage;
    use crate::ml::model::ResNetConfig;

    type Ad = Autodiff<NdArray<f32>>;

    fn split(n: usize) -> ImageDataset {
        ImageDataset::new(
            (0..n)
                .map(|i| LabeledImage::new(vec![(i * 53 % 255) as u8; 3 * 32 * 32], 32, 32, i % 10))
                .collect(),
        )
    }

    fn tiny_config() -> TrainConfig {
        TrainConfig {
            device:       vec![0, 1],
            batch_size:   4,
            num_workers:  1,
            epochs:       2,
            lr:           0.01,
            warmup_steps: 1,
            train_resize: 32,
            crop_size:    32,
            eval_resize:  32,
            log_interval: 1,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_empty_device_list_uses_default() {
        assert_eq!(wgpu_devices(&[]), vec![WgpuDevice::default()]);
        assert_eq!(wgpu_devices(&[1]), vec![WgpuDevice::DiscreteGpu(1)]);
    }

    #[test]
    fn test_two_device_smoke_run_records_every_series() {
        let device = NdArrayDevice::Cpu;
        let group  = DeviceGroup::new(vec![device, device]).unwrap();
        let model: ResNet<Ad> = ResNetConfig::new([1, 1, 1, 1], 10).init(&device);

        // 10 train samples at batch 4 → 2 full steps per epoch, 2 dropped
        let summary = train_loop(&tiny_config(), model, group, split(10), split(6)).unwrap();
        let h = &summary.history;

        assert_eq!(h.epochs.len(), 2);
        assert_eq!(h.learning_rates.len(), 4);
        // warmup starts at zero, then decays from the peak
        assert_eq!(h.learning_rates[0], 0.0);
        assert!((h.learning_rates[1] - 0.01).abs() < 1e-12);
        assert!(h.learning_rates[3] < h.learning_rates[1]);

        for m in &h.epochs {
            assert!(m.train_loss.is_finite());
            assert!(m.val_loss.is_finite());
            assert!((0.0..=1.0).contains(&m.val_acc));
        }
        assert!(summary.peak_memory_bytes > 0);
    }

    #[test]
    fn test_worker_count_does_not_change_the_step_count() {
        let device = NdArrayDevice::Cpu;

        // 12 samples at batch 4 → exactly 3 steps, no partial batches
        let group = DeviceGroup::new(vec![device, device]).unwrap();
        let model: ResNet<Ad> = ResNetConfig::new([1, 1, 1, 1], 10).init(&device);
        let cfg   = TrainConfig { num_workers: 2, epochs: 1, ..tiny_config() };
        let summary = train_loop(&cfg, model, group, split(12), split(4)).unwrap();
        assert_eq!(summary.history.learning_rates.len(), 3);

        // 10 samples at batch 4 with 4 workers → 2 steps, one tail of 2 dropped
        let group = DeviceGroup::new(vec![device, device]).unwrap();
        let model: ResNet<Ad> = ResNetConfig::new([1, 1, 1, 1], 10).init(&device);
        let cfg   = TrainConfig { num_workers: 4, epochs: 1, ..tiny_config() };
        let summary = train_loop(&cfg, model, group, split(10), split(5)).unwrap();
        assert_eq!(summary.history.learning_rates.len(), 2);
        assert_eq!(summary.history.epochs.len(), 1);
    }

    #[test]
    fn test_indivisible_batch_is_rejected() {
        let device = NdArrayDevice::Cpu;
        let group  = DeviceGroup::new(vec![device, device, device]).unwrap();
        let model: ResNet<Ad> = ResNetConfig::new([1, 1, 1, 1], 10).init(&device);

        assert!(train_loop(&tiny_config(), model, group, split(8), split(4)).is_err());
    }

    #[test]
    fn test_split_smaller_than_a_batch_is_rejected() {
        let device = NdArrayDevice::Cpu;
        let group  = DeviceGroup::new(vec![device]).unwrap();
        let model: ResNet<Ad> = ResNetConfig::new([1, 1, 1, 1], 10).init(&device);

        assert!(train_loop(&tiny_config(), model, group, split(3), split(3)).is_err());
    }
}
