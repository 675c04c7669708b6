// ============================================================
// Layer 5 — Data-Parallel Execution
// ============================================================
// Synchronous data parallelism over a fixed list of devices,
// one worker thread per device.
//
// Rank 0 is the PRIMARY device: it owns the master parameters
// and the optimizer state. Every training step:
//
//   1. fork the master model onto each device that holds a shard
//   2. forward + loss + backward on every device concurrently
//   3. move each device's gradients to the primary device and sum
//   4. (caller) apply one optimizer step on the master model
//
// Each shard's mean loss is scaled by shard_len / global_len
// before backward, so the summed gradient is the gradient of the
// mean loss over the whole global batch.
//
// Loss and accuracy are gathered as raw sums (StepStats) and only
// divided at the end of an epoch, so uneven shards are weighted
// correctly.
//
// Reference: Burn's multi-device learner (fork + GradientsAccumulator)

use anyhow::{anyhow, bail, Result};
use burn::{
    optim::{GradientsAccumulator, GradientsParams},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::thread;

use crate::data::batcher::{ImageBatch, ShardedBatch};
use crate::ml::model::{count_correct, ResNet};

// ─── DeviceGroup ──────────────────────────────────────────────────────────────
/// The ordered devices of a run. Index = rank.
#[derive(Debug, Clone)]
pub struct DeviceGroup<D> {
    devices: Vec<D>,
}

impl<D: Clone> DeviceGroup<D> {
    pub fn new(devices: Vec<D>) -> Result<Self> {
        if devices.is_empty() {
            bail!("A device group needs at least one device");
        }
        Ok(Self { devices })
    }

    /// The device holding the master parameters
    pub fn primary(&self) -> &D {
        &self.devices[0]
    }

    pub fn device(&self, rank: usize) -> &D {
        &self.devices[rank]
    }

    pub fn world_size(&self) -> usize {
        self.devices.len()
    }

    pub fn devices(&self) -> &[D] {
        &self.devices
    }
}

// ─── StepStats ────────────────────────────────────────────────────────────────
/// Sums gathered from every shard of one or more batches.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepStats {
    /// Sum of per-sample cross-entropy
    pub loss_sum: f64,
    /// Samples whose argmax matched the label
    pub correct:  usize,
    /// Samples seen
    pub count:    usize,
}

impl StepStats {
    pub fn merge(&mut self, other: StepStats) {
        self.loss_sum += other.loss_sum;
        self.correct  += other.correct;
        self.count    += other.count;
    }

    pub fn mean_loss(&self) -> f64 {
        if self.count > 0 { self.loss_sum / self.count as f64 } else { f64::NAN }
    }

    pub fn accuracy(&self) -> f64 {
        if self.count > 0 { self.correct as f64 / self.count as f64 } else { 0.0 }
    }
}

/// Reduced gradients (on the primary device) plus gathered stats
pub struct TrainStepOutput {
    pub grads: GradientsParams,
    pub stats: StepStats,
}

// ─── Training step ────────────────────────────────────────────────────────────
/// Forward/backward on every shard in parallel, gradients summed on the primary.
pub fn train_step<B: AutodiffBackend>(
    model: &ResNet<B>,
    group: &DeviceGroup<B::Device>,
    batch: ShardedBatch<B>,
) -> Result<TrainStepOutput> {
    let global = batch.size;

    let results = thread::scope(|scope| {
        let handles: Vec<_> = batch
            .shards
            .into_iter()
            .map(|shard| {
                let device  = group.device(shard.rank).clone();
                let replica = model.clone();
                scope.spawn(move || shard_backward(replica, device, shard, global))
            })
            .collect();
        join_all(handles)
    })?;

    let mut accumulator = GradientsAccumulator::new();
    let mut stats       = StepStats::default();

    for (grads, shard_stats) in results {
        let grads = grads.to_device(group.primary(), model);
        accumulator.accumulate(model, grads);
        stats.merge(shard_stats);
    }

    Ok(TrainStepOutput { grads: accumulator.grads(), stats })
}

fn shard_backward<B: AutodiffBackend>(
    model:  ResNet<B>,
    device: B::Device,
    shard:  ImageBatch<B>,
    global: usize,
) -> (GradientsParams, StepStats) {
    let model = model.fork(&device);
    let n     = shard.len();

    let (loss, logits) = model.forward_loss(shard.images, shard.targets.clone());
    let mean_loss: f64 = loss.clone().into_scalar().elem::<f64>();
    let correct = count_correct(logits, shard.targets);

    let weight = n as f64 / global as f64;
    let grads  = loss.mul_scalar(weight).backward();
    let grads  = GradientsParams::from_grads(grads, &model);

    let stats = StepStats { loss_sum: mean_loss * n as f64, correct, count: n };
    (grads, stats)
}

// ─── Evaluation step ──────────────────────────────────────────────────────────
/// Forward pass on every shard in parallel; returns gathered sums.
pub fn eval_step<B: Backend>(
    model: &ResNet<B>,
    group: &DeviceGroup<B::Device>,
    batch: ShardedBatch<B>,
) -> Result<StepStats> {
    let results = thread::scope(|scope| {
        let handles: Vec<_> = batch
            .shards
            .into_iter()
            .map(|shard| {
                let device  = group.device(shard.rank).clone();
                let replica = model.clone();
                scope.spawn(move || shard_eval(replica, device, shard))
            })
            .collect();
        join_all(handles)
    })?;

    let mut stats = StepStats::default();
    for shard_stats in results {
        stats.merge(shard_stats);
    }
    Ok(stats)
}

fn shard_eval<B: Backend>(model: ResNet<B>, device: B::Device, shard: ImageBatch<B>) -> StepStats {
    let model = model.fork(&device);
    let n     = shard.len();

    let (loss, logits) = model.forward_loss(shard.images, shard.targets.clone());
    let mean_loss: f64 = loss.into_scalar().elem::<f64>();

    StepStats {
        loss_sum: mean_loss * n as f64,
        correct:  count_correct(logits, shard.targets),
        count:    n,
    }
}

fn join_all<T>(handles: Vec<thread::ScopedJoinHandle<'_, T>>) -> Result<Vec<T>> {
    handles
        .into_iter()
        .enumerate()
        .map(|(i, h)| h.join().map_err(|_| anyhow!("Device worker {} panicked", i)))
        .collect()
}
