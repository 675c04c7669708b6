// ============================================================
// Layer 4 — Sharded Image Batcher
// ============================================================
// Implements Burn's Batcher trait. The DataLoader hands us one
// GLOBAL batch of LabeledImages; we:
//
//   1. run the transform pipeline on every image  (data::transform)
//   2. split the result into per-device shards     (data::shard)
//   3. build one tensor pair per shard, directly on that shard's device
//
// Input:  Vec of N LabeledImages
// Output: ShardedBatch with one ImageBatch per non-empty shard,
//         images shaped [n_shard, 3, H, W], targets shaped [n_shard]
//
// The DataLoader itself is single threaded so that it sees the
// dataset as one partition. The per-image transforms fan out over
// a rayon pool of `num_workers` threads instead; results are
// collected in item order.
//
// Random crops are drawn from a per-item StdRng seeded with
// (seed, batch counter, item index), so a run is reproducible
// no matter how the pool schedules the work.
//
// Reference: Burn Book §4 (Batcher)

use anyhow::{Context, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use rand::{rngs::StdRng, SeedableRng};
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::data::shard::shard_ranges;
use crate::data::transform::Pipeline;
use crate::domain::image::LabeledImage;

// ─── ImageBatch ───────────────────────────────────────────────────────────────
/// The part of a global batch that lives on one device.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Index of the device in the run's device list
    pub rank: usize,

    /// Normalised images, shape: [n, 3, height, width]
    pub images: Tensor<B, 4>,

    /// Class indices, shape: [n]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── ShardedBatch ─────────────────────────────────────────────────────────────
/// One global batch, already split across devices.
#[derive(Debug, Clone)]
pub struct ShardedBatch<B: Backend> {
    pub shards: Vec<ImageBatch<B>>,
    /// Total samples across all shards
    pub size:   usize,
}

// ─── ShardBatcher ─────────────────────────────────────────────────────────────
/// Holds the device list, the transform pipeline and the crop seed.
#[derive(Clone, Debug)]
pub struct ShardBatcher<B: Backend> {
    pub devices:  Vec<B::Device>,
    pub pipeline: Pipeline,
    seed:         u64,
    /// None → rayon's global pool
    pool:         Option<Arc<ThreadPool>>,
    /// Batches produced so far, shared by every clone
    batches:      Arc<AtomicU64>,
}

impl<B: Backend> ShardBatcher<B> {
    pub fn new(devices: Vec<B::Device>, pipeline: Pipeline) -> Self {
        Self {
            devices,
            pipeline,
            seed:    0,
            pool:    None,
            batches: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run the transforms on a dedicated pool of `workers` threads
    pub fn with_workers(mut self, workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("batcher-{}", i))
            .build()
            .context("Cannot start the transform thread pool")?;
        self.pool = Some(Arc::new(pool));
        Ok(self)
    }

    fn item_rng(&self, batch: u64, item: usize) -> StdRng {
        let mixed = self.seed
            ^ batch.wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (item as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
        StdRng::seed_from_u64(mixed)
    }

    /// Transform every item, in item order
    fn transform_all(&self, batch: u64, items: &[LabeledImage]) -> Vec<Vec<f32>> {
        let work = || {
            items
                .par_iter()
                .enumerate()
                .map(|(i, img)| self.pipeline.apply(img, &mut self.item_rng(batch, i)))
                .collect::<Vec<_>>()
        };
        match &self.pool {
            Some(pool) => pool.install(work),
            None       => work(),
        }
    }

    fn build_shard(
        &self,
        rank:   usize,
        items:  &[LabeledImage],
        pixels: &[Vec<f32>],
    ) -> ImageBatch<B> {
        let device = &self.devices[rank];
        let (width, height) = self.pipeline.output_size((items[0].width, items[0].height));

        let flat: Vec<f32> = pixels.concat();
        let labels: Vec<i32> = items.iter().map(|img| img.label as i32).collect();

        let images = Tensor::<B, 1>::from_floats(flat.as_slice(), device)
            .reshape([items.len(), LabeledImage::CHANNELS, height as usize, width as usize]);

        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), device);

        ImageBatch { rank, images, targets }
    }
}

impl<B: Backend> Batcher<LabeledImage, ShardedBatch<B>> for ShardBatcher<B> {
    fn batch(&self, items: Vec<LabeledImage>) -> ShardedBatch<B> {
        let batch  = self.batches.fetch_add(1, Ordering::Relaxed);
        let pixels = self.transform_all(batch, &items);

        let size   = items.len();
        let shards = shard_ranges(size, self.devices.len())
            .into_iter()
            .map(|shard| {
                let range = shard.range;
                self.build_shard(shard.rank, &items[range.clone()], &pixels[range])
            })
            .collect();

        ShardedBatch { shards, size }
    }
}
