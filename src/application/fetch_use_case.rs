// ============================================================
// Layer 2 — FetchUseCase
// ============================================================
// Downloads everything a run needs ahead of time:
//
//   - the CIFAR-10 binary archive, unpacked into data_dir
//   - the ResNet-50 ImageNet weights, cached in pretrained_dir
//
// Both steps are no-ops when the files are already present, so
// `train` after `fetch` never touches the network.

use anyhow::Result;
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::data::loader::Cifar10Source;
use crate::domain::traits::ImageSource;
use crate::ml::pretrained::PretrainedStore;

/// What ended up on disk
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub classes: Vec<String>,
    pub weights: Option<PathBuf>,
}

pub struct FetchUseCase {
    config: TrainConfig,
}

impl FetchUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<FetchReport> {
        let cfg = &self.config;

        let source = Cifar10Source::new(&cfg.data_dir);
        source.prepare()?;
        let classes = source.classes()?;
        tracing::info!("CIFAR-10 ready in '{}' ({} classes)", cfg.data_dir, classes.len());

        let weights = if cfg.pretrained {
            Some(PretrainedStore::new(&cfg.pretrained_dir).ensure_resnet50()?)
        } else {
            tracing::info!("pretrained = false, skipping weights");
            None
        };

        Ok(FetchReport { classes, weights })
    }
}
