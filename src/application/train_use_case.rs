// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training run in order:
//
//   Step 1: Download / locate CIFAR-10       (Layer 4 - data)
//   Step 2: Parse the train and test splits  (Layer 4 - data)
//   Step 3: Build Burn datasets              (Layer 4 - data)
//   Step 4: Fetch pretrained weights         (Layer 5 - ml)
//   Step 5: Run the data-parallel loop       (Layer 5 - ml)
//   Step 6: Plot curves, memory and duration (Layer 6 - infra)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::data::{dataset::ImageDataset, loader::Cifar10Source};
use crate::domain::{history::RunSummary, traits::ImageSource};
use crate::infra::{config, plot};
use crate::ml::{pretrained::PretrainedStore, trainer::run_training};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a run. Keys missing from the YAML file take the
// defaults below; `epoch` is the key name used in config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Accelerator indices; empty means the default device only
    #[serde(deserialize_with = "config::deserialize_devices")]
    pub device:         Vec<usize>,
    /// GLOBAL batch size, split evenly across devices
    pub batch_size:     usize,
    pub num_workers:    usize,
    #[serde(alias = "epoch")]
    pub epochs:         usize,
    /// Peak learning rate, reached at the end of warmup
    pub lr:             f64,
    pub weight_decay:   f64,
    pub save_dir:       String,
    pub data_dir:       String,
    pub pretrained_dir: String,
    /// Start from the ImageNet weights
    pub pretrained:     bool,
    pub num_classes:    usize,
    pub warmup_steps:   usize,
    /// None → plain SGD
    pub momentum:       Option<f64>,
    pub seed:           u64,
    pub log_interval:   usize,
    pub train_resize:   u32,
    pub crop_size:      u32,
    pub eval_resize:    u32,
    /// Stem of the output image
    pub run_name:       String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            device:         Vec::new(),
            batch_size:     128,
            num_workers:    4,
            epochs:         5,
            lr:             0.01,
            weight_decay:   1e-4,
            save_dir:       "./result".to_string(),
            data_dir:       "./data".to_string(),
            pretrained_dir: "./pretrained_models".to_string(),
            pretrained:     true,
            num_classes:    1000,
            warmup_steps:   10,
            momentum:       None,
            seed:           42,
            log_interval:   20,
            train_resize:   256,
            crop_size:      224,
            eval_resize:    224,
            run_name:       "classifier_ddp".to_string(),
        }
    }
}

impl TrainConfig {
    /// Load and validate a YAML config file
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let cfg: TrainConfig = config::load_yaml(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if self.epochs == 0 {
            bail!("epoch must be positive");
        }
        if self.lr.is_nan() || self.lr <= 0.0 {
            bail!("lr must be positive, got {}", self.lr);
        }
        if self.weight_decay.is_nan() || self.weight_decay < 0.0 {
            bail!("weight_decay must be non-negative, got {}", self.weight_decay);
        }
        if let Some(m) = self.momentum {
            if !(0.0..1.0).contains(&m) {
                bail!("momentum must be in [0, 1), got {}", m);
            }
        }
        if self.num_classes == 0 {
            bail!("num_classes must be positive");
        }
        if self.crop_size == 0 || self.eval_resize == 0 {
            bail!("image sizes must be positive");
        }
        if self.crop_size > self.train_resize {
            bail!("crop_size {} exceeds train_resize {}", self.crop_size, self.train_resize);
        }

        let unique: HashSet<_> = self.device.iter().collect();
        if unique.len() != self.device.len() {
            bail!("device list {:?} repeats an index", self.device);
        }

        let world_size = self.world_size();
        if self.batch_size % world_size != 0 {
            bail!(
                "batch_size {} must be divisible by the number of devices ({})",
                self.batch_size, world_size
            );
        }
        Ok(())
    }

    /// Number of devices the run spreads over
    pub fn world_size(&self) -> usize {
        self.device.len().max(1)
    }

    /// Where the training curves end up
    pub fn plot_path(&self) -> PathBuf {
        Path::new(&self.save_dir).join(format!("{}.jpg", self.run_name))
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<RunSummary> {
        let cfg = &self.config;
        cfg.validate()?;
        tracing::info!("Config: {:?}", cfg);

        // ── Step 1: Make sure the dataset is on disk ──────────────────────────
        let source = Cifar10Source::new(&cfg.data_dir);
        source.prepare()?;

        // ── Step 2: Parse both splits ─────────────────────────────────────────
        let classes = source.classes()?;
        let train   = source.train_split()?;
        let test    = source.test_split()?;
        tracing::info!(
            "train: {}, test: {}, classes: {} ({})",
            train.len(), test.len(), classes.len(), classes.join(", ")
        );

        if cfg.num_classes < classes.len() {
            bail!(
                "num_classes {} cannot hold the {} dataset labels",
                cfg.num_classes, classes.len()
            );
        }

        // ── Step 3: Build Burn datasets ───────────────────────────────────────
        let train_dataset = ImageDataset::new(train);
        let val_dataset   = ImageDataset::new(test);

        // ── Step 4: Pretrained weights ────────────────────────────────────────
        let weights = if cfg.pretrained {
            Some(PretrainedStore::new(&cfg.pretrained_dir).ensure_resnet50()?)
        } else {
            None
        };

        // ── Step 5: Run the training loop (Layer 5) ───────────────────────────
        let summary = run_training(cfg, train_dataset, val_dataset, weights.as_deref())?;

        // ── Step 6: Plot ──────────────────────────────────────────────────────
        plot::save_report(&summary, &cfg.plot_path())?;

        Ok(summary)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> TrainConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_standard_keys_are_accepted() {
        let cfg = parse(
            "device: \"0,1\"\n\
             batch_size: 64\n\
             num_workers: 2\n\
             epoch: 3\n\
             lr: 0.05\n\
             weight_decay: 0.0005\n\
             save_dir: ./out\n",
        );
        assert_eq!(cfg.device, vec![0, 1]);
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.num_workers, 2);
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.lr, 0.05);
        assert_eq!(cfg.weight_decay, 0.0005);
        assert_eq!(cfg.save_dir, "./out");
        // untouched keys keep their defaults
        assert_eq!(cfg.warmup_steps, 10);
        assert_eq!(cfg.crop_size, 224);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_the_default() {
        assert_eq!(parse("{}"), TrainConfig::default());
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            TrainConfig { batch_size: 0, ..Default::default() },
            TrainConfig { epochs: 0, ..Default::default() },
            TrainConfig { lr: 0.0, ..Default::default() },
            TrainConfig { lr: f64::NAN, ..Default::default() },
            TrainConfig { weight_decay: -1.0, ..Default::default() },
            TrainConfig { momentum: Some(1.5), ..Default::default() },
            TrainConfig { crop_size: 300, ..Default::default() },
            TrainConfig { device: vec![0, 0], ..Default::default() },
            TrainConfig { device: vec![0, 1, 2], batch_size: 128, ..Default::default() },
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "{:?} should be rejected", cfg);
        }
    }

    #[test]
    fn test_world_size_and_plot_path() {
        let cfg = TrainConfig { device: vec![2, 3], save_dir: "out".into(), ..Default::default() };
        assert_eq!(cfg.world_size(), 2);
        assert_eq!(TrainConfig::default().world_size(), 1);
        assert_eq!(cfg.plot_path(), Path::new("out").join("classifier_ddp.jpg"));
    }

    #[test]
    fn test_from_yaml_validates() {
        let path = std::env::temp_dir().join(format!("cifar_ddp_train_{}.yaml", std::process::id()));
        std::fs::write(&path, "batch_size: 0\n").unwrap();
        assert!(TrainConfig::from_yaml(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
