// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `fetch`.
//
// Both read the run's YAML config; `train` additionally accepts
// a few overrides so quick experiments don't need a new file.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::infra::config::parse_device_list;

pub const DEFAULT_CONFIG: &str = "./config/classifier_cifar10.yaml";

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune ResNet-50 on CIFAR-10 across the configured devices
    Train(TrainArgs),

    /// Download CIFAR-10 and the pretrained weights, then exit
    Fetch(FetchArgs),
}

/// All arguments for the `train` command.
/// Flags left out fall back to the YAML file.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Path to the YAML run configuration
    #[arg(long, default_value = DEFAULT_CONFIG)]
    pub cfg: String,

    /// Number of full passes through the training split
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Global batch size, split evenly across devices
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Peak learning rate after warmup
    #[arg(long)]
    pub lr: Option<f64>,

    /// Directory for the training curves image
    #[arg(long)]
    pub save_dir: Option<String>,

    /// Comma separated device indices, e.g. "0,1"
    #[arg(long)]
    pub devices: Option<String>,
}

impl TrainArgs {
    /// Load the YAML file, apply the flags on top and validate.
    /// This is the boundary between Layer 1 and Layer 2:
    /// the application layer never sees clap types.
    pub fn into_config(self) -> Result<TrainConfig> {
        let mut cfg = crate::infra::config::load_yaml::<TrainConfig>(&self.cfg)?;

        if let Some(epochs) = self.epochs {
            cfg.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            cfg.batch_size = batch_size;
        }
        if let Some(lr) = self.lr {
            cfg.lr = lr;
        }
        if let Some(save_dir) = self.save_dir {
            cfg.save_dir = save_dir;
        }
        if let Some(devices) = self.devices {
            cfg.device = parse_device_list(&devices)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

/// All arguments for the `fetch` command
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Path to the YAML run configuration (data_dir, pretrained_dir)
    #[arg(long, default_value = DEFAULT_CONFIG)]
    pub cfg: String,
}
