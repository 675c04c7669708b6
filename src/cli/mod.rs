// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// `clap`, delegates the work to Layer 2 and prints the results.
//
//   1. `train` — full data-parallel run, then the curves plot
//   2. `fetch` — download dataset and weights only
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, FetchArgs, TrainArgs};

use crate::application::train_use_case::TrainConfig;

#[derive(Parser, Debug)]
#[command(
    name = "cifar-ddp",
    version = "0.1.0",
    about = "Data-parallel fine-tuning of ResNet-50 on CIFAR-10."
)]
pub struct Cli {
    /// The subcommand to run (train or fetch)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => Self::run_train(args),
            Commands::Fetch(args) => Self::run_fetch(args),
        }
    }

    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Loading run configuration from '{}'", args.cfg);
        let cfg = args.into_config()?;
        let plot_path = cfg.plot_path();

        let summary = TrainUseCase::new(cfg).execute()?;

        println!("{}", crate::infra::plot::run_title(&summary));
        if let Some(best) = summary.history.best_val_acc() {
            println!("best val acc: {:.4}", best);
        }
        println!("Training curves saved to {}", plot_path.display());
        Ok(())
    }

    fn run_fetch(args: FetchArgs) -> Result<()> {
        use crate::application::fetch_use_case::FetchUseCase;

        let cfg = TrainConfig::from_yaml(&args.cfg)?;
        let report = FetchUseCase::new(cfg).execute()?;

        println!("Classes: {}", report.classes.join(", "));
        if let Some(path) = report.weights {
            println!("Weights: {}", path.display());
        }
        Ok(())
    }
}
