// ============================================================
// cifar-ddp — Data-parallel image classifier training
// ============================================================
// Layers (each in its own module):
//
//   L1 cli          argument parsing, printing
//   L2 application  use cases: train, fetch
//   L3 domain       plain data types and traits
//   L4 data         CIFAR-10 loading, transforms, sharded batching
//   L5 ml           ResNet-50, pretrained weights, LR schedule,
//                   multi-device steps, training loop
//   L6 infra        config, downloads, memory, plotting
//
// Logging: RUST_LOG is honoured, this crate logs at info by default.

mod application;
mod cli;
mod data;
mod domain;
mod infra;
mod ml;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cifar_ddp=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
