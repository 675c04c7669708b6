// ============================================================
// Layer 5 — Pretrained Weights
// ============================================================
// Fetches the torchvision ResNet-50 ImageNet weights and loads
// them into the Burn model with burn-import's PyTorch recorder.
//
// torchvision key             → our module path
//   layer1.0.conv1.weight     → layer1.blocks.0.conv1.weight
//   layer2.0.downsample.0.*   → layer2.blocks.0.downsample.conv.*
//   layer2.0.downsample.1.*   → layer2.blocks.0.downsample.bn.*
// BatchNorm weight/bias → gamma/beta is handled by the recorder.
//
// The .pth file is cached in `pretrained_dir` and only downloaded
// when missing. torch.save writes a zip archive, so anything that
// does not start with the zip local-header magic (an HTML error
// page, a truncated body) is refused before it reaches the cache.

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use crate::infra::download::download_bytes;
use crate::ml::model::{ResNet, ResNetConfig, IMAGENET_CLASSES};

/// torchvision ResNet50_Weights.IMAGENET1K_V1
const RESNET50_URL:  &str = "https://download.pytorch.org/models/resnet50-0676ba61.pth";
const RESNET50_FILE: &str = "resnet50-0676ba61.pth";

/// Zip local file header
const CHECKPOINT_MAGIC: &[u8] = b"PK\x03\x04";

/// Local cache of pretrained checkpoints
pub struct PretrainedStore {
    dir: PathBuf,
}

impl PretrainedStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn resnet50_path(&self) -> PathBuf {
        self.dir.join(RESNET50_FILE)
    }

    /// Download the ResNet-50 weights unless already cached
    pub fn ensure_resnet50(&self) -> Result<PathBuf> {
        let path = self.resnet50_path();
        if path.is_file() {
            if is_checkpoint_file(&path) {
                tracing::info!("Using cached weights '{}'", path.display());
                return Ok(path);
            }
            tracing::warn!("Cached '{}' is not a torch checkpoint, downloading again", path.display());
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        tracing::info!("Downloading ResNet-50 ImageNet weights");
        let bytes = download_bytes(RESNET50_URL, RESNET50_FILE)?;
        check_checkpoint(&bytes)?;

        // Write to a temp name first so an interrupted download is never mistaken for a cache hit
        let partial = path.with_extension("pth.partial");
        fs::write(&partial, &bytes)
            .with_context(|| format!("Cannot write '{}'", partial.display()))?;
        fs::rename(&partial, &path)
            .with_context(|| format!("Cannot move weights to '{}'", path.display()))?;

        Ok(path)
    }
}

fn check_checkpoint(bytes: &[u8]) -> Result<()> {
    if !bytes.starts_with(CHECKPOINT_MAGIC) {
        bail!(
            "Downloaded {} bytes from '{}' are not a torch checkpoint (no zip header)",
            bytes.len(), RESNET50_URL
        );
    }
    Ok(())
}

fn is_checkpoint_file(path: &Path) -> bool {
    let mut head = [0u8; 4];
    fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut head))
        .is_ok()
        && head[..] == *CHECKPOINT_MAGIC
}

/// Build ResNet-50, optionally initialised from ImageNet weights.
///
/// With weights and `num_classes != 1000`, the backbone is loaded and
/// the head re-initialised for the requested class count.
pub fn resnet50<B: Backend>(
    num_classes: usize,
    weights:     Option<&Path>,
    device:      &B::Device,
) -> Result<ResNet<B>> {
    let Some(path) = weights else {
        tracing::info!("Initialising ResNet-50 from scratch ({} classes)", num_classes);
        return Ok(ResNetConfig::resnet50(num_classes).init(device));
    };

    let model: ResNet<B> = ResNetConfig::resnet50(IMAGENET_CLASSES).init(device);
    let model = load_torchvision_weights(model, path, device)?;
    tracing::info!("Loaded ImageNet weights from '{}'", path.display());

    if num_classes == IMAGENET_CLASSES {
        Ok(model)
    } else {
        tracing::info!("Replacing {}-way head with a {}-way head", IMAGENET_CLASSES, num_classes);
        Ok(model.with_head(num_classes, device))
    }
}

fn load_torchvision_weights<B: Backend>(
    model:  ResNet<B>,
    path:   &Path,
    device: &B::Device,
) -> Result<ResNet<B>> {
    let args = LoadArgs::new(path.to_path_buf())
        .with_key_remap("(.+)\\.downsample\\.0\\.(.+)", "$1.downsample.conv.$2")
        .with_key_remap("(.+)\\.downsample\\.1\\.(.+)", "$1.downsample.bn.$2")
        .with_key_remap("(layer[1-4])\\.([0-9]+)\\.(.+)", "$1.blocks.$2.$3");

    let record = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(args, device)
        .map_err(|e| anyhow::anyhow!("Cannot load weights '{}': {e:?}", path.display()))?;

    Ok(model.load_record(record))
}
