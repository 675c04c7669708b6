use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Bottleneck blocks widen their output by this factor
pub const EXPANSION: usize = 4;

/// Stage layout of ResNet-50
pub const RESNET50_BLOCKS: [usize; 4] = [3, 4, 6, 3];

/// Classes of the ImageNet head the pretrained weights ship with
pub const IMAGENET_CLASSES: usize = 1000;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Bottleneck blocks per stage
    pub blocks:      [usize; 4],
    pub num_classes: usize,
}

impl ResNetConfig {
    pub fn resnet50(num_classes: usize) -> Self {
        Self::new(RESNET50_BLOCKS, num_classes)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        let conv1 = conv(3, 64, 7, 2, 3, device);
        let bn1   = BatchNormConfig::new(64).init(device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        // Stage widths 64/128/256/512, outputs are EXPANSION times wider.
        // Stages 2-4 halve the spatial size in their first block.
        let layer1 = LayerBlock::new(self.blocks[0], 64,   64,  1, device);
        let layer2 = LayerBlock::new(self.blocks[1], 256,  128, 2, device);
        let layer3 = LayerBlock::new(self.blocks[2], 512,  256, 2, device);
        let layer4 = LayerBlock::new(self.blocks[3], 1024, 512, 2, device);

        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc      = LinearConfig::new(512 * EXPANSION, self.num_classes).init(device);

        ResNet {
            conv1, bn1, relu: Relu::new(), maxpool,
            layer1, layer2, layer3, layer4,
            avgpool, fc,
        }
    }
}

fn conv<B: Backend>(
    in_ch:   usize,
    out_ch:  usize,
    kernel:  usize,
    stride:  usize,
    padding: usize,
    device:  &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_ch, out_ch], [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(false)
        .init(device)
}

/// 1x1 projection on the skip path when shape changes
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn:   BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// 1x1 reduce → 3x3 (strided) → 1x1 expand, plus the skip connection
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    pub conv1:      Conv2d<B>,
    pub bn1:        BatchNorm<B, 2>,
    pub conv2:      Conv2d<B>,
    pub bn2:        BatchNorm<B, 2>,
    pub conv3:      Conv2d<B>,
    pub bn3:        BatchNorm<B, 2>,
    pub relu:       Relu,
    pub downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
    fn new(in_ch: usize, width: usize, stride: usize, device: &B::Device) -> Self {
        let out_ch = width * EXPANSION;
        let downsample = (stride != 1 || in_ch != out_ch).then(|| Downsample {
            conv: conv(in_ch, out_ch, 1, stride, 0, device),
            bn:   BatchNormConfig::new(out_ch).init(device),
        });

        Self {
            conv1: conv(in_ch, width, 1, 1, 0, device),
            bn1:   BatchNormConfig::new(width).init(device),
            conv2: conv(width, width, 3, stride, 1, device),
            bn2:   BatchNormConfig::new(width).init(device),
            conv3: conv(width, out_ch, 1, 1, 0, device),
            bn3:   BatchNormConfig::new(out_ch).init(device),
            relu:  Relu::new(),
            downsample,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(ds) => ds.forward(x.clone()),
            None => x.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let out = self.relu.forward(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));

        self.relu.forward(out + identity)
    }
}

/// One stage: a sequence of bottlenecks, only the first one strided
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    pub blocks: Vec<Bottleneck<B>>,
}

impl<B: Backend> LayerBlock<B> {
    fn new(num_blocks: usize, in_ch: usize, width: usize, stride: usize, device: &B::Device) -> Self {
        let out_ch = width * EXPANSION;
        let blocks = (0..num_blocks)
            .map(|i| {
                if i == 0 {
                    Bottleneck::new(in_ch, width, stride, device)
                } else {
                    Bottleneck::new(out_ch, width, 1, device)
                }
            })
            .collect();
        Self { blocks }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

/// ResNet with bottleneck blocks. Field names follow the torchvision
/// layout so pretrained weights map onto it with a few key remaps.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    pub conv1:   Conv2d<B>,
    pub bn1:     BatchNorm<B, 2>,
    pub relu:    Relu,
    pub maxpool: MaxPool2d,
    pub layer1:  LayerBlock<B>,
    pub layer2:  LayerBlock<B>,
    pub layer3:  LayerBlock<B>,
    pub layer4:  LayerBlock<B>,
    pub avgpool: AdaptiveAvgPool2d,
    pub fc:      Linear<B>,
}

impl<B: Backend> ResNet<B> {
    /// images: [batch, 3, H, W] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.bn1.forward(self.conv1.forward(images)));
        let x = self.maxpool.forward(x);

        let x = self.layer1.forward(x);
        let x = self.layer2.forward(x);
        let x = self.layer3.forward(x);
        let x = self.layer4.forward(x);

        let x = self.avgpool.forward(x); // [batch, 2048, 1, 1]
        let x = x.flatten::<2>(1, 3);
        self.fc.forward(x)
    }

    /// Mean cross-entropy of the logits against class indices
    pub fn forward_loss(
        &self,
        images:  Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets);
        (loss, logits)
    }

    /// Replace the classification head with a freshly initialised one
    pub fn with_head(mut self, num_classes: usize, device: &B::Device) -> Self {
        let [d_in, _] = self.fc.weight.dims();
        self.fc = LinearConfig::new(d_in, num_classes).init(device);
        self
    }

    pub fn num_classes(&self) -> usize {
        self.fc.weight.dims()[1]
    }
}

/// Number of predictions whose argmax equals the target
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    // argmax(1) returns shape [batch, 1], flatten to [batch]
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    let correct: i64 = predicted
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();
    correct as usize
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_resnet50_stage_layout() {
        let device = NdArrayDevice::Cpu;
        let model: ResNet<TestBackend> = ResNetConfig::resnet50(10).init(&device);

        assert_eq!(model.layer1.blocks.len(), 3);
        assert_eq!(model.layer2.blocks.len(), 4);
        assert_eq!(model.layer3.blocks.len(), 6);
        assert_eq!(model.layer4.blocks.len(), 3);
        // Only the first block of each stage projects the skip path
        assert!(model.layer1.blocks[0].downsample.is_some());
        assert!(model.layer3.blocks[1].downsample.is_none());
        assert_eq!(model.num_classes(), 10);
    }

    #[test]
    fn test_forward_shape_on_small_input() {
        let device = NdArrayDevice::Cpu;
        let model: ResNet<TestBackend> = ResNetConfig::new([1, 1, 1, 1], 10).init(&device);

        // 32x32 shrinks to 1x1 before the adaptive pool
        let images = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        assert_eq!(model.forward(images).dims(), [2, 10]);
    }

    #[test]
    fn test_with_head_replaces_classifier() {
        let device = NdArrayDevice::Cpu;
        let model: ResNet<TestBackend> = ResNetConfig::new([1, 1, 1, 1], IMAGENET_CLASSES).init(&device);
        let model = model.with_head(10, &device);
        assert_eq!(model.fc.weight.dims(), [2048, 10]);
    }

    #[test]
    fn test_loss_is_finite_and_backward_runs() {
        type Ad = Autodiff<TestBackend>;
        let device = NdArrayDevice::Cpu;
        let model: ResNet<Ad> = ResNetConfig::new([1, 1, 1, 1], 10).init(&device);

        let images  = Tensor::<Ad, 4>::random([2, 3, 32, 32], burn::tensor::Distribution::Default, &device);
        let targets = Tensor::<Ad, 1, Int>::from_ints([1, 7], &device);
        let (loss, logits) = model.forward_loss(images, targets);

        assert_eq!(logits.dims(), [2, 10]);
        let value: f64 = loss.clone().into_scalar().elem::<f64>();
        assert!(value.is_finite());
        let _grads = loss.backward();
    }

    #[test]
    fn test_count_correct() {
        let device = NdArrayDevice::Cpu;
        let logits = Tensor::<TestBackend, 2>::from_floats(
            [[0.1, 0.9, 0.0], [0.8, 0.1, 0.1], [0.0, 0.2, 0.7]],
            &device,
        );
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 2], &device);
        assert_eq!(count_correct(logits, targets), 2);
    }
}
