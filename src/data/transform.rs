// ============================================================
// Layer 4 — Image Transforms
// ============================================================
// Turns a LabeledImage (u8, CHW, 32x32) into the normalised f32
// tensor data the network expects.
//
// Training pipeline:
//   decode → resize 256x256 → random crop 224x224 → /255 → normalize
//
// Evaluation pipeline:
//   decode → resize 224x224 → /255 → normalize
//
// Geometric steps run on an `image::RgbImage`; the final step
// always scales to [0, 1] and normalises per channel with the
// ImageNet statistics the pretrained weights were trained with.
//
// Reference: image crate (imageops::resize, imageops::crop_imm)

use image::{imageops, imageops::FilterType, RgbImage};
use rand::Rng;

use crate::domain::image::LabeledImage;

/// ImageNet channel means (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations (RGB)
pub const IMAGENET_STD:  [f32; 3] = [0.229, 0.224, 0.225];

/// One geometric step of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Bilinear resize to exactly width x height
    Resize { width: u32, height: u32 },
    /// Crop a window at a uniformly random offset
    RandomCrop { width: u32, height: u32 },
}

impl Transform {
    fn apply<R: Rng + ?Sized>(&self, img: RgbImage, rng: &mut R) -> RgbImage {
        match *self {
            Transform::Resize { width, height } => {
                if img.dimensions() == (width, height) {
                    img
                } else {
                    imageops::resize(&img, width, height, FilterType::Triangle)
                }
            }
            Transform::RandomCrop { width, height } => {
                let (w, h) = img.dimensions();
                let x = rng.gen_range(0..=w.saturating_sub(width));
                let y = rng.gen_range(0..=h.saturating_sub(height));
                imageops::crop_imm(&img, x, y, width.min(w), height.min(h)).to_image()
            }
        }
    }

    /// Output size given an input size
    fn output_size(&self, (w, h): (u32, u32)) -> (u32, u32) {
        match *self {
            Transform::Resize { width, height } => (width, height),
            Transform::RandomCrop { width, height } => (width.min(w), height.min(h)),
        }
    }
}

/// Per-channel `(x - mean) / std` applied after scaling to [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    pub mean: [f32; 3],
    pub std:  [f32; 3],
}

impl Normalize {
    pub fn imagenet() -> Self {
        Self { mean: IMAGENET_MEAN, std: IMAGENET_STD }
    }
}

/// An ordered list of geometric steps followed by normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    steps:     Vec<Transform>,
    normalize: Normalize,
}

impl Pipeline {
    pub fn new(steps: Vec<Transform>, normalize: Normalize) -> Self {
        Self { steps, normalize }
    }

    /// Resize to `resize`, random crop to `crop`, normalise
    pub fn train(resize: u32, crop: u32) -> Self {
        Self::new(
            vec![
                Transform::Resize { width: resize, height: resize },
                Transform::RandomCrop { width: crop, height: crop },
            ],
            Normalize::imagenet(),
        )
    }

    /// Resize to `size`, normalise
    pub fn eval(size: u32) -> Self {
        Self::new(
            vec![Transform::Resize { width: size, height: size }],
            Normalize::imagenet(),
        )
    }

    /// (width, height) produced for an input of the given size
    pub fn output_size(&self, input: (u32, u32)) -> (u32, u32) {
        self.steps.iter().fold(input, |size, t| t.output_size(size))
    }

    /// Run the pipeline and return normalised CHW f32 values.
    pub fn apply<R: Rng + ?Sized>(&self, image: &LabeledImage, rng: &mut R) -> Vec<f32> {
        let img = self
            .steps
            .iter()
            .fold(decode(image), |img, t| t.apply(img, rng));
        to_chw_normalized(&img, &self.normalize)
    }
}

/// CHW u8 → interleaved RgbImage
fn decode(src: &LabeledImage) -> RgbImage {
    RgbImage::from_fn(src.width, src.height, |x, y| image::Rgb(src.rgb_at(y, x)))
}

fn to_chw_normalized(img: &RgbImage, norm: &Normalize) -> Vec<f32> {
    let (w, h) = img.dimensions();
    let plane  = (w * h) as usize;
    let mut out = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in img.enumerate_pixels() {
        let idx = (y * w + x) as usize;
        for c in 0..3 {
            let v = pixel.0[c] as f32 / 255.0;
            out[c * plane + idx] = (v - norm.mean[c]) / norm.std[c];
        }
    }
    out
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn solid(side: u32, rgb: [u8; 3]) -> LabeledImage {
        let plane = (side * side) as usize;
        let mut pixels = Vec::with_capacity(3 * plane);
        for c in rgb {
            pixels.extend(std::iter::repeat(c).take(plane));
        }
        LabeledImage::new(pixels, side, side, 0)
    }

    #[test]
    fn test_train_pipeline_output_size() {
        let p = Pipeline::train(256, 224);
        assert_eq!(p.output_size((32, 32)), (224, 224));

        let mut rng = StdRng::seed_from_u64(0);
        let out = p.apply(&solid(32, [0, 0, 0]), &mut rng);
        assert_eq!(out.len(), 3 * 224 * 224);
    }

    #[test]
    fn test_eval_pipeline_output_size() {
        let p = Pipeline::eval(224);
        assert_eq!(p.output_size((32, 32)), (224, 224));
    }

    #[test]
    fn test_normalization_values() {
        // Every value of a white image is (1 - mean) / std for its channel
        let p   = Pipeline::eval(4);
        let mut rng = StdRng::seed_from_u64(0);
        let out = p.apply(&solid(4, [255, 255, 255]), &mut rng);
        let plane = 16;
        for c in 0..3 {
            let expected = (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            assert!((out[c * plane] - expected).abs() < 1e-5);
            assert!((out[c * plane + plane - 1] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_channels_stay_separate() {
        let p = Pipeline::new(vec![], Normalize { mean: [0.0; 3], std: [1.0; 3] });
        let mut rng = StdRng::seed_from_u64(0);
        let out = p.apply(&solid(2, [255, 0, 51]), &mut rng);
        assert_eq!(&out[0..4],  &[1.0; 4]);
        assert_eq!(&out[4..8],  &[0.0; 4]);
        assert!((out[8] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_random_crop_stays_inside_image() {
        let mut rng = StdRng::seed_from_u64(7);
        let crop = Transform::RandomCrop { width: 3, height: 3 };
        for _ in 0..20 {
            let img = crop.apply(RgbImage::new(5, 5), &mut rng);
            assert_eq!(img.dimensions(), (3, 3));
        }
    }
}
