// ============================================================
// Layer 3 — LabeledImage Domain Type
// ============================================================
// One decoded image plus its class index.
//
// Pixels are stored channel-first (CHW) as raw u8 values, the
// same layout the CIFAR-10 binary files use:
//   [R plane (h*w bytes)] [G plane] [B plane]
//
// Transforms (Layer 4) turn this into normalised f32 tensors.

use serde::{Deserialize, Serialize};

/// A labelled RGB image with u8 pixels in CHW order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledImage {
    /// Pixel values, length = 3 * height * width
    pub pixels: Vec<u8>,
    pub height: u32,
    pub width:  u32,
    /// Class index into the dataset's class list
    pub label:  usize,
}

impl LabeledImage {
    /// Number of colour channels; CIFAR-10 and ImageNet are both RGB
    pub const CHANNELS: usize = 3;

    pub fn new(pixels: Vec<u8>, height: u32, width: u32, label: usize) -> Self {
        debug_assert_eq!(pixels.len(), Self::CHANNELS * (height * width) as usize);
        Self { pixels, height, width, label }
    }

    /// Read one pixel as [r, g, b]
    pub fn rgb_at(&self, y: u32, x: u32) -> [u8; 3] {
        let plane = (self.height * self.width) as usize;
        let idx   = (y * self.width + x) as usize;
        [
            self.pixels[idx],
            self.pixels[plane + idx],
            self.pixels[2 * plane + idx],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_at_reads_planes() {
        // 1x2 image: pixel (0,0) = (1,3,5), pixel (0,1) = (2,4,6)
        let img = LabeledImage::new(vec![1, 2, 3, 4, 5, 6], 1, 2, 7);
        assert_eq!(img.rgb_at(0, 0), [1, 3, 5]);
        assert_eq!(img.rgb_at(0, 1), [2, 4, 6]);
        assert_eq!(img.label, 7);
    }
}
