use burn::data::dataset::Dataset;

use crate::domain::image::LabeledImage;

/// An in-memory labelled image split.
/// Implements Burn's Dataset trait so the DataLoader can index into it.
pub struct ImageDataset {
    images: Vec<LabeledImage>,
}

impl ImageDataset {
    pub fn new(images: Vec<LabeledImage>) -> Self { Self { images } }

    pub fn sample_count(&self) -> usize { self.images.len() }

    /// Number of full batches of `batch_size` (a trailing partial batch is not counted)
    pub fn full_batches(&self, batch_size: usize) -> usize {
        if batch_size == 0 { 0 } else { self.images.len() / batch_size }
    }

    /// Input (width, height); every image of a split shares one size
    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.images.first().map(|i| (i.width, i.height))
    }
}

impl Dataset<LabeledImage> for ImageDataset {
    fn get(&self, index: usize) -> Option<LabeledImage> {
        self.images.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny(n: usize) -> ImageDataset {
        ImageDataset::new(
            (0..n).map(|i| LabeledImage::new(vec![0; 12], 2, 2, i % 10)).collect(),
        )
    }

    #[test]
    fn test_full_batches_drop_remainder() {
        let ds = tiny(10);
        assert_eq!(ds.full_batches(4), 2);
        assert_eq!(ds.full_batches(10), 1);
        assert_eq!(ds.full_batches(11), 0);
        assert_eq!(ds.full_batches(0), 0);
    }

    #[test]
    fn test_get_and_len() {
        let ds = tiny(3);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.get(2).map(|i| i.label), Some(2));
        assert!(ds.get(3).is_none());
        assert_eq!(ds.image_size(), Some((2, 2)));
    }
}
