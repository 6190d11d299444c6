use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbImage};
use rand::Rng;

/// Per-channel statistics of the training images.
pub const MEAN: [f32; 3] = [0.785_477_09, 0.698_607_65, 0.734_174_01];
pub const STD: [f32; 3] = [0.110_431_56, 0.169_354_08, 0.125_082_91];

/// Images are resized so their shorter side is this much larger than the
/// crop taken from them.
const RESIZE_RATIO: f64 = 1.243;

const CONTRAST_JITTER: f32 = 0.3;
const SHARPNESS_FACTOR: f32 = 1.0;
const FLIP_PROBABILITY: f64 = 0.5;
const SHARPNESS_PROBABILITY: f64 = 0.5;

// Smoothing kernel used as the "blurred" end of the sharpness blend
const SMOOTH_KERNEL: [f32; 9] = [
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    5.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
];

/// Turns a decoded image into a normalised CHW float buffer.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    img_size: u32,
    resize_to: u32,
    augment: bool,
}

impl Transform {
    /// Random crop, contrast jitter, horizontal flip and sharpness.
    pub fn train(img_size: usize) -> Self {
        Self::new(img_size, true)
    }

    /// Deterministic center crop.
    pub fn val(img_size: usize) -> Self {
        Self::new(img_size, false)
    }

    fn new(img_size: usize, augment: bool) -> Self {
        Self {
            img_size: img_size as u32,
            resize_to: (img_size as f64 * RESIZE_RATIO) as u32,
            augment,
        }
    }

    pub fn img_size(&self) -> usize {
        self.img_size as usize
    }

    /// Number of floats [`Transform::apply`] produces per image.
    pub fn output_len(&self) -> usize {
        3 * self.img_size() * self.img_size()
    }

    pub fn apply<R: Rng>(&self, img: &DynamicImage, rng: &mut R) -> Vec<f32> {
        let img = resize_shorter_side(img, self.resize_to);

        if !self.augment {
            return to_normalized_chw(&center_crop(&img, self.img_size));
        }

        let img = random_crop(&img, self.img_size, rng);
        let factor = rng.gen_range(1.0 - CONTRAST_JITTER..=1.0 + CONTRAST_JITTER);
        let mut img = adjust_contrast(&img, factor);

        if rng.gen_bool(FLIP_PROBABILITY) {
            img = imageops::flip_horizontal(&img);
        }
        if rng.gen_bool(SHARPNESS_PROBABILITY) {
            img = adjust_sharpness(&img, SHARPNESS_FACTOR);
        }

        to_normalized_chw(&img)
    }
}

pub fn resize_shorter_side(img: &DynamicImage, size: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (new_width, new_height) = if width <= height {
        (size, (size as u64 * height as u64 / width as u64) as u32)
    } else {
        ((size as u64 * width as u64 / height as u64) as u32, size)
    };

    if (new_width, new_height) == (width, height) {
        return img.clone();
    }
    img.resize_exact(new_width, new_height, FilterType::Triangle)
}

pub fn center_crop(img: &DynamicImage, size: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    let x = ((width.saturating_sub(size)) as f64 / 2.0).round() as u32;
    let y = ((height.saturating_sub(size)) as f64 / 2.0).round() as u32;
    img.crop_imm(x, y, size, size).to_rgb8()
}

pub fn random_crop<R: Rng>(img: &DynamicImage, size: u32, rng: &mut R) -> RgbImage {
    let (width, height) = img.dimensions();
    let x = rng.gen_range(0..=width.saturating_sub(size));
    let y = rng.gen_range(0..=height.saturating_sub(size));
    img.crop_imm(x, y, size, size).to_rgb8()
}

/// Blends every pixel with the mean grey level of the image.
/// `factor` 1 is the identity, 0 a flat grey image.
pub fn adjust_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let pixels = (img.width() * img.height()).max(1) as f32;
    let mean = img
        .pixels()
        .map(|p| 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32)
        .sum::<f32>()
        / pixels;

    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = blend(*channel as f32, mean, factor);
        }
    }
    out
}

/// Blends the image with a smoothed copy of itself. Border pixels are left
/// untouched. `factor` 1 is the identity, 0 the smoothed image, above 1 sharpens.
pub fn adjust_sharpness(img: &RgbImage, factor: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        return img.clone();
    }

    let smoothed: RgbImage = imageops::filter3x3(img, &SMOOTH_KERNEL);

    let mut out = img.clone();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let original = img.get_pixel(x, y);
            let degenerate = smoothed.get_pixel(x, y);
            let pixel = out.get_pixel_mut(x, y);
            for c in 0..3 {
                pixel[c] = blend(original[c] as f32, degenerate[c] as f32, factor);
            }
        }
    }
    out
}

fn blend(value: f32, towards: f32, factor: f32) -> u8 {
    (factor * value + (1.0 - factor) * towards)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// HWC bytes to CHW floats scaled to [0, 1] and standardised per channel.
pub fn to_normalized_chw(img: &RgbImage) -> Vec<f32> {
    let plane = (img.width() * img.height()) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (i, pixel) in img.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }

    data
}
