use image::{GenericImageView, RgbaImage};
use log::debug;
use serde::Serialize;

use crate::color::Color;
use crate::config::{SamplerConfig, MAX_PALETTE_SIZE};
use crate::error::ThemeError;

const BIN_BITS: u8 = 5;
const BIN_LEVELS: usize = 1 << BIN_BITS;

/// One representative color and how much of the image it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Swatch {
    pub color: Color,
    /// Sampled pixels in this swatch's bucket.
    pub population: u32,
    /// `population` over all sampled visible pixels.
    pub coverage: f32,
}

/// Dominant colors of an image, most dominant first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Palette {
    pub swatches: Vec<Swatch>,
    pub width: u32,
    pub height: u32,
    /// Visible pixels that went into the histogram.
    pub sampled_pixels: u32,
}

impl Palette {
    pub fn len(&self) -> usize {
        self.swatches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swatches.is_empty()
    }

    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.swatches.iter().map(|swatch| swatch.color)
    }
}

/// Decodes JPEG/PNG/WebP (or anything else the `image` crate recognizes) into RGBA.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, ThemeError> {
    let img = image::load_from_memory(bytes).map_err(|e| ThemeError::Decode(e.to_string()))?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ThemeError::Decode(format!(
            "image has zero dimensions ({width}x{height})"
        )));
    }
    debug!("decoded {width}x{height} image");
    Ok(img.to_rgba8())
}

/// Quantizes `image` with median cut into at most `max_colors` swatches.
///
/// Swatches are ordered by population, descending. Swatches with equal population keep
/// the order median cut produced them in: the half of a split holding the lower values
/// along the split channel comes first. Large images are read on a fixed stride, so the
/// result is a pure function of the pixels and the config.
pub fn sample(image: &RgbaImage, config: &SamplerConfig) -> Result<Palette, ThemeError> {
    let (width, height) = image.dimensions();
    let stride = sampling_stride(width, height, config.subsample_threshold);
    let histogram = Histogram::collect(image, stride, config.min_alpha);

    if histogram.total == 0 {
        return Err(ThemeError::EmptyImage);
    }

    let bins = histogram.into_bins();
    let distinct = bins.len();
    let max_colors = config.max_colors.clamp(1, MAX_PALETTE_SIZE);
    let mut buckets = median_cut(bins, max_colors);
    buckets.sort_by(|a, b| b.population.cmp(&a.population));

    let total = buckets.iter().map(|b| b.population).sum::<u64>();
    let swatches: Vec<Swatch> = buckets
        .iter()
        .map(|bucket| Swatch {
            color: bucket.average(),
            population: bucket.population as u32,
            coverage: (bucket.population as f64 / total as f64) as f32,
        })
        .collect();

    debug!(
        "sampled {total} pixels of {width}x{height} (stride {stride}), {distinct} bins -> {} swatches",
        swatches.len()
    );

    Ok(Palette {
        swatches,
        width,
        height,
        sampled_pixels: total as u32,
    })
}

/// Every pixel below the threshold, otherwise the smallest square stride that brings
/// the sample count under it.
fn sampling_stride(width: u32, height: u32, threshold: u32) -> u32 {
    let pixels = width as u64 * height as u64;
    let threshold = threshold.max(1) as u64;
    if pixels <= threshold {
        return 1;
    }
    let mut stride = (pixels as f64 / threshold as f64).sqrt().ceil() as u64;
    while (width as u64).div_ceil(stride) * (height as u64).div_ceil(stride) > threshold {
        stride += 1;
    }
    stride as u32
}

#[derive(Debug, Clone, Copy)]
struct Bin {
    /// Quantized channel levels.
    key: [u8; 3],
    count: u64,
    sums: [u64; 3],
}

struct Histogram {
    counts: Vec<u64>,
    sums: Vec<[u64; 3]>,
    total: u64,
}

impl Histogram {
    fn collect(image: &RgbaImage, stride: u32, min_alpha: u8) -> Self {
        let mut counts = vec![0u64; BIN_LEVELS * BIN_LEVELS * BIN_LEVELS];
        let mut sums = vec![[0u64; 3]; BIN_LEVELS * BIN_LEVELS * BIN_LEVELS];
        let mut total = 0u64;
        let (width, height) = image.dimensions();

        for y in (0..height).step_by(stride as usize) {
            for x in (0..width).step_by(stride as usize) {
                let [r, g, b, a] = image.get_pixel(x, y).0;
                if a < min_alpha {
                    continue;
                }
                let index = bin_index(r, g, b);
                counts[index] += 1;
                sums[index][0] += r as u64;
                sums[index][1] += g as u64;
                sums[index][2] += b as u64;
                total += 1;
            }
        }

        Self { counts, sums, total }
    }

    /// Non-empty bins in ascending index order.
    fn into_bins(self) -> Vec<Bin> {
        self.counts
            .iter()
            .zip(self.sums.iter())
            .enumerate()
            .filter(|(_, (count, _))| **count > 0)
            .map(|(index, (&count, &sums))| Bin {
                key: bin_key(index),
                count,
                sums,
            })
            .collect()
    }
}

fn bin_index(r: u8, g: u8, b: u8) -> usize {
    let shift = 8 - BIN_BITS;
    let (r, g, b) = ((r >> shift) as usize, (g >> shift) as usize, (b >> shift) as usize);
    (r << (2 * BIN_BITS)) | (g << BIN_BITS) | b
}

fn bin_key(index: usize) -> [u8; 3] {
    let mask = BIN_LEVELS - 1;
    [
        ((index >> (2 * BIN_BITS)) & mask) as u8,
        ((index >> BIN_BITS) & mask) as u8,
        (index & mask) as u8,
    ]
}

#[derive(Debug)]
struct Bucket {
    bins: Vec<Bin>,
    population: u64,
}

impl Bucket {
    fn new(bins: Vec<Bin>) -> Self {
        let population = bins.iter().map(|bin| bin.count).sum();
        Self { bins, population }
    }

    fn range(&self, channel: usize) -> u8 {
        let (min, max) = self
            .bins
            .iter()
            .fold((u8::MAX, u8::MIN), |(min, max), bin| {
                (min.min(bin.key[channel]), max.max(bin.key[channel]))
            });
        max.saturating_sub(min)
    }

    /// Widest channel; red beats green beats blue on ties.
    fn widest_channel(&self) -> (usize, u8) {
        (0..3).fold((0, 0), |(best, best_range), channel| {
            let range = self.range(channel);
            if range > best_range {
                (channel, range)
            } else {
                (best, best_range)
            }
        })
    }

    fn split_score(&self) -> Option<u64> {
        if self.bins.len() < 2 {
            return None;
        }
        let (_, range) = self.widest_channel();
        Some(range as u64 * self.population)
    }

    /// Splits at the population-weighted median of the widest channel. Both halves are
    /// non-empty; the lower half is returned first.
    fn split(mut self) -> (Bucket, Bucket) {
        let (channel, _) = self.widest_channel();
        let (a, b) = ((channel + 1) % 3, (channel + 2) % 3);
        self.bins
            .sort_by_key(|bin| (bin.key[channel], bin.key[a], bin.key[b]));

        let half = self.population.div_ceil(2);
        let mut cumulative = 0;
        let mut cut = self.bins.len() - 1;
        for (i, bin) in self.bins.iter().enumerate() {
            cumulative += bin.count;
            if cumulative >= half {
                cut = i + 1;
                break;
            }
        }
        let cut = cut.clamp(1, self.bins.len() - 1);

        let upper = self.bins.split_off(cut);
        (Bucket::new(self.bins), Bucket::new(upper))
    }

    fn average(&self) -> Color {
        let population = self.population.max(1);
        let mut channels = [0u8; 3];
        for (channel, value) in channels.iter_mut().enumerate() {
            let sum: u64 = self.bins.iter().map(|bin| bin.sums[channel]).sum();
            *value = ((sum + population / 2) / population).min(255) as u8;
        }
        Color::from(channels)
    }
}

fn median_cut(bins: Vec<Bin>, max_colors: usize) -> Vec<Bucket> {
    let mut buckets = vec![Bucket::new(bins)];

    while buckets.len() < max_colors {
        let mut target: Option<(usize, u64)> = None;
        for (i, bucket) in buckets.iter().enumerate() {
            if let Some(score) = bucket.split_score() {
                if target.map_or(true, |(_, best)| score > best) {
                    target = Some((i, score));
                }
            }
        }

        let Some((index, _)) = target else {
            break;
        };
        let (lower, upper) = buckets.remove(index).split();
        buckets.insert(index, upper);
        buckets.insert(index, lower);
    }

    buckets
}
