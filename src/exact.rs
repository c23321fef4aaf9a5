use crate::image::{pixels, PixelSource};
use crate::pal::{pack_rgb, ExactPalette};
use std::collections::HashSet;

/// One bit for each of 2^24 colors
const BITMAP_BYTES: usize = 1 << 21;

/// Membership map of all 24-bit colors, 8 colors per byte
///
/// The low 21 bits of a color select the byte, the top 3 bits of red select the bit.
struct ColorBitmap {
    bits: Box<[u8]>,
}

#[inline(always)]
fn bit_position(rgb: u32) -> (usize, u8) {
    ((rgb & 0x1F_FFFF) as usize, 1 << ((rgb >> 21) & 7))
}

impl ColorBitmap {
    fn new() -> Self {
        Self { bits: vec![0; BITMAP_BYTES].into_boxed_slice() }
    }

    #[inline(always)]
    fn insert(&mut self, rgb: u32) {
        let (byte, mask) = bit_position(rgb);
        self.bits[byte] |= mask;
    }

    fn len(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    fn into_sorted_colors(self) -> Vec<u32> {
        let mut colors = Vec::with_capacity(self.len());
        for (low, &byte) in self.bits.iter().enumerate().filter(|&(_, &b)| b != 0) {
            for high_red in (0..8u32).rev() {
                if byte & (1 << high_red) != 0 {
                    colors.push(low as u32 | (high_red << 21));
                }
            }
        }
        // byte order interleaves the top red bits, so it's not numeric order yet
        colors.sort_unstable();
        colors
    }
}

/// Every distinct opaque color, in 2MB of memory regardless of image size. Alpha is ignored.
pub(crate) fn exact_palette_fancy<S: PixelSource + ?Sized>(image: &S) -> ExactPalette {
    let mut bitmap = ColorBitmap::new();
    for px in pixels(image) {
        bitmap.insert(pack_rgb(px));
    }
    ExactPalette::from_sorted(bitmap.into_sorted_colors())
}

/// Every distinct opaque color, or `None` as soon as there are more than `max_colors`
///
/// Memory grows with the number of colors, so it's meant for small limits.
pub(crate) fn exact_palette_simple<S: PixelSource + ?Sized>(image: &S, max_colors: usize) -> Option<ExactPalette> {
    let mut colors = HashSet::with_capacity_and_hasher(max_colors.min(1 << 16) + 1, U32Hasher(0));
    for px in pixels(image) {
        if colors.insert(pack_rgb(px)) && colors.len() > max_colors {
            return None;
        }
    }
    let mut colors: Vec<u32> = colors.into_iter().collect();
    colors.sort_unstable();
    Some(ExactPalette::from_sorted(colors))
}

// Simple deterministic hasher for the color set
impl std::hash::BuildHasher for U32Hasher {
    type Hasher = Self;
    #[inline(always)]
    fn build_hasher(&self) -> Self {
        Self(0)
    }
}

struct U32Hasher(u32);
impl std::hash::Hasher for U32Hasher {
    // magic constant from fxhash. For a single 32-bit key that's all it needs!
    #[inline(always)]
    fn finish(&self) -> u64 { u64::from(self.0).wrapping_mul(0x517cc1b727220a95) }
    #[inline(always)]
    fn write_u32(&mut self, i: u32) { self.0 = i; }

    fn write(&mut self, _bytes: &[u8]) { unimplemented!() }
}

#[cfg(test)]
struct Row(Vec<crate::pal::RGBA>);

#[cfg(test)]
impl PixelSource for Row {
    fn width(&self) -> usize { self.0.len() }
    fn height(&self) -> usize { 1 }
    fn pixel_at(&self, x: usize, _: usize) -> crate::pal::RGBA { self.0[x] }
}

#[test]
fn bitmap_positions() {
    assert_eq!((0, 1), bit_position(0));
    assert_eq!((0x1F_FFFF, 1 << 7), bit_position(0xFF_FFFF));
    // top 3 bits of red 0b101
    assert_eq!((0x01_0203, 1 << 5), bit_position(0xA1_0203));

    let mut b = ColorBitmap::new();
    for c in [0xA1_0203, 0x01_0203, 0xFF_FFFF, 0x01_0203, 0] {
        b.insert(c);
    }
    assert_eq!(4, b.len());
    assert_eq!(vec![0, 0x01_0203, 0xA1_0203, 0xFF_FFFF], b.into_sorted_colors());
}

#[test]
fn fancy_ignores_alpha() {
    use crate::pal::RGBA;
    let img = Row(vec![RGBA::new(255, 0, 0, 0), RGBA::new(0, 0, 255, 255), RGBA::new(255, 0, 0, 255)]);
    assert_eq!(&[0x00_00FF, 0xFF_0000], exact_palette_fancy(&img).as_slice());
    assert!(exact_palette_fancy(&Row(Vec::new())).is_empty());
}

#[test]
fn simple_limit() {
    use crate::pal::RGBA;
    let img = Row((0..10).map(|i| RGBA::new(i, 0, 0, 255)).collect());
    assert!(exact_palette_simple(&img, 9).is_none());
    let p = exact_palette_simple(&img, 10).unwrap();
    assert_eq!(10, p.len());
    assert_eq!(exact_palette_fancy(&img), p);
    assert!(exact_palette_simple(&Row(Vec::new()), 0).unwrap().is_empty());
}
