//! Build color palettes for indexed-color image encoders (GIF, 8-bit PNG).
//!
//! Images with few colors get an exact palette of every distinct color.
//! Other images are quantized by median split of the RGB cube.
//!
//! ```rust,ignore
//! let attr = rgbpalette::new();
//! let img = attr.new_image_borrowed(&pixels, width, height)?;
//! let palette = match attr.exact_palette_limited(&img, 256) {
//!     Some(exact) => exact,
//!     None => attr.quantize(&img)?,
//! };
//! ```
#![allow(clippy::bool_to_int_with_if)]
#![allow(clippy::if_not_else)]
#![allow(clippy::inline_always)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![warn(clippy::map_unwrap_or)]
#![warn(clippy::redundant_closure_for_method_calls)]

mod attr;
mod error;
mod exact;
mod hist;
mod image;
mod mediancut;
mod pal;
mod seacow;

pub use attr::{AlphaQuantizer, Attributes, DEFAULT_MAX_COLORS};
pub use error::Error;
pub use hist::DEFAULT_PRECISION;
pub use image::{count_transparent_colors, count_transparent_colors_in, has_transparency, is_grayscale};
pub use image::{ColorModel, Image, PixelSource, TransparentColors};
pub use pal::{pack_argb, pack_rgb, unpack_rgb};
pub use pal::{ColorBox, ExactPalette, Palette, QuantizedPalette, RGB, RGBA};

/// Start here: creates new handle for library configuration
///
/// See [`Attributes`]
#[inline(always)]
#[must_use]
pub fn new() -> Attributes {
    Attributes::new()
}

#[derive(Debug, PartialOrd, PartialEq, Copy, Clone)]
pub(crate) struct OrdFloat<T>(T);

impl Eq for OrdFloat<f64> {}

impl Ord for OrdFloat<f64> {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl OrdFloat<f64> {
    pub fn new64(v: f64) -> Self {
        debug_assert!(v.is_finite());
        Self(v)
    }
}

#[cfg(test)]
fn img(pixels: &[RGBA], width: usize) -> Image<'static> {
    new().new_image(pixels, width, pixels.len() / width).unwrap()
}

#[test]
fn single_black_pixel() {
    let image = img(&[RGBA::new(0, 0, 0, 255)], 1);
    let mut attr = new();

    let exact = attr.exact_palette(&image);
    assert_eq!(vec![0], exact.iter().collect::<Vec<_>>());
    assert_eq!(Some(0), exact.palette_index(RGBA::new(0, 0, 0, 255)));

    attr.set_max_colors(4);
    let quantized = attr.quantize(&image).unwrap();
    assert_eq!(vec![0], quantized.iter().collect::<Vec<_>>());
    assert_eq!(Some(0), quantized.palette_index(RGBA::new(3, 3, 3, 255)));
}

#[test]
fn red_and_blue() {
    let image = img(&[RGBA::new(255, 0, 0, 255), RGBA::new(0, 0, 255, 255)], 2);
    let mut attr = new();

    let exact = attr.exact_palette_limited(&image, 256).unwrap();
    assert_eq!(vec![0x0000FF, 0xFF0000], exact.iter().collect::<Vec<_>>());

    attr.set_max_colors(2);
    let quantized = attr.quantize(&image).unwrap();
    assert_eq!(vec![0x0000FF, 0xFF0000], quantized.iter().collect::<Vec<_>>());
    assert_eq!(Some(1), quantized.palette_index(RGBA::new(255, 0, 0, 255)));
    assert_eq!(Some(0), quantized.palette_index(RGBA::new(0, 0, 255, 255)));
}

#[test]
fn too_many_colors() {
    let pixels: Vec<_> = (0..300u32).map(|i| RGBA::new((i >> 8) as u8, i as u8, 7, 255)).collect();
    let image = img(&pixels, 30);
    let attr = new();

    assert!(attr.exact_palette_limited(&image, 256).is_none());
    assert_eq!(300, attr.exact_palette_limited(&image, 300).unwrap().len());
    let fancy = attr.exact_palette(&image);
    assert_eq!(300, fancy.len());
    assert!(fancy.iter().zip(fancy.iter().skip(1)).all(|(a, b)| a < b));

    let quantized = attr.quantize(&image).unwrap();
    assert!(quantized.len() <= 256);
    assert!(quantized.len() > 1);
}

#[test]
fn unlimited_quantization_is_exhaustive() {
    let pixels: Vec<_> = (0..40u8).map(|i| RGBA::new(i * 6, 0, 255 - i * 6, 255)).collect();
    let image = img(&pixels, 8);
    let mut attr = new();
    attr.set_max_colors(0);
    attr.set_precision(8).unwrap();
    // every distinct color gets its own box at full precision
    let quantized = attr.quantize(&image).unwrap();
    assert_eq!(attr.exact_palette(&image).iter().collect::<Vec<_>>(), quantized.iter().collect::<Vec<_>>());
}

#[test]
fn transparent_colors() {
    let clear = RGBA::new(0, 0, 0, 0);
    let image = img(&[clear, RGBA::new(9, 9, 9, 255), clear, RGBA::new(0, 0, 0, 255)], 2);
    assert_eq!(TransparentColors::Single, count_transparent_colors(&image));
    assert!(is_grayscale(&image));
    assert!(new().has_transparency(&image));

    let mut attr = new();
    attr.set_transparency_threshold(0);
    assert!(!attr.has_transparency(&image));
}

#[test]
fn alpha_quantizer_gets_settings() {
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Recorder(AtomicU32);
    impl AlphaQuantizer for Recorder {
        fn quantize_rgba(&self, image: &dyn PixelSource, max_colors: u32, include_alpha: bool) -> Result<Palette, Error> {
            assert!(include_alpha);
            self.0.store(max_colors, Ordering::Relaxed);
            let colors = (0..image.width()).map(|x| pack_argb(image.pixel_at(x, 0))).collect();
            Ok(ExactPalette::new(colors).into())
        }
    }

    let image = img(&[RGBA::new(1, 2, 3, 4), RGBA::new(5, 6, 7, 8)], 2);
    let mut attr = new();
    attr.set_max_colors(17);
    let q = Recorder(AtomicU32::new(0));
    let pal = attr.quantize_rgba(&image, &q, true).unwrap();
    assert_eq!(17, q.0.load(Ordering::Relaxed));
    assert_eq!(vec![0x010203, 0x050607], pal.iter().collect::<Vec<_>>());

    let source: &dyn PixelSource = &image;
    attr.set_max_colors(3);
    assert_eq!(2, attr.quantize_rgba(source, &q, true).unwrap().len());
    assert_eq!(3, q.0.load(Ordering::Relaxed));
}

#[test]
fn send_sync() {
    fn is_send<T: Send>() {}
    fn is_sync<T: Sync>() {}
    is_send::<Attributes>();
    is_sync::<Attributes>();
    is_send::<Image<'_>>();
    is_sync::<Image<'_>>();
    is_send::<Palette>();
    is_sync::<Palette>();
}
