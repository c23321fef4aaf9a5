use crate::error::*;
use crate::exact::{exact_palette_fancy, exact_palette_simple};
use crate::hist::{is_valid_precision, FrequencyTable, DEFAULT_PRECISION};
use crate::image::{has_transparency, Image, PixelSource};
use crate::mediancut::mediancut;
use crate::pal::{Palette, RGBA};
use std::sync::Arc;

/// Default for [`Attributes::set_max_colors`]
pub const DEFAULT_MAX_COLORS: u32 = 256;

/// Palette builder for images that need to represent partial transparency
///
/// Not implemented by this library. [`Attributes::quantize_rgba`] hands over to it.
pub trait AlphaQuantizer {
    /// Make a palette of at most `max_colors` colors. If `include_alpha` is false, treat all pixels as opaque.
    fn quantize_rgba(&self, image: &dyn PixelSource, max_colors: u32, include_alpha: bool) -> Result<Palette, Error>;
}

/// Starting point and settings for building palettes
#[derive(Clone)]
pub struct Attributes {
    max_colors: u32,
    precision: u8,
    transparency_threshold: u8,

    log_callback: Option<Arc<dyn Fn(&Attributes, &str) + Send + Sync>>,
    log_flush_callback: Option<Arc<dyn Fn(&Attributes) + Send + Sync>>,
}

impl Attributes {
    /// New handle for library configuration
    ///
    /// See also [`Attributes::new_image()`]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_colors: DEFAULT_MAX_COLORS,
            precision: DEFAULT_PRECISION,
            transparency_threshold: 255,
            log_callback: None,
            log_flush_callback: None,
        }
    }

    /// Make an image from RGBA pixels.
    ///
    /// The `pixels` argument can be `Vec<RGBA>`, or `Box<[RGBA]>` or `&[RGBA]`.
    /// See [`Attributes::new_image_borrowed`] for a non-copying alternative.
    #[inline]
    pub fn new_image<VecRGBA>(&self, pixels: VecRGBA, width: usize, height: usize) -> Result<Image<'static>, Error> where VecRGBA: Into<Box<[RGBA]>> {
        Image::new(self, pixels, width, height)
    }

    /// Like [`Attributes::new_image`], with rows `stride` pixels apart
    #[inline]
    pub fn new_image_stride<VecRGBA>(&self, pixels: VecRGBA, width: usize, height: usize, stride: usize) -> Result<Image<'static>, Error> where VecRGBA: Into<Box<[RGBA]>> {
        Image::new_stride(self, pixels, width, height, stride)
    }

    /// Describe dimensions of a slice of RGBA pixels
    #[inline]
    pub fn new_image_borrowed<'pixels>(&self, bitmap: &'pixels [RGBA], width: usize, height: usize) -> Result<Image<'pixels>, Error> {
        Image::new_borrowed(self, bitmap, width, height)
    }

    /// Like [`Attributes::new_image_borrowed`], with rows `stride` pixels apart
    #[inline]
    pub fn new_image_stride_borrowed<'pixels>(&self, bitmap: &'pixels [RGBA], width: usize, height: usize, stride: usize) -> Result<Image<'pixels>, Error> {
        Image::new_stride_borrowed(self, bitmap, width, height, stride)
    }

    /// Every distinct color in the image, sorted. Alpha is ignored.
    ///
    /// Uses 2MB of memory, regardless of the image size or number of colors.
    pub fn exact_palette<S: PixelSource + ?Sized>(&self, image: &S) -> Palette {
        let palette = exact_palette_fancy(image);
        self.verbose_print(format!("  exact palette...{} colors", palette.len()));
        palette.into()
    }

    /// Every distinct color in the image, sorted, or `None` if there are more than `max_colors`.
    ///
    /// Stops reading the image as soon as the limit is exceeded. Memory use grows with the number of colors, so this is better than [`Attributes::exact_palette`] only for small limits.
    /// When this returns `None`, [`Attributes::quantize`] is the usual fallback.
    pub fn exact_palette_limited<S: PixelSource + ?Sized>(&self, image: &S, max_colors: usize) -> Option<Palette> {
        match exact_palette_simple(image, max_colors) {
            Some(palette) => {
                self.verbose_print(format!("  exact palette...{} colors", palette.len()));
                Some(palette.into())
            },
            None => {
                self.verbose_print(format!("  too many colors (> {max_colors})"));
                None
            },
        }
    }

    /// Generate a palette of at most [`max_colors`](Attributes::set_max_colors) for the image
    ///
    /// Colors are accurate to [`precision`](Attributes::set_precision) bits per channel. Alpha is ignored.
    /// The palette may have fewer colors if the image doesn't have enough distinct colors to split.
    pub fn quantize<S: PixelSource + ?Sized>(&self, image: &S) -> Result<Palette, Error> {
        let table = FrequencyTable::new(image, self.precision)?;
        self.verbose_print(format!("  made frequency table...{} of {} colors used", table.cells_used(), table.len()));

        let palette = mediancut(&table, self.max_colors)?;
        self.verbose_print(format!("  selected {} colors", palette.len()));
        Ok(palette.into())
    }

    /// Generate a palette with the given quantizer, which can represent partial transparency
    ///
    /// The quantizer gets the configured [`max_colors`](Attributes::max_colors).
    pub fn quantize_rgba<S: PixelSource + ?Sized>(&self, image: &S, quantizer: &dyn AlphaQuantizer, include_alpha: bool) -> Result<Palette, Error> {
        quantizer.quantize_rgba(&image, self.max_colors, include_alpha)
    }

    /// True if any pixel is more transparent than the [threshold](Attributes::set_transparency_threshold)
    pub fn has_transparency<S: PixelSource + ?Sized>(&self, image: &S) -> bool {
        has_transparency(image, self.transparency_threshold)
    }

    /// Maximum number of colors [`quantize`](Attributes::quantize) makes.
    ///
    /// 0 means no limit: boxes are split until none can be split any more. The default is 256.
    #[inline]
    pub fn set_max_colors(&mut self, colors: u32) {
        self.max_colors = colors;
    }

    /// Bits per channel kept when quantizing, 1-8.
    ///
    /// Memory use of [`quantize`](Attributes::quantize) is 2^(3×bits) × 8 bytes. The default is 6.
    #[inline]
    pub fn set_precision(&mut self, bits: u8) -> Result<(), Error> {
        if !is_valid_precision(bits) {
            self.verbose_print("  error: precision must be between 1 and 8 bits");
            return Err(ValueOutOfRange);
        }
        self.precision = bits;
        Ok(())
    }

    /// Pixels with alpha below this are transparent for [`has_transparency`](Attributes::has_transparency). The default is 255.
    #[inline]
    pub fn set_transparency_threshold(&mut self, alpha: u8) {
        self.transparency_threshold = alpha;
    }

    /// Return max number of colors set
    #[inline(always)]
    #[must_use]
    pub fn max_colors(&self) -> u32 {
        self.max_colors
    }

    /// Return bits per channel used for quantization
    #[inline(always)]
    #[must_use]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    #[inline(always)]
    #[must_use]
    pub fn transparency_threshold(&self) -> u8 {
        self.transparency_threshold
    }

    /// Set callback function to be called every time the library wants to print a message.
    ///
    /// To share data with the callback, use `Arc` or `Atomic*` types and `move ||` closures.
    #[inline]
    pub fn set_log_callback<F: Fn(&Attributes, &str) + Send + Sync + 'static>(&mut self, callback: F) {
        self.verbose_printf_flush();
        self.log_callback = Some(Arc::new(callback));
    }

    /// Callback for flushing output (if you buffer messages, that's the time to flush those buffers)
    #[inline]
    pub fn set_log_flush_callback<F: Fn(&Attributes) + Send + Sync + 'static>(&mut self, callback: F) {
        self.verbose_printf_flush();
        self.log_flush_callback = Some(Arc::new(callback));
    }

    #[inline(always)]
    pub(crate) fn verbose_print(self: &Attributes, msg: impl AsRef<str>) {
        fn _print(a: &Attributes, msg: &str) {
            if let Some(f) = &a.log_callback {
                f(a, msg);
            }
        }
        _print(self, msg.as_ref());
    }

    #[inline]
    pub(crate) fn verbose_printf_flush(self: &Attributes) {
        if let Some(f) = &self.log_flush_callback {
            f(self);
        }
    }
}

impl Drop for Attributes {
    fn drop(&mut self) {
        self.verbose_printf_flush();
    }
}

impl Default for Attributes {
    #[inline(always)]
    fn default() -> Attributes {
        Attributes::new()
    }
}

#[test]
fn getset() {
    let mut a = Attributes::new();
    assert_eq!(256, a.max_colors());
    assert_eq!(6, a.precision());
    assert_eq!(255, a.transparency_threshold());

    a.set_max_colors(0);
    assert_eq!(0, a.max_colors());

    a.set_precision(8).unwrap();
    assert_eq!(8, a.precision());
    assert!(a.set_precision(0).is_err());
    assert!(a.set_precision(9).is_err());
    assert_eq!(8, a.precision());

    a.set_transparency_threshold(128);
    assert_eq!(128, a.transparency_threshold());
}

#[test]
fn logs() {
    use std::sync::Mutex;

    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let flushes = Arc::new(Mutex::new(0));
    let mut a = Attributes::new();
    let l = log.clone();
    a.set_log_callback(move |_, msg| l.lock().unwrap().push(msg.to_string()));
    let f = flushes.clone();
    a.set_log_flush_callback(move |_| *f.lock().unwrap() += 1);

    let px = [RGBA::new(1, 2, 3, 255), RGBA::new(4, 5, 6, 255)];
    let img = a.new_image_borrowed(&px, 2, 1).unwrap();
    assert!(a.exact_palette_limited(&img, 1).is_none());
    assert_eq!(2, a.quantize(&img).unwrap().len());
    assert!(a.set_precision(12).is_err());
    drop(img);
    drop(a);

    let log = log.lock().unwrap();
    assert_eq!("  too many colors (> 1)", log[0]);
    assert!(log[1].starts_with("  made frequency table...2 of 262144"));
    assert_eq!("  selected 2 colors", log[2]);
    assert!(log[3].contains("precision"));
    assert_eq!(1, *flushes.lock().unwrap());
}
