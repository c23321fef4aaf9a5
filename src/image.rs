use crate::attr::Attributes;
use crate::error::*;
use crate::pal::{pack_argb, RGBA};
use crate::seacow::SeaCow;
use std::fmt;

/// Anything that can be read pixel by pixel
///
/// The source must not change while a palette is being built from it.
pub trait PixelSource: Sync {
    /// Width in pixels
    fn width(&self) -> usize;

    /// Height in pixels
    fn height(&self) -> usize;

    /// Pixel at column `x`, row `y`. Called only with `x < width()` and `y < height()`.
    fn pixel_at(&self, x: usize, y: usize) -> RGBA;

    /// What the source declares about its colors, regardless of the actual pixel values
    #[inline]
    fn color_model(&self) -> ColorModel {
        ColorModel::Rgba
    }
}

impl<T: PixelSource + ?Sized> PixelSource for &T {
    #[inline(always)]
    fn width(&self) -> usize {
        (**self).width()
    }

    #[inline(always)]
    fn height(&self) -> usize {
        (**self).height()
    }

    #[inline(always)]
    fn pixel_at(&self, x: usize, y: usize) -> RGBA {
        (**self).pixel_at(x, y)
    }

    #[inline(always)]
    fn color_model(&self) -> ColorModel {
        (**self).color_model()
    }
}

/// Colorspace metadata of a [`PixelSource`]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ColorModel {
    /// Color with alpha channel
    #[default]
    Rgba,
    /// Color without alpha. Every pixel is treated as opaque.
    Rgb,
    /// Declared grayscale, without alpha
    Gray,
}

impl ColorModel {
    #[inline]
    #[must_use]
    pub fn has_alpha(self) -> bool {
        self == Self::Rgba
    }
}

/// Every pixel in row-major order
pub(crate) fn pixels<S: PixelSource + ?Sized>(image: &S) -> impl Iterator<Item = RGBA> + '_ {
    let width = image.width();
    (0..image.height()).flat_map(move |y| (0..width).map(move |x| image.pixel_at(x, y)))
}

/// Describes image dimensions and pixels for the library.
pub struct Image<'pixels> {
    pixels: SeaCow<'pixels, RGBA>,
    width: u32,
    height: u32,
    stride: usize,
    color_model: ColorModel,
}

impl<'pixels> Image<'pixels> {
    /// Makes an image from RGBA pixels, taking ownership of them.
    ///
    /// The `pixels` argument can be `Vec<RGBA>`, or `Box<[RGBA]>` or `&[RGBA]` (which is copied).
    #[inline]
    pub fn new<VecRGBA>(attr: &Attributes, pixels: VecRGBA, width: usize, height: usize) -> Result<Image<'static>, Error> where VecRGBA: Into<Box<[RGBA]>> {
        Self::new_stride(attr, pixels, width, height, width)
    }

    /// Stride is in pixels. Allows defining regions of larger images or images with padding.
    ///
    /// Otherwise the same as [`Image::new`].
    #[inline]
    pub fn new_stride<VecRGBA>(attr: &Attributes, pixels: VecRGBA, width: usize, height: usize, stride: usize) -> Result<Image<'static>, Error> where VecRGBA: Into<Box<[RGBA]>> {
        Image::new_stride_internal(attr, SeaCow::boxed(pixels.into()), width, height, stride)
    }

    /// Describes a slice of RGBA pixels without copying it.
    ///
    /// See the [`rgb`] and [`bytemuck`](//lib.rs/bytemuck) crates for making `[RGBA]` slices from `[u8]` slices.
    #[inline]
    pub fn new_borrowed(attr: &Attributes, pixels: &'pixels [RGBA], width: usize, height: usize) -> Result<Self, Error> {
        Self::new_stride_borrowed(attr, pixels, width, height, width)
    }

    /// Like [`Image::new_stride`], but doesn't copy the pixels.
    #[inline]
    pub fn new_stride_borrowed(attr: &Attributes, pixels: &'pixels [RGBA], width: usize, height: usize, stride: usize) -> Result<Self, Error> {
        Self::new_stride_internal(attr, SeaCow::borrowed(pixels), width, height, stride)
    }

    fn new_stride_internal<'a>(attr: &Attributes, pixels: SeaCow<'a, RGBA>, width: usize, height: usize, stride: usize) -> Result<Image<'a>, Error> {
        if !Self::check_image_size(width, height) {
            attr.verbose_print("  error: image too large");
            return Err(ValueOutOfRange);
        }
        if stride < width {
            attr.verbose_print("  error: stride must be at least as large as width");
            return Err(ValueOutOfRange);
        }

        let slice = pixels.as_slice();
        let required = if width == 0 || height == 0 { 0 } else {
            stride.checked_mul(height - 1).and_then(|n| n.checked_add(width)).ok_or(ValueOutOfRange)?
        };
        if slice.len() < required {
            attr.verbose_print(format!("Buffer length is {} pixels, which is not enough for {}×{} pixels at stride {}", slice.len(), width, height, stride));
            return Err(BufferTooSmall);
        }

        Ok(Image {
            pixels,
            width: width as u32,
            height: height as u32,
            stride,
            color_model: ColorModel::Rgba,
        })
    }

    /// Pixel count has to fit in 32 bits, because that's what the histogram counts in
    fn check_image_size(width: usize, height: usize) -> bool {
        if u32::try_from(width).is_err() || u32::try_from(height).is_err() {
            return false;
        }
        match width.checked_mul(height) {
            Some(area) => area <= u32::MAX as usize,
            None => false,
        }
    }

    /// Declares what the pixels represent. The default is [`ColorModel::Rgba`].
    #[inline]
    #[must_use]
    pub fn with_color_model(mut self, color_model: ColorModel) -> Self {
        self.color_model = color_model;
        self
    }

    /// Width of the image in pixels
    #[must_use]
    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width as _
    }

    /// Height of the image in pixels
    #[must_use]
    #[inline(always)]
    pub fn height(&self) -> usize {
        self.height as _
    }
}

impl PixelSource for Image<'_> {
    #[inline(always)]
    fn width(&self) -> usize {
        self.width()
    }

    #[inline(always)]
    fn height(&self) -> usize {
        self.height()
    }

    #[inline(always)]
    fn pixel_at(&self, x: usize, y: usize) -> RGBA {
        self.pixels.as_slice()[y * self.stride + x]
    }

    #[inline(always)]
    fn color_model(&self) -> ColorModel {
        self.color_model
    }
}

impl fmt::Debug for Image<'_> {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("color_model", &self.color_model)
            .field("borrowed", &self.pixels.is_borrowed())
            .finish()
    }
}

/// Result of [`count_transparent_colors`]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TransparentColors {
    /// No pixel has alpha below 255
    None = 0,
    /// All non-opaque pixels have the same RGBA value
    Single = 1,
    /// More than one distinct non-opaque RGBA value
    Multiple = 2,
}

/// True if the image declares itself gray, or all pixels have R = G = B
pub fn is_grayscale<S: PixelSource + ?Sized>(image: &S) -> bool {
    if image.color_model() == ColorModel::Gray {
        return true;
    }
    pixels(image).all(|px| px.r == px.g && px.r == px.b)
}

/// True if any pixel has alpha below `threshold`. Sources without alpha are never transparent.
pub fn has_transparency<S: PixelSource + ?Sized>(image: &S, threshold: u8) -> bool {
    if !image.color_model().has_alpha() {
        return false;
    }
    pixels(image).any(|px| px.a < threshold)
}

/// Whether non-opaque pixels use none, one, or many distinct RGBA values
pub fn count_transparent_colors<S: PixelSource + ?Sized>(image: &S) -> TransparentColors {
    if !image.color_model().has_alpha() {
        return TransparentColors::None;
    }
    transparent_colors(pixels(image))
}

/// Same as [`count_transparent_colors`], for a bare list of pixels
pub fn count_transparent_colors_in(pixels: &[RGBA]) -> TransparentColors {
    transparent_colors(pixels.iter().copied())
}

fn transparent_colors(pixels: impl Iterator<Item = RGBA>) -> TransparentColors {
    let mut first = None;
    for px in pixels.filter(|px| px.a < 255) {
        let argb = pack_argb(px);
        match first {
            None => first = Some(argb),
            Some(f) if f != argb => return TransparentColors::Multiple,
            Some(_) => {},
        }
    }
    if first.is_some() { TransparentColors::Single } else { TransparentColors::None }
}

#[test]
fn stride_and_rows() {
    let attr = Attributes::new();
    let px: Vec<_> = (0..12u8).map(|i| RGBA::new(i, i, i, 255)).collect();
    let img = Image::new_stride_borrowed(&attr, &px, 3, 3, 4).unwrap();
    assert_eq!(RGBA::new(9, 9, 9, 255), img.pixel_at(1, 2));
    assert_eq!(RGBA::new(4, 4, 4, 255), img.pixel_at(0, 1));
    assert_eq!(9, pixels(&img).count());

    assert_eq!(Err(BufferTooSmall), Image::new_stride_borrowed(&attr, &px[..10], 3, 3, 4).map(|_| ()));
    assert_eq!(Err(ValueOutOfRange), Image::new_stride_borrowed(&attr, &px, 4, 2, 3).map(|_| ()));
    assert_eq!(Err(ValueOutOfRange), Image::new(&attr, Vec::<RGBA>::new(), 1 << 20, 1 << 20).map(|_| ()));

    let empty = Image::new(&attr, Vec::<RGBA>::new(), 0, 5).unwrap();
    assert_eq!(0, pixels(&empty).count());
}

#[test]
fn dimensions_fit_u32_even_when_empty() {
    let attr = Attributes::new();
    if let Ok(huge) = usize::try_from((1u64 << 32) + 5) {
        assert_eq!(Err(ValueOutOfRange), Image::new(&attr, Vec::<RGBA>::new(), huge, 0).map(|_| ()));
        assert_eq!(Err(ValueOutOfRange), Image::new(&attr, Vec::<RGBA>::new(), 0, huge).map(|_| ()));
    }
    let max = u32::MAX as usize;
    assert_eq!(max, Image::new(&attr, Vec::<RGBA>::new(), max, 0).unwrap().width());
}

#[test]
fn grayscale() {
    let attr = Attributes::new();
    let gray = [RGBA::new(7, 7, 7, 0), RGBA::new(200, 200, 200, 255)];
    assert!(is_grayscale(&Image::new_borrowed(&attr, &gray, 2, 1).unwrap()));

    let color = [RGBA::new(7, 7, 7, 255), RGBA::new(200, 200, 201, 255)];
    let img = Image::new_borrowed(&attr, &color, 2, 1).unwrap();
    assert!(!is_grayscale(&img));
    assert!(is_grayscale(&img.with_color_model(ColorModel::Gray)));
}

#[test]
fn transparency() {
    let attr = Attributes::new();
    let px = [RGBA::new(1, 2, 3, 255), RGBA::new(1, 2, 3, 200)];
    let img = Image::new_borrowed(&attr, &px, 2, 1).unwrap();
    assert!(has_transparency(&img, 255));
    assert!(!has_transparency(&img, 200));
    assert!(!has_transparency(&img.with_color_model(ColorModel::Rgb), 255));
}

#[test]
fn transparent_color_count() {
    let opaque = RGBA::new(10, 20, 30, 255);
    let clear = RGBA::new(0, 0, 0, 0);
    assert_eq!(TransparentColors::None, count_transparent_colors_in(&[opaque, opaque]));
    assert_eq!(TransparentColors::Single, count_transparent_colors_in(&[opaque, clear, clear]));
    assert_eq!(TransparentColors::Multiple, count_transparent_colors_in(&[clear, opaque, RGBA::new(0, 0, 0, 1)]));
    assert_eq!(TransparentColors::Multiple, count_transparent_colors_in(&[clear, RGBA::new(1, 0, 0, 0)]));
    assert_eq!(2, TransparentColors::Multiple as u8);

    let attr = Attributes::new();
    let px = [opaque, clear, RGBA::new(5, 5, 5, 0)];
    let img = Image::new_borrowed(&attr, &px, 3, 1).unwrap();
    assert_eq!(TransparentColors::Multiple, count_transparent_colors(&img));
    assert_eq!(TransparentColors::None, count_transparent_colors(&img.with_color_model(ColorModel::Rgb)));
}
