use crate::error::Error;
use crate::hist::{cell_index, pixel_index, table_len};
use std::fmt;

/// 8-bit RGBA in sRGB. This is the only pixel format *publicly* used by the library.
pub type RGBA = rgb::RGBA<u8>;

/// 8-bit RGB palette entry
pub type RGB = rgb::RGB<u8>;

/// Marks quantized cells not covered by any box (only possible in an empty palette)
const NO_ENTRY: u32 = u32::MAX;

/// Packs the color as `0xRRGGBB`. Alpha is ignored.
#[inline(always)]
#[must_use]
pub fn pack_rgb(px: RGBA) -> u32 {
    (u32::from(px.r) << 16) | (u32::from(px.g) << 8) | u32::from(px.b)
}

/// Packs the color as `0xAARRGGBB`
#[inline(always)]
#[must_use]
pub fn pack_argb(px: RGBA) -> u32 {
    (u32::from(px.a) << 24) | pack_rgb(px)
}

/// Inverse of [`pack_rgb`]. Bits above 24 are ignored.
#[inline(always)]
#[must_use]
pub fn unpack_rgb(rgb: u32) -> RGB {
    RGB::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
}

struct Hex(u32);

impl fmt::Debug for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

/// Colors for indexed-color encoding, as returned by [`Attributes`](crate::Attributes)
///
/// Entries are always enumerated in ascending order of their packed `0xRRGGBB` value.
#[derive(Clone, Debug)]
pub enum Palette {
    /// Every distinct color of the image
    Exact(ExactPalette),
    /// One average color per box of the median split
    Quantized(QuantizedPalette),
}

impl Palette {
    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Exact(p) => p.len(),
            Self::Quantized(p) => p.len(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Packed `0xRRGGBB` color of the entry
    #[must_use]
    pub fn color_at(&self, index: usize) -> Option<u32> {
        match self {
            Self::Exact(p) => p.color_at(index),
            Self::Quantized(p) => p.color_at(index),
        }
    }

    #[must_use]
    pub fn rgb_at(&self, index: usize) -> Option<RGB> {
        self.color_at(index).map(unpack_rgb)
    }

    /// Packed colors in palette order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).filter_map(move |i| self.color_at(i))
    }

    /// Entry that represents the pixel. Alpha is ignored.
    ///
    /// Exact palettes only match colors they contain. Quantized palettes match the box that contains the pixel's quantized color.
    #[must_use]
    pub fn palette_index(&self, px: RGBA) -> Option<usize> {
        match self {
            Self::Exact(p) => p.palette_index(px),
            Self::Quantized(p) => p.palette_index(px),
        }
    }
}

impl From<ExactPalette> for Palette {
    #[inline]
    fn from(p: ExactPalette) -> Self {
        Self::Exact(p)
    }
}

impl From<QuantizedPalette> for Palette {
    #[inline]
    fn from(p: QuantizedPalette) -> Self {
        Self::Quantized(p)
    }
}

/// Ascending, duplicate-free list of packed `0xRRGGBB` colors
#[derive(Clone, PartialEq, Eq)]
pub struct ExactPalette {
    colors: Box<[u32]>,
}

impl ExactPalette {
    /// Makes a palette of arbitrary colors. They're truncated to 24 bits, sorted and deduplicated.
    #[must_use]
    pub fn new(mut colors: Vec<u32>) -> Self {
        colors.iter_mut().for_each(|c| *c &= 0xFF_FFFF);
        colors.sort_unstable();
        colors.dedup();
        Self::from_sorted(colors)
    }

    #[inline]
    pub(crate) fn from_sorted(colors: Vec<u32>) -> Self {
        debug_assert!(colors.windows(2).all(|w| w[0] < w[1]));
        Self { colors: colors.into_boxed_slice() }
    }

    #[inline(always)]
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.colors
    }

    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn color_at(&self, index: usize) -> Option<u32> {
        self.colors.get(index).copied()
    }

    /// Position of the pixel's exact color, if present
    #[must_use]
    pub fn palette_index(&self, px: RGBA) -> Option<usize> {
        self.colors.binary_search(&pack_rgb(px)).ok()
    }
}

impl fmt::Debug for ExactPalette {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.colors.iter().copied().map(Hex))
            .finish()
    }
}

/// Axis-aligned region of the quantized RGB cube that became one palette entry
///
/// Bounds are inclusive and in quantized units (`0..2^precision`), in red, green, blue order.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ColorBox {
    pub(crate) mins: [u8; 3],
    pub(crate) maxs: [u8; 3],
    pub(crate) total: u32,
    pub(crate) color: u32,
}

impl ColorBox {
    #[inline]
    #[must_use]
    pub fn mins(&self) -> [u8; 3] {
        self.mins
    }

    #[inline]
    #[must_use]
    pub fn maxs(&self) -> [u8; 3] {
        self.maxs
    }

    /// Number of image pixels that fell into this box
    #[inline]
    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Population-weighted average color, packed as `0xRRGGBB`
    #[inline]
    #[must_use]
    pub fn color(&self) -> u32 {
        self.color
    }

    /// Number of quantized cells covered
    #[must_use]
    pub fn volume(&self) -> u32 {
        (0..3).map(|c| u32::from(self.maxs[c] - self.mins[c]) + 1).product()
    }

    /// Whether the quantized color (red, green, blue levels) is inside
    #[must_use]
    pub fn contains(&self, levels: [u8; 3]) -> bool {
        (0..3).all(|c| (self.mins[c]..=self.maxs[c]).contains(&levels[c]))
    }

    pub(crate) fn cells(&self, precision: u8) -> impl Iterator<Item = usize> {
        let (mins, maxs) = (self.mins, self.maxs);
        (mins[2]..=maxs[2]).flat_map(move |blue| {
            (mins[1]..=maxs[1]).flat_map(move |green| {
                (mins[0]..=maxs[0]).map(move |red| cell_index(red, green, blue, precision))
            })
        })
    }
}

impl fmt::Debug for ColorBox {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorBox")
            .field("mins", &self.mins)
            .field("maxs", &self.maxs)
            .field("total", &self.total)
            .field("color", &Hex(self.color))
            .finish()
    }
}

/// Palette made by [`Attributes::quantize`](crate::Attributes::quantize)
#[derive(Clone)]
pub struct QuantizedPalette {
    boxes: Box<[ColorBox]>,
    precision: u8,
    /// quantized cell index -> palette entry
    lookup: Box<[u32]>,
}

impl QuantizedPalette {
    /// Boxes must be sorted and partition the whole cube (or be empty)
    pub(crate) fn new(boxes: Vec<ColorBox>, precision: u8) -> Result<Self, Error> {
        debug_assert!(boxes.windows(2).all(|w| w[0].color <= w[1].color));
        let len = table_len(precision);
        let mut lookup = Vec::new();
        lookup.try_reserve_exact(len)?;
        lookup.resize(len, NO_ENTRY);

        for (i, b) in boxes.iter().enumerate() {
            for cell in b.cells(precision) {
                debug_assert_eq!(lookup[cell], NO_ENTRY, "boxes overlap");
                lookup[cell] = i as u32;
            }
        }
        debug_assert!(boxes.is_empty() || lookup.iter().all(|&e| e != NO_ENTRY));

        Ok(Self {
            boxes: boxes.into_boxed_slice(),
            precision,
            lookup: lookup.into_boxed_slice(),
        })
    }

    /// Surviving boxes, in palette order
    #[inline(always)]
    #[must_use]
    pub fn boxes(&self) -> &[ColorBox] {
        &self.boxes
    }

    /// Bits per channel of the quantized color space
    #[inline(always)]
    #[must_use]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn color_at(&self, index: usize) -> Option<u32> {
        self.boxes.get(index).map(|b| b.color)
    }

    /// Entry whose box contains the pixel's quantized color. `None` only if the palette is empty.
    #[inline]
    #[must_use]
    pub fn palette_index(&self, px: RGBA) -> Option<usize> {
        match self.lookup[pixel_index(px, self.precision)] {
            NO_ENTRY => None,
            i => Some(i as usize),
        }
    }
}

impl fmt::Debug for QuantizedPalette {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantizedPalette")
            .field("precision", &self.precision)
            .field("boxes", &self.boxes)
            .finish()
    }
}

#[test]
fn packing() {
    let px = RGBA::new(0x12, 0x34, 0x56, 0x78);
    assert_eq!(0x12_3456, pack_rgb(px));
    assert_eq!(0x7812_3456, pack_argb(px));
    assert_eq!(RGB::new(0x12, 0x34, 0x56), unpack_rgb(0xFF12_3456));
}

#[test]
fn exact_lookup() {
    let p = ExactPalette::new(vec![0xFF00_00FF, 0x00FF_0000, 0x0000_00FF, 0x12]);
    assert_eq!(&[0x12, 0xFF, 0xFF_0000], p.as_slice());
    assert_eq!(Some(1), p.palette_index(RGBA::new(0, 0, 255, 0)));
    assert_eq!(Some(2), p.palette_index(RGBA::new(255, 0, 0, 255)));
    assert_eq!(None, p.palette_index(RGBA::new(1, 2, 3, 255)));

    let p = Palette::from(p);
    assert_eq!(vec![0x12, 0xFF, 0xFF_0000], p.iter().collect::<Vec<_>>());
    assert_eq!(Some(RGB::new(255, 0, 0)), p.rgb_at(2));
    assert_eq!(None, p.color_at(3));
}

#[test]
fn quantized_lookup() {
    let low = ColorBox { mins: [0, 0, 0], maxs: [0, 1, 1], total: 3, color: 0x00_0055 };
    let high = ColorBox { mins: [1, 0, 0], maxs: [1, 1, 1], total: 1, color: 0xFF_FFFF };
    assert_eq!(4, low.volume());
    assert!(high.contains([1, 1, 0]));
    assert!(!high.contains([0, 1, 0]));

    let p = QuantizedPalette::new(vec![low, high], 1).unwrap();
    assert_eq!(Some(0), p.palette_index(RGBA::new(0x7F, 0xFF, 0xFF, 255)));
    assert_eq!(Some(1), p.palette_index(RGBA::new(0x80, 0, 0, 0)));
    assert_eq!(Some(0xFF_FFFF), p.color_at(1));

    let empty = QuantizedPalette::new(Vec::new(), 6).unwrap();
    assert!(empty.is_empty());
    assert_eq!(None, empty.palette_index(RGBA::new(1, 2, 3, 4)));
}
