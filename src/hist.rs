use crate::error::*;
use crate::image::PixelSource;
use crate::pal::RGBA;
use std::ops::Range;

/// Channel precision used unless [`Attributes::set_precision`](crate::Attributes::set_precision) says otherwise
pub const DEFAULT_PRECISION: u8 = 6;

/// Population per quantized color level, for each of the three axes of a box
pub(crate) type AxisTotals = [[u32; 256]; 3];

/// Number of cells in the quantized cube
#[inline(always)]
pub(crate) fn table_len(precision: u8) -> usize {
    1 << (3 * u32::from(precision))
}

#[inline(always)]
pub(crate) fn is_valid_precision(precision: u8) -> bool {
    (1..=8).contains(&precision)
}

/// Red is the least significant part of the index, blue the most
#[inline(always)]
pub(crate) fn cell_index(red: u8, green: u8, blue: u8, precision: u8) -> usize {
    let p = u32::from(precision);
    (usize::from(blue) << (2 * p)) | (usize::from(green) << p) | usize::from(red)
}

#[inline(always)]
pub(crate) fn pixel_index(px: RGBA, precision: u8) -> usize {
    let shift = 8 - precision;
    cell_index(px.r >> shift, px.g >> shift, px.b >> shift, precision)
}

/// Maps a quantized level back to the 0-255 range, so that the top level is 255
#[inline]
fn level_to_channel(level: u8, precision: u8) -> u64 {
    let max_level = (1u64 << precision) - 1;
    (u64::from(level) * 255 + max_level / 2) / max_level
}

fn zeroed_counts(len: usize) -> Result<Vec<u32>, Error> {
    let mut counts = Vec::new();
    counts.try_reserve_exact(len)?;
    counts.resize(len, 0);
    Ok(counts)
}

fn count_rows<S: PixelSource + ?Sized>(counts: &mut [u32], image: &S, rows: Range<usize>, precision: u8) {
    for y in rows {
        for x in 0..image.width() {
            counts[pixel_index(image.pixel_at(x, y), precision)] += 1;
        }
    }
}

/// Flat population count over the quantized RGB cube
///
/// Built with a single pass over the image, read-only afterwards.
pub(crate) struct FrequencyTable {
    counts: Box<[u32]>,
    precision: u8,
    pixel_count: u32,
}

impl FrequencyTable {
    pub fn new<S: PixelSource + ?Sized>(image: &S, precision: u8) -> Result<Self, Error> {
        if !is_valid_precision(precision) {
            return Err(ValueOutOfRange);
        }
        let pixel_count = image.width().checked_mul(image.height())
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(ValueOutOfRange)?;

        let counts = zeroed_counts(table_len(precision))?;
        let mut table = Self { counts: counts.into_boxed_slice(), precision, pixel_count };
        table.count_pixels(image)?;
        debug_assert_eq!(u64::from(pixel_count), table.counts.iter().map(|&c| u64::from(c)).sum::<u64>());
        Ok(table)
    }

    #[cfg(not(feature = "threads"))]
    fn count_pixels<S: PixelSource + ?Sized>(&mut self, image: &S) -> Result<(), Error> {
        count_rows(&mut self.counts, image, 0..image.height(), self.precision);
        Ok(())
    }

    /// Each job counts into its own table, so there are at most as many tables as threads
    #[cfg(feature = "threads")]
    fn count_pixels<S: PixelSource + ?Sized>(&mut self, image: &S) -> Result<(), Error> {
        use rayon::prelude::*;

        let precision = self.precision;
        let len = self.counts.len();
        let height = image.height();
        let threads = rayon::current_num_threads();
        if threads < 2 || height < 2 || (self.pixel_count as usize) < len * 2 {
            count_rows(&mut self.counts, image, 0..height, precision);
            return Ok(());
        }

        let rows_per_job = (height + threads - 1) / threads;
        let partial = (0..height).into_par_iter()
            .with_min_len(rows_per_job)
            .fold(move || zeroed_counts(len), move |counts, y| {
                counts.map(|mut counts| {
                    count_rows(&mut counts, image, y..y + 1, precision);
                    counts
                })
            })
            .reduce_with(|a, b| {
                let (mut a, b) = (a?, b?);
                a.iter_mut().zip(b).for_each(|(a, b)| *a += b);
                Ok(a)
            });
        if let Some(partial) = partial {
            self.counts.iter_mut().zip(partial?).for_each(|(c, p)| *c += p);
        }
        Ok(())
    }

    #[inline(always)]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Width × height of the image the table was built from
    #[inline(always)]
    pub fn pixel_count(&self) -> u32 {
        self.pixel_count
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Number of distinct quantized colors
    pub fn cells_used(&self) -> usize {
        self.counts.iter().filter(|&&c| c != 0).count()
    }

    /// Visits every cell of the box, blue outermost, red innermost
    #[inline]
    fn for_each_cell(&self, mins: [u8; 3], maxs: [u8; 3], mut cb: impl FnMut([u8; 3], u32)) {
        for blue in mins[2]..=maxs[2] {
            for green in mins[1]..=maxs[1] {
                let row = cell_index(0, green, blue, self.precision);
                let counts = &self.counts[row + usize::from(mins[0])..=row + usize::from(maxs[0])];
                for (red, &count) in (mins[0]..=maxs[0]).zip(counts) {
                    cb([red, green, blue], count);
                }
            }
        }
    }

    /// Population of the box (inclusive bounds)
    pub fn box_total(&self, mins: [u8; 3], maxs: [u8; 3]) -> u32 {
        let mut sum = 0;
        self.for_each_cell(mins, maxs, |_, count| sum += count);
        sum
    }

    /// For each axis, population of every single-level slice of the box
    ///
    /// Levels outside of the box's range on that axis are 0.
    pub fn axis_totals(&self, mins: [u8; 3], maxs: [u8; 3]) -> AxisTotals {
        let mut totals = [[0; 256]; 3];
        self.for_each_cell(mins, maxs, |levels, count| {
            if count != 0 {
                for (axis, &level) in totals.iter_mut().zip(&levels) {
                    axis[usize::from(level)] += count;
                }
            }
        });
        totals
    }

    /// Population-weighted average of the box, packed as `0xRRGGBB`
    pub fn average_color(&self, mins: [u8; 3], maxs: [u8; 3], total: u32) -> u32 {
        debug_assert!(total > 0);
        let precision = self.precision;
        let mut sums = [0u64; 3];
        self.for_each_cell(mins, maxs, |levels, count| {
            if count != 0 {
                for (sum, &level) in sums.iter_mut().zip(&levels) {
                    *sum += u64::from(count) * level_to_channel(level, precision);
                }
            }
        });
        let total = u64::from(total);
        let [r, g, b] = sums.map(|sum| ((sum + total / 2) / total).min(255) as u32);
        (r << 16) | (g << 8) | b
    }
}

#[cfg(test)]
struct TestPixels(Vec<RGBA>);

#[cfg(test)]
impl PixelSource for TestPixels {
    fn width(&self) -> usize { self.0.len() }
    fn height(&self) -> usize { 1 }
    fn pixel_at(&self, x: usize, _: usize) -> RGBA { self.0[x] }
}

#[test]
fn index_layout() {
    assert_eq!(1 << 18, table_len(6));
    assert_eq!(1 << 24, table_len(8));
    assert_eq!((3 << 12) | (2 << 6) | 1, cell_index(1, 2, 3, 6));
    // top 6 bits of each channel
    assert_eq!(cell_index(63, 0, 1, 6), pixel_index(RGBA::new(255, 3, 4, 0), 6));
    assert_eq!(cell_index(255, 1, 0, 8), pixel_index(RGBA::new(255, 1, 0, 255), 8));
    assert_eq!(cell_index(1, 0, 1, 1), pixel_index(RGBA::new(128, 127, 200, 255), 1));
}

#[test]
fn levels() {
    assert_eq!(255, level_to_channel(63, 6));
    assert_eq!(0, level_to_channel(0, 6));
    assert_eq!(77, level_to_channel(77, 8));
    assert_eq!(255, level_to_channel(1, 1));
}

#[test]
fn counts_and_totals() {
    let img = TestPixels(vec![
        RGBA::new(255, 0, 0, 255),
        RGBA::new(255, 0, 0, 0),
        RGBA::new(0, 0, 255, 255),
        RGBA::new(0, 255, 0, 255),
    ]);
    let t = FrequencyTable::new(&img, 6).unwrap();
    assert_eq!(4, t.pixel_count());
    assert_eq!(3, t.cells_used());
    assert_eq!(4, t.box_total([0; 3], [63; 3]));
    assert_eq!(2, t.box_total([63, 0, 0], [63, 63, 63]));

    let axes = t.axis_totals([0; 3], [63; 3]);
    assert_eq!(2, axes[0][0]);
    assert_eq!(2, axes[0][63]);
    assert_eq!(3, axes[1][0]);
    assert_eq!(1, axes[2][63]);
    assert_eq!(4, axes[2].iter().sum::<u32>());

    assert_eq!(0xFF_0000, t.average_color([63, 0, 0], [63, 63, 63], 2));
    assert_eq!(0x00_00FF, t.average_color([0, 0, 1], [0, 63, 63], 1));
    // 2 red, 1 green, 1 blue
    assert_eq!(0x80_4040, t.average_color([0; 3], [63; 3], 4));
}

#[cfg(all(test, feature = "threads"))]
struct TestGrid(Vec<RGBA>);

#[cfg(all(test, feature = "threads"))]
impl PixelSource for TestGrid {
    fn width(&self) -> usize { 64 }
    fn height(&self) -> usize { self.0.len() / 64 }
    fn pixel_at(&self, x: usize, y: usize) -> RGBA { self.0[y * 64 + x] }
}

#[cfg(feature = "threads")]
#[test]
fn parallel_counts_match_sequential() {
    let img = TestGrid((0..64 * 64u32).map(|i| {
        let c = i.wrapping_mul(0x9E37_79B9);
        RGBA::new((c >> 24) as u8, (c >> 16) as u8, (c >> 8) as u8, 255)
    }).collect());

    for precision in [1, 3, 5] {
        let table = FrequencyTable::new(&img, precision).unwrap();
        let mut sequential = vec![0; table_len(precision)];
        count_rows(&mut sequential, &img, 0..img.height(), precision);
        assert_eq!(&sequential[..], &table.counts[..]);
    }
}

#[test]
fn bad_precision() {
    let img = TestPixels(vec![RGBA::new(0, 0, 0, 255)]);
    assert_eq!(Err(ValueOutOfRange), FrequencyTable::new(&img, 0).map(|_| ()));
    assert_eq!(Err(ValueOutOfRange), FrequencyTable::new(&img, 9).map(|_| ()));
}
