use crate::error::Error;
use crate::hist::{AxisTotals, FrequencyTable};
use crate::pal::{ColorBox, QuantizedPalette};
use crate::OrdFloat;
use arrayvec::ArrayVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Index into `MedianCutter::boxes`. Lower handles were created earlier.
type BoxHandle = usize;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum BoxState {
    /// Can still be picked for splitting
    Active,
    /// No valid split exists, but the box stays in the palette
    Exhausted,
    /// Replaced by its two halves
    Divided,
}

struct MBox {
    /// Inclusive bounds in quantized levels, red, green, blue
    mins: [u8; 3],
    maxs: [u8; 3],
    /// Pixels inside the bounds. Never 0 for a box that can be split.
    total: u32,
    state: BoxState,
}

/// Cut of one box into `[mins, slice]` and `[slice + 1, maxs]` along `axis`
#[derive(Copy, Clone, Debug)]
struct DivisionCandidate {
    axis: usize,
    slice: u8,
    /// Population of the lower part
    low_total: u32,
}

impl DivisionCandidate {
    /// 0 is a perfectly even split, approaching 1 is lopsided
    fn score(&self, total: u32) -> f64 {
        let a = self.low_total;
        let b = total - a;
        f64::from(a.abs_diff(b)) / f64::from(a.max(b))
    }
}

impl MBox {
    /// Two cuts per axis around the level where half of the population is reached
    fn division_candidates(&self, totals: &AxisTotals) -> ArrayVec<DivisionCandidate, 6> {
        let mut candidates = ArrayVec::new();
        for (axis, slices) in totals.iter().enumerate() {
            let (lo, hi) = (self.mins[axis], self.maxs[axis]);

            let mut sum = 0;
            let mut last = 0;
            let mut slice = u16::from(hi) + 1;
            for level in lo..=hi {
                last = slices[usize::from(level)];
                sum += last;
                if sum >= self.total / 2 {
                    slice = u16::from(level);
                    break;
                }
            }

            self.push_candidate(&mut candidates, axis, Some(slice), sum);
            self.push_candidate(&mut candidates, axis, slice.checked_sub(1), sum - last);
        }
        candidates
    }

    /// Both halves must be non-empty and the cut must leave at least one level on each side
    fn push_candidate(&self, candidates: &mut ArrayVec<DivisionCandidate, 6>, axis: usize, slice: Option<u16>, low_total: u32) {
        let slice = match slice {
            Some(s) if s >= u16::from(self.mins[axis]) && s < u16::from(self.maxs[axis]) => s as u8,
            _ => return,
        };
        if low_total == 0 || low_total >= self.total {
            return;
        }
        candidates.push(DivisionCandidate { axis, slice, low_total });
    }
}

struct MedianCutter<'table> {
    table: &'table FrequencyTable,
    /// Every box ever made, in creation order
    boxes: Vec<MBox>,
    /// Active boxes, most populated first, then oldest first
    active: BinaryHeap<(u32, Reverse<BoxHandle>)>,
    exhausted: usize,
    /// 0 = no limit
    target_colors: u32,
}

impl<'table> MedianCutter<'table> {
    fn new(table: &'table FrequencyTable, target_colors: u32) -> Self {
        let mut cutter = Self {
            table,
            boxes: Vec::new(),
            active: BinaryHeap::new(),
            exhausted: 0,
            target_colors,
        };
        let total = table.pixel_count();
        if total > 0 {
            let max_level = ((1u16 << table.precision()) - 1) as u8;
            cutter.push_active(MBox { mins: [0; 3], maxs: [max_level; 3], total, state: BoxState::Active });
        }
        cutter
    }

    fn push_active(&mut self, b: MBox) {
        debug_assert!(b.total > 0);
        debug_assert_eq!(b.total, self.table.box_total(b.mins, b.maxs));
        let handle = self.boxes.len();
        self.active.push((b.total, Reverse(handle)));
        self.boxes.push(b);
    }

    /// Boxes that will end up in the palette if cutting stopped now
    fn surviving_boxes(&self) -> usize {
        self.active.len() + self.exhausted
    }

    fn has_enough_colors(&self) -> bool {
        self.target_colors != 0 && self.surviving_boxes() >= self.target_colors as usize
    }

    fn cut(mut self) -> Self {
        while !self.has_enough_colors() {
            let handle = match self.take_best_splittable_box() {
                Some(h) => h,
                None => break,
            };

            match self.best_division(&self.boxes[handle]) {
                Some(dc) => self.split(handle, dc),
                None => {
                    self.boxes[handle].state = BoxState::Exhausted;
                    self.exhausted += 1;
                },
            }
        }
        self
    }

    fn take_best_splittable_box(&mut self) -> Option<BoxHandle> {
        self.active.pop().map(|(_, Reverse(handle))| {
            debug_assert_eq!(self.boxes[handle].state, BoxState::Active);
            handle
        })
    }

    fn best_division(&self, b: &MBox) -> Option<DivisionCandidate> {
        let totals = self.table.axis_totals(b.mins, b.maxs);
        b.division_candidates(&totals)
            .into_iter()
            .min_by_key(|dc| OrdFloat::new64(dc.score(b.total)))
    }

    fn split(&mut self, handle: BoxHandle, dc: DivisionCandidate) {
        let parent = &mut self.boxes[handle];
        parent.state = BoxState::Divided;
        let (mins, maxs, total) = (parent.mins, parent.maxs, parent.total);

        let mut low_maxs = maxs;
        low_maxs[dc.axis] = dc.slice;
        let mut high_mins = mins;
        high_mins[dc.axis] = dc.slice + 1;

        self.push_active(MBox { mins, maxs: low_maxs, total: dc.low_total, state: BoxState::Active });
        self.push_active(MBox { mins: high_mins, maxs, total: total - dc.low_total, state: BoxState::Active });
    }

    fn into_palette(self) -> Result<QuantizedPalette, Error> {
        let table = self.table;
        let mut boxes: Vec<ColorBox> = self.boxes.iter()
            .filter(|b| b.state != BoxState::Divided)
            .map(|b| ColorBox {
                mins: b.mins,
                maxs: b.maxs,
                total: b.total,
                color: table.average_color(b.mins, b.maxs, b.total),
            })
            .collect();
        sort_palette(&mut boxes);
        QuantizedPalette::new(boxes, table.precision())
    }
}

/// Ascending by average color. Stable, so equal colors stay in creation order.
fn sort_palette(boxes: &mut [ColorBox]) {
    boxes.sort_by_key(|b| b.color);
}

/// Splits the color cube into at most `target_colors` boxes of similar population (0 = as many as possible)
#[inline(never)]
pub(crate) fn mediancut(table: &FrequencyTable, target_colors: u32) -> Result<QuantizedPalette, Error> {
    MedianCutter::new(table, target_colors).cut().into_palette()
}

#[cfg(test)]
use crate::{image::PixelSource, pal::RGBA};

#[cfg(test)]
struct Row(Vec<RGBA>);

#[cfg(test)]
impl PixelSource for Row {
    fn width(&self) -> usize { self.0.len() }
    fn height(&self) -> usize { 1 }
    fn pixel_at(&self, x: usize, _: usize) -> RGBA { self.0[x] }
}

#[test]
fn candidates_around_median() {
    // red levels 0, 1, 2, 3 with 1, 1, 1, 5 pixels
    let mut px = vec![RGBA::new(0, 0, 0, 255), RGBA::new(1, 0, 0, 255), RGBA::new(2, 0, 0, 255)];
    px.extend(std::iter::repeat(RGBA::new(3, 0, 0, 255)).take(5));
    let table = FrequencyTable::new(&Row(px), 8).unwrap();
    let b = MBox { mins: [0; 3], maxs: [255; 3], total: 8, state: BoxState::Active };
    let c = b.division_candidates(&table.axis_totals(b.mins, b.maxs));

    // half of 8 is reached at level 3, which leaves nothing above it, so only the cut below it is valid
    assert_eq!(1, c.len());
    assert_eq!((0, 2, 3), (c[0].axis, c[0].slice, c[0].low_total));
    assert!((c[0].score(8) - 0.4).abs() < 1e-9);
}

#[test]
fn equal_scores_pick_first_axis() {
    // red and green are symmetric, blue can't be cut
    let px = vec![RGBA::new(0, 0, 0, 255), RGBA::new(255, 255, 0, 255)];
    let table = FrequencyTable::new(&Row(px), 6).unwrap();
    let cutter = MedianCutter::new(&table, 0);
    let b = &cutter.boxes[0];
    let c = b.division_candidates(&table.axis_totals(b.mins, b.maxs));
    assert_eq!(vec![(0, 0, 1), (1, 0, 1)], c.iter().map(|dc| (dc.axis, dc.slice, dc.low_total)).collect::<Vec<_>>());

    let best = cutter.best_division(b).unwrap();
    assert_eq!((0, 0), (best.axis, best.slice));
}

#[test]
fn equal_scores_pick_upper_cut() {
    // red levels 0, 1, 2 with 1, 2, 1 pixels: cutting after 1 or after 0 is equally lopsided
    let px = vec![RGBA::new(0, 0, 0, 255), RGBA::new(1, 0, 0, 255), RGBA::new(1, 0, 0, 255), RGBA::new(2, 0, 0, 255)];
    let table = FrequencyTable::new(&Row(px), 8).unwrap();
    let cutter = MedianCutter::new(&table, 0);
    let b = &cutter.boxes[0];
    let c = b.division_candidates(&table.axis_totals(b.mins, b.maxs));
    assert_eq!(2, c.len());
    assert_eq!(c[0].score(4), c[1].score(4));

    let best = cutter.best_division(b).unwrap();
    assert_eq!((0, 1, 3), (best.axis, best.slice, best.low_total));
}

#[test]
fn equal_colors_keep_creation_order() {
    let b = |total, color| ColorBox { mins: [0; 3], maxs: [0; 3], total, color };
    let mut boxes = vec![b(1, 0x50), b(2, 0x30), b(3, 0x50), b(4, 0x10), b(5, 0x50)];
    sort_palette(&mut boxes);
    assert_eq!(vec![4, 2, 1, 3, 5], boxes.iter().map(|b| b.total).collect::<Vec<_>>());
}

#[test]
fn single_color_is_exhausted() {
    let table = FrequencyTable::new(&Row(vec![RGBA::new(10, 20, 30, 255); 9]), 6).unwrap();
    let cutter = MedianCutter::new(&table, 0).cut();
    assert_eq!(1, cutter.exhausted);
    assert_eq!(1, cutter.boxes.len());
    let pal = cutter.into_palette().unwrap();
    assert_eq!(1, pal.len());
    assert_eq!(9, pal.boxes()[0].total());
}

#[test]
fn splits_until_target() {
    let px: Vec<_> = (0..64u8).map(|i| RGBA::new(i * 4, 255 - i * 4, i, 255)).collect();
    let table = FrequencyTable::new(&Row(px), 6).unwrap();
    for target in [1, 2, 7, 16] {
        let pal = mediancut(&table, target).unwrap();
        assert_eq!(target as usize, pal.len());
        assert_eq!(64, pal.boxes().iter().map(|b| b.total()).sum::<u32>());
        assert_eq!(1 << 18, pal.boxes().iter().map(|b| b.volume()).sum::<u32>());
    }
    // 64 distinct quantized colors can't make more than 64 boxes
    assert_eq!(64, mediancut(&table, 0).unwrap().len());
    assert_eq!(64, mediancut(&table, 1000).unwrap().len());
}

#[test]
fn ties_pick_oldest_box() {
    let table = FrequencyTable::new(&Row(vec![RGBA::new(0, 0, 0, 255); 2]), 6).unwrap();
    let mut cutter = MedianCutter::new(&table, 0);
    cutter.push_active(MBox { mins: [0; 3], maxs: [0; 3], total: 2, state: BoxState::Active });
    assert_eq!(Some(0), cutter.take_best_splittable_box());
    assert_eq!(Some(1), cutter.take_best_splittable_box());
    assert_eq!(None, cutter.take_best_splittable_box());
}

#[test]
fn empty_image() {
    let table = FrequencyTable::new(&Row(Vec::new()), 6).unwrap();
    assert!(mediancut(&table, 4).unwrap().is_empty());
}
