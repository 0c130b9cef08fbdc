//! Multi-scale sliding-window object detection and grouping of raw hits

use image::{GrayImage, RgbImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::cascade::{Cascade, CascadeEvaluator};
use super::energy::Luminance;
use super::geometry::Rectangle;
use super::integral::IntegralTables;
use crate::utils::{format_duration, verbose_println};

/// Tuning of the detection scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectorParams {
    /// Scale of the first pass
    pub base_scale: f64,
    /// Multiplicative growth of the window between passes
    pub scale_step: f64,
    /// Raw hits a group needs to survive
    pub min_neighbors: usize,
    /// Relative tolerance when merging near-duplicate hits
    pub grouping_epsilon: f64,
    /// Nearest-neighbour rescale applied to the canvas before scanning
    pub canvas_scale: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            base_scale: 1.0,
            scale_step: 1.2,
            min_neighbors: 1,
            grouping_epsilon: 0.2,
            canvas_scale: 1.0,
        }
    }
}

/// Luminance buffer with its integral tables
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<f64>,
    tables: IntegralTables,
}

impl Canvas {
    pub fn from_luminance(width: u32, height: u32, data: Vec<f64>) -> Self {
        let tables = IntegralTables::new(width, height, &data);
        if tables.is_empty() {
            return Self::default();
        }

        Self {
            width,
            height,
            data,
            tables,
        }
    }

    pub fn from_rgb(img: &RgbImage) -> Self {
        let data = img.pixels().map(|p| p.luminance()).collect();
        Self::from_luminance(img.width(), img.height(), data)
    }

    pub fn from_gray(img: &GrayImage) -> Self {
        let data = img.pixels().map(|p| p.luminance()).collect();
        Self::from_luminance(img.width(), img.height(), data)
    }

    /// Nearest-neighbour resample by `factor`; tables are rebuilt for the new size
    pub fn rescaled(&self, factor: f64) -> Self {
        if self.is_empty() || !(factor > 0.0) {
            return Self::default();
        }

        let new_width = (self.width as f64 * factor).floor() as u32;
        let new_height = (self.height as f64 * factor).floor() as u32;
        let src_width = self.width as usize;

        let mut data = vec![0.0; new_width as usize * new_height as usize];
        for y in 0..new_height {
            let src_y = (y as f64 / factor).floor() as u32;
            for x in 0..new_width {
                let src_x = (x as f64 / factor).floor() as u32;
                if src_x < self.width && src_y < self.height {
                    data[(y * new_width + x) as usize] =
                        self.data[src_y as usize * src_width + src_x as usize];
                }
            }
        }

        Self::from_luminance(new_width, new_height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tables(&self) -> &IntegralTables {
        &self.tables
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

pub struct ObjectDetector {
    params: DetectorParams,
    verbose: bool,
}

impl ObjectDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self {
            params,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Build the scan canvas for an image, applying `canvas_scale`
    pub fn prepare(&self, img: &RgbImage) -> Canvas {
        let canvas = Canvas::from_rgb(img);
        if self.params.canvas_scale != 1.0 {
            canvas.rescaled(self.params.canvas_scale)
        } else {
            canvas
        }
    }

    /// Window scales visited by one scan, smallest first
    fn scan_scales(&self, canvas: &Canvas, cascade: &Cascade) -> Vec<f64> {
        let mut scales = Vec::new();
        if !(self.params.base_scale > 0.0) {
            return scales;
        }

        let width = canvas.width() as f64;
        let height = canvas.height() as f64;
        let base_width = cascade.base_width() as f64;
        let base_height = cascade.base_height() as f64;

        let mut scale = self.params.base_scale;
        while scale * base_width < width && scale * base_height < height {
            scales.push(scale);
            if !(self.params.scale_step > 1.0) {
                break;
            }
            scale *= self.params.scale_step;
        }

        scales
    }

    /// Slide one window size across the canvas and collect accepted windows
    fn scan(&self, canvas: &Canvas, cascade: &Cascade, scale: f64) -> Vec<Rectangle> {
        let evaluator = CascadeEvaluator::new(cascade, canvas.tables());

        let window_width = (cascade.base_width() as f64 * scale).floor() as u32;
        let window_height = (cascade.base_height() as f64 * scale).floor() as u32;
        let step = ((scale * 2.0).floor() as usize).max(1);

        let mut hits = Vec::new();
        for y in (0..=canvas.height() - window_height).step_by(step) {
            for x in (0..=canvas.width() - window_width).step_by(step) {
                if evaluator.evaluate(x, y, scale) {
                    hits.push(Rectangle::new(x, y, window_width, window_height));
                }
            }
        }

        hits
    }

    /// Run one cascade over every scale and group the raw hits.
    ///
    /// Scales are scanned in parallel; hits keep scale order.
    pub fn detect(&self, canvas: &Canvas, cascade: &Cascade) -> Vec<Rectangle> {
        if canvas.is_empty() || cascade.is_empty() {
            return Vec::new();
        }

        let scales = self.scan_scales(canvas, cascade);
        let raw: Vec<Rectangle> = scales
            .par_iter()
            .map(|&scale| self.scan(canvas, cascade, scale))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();

        let grouped = group_rectangles(
            &raw,
            self.params.min_neighbors,
            self.params.grouping_epsilon,
        );

        verbose_println(
            self.verbose,
            &format!(
                "Detection on {}x{}: {} scales, {} raw hits, {} grouped",
                canvas.width(),
                canvas.height(),
                scales.len(),
                raw.len(),
                grouped.len()
            ),
        );

        grouped
    }

    /// Run several cascades in order and concatenate their detections.
    ///
    /// With a budget, a later cascade only runs while less than half of the
    /// budget has been spent. A pass in progress always completes.
    pub fn detect_all(
        &self,
        canvas: &Canvas,
        cascades: &[&Cascade],
        budget: Option<Duration>,
    ) -> Vec<Rectangle> {
        let start = Instant::now();
        let mut detections = Vec::new();

        for (index, cascade) in cascades.iter().enumerate() {
            if index > 0 {
                if let Some(budget) = budget {
                    let elapsed = start.elapsed();
                    if elapsed >= budget / 2 {
                        verbose_println(
                            self.verbose,
                            &format!(
                                "Skipping {} remaining cascade(s): {} spent of {} budget",
                                cascades.len() - index,
                                format_duration(elapsed),
                                format_duration(budget)
                            ),
                        );
                        break;
                    }
                }
            }

            detections.extend(self.detect(canvas, cascade));
        }

        detections
    }
}

fn is_close(a: &Rectangle, b: &Rectangle, epsilon: f64) -> bool {
    let dx = (a.x as f64 - b.x as f64).abs();
    let dy = (a.y as f64 - b.y as f64).abs();
    let dw = (a.width as f64 - b.width as f64).abs();
    let dh = (a.height as f64 - b.height as f64).abs();

    let avg_width = (a.width as f64 + b.width as f64) / 2.0;
    let avg_height = (a.height as f64 + b.height as f64) / 2.0;

    dx <= epsilon * avg_width
        && dy <= epsilon * avg_height
        && dw <= epsilon * avg_width
        && dh <= epsilon * avg_height
}

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }

        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
    }
}

/// Cluster near-duplicate rectangles.
///
/// Every close pair is joined, so groups are the transitive closure of the
/// closeness relation. Groups smaller than `min_neighbors` are dropped and
/// the rest collapse to their component-wise floor average, ordered by the
/// first member's position in `rects`.
pub fn group_rectangles(rects: &[Rectangle], min_neighbors: usize, epsilon: f64) -> Vec<Rectangle> {
    if rects.is_empty() {
        return Vec::new();
    }

    let mut sets = DisjointSet::new(rects.len());
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if is_close(&rects[i], &rects[j], epsilon) {
                sets.union(i, j);
            }
        }
    }

    // root -> index into `groups`, in order of first appearance
    let mut slots: Vec<Option<usize>> = vec![None; rects.len()];
    let mut groups: Vec<Vec<&Rectangle>> = Vec::new();
    for (index, rect) in rects.iter().enumerate() {
        let root = sets.find(index);
        let slot = *slots[root].get_or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(rect);
    }

    groups
        .into_iter()
        .filter(|members| members.len() >= min_neighbors)
        .map(|members| {
            let count = members.len() as u64;
            let total = members.iter().fold([0u64; 4], |mut acc, r| {
                acc[0] += r.x as u64;
                acc[1] += r.y as u64;
                acc[2] += r.width as u64;
                acc[3] += r.height as u64;
                acc
            });
            Rectangle::new(
                (total[0] / count) as u32,
                (total[1] / count) as u32,
                (total[2] / count) as u32,
                (total[3] / count) as u32,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::cascade::tests::accepting_cascade;
    use image::{ImageBuffer, Rgb};

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 37 + y * 11) % 256) as u8,
                ((x * 7 + y * 53) % 256) as u8,
                ((x + y) % 256) as u8,
            ])
        })
    }

    #[test]
    fn test_grouping_merges_close_rectangles() {
        let rects = [
            Rectangle::new(10, 10, 20, 20),
            Rectangle::new(11, 11, 21, 19),
            Rectangle::new(100, 100, 20, 20),
        ];
        let groups = group_rectangles(&rects, 1, 0.2);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], Rectangle::new(10, 10, 20, 19));
        assert_eq!(groups[1], Rectangle::new(100, 100, 20, 20));
    }

    #[test]
    fn test_grouping_is_transitive() {
        // a~b and b~c but a is not close to c
        let rects = [
            Rectangle::new(0, 0, 20, 20),
            Rectangle::new(4, 0, 20, 20),
            Rectangle::new(8, 0, 20, 20),
        ];
        assert!(!is_close(&rects[0], &rects[2], 0.2));

        let groups = group_rectangles(&rects, 1, 0.2);
        assert_eq!(groups, vec![Rectangle::new(4, 0, 20, 20)]);

        let reversed: Vec<Rectangle> = rects.iter().rev().copied().collect();
        assert_eq!(group_rectangles(&reversed, 1, 0.2), groups);
    }

    #[test]
    fn test_grouping_min_neighbors() {
        let rects = [
            Rectangle::new(10, 10, 20, 20),
            Rectangle::new(11, 11, 20, 20),
            Rectangle::new(100, 100, 20, 20),
        ];
        let groups = group_rectangles(&rects, 2, 0.2);
        assert_eq!(groups, vec![Rectangle::new(10, 10, 20, 20)]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(group_rectangles(&[], 1, 0.2).is_empty());

        let detector = ObjectDetector::new(DetectorParams::default());
        let cascade = accepting_cascade(4, 4);
        assert!(detector.detect(&Canvas::default(), &cascade).is_empty());

        let canvas = Canvas::from_rgb(&create_test_image(32, 32));
        let empty = Cascade {
            size: (4, 4),
            stages: Vec::new(),
        };
        assert!(detector.detect(&canvas, &empty).is_empty());
    }

    #[test]
    fn test_unreachable_threshold_yields_nothing() {
        let mut cascade = accepting_cascade(8, 8);
        cascade.stages[0].threshold = f64::INFINITY;

        let detector = ObjectDetector::new(DetectorParams::default());
        let canvas = Canvas::from_rgb(&create_test_image(64, 48));
        assert!(detector.detect(&canvas, &cascade).is_empty());
    }

    #[test]
    fn test_accepting_cascade_finds_windows_inside_canvas() {
        let cascade = accepting_cascade(8, 8);
        let detector = ObjectDetector::new(DetectorParams::default());
        let canvas = Canvas::from_rgb(&create_test_image(40, 30));

        let detections = detector.detect(&canvas, &cascade);
        assert!(!detections.is_empty());
        for rect in &detections {
            assert!(rect.right() <= 40);
            assert!(rect.bottom() <= 30);
        }
    }

    #[test]
    fn test_scan_scales_stop_at_canvas_size() {
        let cascade = accepting_cascade(10, 10);
        let detector = ObjectDetector::new(DetectorParams::default());
        let canvas = Canvas::from_rgb(&create_test_image(30, 20));

        let scales = detector.scan_scales(&canvas, &cascade);
        // 1.0, 1.2, 1.44, 1.728; 2.0736 * 10 is no longer below 20
        assert_eq!(scales.len(), 4);
        assert!(scales.iter().all(|s| s * 10.0 < 20.0));
    }

    #[test]
    fn test_non_growing_scale_step_scans_once() {
        let cascade = accepting_cascade(4, 4);
        let params = DetectorParams {
            scale_step: 1.0,
            ..DetectorParams::default()
        };
        let detector = ObjectDetector::new(params);
        let canvas = Canvas::from_rgb(&create_test_image(16, 16));

        assert_eq!(detector.scan_scales(&canvas, &cascade), vec![1.0]);
    }

    #[test]
    fn test_canvas_rescale() {
        let canvas = Canvas::from_luminance(4, 2, (0..8).map(|v| v as f64).collect());
        let half = canvas.rescaled(0.5);

        assert_eq!((half.width(), half.height()), (2, 1));
        // pixels (0,0) and (2,0) survive
        assert_eq!(half.tables().rect_sum(0.0, 0.0, 2.0, 1.0), 2.0);

        let double = canvas.rescaled(2.0);
        assert_eq!((double.width(), double.height()), (8, 4));
        assert_eq!(double.tables().rect_sum(0.0, 0.0, 8.0, 4.0), 4.0 * 28.0);
    }

    #[test]
    fn test_canvas_from_gray_and_rgb_agree() {
        let gray = GrayImage::from_fn(6, 4, |x, y| image::Luma([(x * 40 + y) as u8]));
        let rgb = RgbImage::from_fn(6, 4, |x, y| {
            let v = (x * 40 + y) as u8;
            Rgb([v, v, v])
        });

        let from_gray = Canvas::from_gray(&gray);
        let from_rgb = Canvas::from_rgb(&rgb);
        assert_eq!((from_gray.width(), from_gray.height()), (6, 4));

        let gray_sum = from_gray.tables().rect_sum(0.0, 0.0, 6.0, 4.0);
        let rgb_sum = from_rgb.tables().rect_sum(0.0, 0.0, 6.0, 4.0);
        assert!((gray_sum - rgb_sum).abs() < 1e-6);
        assert!(Canvas::from_gray(&GrayImage::new(0, 0)).is_empty());
    }

    #[test]
    fn test_prepare_applies_canvas_scale() {
        let params = DetectorParams {
            canvas_scale: 0.5,
            ..DetectorParams::default()
        };
        let detector = ObjectDetector::new(params);
        let canvas = detector.prepare(&create_test_image(40, 30));
        assert_eq!((canvas.width(), canvas.height()), (20, 15));
    }

    #[test]
    fn test_budget_skips_later_cascades() {
        let first = accepting_cascade(8, 8);
        let mut second = accepting_cascade(8, 8);
        second.stages[0].threshold = 0.5;

        let detector = ObjectDetector::new(DetectorParams::default());
        let canvas = Canvas::from_rgb(&create_test_image(40, 30));

        let alone = detector.detect(&canvas, &first);
        let both = detector.detect_all(&canvas, &[&first, &second], None);
        assert_eq!(both.len(), alone.len() * 2);

        // A zero budget is already half spent after the first pass
        let budgeted = detector.detect_all(&canvas, &[&first, &second], Some(Duration::ZERO));
        assert_eq!(budgeted, alone);
    }
}
