// SPDX-License-Identifier: MIT OR Apache-2.0

//! Side-by-side keypoint match visualization,
//! based on OpenCV <https://crates.io/crates/opencv> and Rayon <https://crates.io/crates/rayon>.
//!
//! Two images of arbitrary (and possibly differing) dimensions are scaled to a
//! common display height, composited onto one canvas and connected with one
//! line per point correspondence. Keypoint detection (SIFT) and a brute-force
//! ratio-test matcher are included as boundary helpers; any matcher can be
//! plugged in through the [CorrespondenceMatcher] trait.

pub mod utils;

pub use opencv;
use opencv::core::{Mat, Point, Point2f, Rect, Scalar, Size, Vector};
use opencv::{core, features2d, imgcodecs, imgproc, prelude::*};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchVizError {
    #[error(transparent)]
    OpenCvError(#[from] opencv::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Invalid path encoding {0}")]
    InvalidPathEncoding(PathBuf),
    #[error("Invalid image dimensions {0}x{1} (width x height)")]
    InvalidDimensions(i32, i32),
    #[error("Correspondence length mismatch: {0} != {1}")]
    CorrespondenceLengthMismatch(usize, usize),
    #[error("Invalid parameter(s) {0}")]
    InvalidParams(String),
}

/// Parameters for SIFT keypoint detection.
///
/// These are forwarded verbatim to `opencv::features2d::SIFT`; the visualizer
/// core never interprets them.
#[derive(Debug, Clone, Copy)]
pub struct SiftParameters {
    /// Maximum number of features to retain per image.
    pub nfeatures: i32,

    /// Contrast threshold used to filter out weak features.
    /// Lower values keep more (and noisier) keypoints.
    pub contrast_threshold: f64,
}

impl Default for SiftParameters {
    fn default() -> Self {
        Self {
            nfeatures: 8000,
            contrast_threshold: 1e-5,
        }
    }
}

/// Keypoints and descriptors detected in a single image, together with the
/// size of that image.
///
/// The parallel-sequence accessors ([positions](KeypointSet::positions),
/// [orientations](KeypointSet::orientations), [scales](KeypointSet::scales))
/// expose the per-keypoint data in detection order, index-aligned with the
/// descriptor rows.
pub struct KeypointSet {
    pub keypoints: Vector<core::KeyPoint>,
    /// One descriptor row per keypoint, CV_32F for SIFT.
    pub descriptors: Mat,
    /// Size of the source image, used by batched matchers.
    pub image_size: Size,
}

impl KeypointSet {
    /// Keypoint positions (x, y) in the source image's coordinate space.
    pub fn positions(&self) -> Vec<Point2f> {
        self.keypoints.iter().map(|k| k.pt()).collect()
    }

    /// Keypoint orientations in degrees.
    pub fn orientations(&self) -> Vec<f32> {
        self.keypoints.iter().map(|k| k.angle()).collect()
    }

    /// Keypoint diameters.
    pub fn scales(&self) -> Vec<f32> {
        self.keypoints.iter().map(|k| k.size()).collect()
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Detects SIFT keypoints and computes their descriptors for one image.
///
/// The image is expected to be a color (`CV_8UC3`) Mat as returned by
/// `imread(..., IMREAD_COLOR)`. Fails with
/// [MatchVizError::InvalidDimensions] if the image has a zero width or
/// height.
pub fn extract_keypoints(
    img: &Mat,
    params: &SiftParameters,
) -> Result<KeypointSet, MatchVizError> {
    let image_size = img.size()?;
    if image_size.width <= 0 || image_size.height <= 0 {
        return Err(MatchVizError::InvalidDimensions(
            image_size.width,
            image_size.height,
        ));
    }
    let (keypoints, descriptors) = utils::sift_detect_and_compute(img, params)?;
    Ok(KeypointSet {
        keypoints,
        descriptors,
        image_size,
    })
}

/// Loads a list of image files and extracts a [KeypointSet] from each,
/// processing the files in parallel.
///
/// Returns the loaded images alongside their keypoint sets, in input order,
/// so callers can feed the same Mats to [draw_matches] without re-reading
/// them from disk.
///
/// # Example
/// ```rust,no_run
/// # use matchviz::prelude::*;
/// # fn f() -> Result<(), MatchVizError> {
/// let sets = matchviz::extract_keypoint_sets(
///     ["a.jpg", "b.jpg"],
///     &SiftParameters::default(),
/// )?;
/// for (_img, set) in &sets {
///     println!("{} keypoints", set.len());
/// }
/// # Ok(())}
/// ```
pub fn extract_keypoint_sets<I, P>(
    files: I,
    params: &SiftParameters,
) -> Result<Vec<(Mat, KeypointSet)>, MatchVizError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<std::path::Path>,
{
    let files: Vec<PathBuf> = files
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .collect();
    files
        .par_iter()
        .map(|f| {
            let img = utils::imread(f, imgcodecs::IMREAD_COLOR)?;
            let set = extract_keypoints(&img, params)?;
            Ok((img, set))
        })
        .collect()
}

/// Capability interface for correspondence matchers.
///
/// Given the keypoint sets of two images, an implementation returns index
/// pairs `(query_idx, train_idx)` of keypoints believed to depict the same
/// physical point. The visualizer never depends on a concrete matcher; an
/// external filter (e.g. AdaLAM) can be wired in behind this trait, with its
/// output converted to plain coordinates via [correspondence_points].
pub trait CorrespondenceMatcher {
    fn match_keypoints(
        &self,
        query: &KeypointSet,
        train: &KeypointSet,
    ) -> Result<Vec<(usize, usize)>, MatchVizError>;
}

/// Brute-force matcher with Lowe's ratio test.
///
/// Performs a k=2 knn match on the descriptors (L2 norm, suitable for SIFT),
/// keeps matches whose best distance is below `match_ratio` times the
/// second-best, sorts by distance and retains the best `match_keep_ratio`
/// fraction.
#[derive(Debug, Clone, Copy)]
pub struct RatioTestMatcher {
    /// Lowe's ratio test threshold: how similar the best and second-best
    /// matches may be. Common values range from 0.7 to 0.9.
    pub match_ratio: f32,

    /// Ratio of best matches to keep after sorting by distance.
    /// Common values range from 0.5 to 0.8.
    pub match_keep_ratio: f32,
}

impl Default for RatioTestMatcher {
    fn default() -> Self {
        Self {
            match_ratio: 0.9,
            match_keep_ratio: 0.8,
        }
    }
}

impl CorrespondenceMatcher for RatioTestMatcher {
    fn match_keypoints(
        &self,
        query: &KeypointSet,
        train: &KeypointSet,
    ) -> Result<Vec<(usize, usize)>, MatchVizError> {
        if query.is_empty() || train.is_empty() {
            return Ok(Vec::new());
        }

        let mut matcher = features2d::BFMatcher::create(core::NORM_L2, false)?; // false for knn_match
        matcher.add(&train.descriptors)?;
        let mut knn_matches = Vector::<Vector<core::DMatch>>::new();
        matcher.knn_match(
            &query.descriptors,
            &mut knn_matches,
            2,               // k (2 best matches per descriptor)
            &Mat::default(), // mask (no filtering here)
            false,           // compact_result
        )?;

        let mut filtered_matches = knn_matches
            .iter()
            .filter_map(|m| {
                if m.len() == 2
                    && m.get(0).unwrap().distance < self.match_ratio * m.get(1).unwrap().distance
                {
                    Some(m.get(0).unwrap())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        // Sort by distance
        filtered_matches.sort_by(|a, b| OrderedFloat(a.distance).cmp(&OrderedFloat(b.distance)));

        let num_to_keep = (filtered_matches.len() as f32 * self.match_keep_ratio).round() as usize;
        filtered_matches.truncate(num_to_keep);

        Ok(filtered_matches
            .iter()
            .map(|m| (m.query_idx as usize, m.train_idx as usize))
            .collect())
    }
}

/// Converts matcher index pairs into the two flat coordinate lists consumed
/// by [draw_matches].
///
/// Fails with [MatchVizError::InvalidParams] if an index does not refer to a
/// keypoint of the respective set.
pub fn correspondence_points(
    matches: &[(usize, usize)],
    query: &KeypointSet,
    train: &KeypointSet,
) -> Result<(Vec<Point2f>, Vec<Point2f>), MatchVizError> {
    let mut points_a = Vec::with_capacity(matches.len());
    let mut points_b = Vec::with_capacity(matches.len());
    for &(query_idx, train_idx) in matches {
        let ka = query.keypoints.get(query_idx).map_err(|_| {
            MatchVizError::InvalidParams(format!("query index {query_idx} out of range"))
        })?;
        let kb = train.keypoints.get(train_idx).map_err(|_| {
            MatchVizError::InvalidParams(format!("train index {train_idx} out of range"))
        })?;
        points_a.push(ka.pt());
        points_b.push(kb.pt());
    }
    Ok((points_a, points_b))
}

/// Parameters for the composite match visualizer.
#[derive(Debug, Clone, Copy)]
pub struct DrawMatchesParameters {
    /// Height of the output canvas in pixels. Default: 800.
    pub target_height: f64,

    /// Color of the correspondence lines (BGR). Default: green.
    pub line_color: Scalar,

    /// Canvas background color (BGR). Default: white.
    /// Only visible where neither scaled image covers the canvas.
    pub background: Scalar,

    /// Line thickness in pixels. Default: 1.
    pub line_thickness: i32,
}

impl Default for DrawMatchesParameters {
    fn default() -> Self {
        Self {
            target_height: 800.0,
            line_color: Scalar::new(0.0, 255.0, 0.0, 0.0),
            background: Scalar::all(255.0),
            line_thickness: 1,
        }
    }
}

/// Geometry of a side-by-side composite: two images scaled to a common
/// display height and placed next to each other.
///
/// Image B's height is first aligned to image A's (`scale_to_align`,
/// preserving B's aspect ratio relative to A), then both are scaled so the
/// composite ends up `target_height` pixels tall (`scale_to_fit`). All
/// rounding is half-away-from-zero (`f64::round`), applied uniformly to
/// scaled sizes and mapped points.
///
/// ```
/// # use matchviz::{HorizontalLayout, MatchVizError};
/// # use matchviz::opencv::core::Size;
/// # fn f() -> Result<(), MatchVizError> {
/// // A is 400 high, 300 wide; B is 800 high, 600 wide.
/// let layout = HorizontalLayout::new(Size::new(300, 400), Size::new(600, 800), 800.0)?;
/// assert_eq!(layout.size_a, Size::new(600, 800));
/// assert_eq!(layout.size_b, Size::new(600, 800));
/// assert_eq!(layout.canvas_size(), Size::new(1200, 800));
/// assert_eq!(layout.offset_x, 600);
/// # Ok(())}
/// # f().unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalLayout {
    /// Scale applied to image A and its points (`scale_to_fit`).
    pub scale_a: f64,
    /// Scale applied to image B and its points
    /// (`scale_to_fit * scale_to_align`).
    pub scale_b: f64,
    /// Display size of scaled image A.
    pub size_a: Size,
    /// Display size of scaled image B.
    pub size_b: Size,
    /// Horizontal offset of image B on the canvas (== `size_a.width`).
    pub offset_x: i32,
}

impl HorizontalLayout {
    /// Computes the layout for two source image sizes and a display height.
    ///
    /// Fails with [MatchVizError::InvalidDimensions] if either size has a
    /// non-positive width or height, and with
    /// [MatchVizError::InvalidParams] if `target_height` is not positive.
    pub fn new(size_a: Size, size_b: Size, target_height: f64) -> Result<Self, MatchVizError> {
        for size in [size_a, size_b] {
            if size.width <= 0 || size.height <= 0 {
                return Err(MatchVizError::InvalidDimensions(size.width, size.height));
            }
        }
        if target_height <= 0.0 {
            return Err(MatchVizError::InvalidParams(format!(
                "target_height must be positive, got {target_height}"
            )));
        }

        let scale_to_align = size_a.height as f64 / size_b.height as f64;
        let scale_to_fit = target_height / size_a.height as f64;
        let scale_a = scale_to_fit;
        let scale_b = scale_to_fit * scale_to_align;

        let target_h = target_height.round() as i32;
        let size_a = Size::new((size_a.width as f64 * scale_a).round() as i32, target_h);
        let size_b = Size::new((size_b.width as f64 * scale_b).round() as i32, target_h);

        Ok(Self {
            scale_a,
            scale_b,
            size_a,
            size_b,
            offset_x: size_a.width,
        })
    }

    /// Size of the composite canvas holding both scaled images.
    pub fn canvas_size(&self) -> Size {
        Size::new(
            self.size_a.width + self.size_b.width,
            self.size_a.height.max(self.size_b.height),
        )
    }

    /// Maps a point from image A's coordinate space to the canvas.
    pub fn map_a(&self, p: Point2f) -> Point {
        Point::new(
            (p.x as f64 * self.scale_a).round() as i32,
            (p.y as f64 * self.scale_a).round() as i32,
        )
    }

    /// Maps a point from image B's coordinate space to the canvas.
    pub fn map_b(&self, p: Point2f) -> Point {
        Point::new(
            (p.x as f64 * self.scale_b).round() as i32 + self.offset_x,
            (p.y as f64 * self.scale_b).round() as i32,
        )
    }
}

/// Composites two images side by side at a common display height and draws
/// one line per point correspondence.
///
/// `points_a[i]` and `points_b[i]` form correspondence `i`, each in the
/// coordinate space of its own source image. Both images are resized with
/// area-averaging interpolation (`INTER_AREA`), which is artifact-free when
/// downscaling; upscaled images come out soft, a known limitation.
///
/// The mapping of points onto the canvas is purely affine (scale plus
/// translation) and performs no clipping: a point outside its image's bounds
/// is drawn where the affine map puts it, which may be outside the visible
/// canvas. Such points are reported at debug level and are not an error.
///
/// The output is a freshly allocated `CV_8UC3` canvas; the inputs are never
/// mutated, and identical inputs produce pixel-identical canvases.
///
/// # Errors
/// - [MatchVizError::CorrespondenceLengthMismatch] if the point lists differ
///   in length.
/// - [MatchVizError::InvalidDimensions] if either image has a zero width or
///   height.
///
/// Both are detected before any canvas allocation.
///
/// # Example
/// ```rust,no_run
/// # use matchviz::prelude::*;
/// # fn f() -> Result<(), MatchVizError> {
/// let params = SiftParameters::default();
/// let mut sets = matchviz::extract_keypoint_sets(["a.jpg", "b.jpg"], &params)?.into_iter();
/// let ((img_a, set_a), (img_b, set_b)) = (sets.next().unwrap(), sets.next().unwrap());
/// let matches = RatioTestMatcher::default().match_keypoints(&set_a, &set_b)?;
/// let (points_a, points_b) = matchviz::correspondence_points(&matches, &set_a, &set_b)?;
/// let canvas = matchviz::draw_matches(
///     &img_a,
///     &img_b,
///     &points_a,
///     &points_b,
///     &DrawMatchesParameters::default(),
/// )?;
/// # Ok(())}
/// ```
pub fn draw_matches(
    img_a: &Mat,
    img_b: &Mat,
    points_a: &[Point2f],
    points_b: &[Point2f],
    params: &DrawMatchesParameters,
) -> Result<Mat, MatchVizError> {
    if points_a.len() != points_b.len() {
        return Err(MatchVizError::CorrespondenceLengthMismatch(
            points_a.len(),
            points_b.len(),
        ));
    }

    let layout = HorizontalLayout::new(img_a.size()?, img_b.size()?, params.target_height)?;

    let mut scaled_a = Mat::default();
    imgproc::resize(
        img_a,
        &mut scaled_a,
        layout.size_a,
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;
    let mut scaled_b = Mat::default();
    imgproc::resize(
        img_b,
        &mut scaled_b,
        layout.size_b,
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;

    let canvas_size = layout.canvas_size();
    let mut canvas = Mat::new_rows_cols_with_default(
        canvas_size.height,
        canvas_size.width,
        core::CV_8UC3,
        params.background,
    )?;

    {
        let mut roi = Mat::roi_mut(
            &mut canvas,
            Rect::new(0, 0, layout.size_a.width, layout.size_a.height),
        )?;
        scaled_a.copy_to(&mut roi)?;
    }
    {
        let mut roi = Mat::roi_mut(
            &mut canvas,
            Rect::new(
                layout.offset_x,
                0,
                layout.size_b.width,
                layout.size_b.height,
            ),
        )?;
        scaled_b.copy_to(&mut roi)?;
    }

    let bounds = Rect::new(0, 0, canvas_size.width, canvas_size.height);
    for (i, (&pa, &pb)) in points_a.iter().zip(points_b).enumerate() {
        let pa = layout.map_a(pa);
        let pb = layout.map_b(pb);
        if !bounds.contains(pa) || !bounds.contains(pb) {
            log::debug!("correspondence {i} maps outside the canvas: {pa:?} -> {pb:?}");
        }
        imgproc::line(
            &mut canvas,
            pa,
            pb,
            params.line_color,
            params.line_thickness,
            imgproc::LINE_8,
            0,
        )?;
    }

    Ok(canvas)
}

pub mod prelude {
    pub use super::{
        CorrespondenceMatcher, DrawMatchesParameters, HorizontalLayout, KeypointSet,
        MatchVizError, RatioTestMatcher, SiftParameters, correspondence_points, draw_matches,
        extract_keypoint_sets, extract_keypoints,
    };
}
