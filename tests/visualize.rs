// Integration tests for the side-by-side composite, run with
// `cargo test --test visualize`. Images are synthetic solid-color Mats so
// every expected dimension and pixel is known exactly.

use matchviz::opencv::core::{self, Mat, Point, Point2f, Scalar, Size};
use matchviz::opencv::prelude::*;
use matchviz::prelude::*;

fn solid(height: i32, width: i32, color: Scalar) -> Mat {
    Mat::new_rows_cols_with_default(height, width, core::CV_8UC3, color).unwrap()
}

fn pixel(canvas: &Mat, x: i32, y: i32) -> [u8; 3] {
    let p = canvas.at_2d::<core::Vec3b>(y, x).unwrap();
    [p[0], p[1], p[2]]
}

fn red() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

fn blue() -> Scalar {
    Scalar::new(255.0, 0.0, 0.0, 0.0)
}

// ===== Layout geometry =====

#[test]
fn layout_concrete_scenario() {
    // A = 400x300 (h x w), B = 800x600, target 800:
    // scale_to_align = 0.5, scale_to_fit = 2.0, both halves 600 wide.
    let layout = HorizontalLayout::new(Size::new(300, 400), Size::new(600, 800), 800.0).unwrap();
    assert_eq!(layout.scale_a, 2.0);
    assert_eq!(layout.scale_b, 1.0);
    assert_eq!(layout.size_a, Size::new(600, 800));
    assert_eq!(layout.size_b, Size::new(600, 800));
    assert_eq!(layout.offset_x, 600);
    assert_eq!(layout.canvas_size(), Size::new(1200, 800));
}

#[test]
fn layout_canvas_width_formula() {
    // width == round(w1 * T/h1) + round(w2 * (h1/h2) * (T/h1))
    let (h1, w1, h2, w2, t) = (333.0_f64, 517.0_f64, 741.0_f64, 289.0_f64, 800.0_f64);
    let layout =
        HorizontalLayout::new(Size::new(w1 as i32, h1 as i32), Size::new(w2 as i32, h2 as i32), t)
            .unwrap();
    let expected_w1 = (w1 * t / h1).round() as i32;
    let expected_w2 = (w2 * (h1 / h2) * (t / h1)).round() as i32;
    assert_eq!(layout.canvas_size().height, t.round() as i32);
    assert_eq!(layout.canvas_size().width, expected_w1 + expected_w2);
    assert_eq!(layout.offset_x, expected_w1);
}

#[test]
fn layout_point_mapping_rounds_half_away_from_zero() {
    let layout = HorizontalLayout::new(Size::new(300, 400), Size::new(600, 800), 800.0).unwrap();
    // scale_a = 2.0: 10.25 * 2 = 20.5 rounds up to 21.
    assert_eq!(layout.map_a(Point2f::new(10.25, 20.5)), Point::new(21, 41));
    // scale_b = 1.0: x is translated by offset_x, 12.5 rounds up to 13.
    assert_eq!(layout.map_b(Point2f::new(12.5, 7.25)), Point::new(613, 7));
}

#[test]
fn layout_rejects_zero_dimensions() {
    let err = HorizontalLayout::new(Size::new(0, 100), Size::new(10, 10), 800.0).unwrap_err();
    assert!(matches!(err, MatchVizError::InvalidDimensions(0, 100)));
    let err = HorizontalLayout::new(Size::new(10, 10), Size::new(10, 0), 800.0).unwrap_err();
    assert!(matches!(err, MatchVizError::InvalidDimensions(10, 0)));
}

#[test]
fn layout_rejects_non_positive_target_height() {
    let err = HorizontalLayout::new(Size::new(10, 10), Size::new(10, 10), 0.0).unwrap_err();
    assert!(matches!(err, MatchVizError::InvalidParams(_)));
}

// ===== Composite construction =====

#[test]
fn canvas_dimensions_and_image_placement() {
    let img_a = solid(400, 300, red());
    let img_b = solid(800, 600, blue());
    let canvas =
        draw_matches(&img_a, &img_b, &[], &[], &DrawMatchesParameters::default()).unwrap();

    let size = canvas.size().unwrap();
    assert_eq!(size, Size::new(1200, 800));
    // Left half is the scaled red image, right half the scaled blue one.
    assert_eq!(pixel(&canvas, 10, 10), [0, 0, 255]);
    assert_eq!(pixel(&canvas, 599, 799), [0, 0, 255]);
    assert_eq!(pixel(&canvas, 600, 0), [255, 0, 0]);
    assert_eq!(pixel(&canvas, 1199, 799), [255, 0, 0]);
}

#[test]
fn match_lines_end_at_mapped_points() {
    let img_a = solid(400, 300, red());
    let img_b = solid(800, 600, blue());
    let points_a = [Point2f::new(50.0, 100.0)];
    let points_b = [Point2f::new(80.0, 40.0)];
    let canvas = draw_matches(
        &img_a,
        &img_b,
        &points_a,
        &points_b,
        &DrawMatchesParameters::default(),
    )
    .unwrap();

    // scale_a = 2.0 and scale_b = 1.0 with offset 600 (see layout tests).
    assert_eq!(pixel(&canvas, 100, 200), [0, 255, 0]);
    assert_eq!(pixel(&canvas, 680, 40), [0, 255, 0]);
}

#[test]
fn identical_inputs_give_identical_canvases() {
    let img_a = solid(240, 320, red());
    let img_b = solid(480, 200, blue());
    let points_a = [Point2f::new(10.0, 20.0), Point2f::new(300.0, 100.0)];
    let points_b = [Point2f::new(5.0, 5.0), Point2f::new(150.0, 400.0)];
    let params = DrawMatchesParameters::default();

    let first = draw_matches(&img_a, &img_b, &points_a, &points_b, &params).unwrap();
    let second = draw_matches(&img_a, &img_b, &points_a, &points_b, &params).unwrap();
    assert_eq!(
        first.data_bytes().unwrap(),
        second.data_bytes().unwrap(),
        "composite must be deterministic"
    );
}

#[test]
fn out_of_range_points_are_drawn_without_error() {
    let img_a = solid(100, 100, red());
    let img_b = solid(100, 100, blue());
    // Way outside both source images; accepted, not an error.
    let points_a = [Point2f::new(5000.0, -300.0)];
    let points_b = [Point2f::new(-20.0, 9000.0)];
    let result = draw_matches(
        &img_a,
        &img_b,
        &points_a,
        &points_b,
        &DrawMatchesParameters::default(),
    );
    assert!(result.is_ok());
}

#[test]
fn custom_target_height_is_respected() {
    let img_a = solid(100, 100, red());
    let img_b = solid(100, 100, blue());
    let canvas = draw_matches(
        &img_a,
        &img_b,
        &[],
        &[],
        &DrawMatchesParameters {
            target_height: 250.0,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(canvas.size().unwrap(), Size::new(500, 250));
}

// ===== Fail-fast error cases =====

#[test]
fn mismatched_point_lists_are_rejected() {
    let img_a = solid(100, 100, red());
    let img_b = solid(100, 100, blue());
    let points_a = vec![Point2f::new(1.0, 1.0); 5];
    let points_b = vec![Point2f::new(1.0, 1.0); 3];
    let err = draw_matches(
        &img_a,
        &img_b,
        &points_a,
        &points_b,
        &DrawMatchesParameters::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        MatchVizError::CorrespondenceLengthMismatch(5, 3)
    ));
}

#[test]
fn zero_sized_image_is_rejected_before_resizing() {
    let img_a = Mat::default(); // 0x0
    let img_b = solid(100, 100, blue());
    let err = draw_matches(
        &img_a,
        &img_b,
        &[],
        &[],
        &DrawMatchesParameters::default(),
    )
    .unwrap_err();
    assert!(matches!(err, MatchVizError::InvalidDimensions(0, 0)));
}

// ===== Matcher plumbing =====

struct FixedMatcher(Vec<(usize, usize)>);

impl CorrespondenceMatcher for FixedMatcher {
    fn match_keypoints(
        &self,
        _query: &KeypointSet,
        _train: &KeypointSet,
    ) -> Result<Vec<(usize, usize)>, MatchVizError> {
        Ok(self.0.clone())
    }
}

fn keypoint_set(positions: &[(f32, f32)], size: Size) -> KeypointSet {
    let keypoints = positions
        .iter()
        .map(|&(x, y)| core::KeyPoint::new_coords(x, y, 1.0, -1.0, 0.0, 0, -1).unwrap())
        .collect();
    KeypointSet {
        keypoints,
        descriptors: Mat::default(),
        image_size: size,
    }
}

#[test]
fn correspondence_points_follow_match_indices() {
    let set_a = keypoint_set(&[(1.0, 2.0), (3.0, 4.0)], Size::new(100, 100));
    let set_b = keypoint_set(&[(5.0, 6.0), (7.0, 8.0)], Size::new(100, 100));
    let matches = FixedMatcher(vec![(1, 0)])
        .match_keypoints(&set_a, &set_b)
        .unwrap();

    let (points_a, points_b) = correspondence_points(&matches, &set_a, &set_b).unwrap();
    assert_eq!(points_a, vec![Point2f::new(3.0, 4.0)]);
    assert_eq!(points_b, vec![Point2f::new(5.0, 6.0)]);
}

#[test]
fn correspondence_points_reject_bad_indices() {
    let set_a = keypoint_set(&[(1.0, 2.0)], Size::new(100, 100));
    let set_b = keypoint_set(&[(5.0, 6.0)], Size::new(100, 100));
    let err = correspondence_points(&[(7, 0)], &set_a, &set_b).unwrap_err();
    assert!(matches!(err, MatchVizError::InvalidParams(_)));
}

#[test]
fn keypoint_set_parallel_sequences_are_index_aligned() {
    let set = keypoint_set(&[(1.5, 2.5), (3.5, 4.5)], Size::new(64, 64));
    assert_eq!(set.len(), 2);
    assert_eq!(set.positions()[1], Point2f::new(3.5, 4.5));
    assert_eq!(set.orientations().len(), 2);
    assert_eq!(set.scales(), vec![1.0, 1.0]);
}
