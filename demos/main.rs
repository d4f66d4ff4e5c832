// SPDX-License-Identifier: MIT OR Apache-2.0

use matchviz::opencv::highgui;
use matchviz::prelude::*;
use matchviz::{correspondence_points, draw_matches, extract_keypoint_sets};

/// Run an example matching two images given on the command line.
/// The demo displays two composites: one built from the default ratio-test
/// matches, one from a stricter matcher configuration.
fn main() -> Result<(), MatchVizError> {
    pretty_env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [im1, im2] = args.as_slice() else {
        eprintln!("usage: main <image-a> <image-b>");
        std::process::exit(1);
    };

    let now = std::time::Instant::now();
    let mut results = extract_keypoint_sets([im1, im2], &SiftParameters::default())?.into_iter();
    let (Some((img_a, set_a)), Some((img_b, set_b))) = (results.next(), results.next()) else {
        unreachable!("two input files yield two keypoint sets");
    };
    println!(
        "Extracted {}+{} keypoints in {:?}",
        set_a.len(),
        set_b.len(),
        now.elapsed()
    );

    let now = std::time::Instant::now();
    let matches = RatioTestMatcher::default().match_keypoints(&set_a, &set_b)?;
    let default_match_duration = now.elapsed();
    println!(
        "Calculated {} matches (default ratio) in {:?}",
        matches.len(),
        default_match_duration
    );
    let (points_a, points_b) = correspondence_points(&matches, &set_a, &set_b)?;
    let default_canvas = draw_matches(
        &img_a,
        &img_b,
        &points_a,
        &points_b,
        &DrawMatchesParameters::default(),
    )?;

    let now = std::time::Instant::now();
    let matches = RatioTestMatcher {
        match_ratio: 0.7,
        match_keep_ratio: 0.5,
    }
    .match_keypoints(&set_a, &set_b)?;
    let strict_match_duration = now.elapsed();
    println!(
        "Calculated {} matches (strict ratio) in {:?}",
        matches.len(),
        strict_match_duration
    );
    let (points_a, points_b) = correspondence_points(&matches, &set_a, &set_b)?;
    let strict_canvas = draw_matches(
        &img_a,
        &img_b,
        &points_a,
        &points_b,
        &DrawMatchesParameters {
            target_height: 600.0,
            ..Default::default()
        },
    )?;

    while highgui::wait_key(33)? != 27 {
        highgui::imshow(
            format!("Ratio test 0.9 [{default_match_duration:?}]").as_str(),
            &default_canvas,
        )?;
        highgui::imshow(
            format!("Ratio test 0.7 [{strict_match_duration:?}]").as_str(),
            &strict_canvas,
        )?;
    }
    Ok(())
}
