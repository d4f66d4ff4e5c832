use matchviz::opencv::highgui::{imshow, wait_key};
use matchviz::prelude::*;
use matchviz::{correspondence_points, draw_matches, extract_keypoint_sets};

fn main() -> Result<(), MatchVizError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [im1, im2] = args.as_slice() else {
        eprintln!("usage: matchviz <image-a> <image-b>");
        std::process::exit(1);
    };

    let mut results = extract_keypoint_sets([im1, im2], &SiftParameters::default())?.into_iter();
    let (Some((img_a, set_a)), Some((img_b, set_b))) = (results.next(), results.next()) else {
        unreachable!("two input files yield two keypoint sets");
    };
    println!("{} / {} keypoints detected", set_a.len(), set_b.len());

    let matches = RatioTestMatcher::default().match_keypoints(&set_a, &set_b)?;
    println!("{} matches kept", matches.len());

    let (points_a, points_b) = correspondence_points(&matches, &set_a, &set_b)?;
    let canvas = draw_matches(
        &img_a,
        &img_b,
        &points_a,
        &points_b,
        &DrawMatchesParameters::default(),
    )?;

    while wait_key(33)? != 27 {
        imshow("matchviz", &canvas)?;
    }
    Ok(())
}
