use super::{MatchVizError, SiftParameters};
use opencv::core::Mat;
use opencv::features2d::SIFT;
use opencv::imgcodecs;
use opencv::prelude::Feature2DTrait;

/// Safe wrapper around OpenCV's `imread` with proper error handling
///
/// This exists because:
/// 1. OpenCV's API requires a `&str` path rather than standard Rust `Path` types
/// 2. Paths might contain non-Unicode characters that need proper error handling
///
/// # Arguments
/// * `path` - Filesystem path to image (any type implementing `AsRef<Path>`)
/// * `flags` - OpenCV loading flags (e.g., `imgcodecs::IMREAD_COLOR`)
///
/// # Errors
/// Returns `MatchVizError::InvalidPathEncoding` if the path contains invalid
/// Unicode characters, and `MatchVizError::OpenCvError` on decode failures
/// (file not found, unsupported format, corrupted image data).
///
/// # Example
/// ```no_run
/// # use matchviz::{utils::imread, prelude::*, opencv::imgcodecs};
/// # fn a() -> Result<(), MatchVizError> {
/// let img = imread("image.jpg", imgcodecs::IMREAD_COLOR)?;
/// # Ok(()) }
/// ```
#[inline(always)]
pub fn imread<P: AsRef<std::path::Path>>(path: P, flags: i32) -> Result<Mat, MatchVizError> {
    let path_str = path
        .as_ref()
        .to_str()
        .ok_or_else(|| MatchVizError::InvalidPathEncoding(path.as_ref().to_path_buf()))?;
    Ok(imgcodecs::imread(path_str, flags)?)
}

/// Does a (key-points, descriptors) tuple of a Mat
pub(super) fn sift_detect_and_compute(
    img: &Mat,
    params: &SiftParameters,
) -> Result<(opencv::core::Vector<opencv::core::KeyPoint>, Mat), MatchVizError> {
    let mut sift = SIFT::create(
        params.nfeatures,
        3, // nOctaveLayers
        params.contrast_threshold,
        10.0, // edgeThreshold
        1.6,  // sigma
    )?;

    let mut kp = opencv::core::Vector::<opencv::core::KeyPoint>::new();
    let mut des = Mat::default();
    sift.detect_and_compute(img, &Mat::default(), &mut kp, &mut des, false)?;
    Ok((kp, des))
}
