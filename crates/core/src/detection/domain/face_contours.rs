//! Keypoint-index paths outlining the face in the 468-point mesh topology.
//!
//! Closed contours repeat their first index at the end.

pub const FACE_OVAL: &[usize] = &[
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109, 10,
];

pub const LIPS_OUTER: &[usize] = &[
    61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 409, 270, 269, 267, 0, 37, 39, 40, 185, 61,
];

pub const LIPS_INNER: &[usize] = &[
    78, 95, 88, 178, 87, 14, 317, 402, 318, 324, 308, 415, 310, 311, 312, 13, 82, 81, 80, 191, 78,
];

pub const RIGHT_EYE: &[usize] = &[
    33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246, 33,
];

pub const LEFT_EYE: &[usize] = &[
    263, 249, 390, 373, 374, 380, 381, 382, 362, 398, 384, 385, 386, 387, 388, 466, 263,
];

pub const RIGHT_EYEBROW: &[usize] = &[156, 70, 63, 105, 66, 107, 55, 193];

pub const LEFT_EYEBROW: &[usize] = &[383, 300, 293, 334, 296, 336, 285, 417];

pub const ALL: &[&[usize]] = &[
    FACE_OVAL,
    LIPS_OUTER,
    LIPS_INNER,
    RIGHT_EYE,
    LEFT_EYE,
    RIGHT_EYEBROW,
    LEFT_EYEBROW,
];

/// The contour set as owned polylines, ready for a [`FaceMesh`].
///
/// [`FaceMesh`]: crate::detection::domain::face_mesh::FaceMesh
pub fn polylines() -> Vec<Vec<usize>> {
    ALL.iter().map(|path| path.to_vec()).collect()
}
