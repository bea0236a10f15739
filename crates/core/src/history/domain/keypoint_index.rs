use crate::shared::constants::KEYPOINT_COUNT;

/// A landmark index known to be inside the 468-point mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeypointIndex(usize);

impl KeypointIndex {
    pub const MAX: KeypointIndex = KeypointIndex(KEYPOINT_COUNT - 1);

    /// `None` for any index outside `0..KEYPOINT_COUNT`, negative ones included.
    pub fn new<I: TryInto<usize>>(index: I) -> Option<Self> {
        let index = index.try_into().ok()?;
        (index < KEYPOINT_COUNT).then_some(Self(index))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for KeypointIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
