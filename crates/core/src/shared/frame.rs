use ndarray::{ArrayView3, ArrayViewMut3};

/// One captured video frame: packed RGB24 bytes, row-major.
///
/// `index` is the capture sequence number assigned by the source, not a
/// position in a file.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// RGB frame filled with a single color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], index: usize) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(data, width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Color at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height || self.channels < 3 {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        let shape = self.shape();
        ArrayViewMut3::from_shape(shape, &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
