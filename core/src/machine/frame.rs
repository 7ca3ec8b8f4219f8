//! Rendered frame storage

/// RGBA frame handed from the machine to the frontend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Resize if needed and expose the pixels for writing
    pub fn pixels_mut(&mut self, width: u32, height: u32) -> &mut [u32] {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.pixels.resize(width as usize * height as usize, 0);
        }
        &mut self.pixels
    }

    /// Cheap content fingerprint, used for logging and tests
    pub fn fingerprint(&self) -> u64 {
        let bytes: Vec<u8> = self.pixels.iter().flat_map(|p| p.to_le_bytes()).collect();
        crate::codec::checksum(&bytes)
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(0, 0)
    }
}
