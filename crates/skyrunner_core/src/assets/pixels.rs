//! Raw pixel buffers handed to texture creation

use super::AssetError;

/// RGBA8 pixels, row-major, top row first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexturePixels {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl TexturePixels {
    /// Bytes per pixel
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Wrap `data`, checking it holds exactly `width * height` RGBA8 pixels
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, AssetError> {
        if width == 0 || height == 0 {
            return Err(AssetError::InvalidData(format!("image dimensions {width}x{height}")));
        }
        let expected = width as usize * height as usize * Self::BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(AssetError::PixelCountMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// Single-colour image, used as a placeholder when a file fails to load
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let count = width.max(1) as usize * height.max(1) as usize;
        Self {
            data: color.repeat(count),
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Length of a full mip chain down to 1x1
    pub fn mip_levels(&self) -> u32 {
        32 - self.width.max(self.height).leading_zeros()
    }
}

/// Six equally sized square faces in +X, -X, +Y, -Y, +Z, -Z order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubemapPixels {
    faces: [TexturePixels; 6],
}

impl CubemapPixels {
    /// Validate and wrap six faces
    pub fn new(faces: [TexturePixels; 6]) -> Result<Self, AssetError> {
        let size = faces[0].width;
        for (index, face) in faces.iter().enumerate() {
            if face.width != face.height || face.width != size {
                return Err(AssetError::CubemapFace {
                    index,
                    width: face.width,
                    height: face.height,
                    size,
                });
            }
        }
        Ok(Self { faces })
    }

    /// Six 1x1 faces of one colour
    pub fn solid(color: [u8; 4]) -> Self {
        Self {
            faces: std::array::from_fn(|_| TexturePixels::solid(1, 1, color)),
        }
    }

    /// Edge length of every face
    pub fn size(&self) -> u32 {
        self.faces[0].width
    }

    /// Faces in layer order
    pub fn faces(&self) -> &[TexturePixels; 6] {
        &self.faces
    }

    /// All faces packed back to back, as one staging upload expects
    pub fn packed(&self) -> Vec<u8> {
        self.faces.iter().flat_map(|f| f.data.iter().copied()).collect()
    }

    /// Bytes in a single face
    pub fn face_bytes(&self) -> usize {
        self.faces[0].size_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_count_is_checked() {
        assert!(TexturePixels::new(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            TexturePixels::new(2, 2, vec![0; 15]),
            Err(AssetError::PixelCountMismatch { expected: 16, actual: 15, .. })
        ));
        assert!(matches!(TexturePixels::new(0, 4, Vec::new()), Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn test_solid_placeholder() {
        let pixels = TexturePixels::solid(2, 1, [255, 0, 255, 255]);
        assert_eq!(pixels.data(), &[255, 0, 255, 255, 255, 0, 255, 255]);
        assert_eq!(pixels.size_bytes(), 8);

        let sky = CubemapPixels::solid([0, 0, 16, 255]);
        assert_eq!(sky.size(), 1);
        assert_eq!(sky.packed().len(), 6 * 4);
    }

    #[test]
    fn test_mip_levels() {
        assert_eq!(TexturePixels::solid(1, 1, [0; 4]).mip_levels(), 1);
        assert_eq!(TexturePixels::solid(256, 256, [0; 4]).mip_levels(), 9);
        assert_eq!(TexturePixels::solid(300, 20, [0; 4]).mip_levels(), 9);
    }

    #[test]
    fn test_cubemap_faces_must_be_equal_squares() {
        let face = TexturePixels::solid(4, 4, [1, 2, 3, 4]);
        let cube = CubemapPixels::new(std::array::from_fn(|_| face.clone())).unwrap();
        assert_eq!(cube.size(), 4);
        assert_eq!(cube.packed().len(), 6 * 64);
        assert_eq!(cube.face_bytes(), 64);

        let mut faces: [TexturePixels; 6] = std::array::from_fn(|_| face.clone());
        faces[3] = TexturePixels::solid(4, 2, [0; 4]);
        assert!(matches!(
            CubemapPixels::new(faces),
            Err(AssetError::CubemapFace { index: 3, width: 4, height: 2, size: 4 })
        ));
    }
}
