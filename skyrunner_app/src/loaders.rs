//! File decoding for meshes and textures
//!
//! OBJ files go through `tobj` into a [`GeometrySource`]; images go through
//! the `image` crate into [`TexturePixels`]. Anything missing on disk falls
//! back to a placeholder so the game still starts without its art.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use skyrunner_core::assets::{AssetError, CubemapPixels, GeometrySource, TexturePixels};

/// Cubemap face suffixes in layer order
pub const CUBE_FACES: [&str; 6] = ["px", "nx", "py", "ny", "pz", "nz"];

/// Load every mesh in an OBJ file as one triangle list
pub fn load_obj(path: impl AsRef<Path>) -> Result<GeometrySource, AssetError> {
    let path = path.as_ref();
    log::debug!("Loading OBJ from: {:?}", path);

    let file = File::open(path)
        .map_err(|e| AssetError::NotFound(format!("{}: {e}", path.display())))?;
    let source = parse_obj(&mut BufReader::new(file))?;

    log::info!(
        "Loaded {} vertices, {} triangles from {:?}",
        source.positions.len(),
        source.indices.len() / 3,
        path
    );
    Ok(source)
}

/// Parse OBJ text, merging all objects and flipping V to top-left origin
pub fn parse_obj(reader: &mut impl BufRead) -> Result<GeometrySource, AssetError> {
    let (models, _) = tobj::load_obj_buf(
        reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| Ok(Default::default()),
    )
    .map_err(|e| AssetError::LoadFailed(format!("OBJ parse failed: {e}")))?;

    let mut source = GeometrySource::default();
    for model in &models {
        let mesh = &model.mesh;
        let base = source.positions.len() as u32;
        let count = mesh.positions.len() / 3;

        source.positions.extend(mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]));
        if mesh.normals.len() == mesh.positions.len() {
            source.normals.extend(mesh.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]));
        }
        if mesh.texcoords.len() / 2 == count {
            source.uvs.extend(mesh.texcoords.chunks_exact(2).map(|t| [t[0], 1.0 - t[1]]));
        }
        source.indices.extend(mesh.indices.iter().map(|&i| base + i));
    }

    // A stream only some objects provided cannot be assembled
    let vertices = source.positions.len();
    if source.normals.len() != vertices {
        source.normals.clear();
    }
    if source.uvs.len() != vertices {
        source.uvs.clear();
    }

    if source.positions.is_empty() {
        return Err(AssetError::InvalidData("OBJ contains no vertices".to_string()));
    }
    Ok(source)
}

/// Load `path` when it exists, otherwise `fallback()`
pub fn load_obj_or(
    path: impl AsRef<Path>,
    fallback: impl FnOnce() -> GeometrySource,
) -> GeometrySource {
    let path = path.as_ref();
    match load_obj(path) {
        Ok(source) => source,
        Err(e) => {
            log::warn!("Using procedural mesh instead of {:?}: {e}", path);
            fallback()
        }
    }
}

/// Decode an image file to RGBA8
pub fn load_image(path: impl AsRef<Path>) -> Result<TexturePixels, AssetError> {
    let path = path.as_ref();
    log::debug!("Loading image from: {:?}", path);

    let rgba = image::open(path)
        .map_err(|e| {
            AssetError::LoadFailed(format!("Failed to load image {}: {e}", path.display()))
        })?
        .to_rgba8();
    let (width, height) = rgba.dimensions();

    log::info!("Loaded image {}x{} from {:?}", width, height, path);
    TexturePixels::new(width, height, rgba.into_raw())
}

/// Load `path`, or a 1x1 texture of `color` when it cannot be read
pub fn load_image_or(path: impl AsRef<Path>, color: [u8; 4]) -> TexturePixels {
    let path = path.as_ref();
    load_image(path).unwrap_or_else(|e| {
        log::warn!("Using solid {:?} texture instead of {:?}: {e}", color, path);
        TexturePixels::solid(1, 1, color)
    })
}

/// Load `<dir>/<stem>_<face>.png` for every face
///
/// Any missing or mismatched face replaces the whole cubemap with a solid one.
pub fn load_cubemap_or(dir: impl AsRef<Path>, stem: &str, color: [u8; 4]) -> CubemapPixels {
    let dir = dir.as_ref();
    let load = || -> Result<CubemapPixels, AssetError> {
        let mut faces = Vec::with_capacity(6);
        for face in CUBE_FACES {
            faces.push(load_image(dir.join(format!("{stem}_{face}.png")))?);
        }
        let faces: [TexturePixels; 6] = faces
            .try_into()
            .map_err(|_| AssetError::InvalidData("cubemap needs six faces".to_string()))?;
        CubemapPixels::new(faces)
    };

    load().unwrap_or_else(|e| {
        log::warn!("Using solid sky instead of {:?}/{stem}_*.png: {e}", dir);
        CubemapPixels::solid(color)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD_OBJ: &str = "\
o quad
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn test_parse_obj_triangulates_and_flips_v() {
        let source = parse_obj(&mut Cursor::new(QUAD_OBJ)).unwrap();
        assert_eq!(source.positions.len(), 4);
        assert_eq!(source.indices.len(), 6);
        assert_eq!(source.normals.len(), 4);
        assert!(source.normals.iter().all(|n| *n == [0.0, 0.0, 1.0]));

        let bottom_left = source.positions.iter().position(|p| *p == [0.0, 0.0, 0.0]).unwrap();
        assert_eq!(source.uvs[bottom_left], [0.0, 1.0]);
    }

    #[test]
    fn test_parse_obj_without_normals_leaves_stream_empty() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let source = parse_obj(&mut Cursor::new(obj)).unwrap();
        assert_eq!(source.vertex_count().unwrap(), 3);
        assert!(source.normals.is_empty());
        assert!(source.uvs.is_empty());
    }

    #[test]
    fn test_parse_obj_rejects_empty_file() {
        assert!(parse_obj(&mut Cursor::new("# nothing\n")).is_err());
    }

    #[test]
    fn test_missing_files_fall_back() {
        let pixels = load_image_or("does/not/exist.png", [10, 20, 30, 255]);
        assert_eq!((pixels.width(), pixels.height()), (1, 1));
        assert_eq!(pixels.data(), &[10, 20, 30, 255]);

        let sky = load_cubemap_or("does/not/exist", "sky", [0, 0, 0, 255]);
        assert_eq!(sky.size(), 1);

        let mesh = load_obj_or("does/not/exist.obj", GeometrySource::default);
        assert!(mesh.positions.is_empty());
    }

    #[test]
    fn test_load_png_as_rgba() {
        let name = format!("skyrunner_loader_{}.png", std::process::id());
        let path = std::env::temp_dir().join(name);
        image::RgbImage::from_pixel(2, 3, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let pixels = load_image(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!((pixels.width(), pixels.height()), (2, 3));
        assert_eq!(pixels.size_bytes(), 2 * 3 * 4);
        assert_eq!(&pixels.data()[..4], &[1, 2, 3, 255]);
    }
}
