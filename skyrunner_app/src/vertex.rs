//! Vertex records and uniform blocks shared with the shaders
//!
//! Every record is `#[repr(C)]` and `Pod` so it can be uploaded as-is; the
//! matching [`VertexDescriptor`] tells the geometry assembler and the
//! pipelines where each attribute lives.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use skyrunner_core::foundation::math::{Mat4, Vec3};
use skyrunner_core::render::vulkan::vertex_descriptor::VertexBinding;
use skyrunner_core::render::vulkan::{
    AttributeUsage, VertexAttribute, VertexDescriptor, VertexLayoutError,
};

const VEC2: vk::Format = vk::Format::R32G32_SFLOAT;
const VEC3: vk::Format = vk::Format::R32G32B32_SFLOAT;

fn stride_of<T>() -> u32 {
    std::mem::size_of::<T>() as u32
}

/// Position only; the sky direction is the position itself
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SkyVertex {
    pub position: [f32; 3],
}

impl SkyVertex {
    pub fn descriptor() -> Result<VertexDescriptor, VertexLayoutError> {
        VertexDescriptor::new(
            vec![VertexBinding::per_vertex(0, stride_of::<Self>())],
            vec![VertexAttribute::new(0, VEC3, 0, AttributeUsage::Position)],
        )
    }
}

/// Lit, textured mesh vertex for the ship and asteroids
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn descriptor() -> Result<VertexDescriptor, VertexLayoutError> {
        VertexDescriptor::new(
            vec![VertexBinding::per_vertex(0, stride_of::<Self>())],
            vec![
                VertexAttribute::new(0, VEC3, 0, AttributeUsage::Position),
                VertexAttribute::new(1, VEC3, 12, AttributeUsage::Normal),
                VertexAttribute::new(2, VEC2, 24, AttributeUsage::Uv),
            ],
        )
    }
}

/// Lit, untextured vertex for the power-up crystals
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CrystalVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl CrystalVertex {
    pub fn descriptor() -> Result<VertexDescriptor, VertexLayoutError> {
        VertexDescriptor::new(
            vec![VertexBinding::per_vertex(0, stride_of::<Self>())],
            vec![
                VertexAttribute::new(0, VEC3, 0, AttributeUsage::Position),
                VertexAttribute::new(1, VEC3, 12, AttributeUsage::Normal),
            ],
        )
    }
}

/// Screen-space quad vertex for the HUD
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct HudVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl HudVertex {
    pub fn descriptor() -> Result<VertexDescriptor, VertexLayoutError> {
        VertexDescriptor::new(
            vec![VertexBinding::per_vertex(0, stride_of::<Self>())],
            vec![
                VertexAttribute::new(0, VEC3, 0, AttributeUsage::Position),
                VertexAttribute::new(1, VEC2, 12, AttributeUsage::Uv),
            ],
        )
    }
}

/// Every layout the game draws with, validated once at startup
#[derive(Debug, Clone)]
pub struct VertexLayouts {
    pub sky: VertexDescriptor,
    pub mesh: VertexDescriptor,
    pub crystal: VertexDescriptor,
    pub hud: VertexDescriptor,
}

impl VertexLayouts {
    pub fn new() -> Result<Self, VertexLayoutError> {
        Ok(Self {
            sky: SkyVertex::descriptor()?,
            mesh: MeshVertex::descriptor()?,
            crystal: CrystalVertex::descriptor()?,
            hud: HudVertex::descriptor()?,
        })
    }
}

fn columns(m: &Mat4) -> [[f32; 4]; 4] {
    (*m).into()
}

fn point(v: &Vec3) -> [f32; 4] {
    [v.x, v.y, v.z, 1.0]
}

/// `SkyUniform` in sky.vert
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SkyUniform {
    pub view_projection: [[f32; 4]; 4],
}

impl SkyUniform {
    /// Drop the camera translation so the sky stays at infinity
    pub fn new(fixed_view_projection: &Mat4, camera_position: &Vec3) -> Self {
        let view_projection = fixed_view_projection * Mat4::new_translation(camera_position);
        Self { view_projection: columns(&view_projection) }
    }
}

/// `MeshUniform` in mesh.vert and crystal.vert
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct MeshUniform {
    pub mvp: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
}

impl MeshUniform {
    pub fn new(view_projection: &Mat4, model: &Mat4) -> Self {
        let normal_matrix = model.try_inverse().unwrap_or_else(Mat4::identity).transpose();
        Self {
            mvp: columns(&(view_projection * model)),
            model: columns(model),
            normal_matrix: columns(&normal_matrix),
        }
    }
}

/// `LightUniform` in mesh.frag
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    pub light_position: [f32; 4],
    pub light_color: [f32; 4],
    pub eye_position: [f32; 4],
}

impl LightUniform {
    pub fn new(light_position: &Vec3, light_color: [f32; 3], eye: &Vec3) -> Self {
        let [r, g, b] = light_color;
        Self {
            light_position: point(light_position),
            light_color: [r, g, b, 1.0],
            eye_position: point(eye),
        }
    }
}

/// `CrystalUniform` in crystal.frag
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CrystalUniform {
    pub color: [f32; 4],
    pub light_position: [f32; 4],
    pub eye_position: [f32; 4],
    /// `x` is the simulation time
    pub pulse: [f32; 4],
}

impl CrystalUniform {
    pub fn new(color: [f32; 4], light_position: &Vec3, eye: &Vec3, time: f32) -> Self {
        Self {
            color,
            light_position: point(light_position),
            eye_position: point(eye),
            pulse: [time, 0.0, 0.0, 0.0],
        }
    }
}

/// `HudUniform` in hud.vert and hud.frag
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct HudUniform {
    /// Lower-left corner and size in normalized device coordinates
    pub rect: [f32; 4],
    pub tint: [f32; 4],
}

impl HudUniform {
    /// Square icon of `size` (in NDC height units) anchored to the bottom-right corner
    pub fn corner_icon(size: f32, aspect: f32, margin: f32) -> Self {
        let width = size / aspect.max(f32::EPSILON);
        Self {
            rect: [1.0 - margin - width, 1.0 - margin - size, width, size],
            tint: [1.0; 4],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_layouts_match_records() {
        let layouts = VertexLayouts::new().unwrap();
        assert_eq!(layouts.sky.stride(0), Some(12));
        assert_eq!(layouts.mesh.stride(0), Some(32));
        assert_eq!(layouts.crystal.stride(0), Some(24));
        assert_eq!(layouts.hud.stride(0), Some(20));
    }

    #[test]
    fn test_uniform_blocks_are_std140_sized() {
        assert_eq!(std::mem::size_of::<SkyUniform>(), 64);
        assert_eq!(std::mem::size_of::<MeshUniform>(), 192);
        assert_eq!(std::mem::size_of::<LightUniform>(), 48);
        assert_eq!(std::mem::size_of::<CrystalUniform>(), 64);
        assert_eq!(std::mem::size_of::<HudUniform>(), 32);
    }

    #[test]
    fn test_sky_ignores_camera_translation() {
        let camera = Vec3::new(4.0, -2.0, 9.0);
        let sky = SkyUniform::new(&Mat4::new_translation(&-camera), &camera);
        assert_eq!(sky.view_projection, columns(&Mat4::identity()));
    }

    #[test]
    fn test_mesh_uniform_columns() {
        let model = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let block = MeshUniform::new(&Mat4::identity(), &model);
        // Translation lives in the fourth column
        assert_relative_eq!(block.model[3][0], 1.0);
        assert_relative_eq!(block.model[3][2], 3.0);
        assert_eq!(block.mvp, block.model);
        // Pure translation leaves normals untouched
        assert_eq!(block.normal_matrix[0][..3], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_corner_icon_stays_on_screen() {
        let hud = HudUniform::corner_icon(0.2, 16.0 / 9.0, 0.05);
        let [x, y, w, h] = hud.rect;
        assert!(x >= -1.0 && x + w <= 1.0);
        assert!(y >= -1.0 && y + h <= 1.0);
        assert_relative_eq!(w, 0.2 * 9.0 / 16.0);
    }
}
