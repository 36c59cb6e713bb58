//! Math utilities and types
//!
//! nalgebra aliases plus the projection helpers used by the flight camera.
//! Projections follow the Vulkan clip-space convention: depth maps to `[0, 1]`
//! and the Y axis points down, so the `[1][1]` term is negated.

pub use nalgebra::{Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Right-handed perspective projection with `[0, 1]` depth and flipped Y.
pub fn perspective_vk(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fov_y * 0.5).tan();
    let mut m = Mat4::zeros();
    m[(0, 0)] = f / aspect;
    m[(1, 1)] = -f;
    m[(2, 2)] = far / (near - far);
    m[(3, 2)] = -1.0;
    m[(2, 3)] = -(far * near) / (far - near);
    m
}

/// Right-handed view matrix looking from `eye` towards `target`.
pub fn look_at(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
    Mat4::look_at_rh(&Point3::from(*eye), &Point3::from(*target), up)
}

/// Rotation of `angle` radians around `axis`.
pub fn axis_rotation(axis: &Vec3, angle: f32) -> Quat {
    Quat::from_axis_angle(&Unit::new_normalize(*axis), angle)
}

/// Translation followed by rotation: the world matrix of a rigid body.
pub fn rigid_transform(position: &Vec3, rotation: &Quat) -> Mat4 {
    Mat4::new_translation(position) * rotation.to_homogeneous()
}
