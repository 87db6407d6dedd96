//! Transform component

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};

/// Spatial transform for drawable entities
///
/// Rotation is a fixed-order euler triple and scale is uniform; the draw
/// pass depends on both constraints for identical visual results.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in radians, applied in X then Y then Z order
    pub rotation: Vec3,
    /// Uniform scale factor
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn new(position: Vec3, rotation: Vec3, scale: f32) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// World matrix for the given world-space position (the entity position
    /// plus its model offset).
    ///
    /// Composition order is fixed:
    /// `Translate * RotX * RotY * RotZ * Scale(uniform)`.
    pub fn world_matrix(&self, world_position: Vec3) -> Mat4 {
        Mat4::from_translation(world_position)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_z(self.rotation.z)
            * Mat4::from_scale(Vec3::splat(self.scale))
    }

    /// World matrix with no model offset
    pub fn matrix(&self) -> Mat4 {
        self.world_matrix(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_mat4_eq(a: Mat4, b: Mat4) {
        for (x, y) in a.to_cols_array().iter().zip(b.to_cols_array().iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-5);
        }
    }

    #[test]
    fn world_matrix_reference_scenario() {
        // (1,2,3), uniform scale 2, 180 degrees about Y, no model offset.
        let transform = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, std::f32::consts::PI, 0.0),
            2.0,
        );

        let expected = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            * Mat4::from_rotation_y(std::f32::consts::PI)
            * Mat4::from_scale(Vec3::splat(2.0));
        assert_mat4_eq(transform.matrix(), expected);

        // Spot-check the effect: local +X maps to world -X around (1,2,3).
        let p = transform.matrix() * glam::Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn rotation_order_is_x_then_y_then_z() {
        let transform = Transform::new(Vec3::ZERO, Vec3::new(0.4, 1.1, -0.7), 1.0);
        let expected = Mat4::from_rotation_x(0.4)
            * Mat4::from_rotation_y(1.1)
            * Mat4::from_rotation_z(-0.7);
        assert_mat4_eq(transform.matrix(), expected);

        // The reversed order produces a different matrix.
        let reversed = Mat4::from_rotation_z(-0.7)
            * Mat4::from_rotation_y(1.1)
            * Mat4::from_rotation_x(0.4);
        assert_ne!(transform.matrix(), reversed);
    }

    #[test]
    fn model_offset_shifts_translation_only() {
        let transform = Transform::new(Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO, 3.0);
        let offset = Vec3::new(0.0, 5.0, -1.0);
        let m = transform.world_matrix(transform.position + offset);
        assert_eq!(m.w_axis.truncate(), Vec3::new(1.0, 5.0, -1.0));
        // Scale is untouched by the offset.
        assert_relative_eq!(m.x_axis.x, 3.0, epsilon = 1e-6);
    }
}
