//! Planar reflection math and the reflection camera
//!
//! The water surface is rendered by mirroring the scene across a horizontal
//! plane into an offscreen target. The mirroring is a single affine matrix
//! applied innermost in the view-projection chain.

use glam::{Mat4, Vec3, Vec4};

use crate::scene::Camera;

/// A plane `normal · p + d = 0`
///
/// The reflection matrix is only metrically correct for a unit-length
/// normal; callers are responsible for normalizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// The fixed horizontal water plane at ground height
    pub const WATER: Plane = Plane {
        normal: Vec3::Y,
        d: 0.0,
    };

    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Build the 4x4 matrix reflecting points across this plane.
    ///
    /// Row form (column-major storage, translation in the w column):
    ///
    /// ```text
    /// | 1-2a²  -2ab   -2ac   -2ad |
    /// | -2ab   1-2b²  -2bc   -2bd |
    /// | -2ac   -2bc   1-2c²  -2cd |
    /// |   0      0      0      1  |
    /// ```
    pub fn reflection_matrix(&self) -> Mat4 {
        let Vec3 { x: a, y: b, z: c } = self.normal;
        let d = self.d;

        Mat4::from_cols(
            Vec4::new(1.0 - 2.0 * a * a, -2.0 * a * b, -2.0 * a * c, 0.0),
            Vec4::new(-2.0 * a * b, 1.0 - 2.0 * b * b, -2.0 * b * c, 0.0),
            Vec4::new(-2.0 * a * c, -2.0 * b * c, 1.0 - 2.0 * c * c, 0.0),
            Vec4::new(-2.0 * a * d, -2.0 * b * d, -2.0 * c * d, 1.0),
        )
    }

    /// Reflect a single point across the plane
    pub fn reflect_point(&self, point: Vec3) -> Vec3 {
        point - 2.0 * (point.dot(self.normal) + self.d) * self.normal
    }
}

/// Camera variant rendering the mirror image of the scene
///
/// Built fresh each frame from the scene camera's pose and projection and
/// discarded after the reflection pass. It never mutates the scene camera
/// and has no rendering side effects; it only supplies matrices.
#[derive(Debug, Clone)]
pub struct ReflectionCamera {
    position: Vec3,
    rotation: Mat4,
    projection: Mat4,
    plane: Plane,
}

impl ReflectionCamera {
    /// `rotation` is the view-space rotation (world rotation inverted),
    /// i.e. the view matrix with its translation removed.
    pub fn new(position: Vec3, rotation: Mat4, projection: Mat4, plane: Plane) -> Self {
        Self {
            position,
            rotation,
            projection,
            plane,
        }
    }

    /// Capture the scene camera's current pose and projection
    pub fn from_camera(camera: &Camera, plane: Plane) -> Self {
        Self::new(
            camera.position,
            camera.view_rotation(),
            camera.projection_matrix(),
            plane,
        )
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    /// Combined view-projection for the mirrored scene.
    ///
    /// The reflection matrix is innermost: world points are mirrored first,
    /// then run through the normal view/projection pipeline.
    pub fn view_projection_matrix(&self) -> Mat4 {
        let view = self.rotation * Mat4::from_translation(-self.position);
        self.projection * view * self.plane.reflection_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    fn planes() -> Vec<Plane> {
        vec![
            Plane::WATER,
            Plane::new(Vec3::X, 2.0),
            Plane::new(Vec3::new(1.0, 2.0, -0.5).normalize(), -3.25),
            Plane::new(Vec3::new(0.0, -1.0, 0.0), 1.5),
        ]
    }

    #[test]
    fn reflection_is_involution() {
        let points = [
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-4.5, 0.0, 12.0),
            Vec3::ZERO,
        ];
        for plane in planes() {
            let m = plane.reflection_matrix();
            for p in points {
                let twice = m * (m * p.extend(1.0));
                assert_relative_eq!(twice.x, p.x, epsilon = 1e-5);
                assert_relative_eq!(twice.y, p.y, epsilon = 1e-5);
                assert_relative_eq!(twice.z, p.z, epsilon = 1e-5);
                assert_relative_eq!(twice.w, 1.0, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn water_plane_negates_height() {
        let m = Plane::WATER.reflection_matrix();
        let p = Vec3::new(3.0, 7.5, -2.0);
        let r = m * p.extend(1.0);
        assert_relative_eq!(r.x, 3.0, epsilon = 1e-6);
        assert_relative_eq!(r.y, -7.5, epsilon = 1e-6);
        assert_relative_eq!(r.z, -2.0, epsilon = 1e-6);
    }

    #[test]
    fn matrix_matches_pointwise_reflection() {
        for plane in planes() {
            let m = plane.reflection_matrix();
            let p = Vec3::new(0.25, -1.0, 4.0);
            let expected = plane.reflect_point(p);
            let got = m * p.extend(1.0);
            assert_relative_eq!(got.x, expected.x, epsilon = 1e-5);
            assert_relative_eq!(got.y, expected.y, epsilon = 1e-5);
            assert_relative_eq!(got.z, expected.z, epsilon = 1e-5);
        }
    }

    #[test]
    fn view_projection_composition_order() {
        let position = Vec3::new(0.0, 4.0, 10.0);
        let rotation = Mat4::from_quat(Quat::from_rotation_y(0.3).inverse());
        let projection = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0);

        let camera = ReflectionCamera::new(position, rotation, projection, Plane::WATER);
        let view = rotation * Mat4::from_translation(-position);
        let reflect = Plane::WATER.reflection_matrix();

        let expected = projection * view * reflect;
        assert_eq!(camera.view_projection_matrix(), expected);

        // Reordering the composition must change the result.
        let reordered = reflect * projection * view;
        assert_ne!(camera.view_projection_matrix(), reordered);
    }

    #[test]
    fn mirrored_camera_sees_reflected_point() {
        // A point above the water and its mirror image below must land on
        // the same clip-space position when one is viewed through the
        // reflection camera and the other through the plain pipeline.
        let position = Vec3::new(0.0, 2.0, 8.0);
        let rotation = Mat4::IDENTITY;
        let projection = Mat4::perspective_rh(1.2, 1.0, 0.1, 100.0);

        let camera = ReflectionCamera::new(position, rotation, projection, Plane::WATER);
        let plain_vp = projection * rotation * Mat4::from_translation(-position);

        let p = Vec3::new(1.0, 3.0, -2.0);
        let mirrored = Plane::WATER.reflect_point(p);

        let a = camera.view_projection_matrix() * p.extend(1.0);
        let b = plain_vp * mirrored.extend(1.0);
        assert_relative_eq!(a.x, b.x, epsilon = 1e-4);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-4);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-4);
        assert_relative_eq!(a.w, b.w, epsilon = 1e-4);
    }
}
