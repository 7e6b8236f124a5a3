//! Transform channel composition
//!
//! A transform is described by seven vector channels. Points in object space
//! are carried into parent space by
//!
//! ```text
//! L = T(t) · T(rp + rpt) · R · T(-rp) · T(sp + spt) · S · T(-sp)
//! ```
//!
//! where `R` applies the X, then Y, then Z rotation (degrees) and `S` is a
//! non-uniform scale. Moving a pivot leaves `L` intact as long as the matching
//! pivot-translate absorbs the difference, which is what
//! [`TransformChannels::with_pivot`] does.

use glam::{DMat4, DQuat, EulerRot};

use super::types::{Pivot, Vec3};

/// Local transform channels of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformChannels {
    pub translate: Vec3,
    /// Euler angles in degrees, XYZ order
    pub rotate: Vec3,
    pub scale: Vec3,
    pub rotate_pivot: Vec3,
    pub scale_pivot: Vec3,
    pub rotate_pivot_translate: Vec3,
    pub scale_pivot_translate: Vec3,
}

impl Default for TransformChannels {
    fn default() -> Self {
        Self {
            translate: Vec3::ZERO,
            rotate: Vec3::ZERO,
            scale: Vec3::ONE,
            rotate_pivot: Vec3::ZERO,
            scale_pivot: Vec3::ZERO,
            rotate_pivot_translate: Vec3::ZERO,
            scale_pivot_translate: Vec3::ZERO,
        }
    }
}

impl TransformChannels {
    /// Rotation as a quaternion
    pub fn rotation(&self) -> DQuat {
        rotation_from_degrees(self.rotate)
    }

    /// Object-to-parent matrix
    pub fn local_matrix(&self) -> DMat4 {
        let rotate_part = DMat4::from_translation(self.rotate_pivot + self.rotate_pivot_translate)
            * DMat4::from_quat(self.rotation())
            * DMat4::from_translation(-self.rotate_pivot);
        let scale_part = DMat4::from_translation(self.scale_pivot + self.scale_pivot_translate)
            * DMat4::from_scale(self.scale)
            * DMat4::from_translation(-self.scale_pivot);
        DMat4::from_translation(self.translate) * rotate_part * scale_part
    }

    /// Where the object-space origin lands in parent space, minus `translate`
    pub fn origin_offset(&self) -> Vec3 {
        self.local_matrix().transform_point3(Vec3::ZERO) - self.translate
    }

    /// Move one pivot to `position` (object space) without moving the object.
    ///
    /// The pivot-translate is adjusted so that the pivot sub-matrix
    /// `T(p + pt) · M · T(-p)` keeps its translation term `p + pt - M·p`.
    pub fn with_pivot(mut self, pivot: Pivot, position: Vec3) -> Self {
        match pivot {
            Pivot::Rotate => {
                let delta = self.rotate_pivot - position;
                self.rotate_pivot_translate += delta - self.rotation() * delta;
                self.rotate_pivot = position;
            }
            Pivot::Scale => {
                let delta = self.scale_pivot - position;
                self.scale_pivot_translate += delta - self.scale * delta;
                self.scale_pivot = position;
            }
        }
        self
    }

    /// Object-space pivot position
    pub fn pivot(&self, pivot: Pivot) -> Vec3 {
        match pivot {
            Pivot::Rotate => self.rotate_pivot,
            Pivot::Scale => self.scale_pivot,
        }
    }
}

/// Build a rotation from XYZ-order Euler angles in degrees
pub fn rotation_from_degrees(degrees: Vec3) -> DQuat {
    DQuat::from_rotation_z(degrees.z.to_radians())
        * DQuat::from_rotation_y(degrees.y.to_radians())
        * DQuat::from_rotation_x(degrees.x.to_radians())
}

/// Decompose a rotation into XYZ-order Euler angles in degrees
pub fn degrees_from_rotation(rotation: DQuat) -> Vec3 {
    let (z, y, x) = rotation.to_euler(EulerRot::ZYX);
    Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
}
