//! Interop between USD value types and `glam`.
//!
//! USD matrices are row-major with row vectors (`v * M`, translation in the
//! last row). Reading each USD row as a glam column yields the equivalent
//! column-vector matrix, so no transpose is needed either way.

pub use glam::{DMat2, DMat3, DMat4, DQuat, DVec2, DVec3, DVec4, Mat4, Quat, Vec2, Vec3, Vec4};

use half::f16;

use super::value::Lerp;
use super::{Matrix2d, Matrix3d, Matrix4d, Matrix4f, Quatd, Quatf, Quath, Value};

impl From<Matrix4d> for DMat4 {
    #[inline]
    fn from(m: Matrix4d) -> Self {
        DMat4::from_cols_array_2d(&m.0)
    }
}

impl From<DMat4> for Matrix4d {
    #[inline]
    fn from(m: DMat4) -> Self {
        Matrix4d(m.to_cols_array_2d())
    }
}

impl From<Matrix3d> for DMat3 {
    #[inline]
    fn from(m: Matrix3d) -> Self {
        DMat3::from_cols_array_2d(&m.0)
    }
}

impl From<DMat3> for Matrix3d {
    #[inline]
    fn from(m: DMat3) -> Self {
        Matrix3d(m.to_cols_array_2d())
    }
}

impl From<Matrix2d> for DMat2 {
    #[inline]
    fn from(m: Matrix2d) -> Self {
        DMat2::from_cols_array_2d(&m.0)
    }
}

impl From<Matrix4f> for Mat4 {
    #[inline]
    fn from(m: Matrix4f) -> Self {
        Mat4::from_cols_array_2d(&m.0)
    }
}

impl From<Mat4> for Matrix4f {
    #[inline]
    fn from(m: Mat4) -> Self {
        Matrix4f(m.to_cols_array_2d())
    }
}

impl From<Quatf> for Quat {
    #[inline]
    fn from(q: Quatf) -> Self {
        Quat::from_array(q.0)
    }
}

impl From<Quat> for Quatf {
    #[inline]
    fn from(q: Quat) -> Self {
        Quatf(q.to_array())
    }
}

impl From<Quatd> for DQuat {
    #[inline]
    fn from(q: Quatd) -> Self {
        DQuat::from_array(q.0)
    }
}

impl From<DQuat> for Quatd {
    #[inline]
    fn from(q: DQuat) -> Self {
        Quatd(q.to_array())
    }
}

impl From<Quath> for Quat {
    #[inline]
    fn from(q: Quath) -> Self {
        Quat::from_array(q.0.map(f16::to_f32))
    }
}

impl Lerp for Quatf {
    fn lerp(self, other: Self, t: f64) -> Self {
        Quat::from(self).slerp(Quat::from(other), t as f32).into()
    }
}

impl Lerp for Quatd {
    fn lerp(self, other: Self, t: f64) -> Self {
        DQuat::from(self).slerp(DQuat::from(other), t).into()
    }
}

impl Lerp for Quath {
    fn lerp(self, other: Self, t: f64) -> Self {
        let q = Quat::from(self).slerp(Quat::from(other), t as f32);
        Quath(q.to_array().map(f16::from_f32))
    }
}

impl Value {
    /// View a `float3[]` of any role (points, normals, colors) as glam vectors.
    pub fn as_vec3_slice(&self) -> Option<&[Vec3]> {
        match self {
            Value::Float3Array(v, _) => Some(bytemuck::cast_slice(v)),
            _ => None,
        }
    }

    /// View a `double3[]` of any role as glam vectors.
    pub fn as_dvec3_slice(&self) -> Option<&[DVec3]> {
        match self {
            Value::Double3Array(v, _) => Some(bytemuck::cast_slice(v)),
            _ => None,
        }
    }

    /// A `matrix4d` / `frame4d` scalar as a glam matrix.
    pub fn as_dmat4(&self) -> Option<DMat4> {
        match self {
            Value::Matrix4d(m, _) => Some((*m).into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Role;

    #[test]
    fn test_translation_lands_in_last_column() {
        let mut m = Matrix4d::default();
        m.0[3] = [1.0, 2.0, 3.0, 1.0];
        let g: DMat4 = m.into();
        assert_eq!(g.transform_point3(DVec3::ZERO), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(Matrix4d::from(g), m);
    }

    #[test]
    fn test_slices() {
        let v = Value::Float3Array(vec![[1.0, 2.0, 3.0]], Role::Point);
        assert_eq!(v.as_vec3_slice().unwrap()[0], Vec3::new(1.0, 2.0, 3.0));
        assert!(Value::FloatArray(vec![]).as_vec3_slice().is_none());
    }

    #[test]
    fn test_quat_slerp() {
        let a = Quatf::default();
        let b: Quatf = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2).into();
        let mid = Quat::from(a.lerp(b, 0.5));
        let expected = Quat::from_rotation_z(std::f32::consts::FRAC_PI_4);
        assert!(mid.abs_diff_eq(expected, 1e-5));
    }
}
