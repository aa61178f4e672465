use serde::{Deserialize, Serialize};

use crate::glsl::GlslType;

/// Available uniform values.
///
/// Used both as option defaults carried by modules and as the payload the
/// driver uploads under a (possibly namespaced) uniform name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformValue {
    Bool(bool),
    Float1(f32),
    Float2(f32, f32),
    Float3(f32, f32, f32),
    Float4(f32, f32, f32, f32),
    Integer1(i32),
    Integer2(i32, i32),
    Integer3(i32, i32, i32),
    Integer4(i32, i32, i32, i32),
    UnsignedInteger1(u32),
    FloatVector2([f32; 2]),
    FloatVector3([f32; 3]),
    FloatVector4([f32; 4]),
    Matrix2([f32; 4]),
    Matrix3([f32; 9]),
    Matrix4([f32; 16]),
    FloatArray(Vec<f32>),
    IntegerArray(Vec<i32>),
    FloatVector2Array(Vec<[f32; 2]>),
    FloatVector3Array(Vec<[f32; 3]>),
    FloatVector4Array(Vec<[f32; 4]>),
}

impl UniformValue {
    /// Returns the GLSL type a declaration holding this value has.
    pub fn gl_type(&self) -> GlslType {
        match self {
            UniformValue::Bool(_) => GlslType::Bool,
            UniformValue::Float1(_) | UniformValue::FloatArray(_) => GlslType::Float,
            UniformValue::Float2(_, _) | UniformValue::FloatVector2(_) => GlslType::Vec2,
            UniformValue::Float3(_, _, _) | UniformValue::FloatVector3(_) => GlslType::Vec3,
            UniformValue::Float4(_, _, _, _) | UniformValue::FloatVector4(_) => GlslType::Vec4,
            UniformValue::Integer1(_) | UniformValue::IntegerArray(_) => GlslType::Int,
            UniformValue::Integer2(_, _) => GlslType::IVec2,
            UniformValue::Integer3(_, _, _) => GlslType::IVec3,
            UniformValue::Integer4(_, _, _, _) => GlslType::IVec4,
            UniformValue::UnsignedInteger1(_) => GlslType::Uint,
            UniformValue::Matrix2(_) => GlslType::Mat2,
            UniformValue::Matrix3(_) => GlslType::Mat3,
            UniformValue::Matrix4(_) => GlslType::Mat4,
            UniformValue::FloatVector2Array(_) => GlslType::Vec2,
            UniformValue::FloatVector3Array(_) => GlslType::Vec3,
            UniformValue::FloatVector4Array(_) => GlslType::Vec4,
        }
    }

    /// Returns the element count for array values, `None` for scalars.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            UniformValue::FloatArray(values) => Some(values.len()),
            UniformValue::IntegerArray(values) => Some(values.len()),
            UniformValue::FloatVector2Array(values) => Some(values.len()),
            UniformValue::FloatVector3Array(values) => Some(values.len()),
            UniformValue::FloatVector4Array(values) => Some(values.len()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gl_types() {
        assert_eq!(UniformValue::Float1(0.5).gl_type(), GlslType::Float);
        assert_eq!(
            UniformValue::FloatVector3([0.0, 0.0, 0.0]).gl_type(),
            GlslType::Vec3
        );
        assert_eq!(UniformValue::Integer2(1, 2).gl_type(), GlslType::IVec2);
    }

    #[test]
    fn test_array_len() {
        assert_eq!(UniformValue::Float1(1.0).array_len(), None);
        assert_eq!(
            UniformValue::FloatVector3Array(vec![[1.0, 1.0, 1.0], [0.0, 0.0, 0.0]]).array_len(),
            Some(2)
        );
    }

    #[test]
    fn test_json_round() {
        let value: UniformValue = serde_json::from_value(serde_json::json!({
            "float_vector3_array": [[1.0, 1.0, 1.0], [0.0, 0.0, 0.0]]
        }))
        .unwrap();
        assert_eq!(value.array_len(), Some(2));
        assert_eq!(value.gl_type(), GlslType::Vec3);

        let value: UniformValue = serde_json::from_value(serde_json::json!({ "float1": 2.2 })).unwrap();
        assert_eq!(value, UniformValue::Float1(2.2));
    }
}
