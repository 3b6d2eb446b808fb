use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::LabError;

/// A scalar or RGB/XYZ value sent to a shader uniform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Scalar(f32),
    Vec3(Vec3),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Scalar(_) => ParamKind::Scalar,
            Self::Vec3(_) => ParamKind::Vec3,
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Self::Scalar(value) => Some(*value),
            Self::Vec3(_) => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vec3(value) => Some(*value),
            Self::Scalar(_) => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            Self::Scalar(value) => value.is_finite(),
            Self::Vec3(value) => value.is_finite(),
        }
    }

    /// Expands the value into a vec4 slot, scalars in `x`.
    pub fn to_slot(&self) -> [f32; 4] {
        match self {
            Self::Scalar(value) => [*value, 0.0, 0.0, 0.0],
            Self::Vec3(value) => [value.x, value.y, value.z, 0.0],
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => write!(f, "{value:.3}"),
            Self::Vec3(value) => write!(f, "({:.3}, {:.3}, {:.3})", value.x, value.y, value.z),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec3> for ParamValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Scalar,
    Vec3,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Vec3 => "vec3",
        }
    }
}

/// Inclusive range applied to every component of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
}

impl ParamRange {
    pub const UNIT: Self = Self { min: 0.0, max: 1.0 };

    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: ParamValue) -> ParamValue {
        match value {
            ParamValue::Scalar(v) => ParamValue::Scalar(v.clamp(self.min, self.max)),
            ParamValue::Vec3(v) => {
                ParamValue::Vec3(v.clamp(Vec3::splat(self.min), Vec3::splat(self.max)))
            }
        }
    }

    pub fn contains(&self, value: ParamValue) -> bool {
        self.clamp(value) == value
    }
}

/// Declaration of one tunable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    /// Uniform name the value is bound to in the shader program.
    pub uniform: String,
    pub default: ParamValue,
    pub range: ParamRange,
}

impl ParameterSpec {
    pub fn scalar(name: &str, uniform: &str, default: f32, range: ParamRange) -> Self {
        Self {
            name: name.to_string(),
            uniform: uniform.to_string(),
            default: ParamValue::Scalar(default),
            range,
        }
    }

    pub fn vec3(name: &str, uniform: &str, default: Vec3, range: ParamRange) -> Self {
        Self {
            name: name.to_string(),
            uniform: uniform.to_string(),
            default: ParamValue::Vec3(default),
            range,
        }
    }

    pub fn kind(&self) -> ParamKind {
        self.default.kind()
    }
}

/// Current value of every declared parameter, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialParameters {
    specs: Vec<ParameterSpec>,
    values: Vec<ParamValue>,
}

impl MaterialParameters {
    /// Builds the store with every parameter at its (clamped) default.
    pub fn new(specs: Vec<ParameterSpec>) -> Self {
        let values = specs.iter().map(|spec| spec.range.clamp(spec.default)).collect();
        Self { specs, values }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn spec(&self, name: &str) -> Result<&ParameterSpec, LabError> {
        self.index_of(name).map(|index| &self.specs[index])
    }

    pub fn get(&self, name: &str) -> Result<ParamValue, LabError> {
        self.index_of(name).map(|index| self.values[index])
    }

    /// Clamps `value` to the declared range, stores it and returns what was stored.
    ///
    /// Non-finite values are rejected and leave the stored value untouched.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<ParamValue, LabError> {
        let index = self.index_of(name)?;
        let value = value.into();
        let spec = &self.specs[index];
        if value.kind() != spec.kind() {
            return Err(LabError::ValueKindMismatch {
                name: name.to_string(),
                expected: spec.kind().name(),
            });
        }
        if !value.is_finite() {
            return Err(LabError::NonFiniteValue(name.to_string()));
        }
        let clamped = spec.range.clamp(value);
        self.values[index] = clamped;
        Ok(clamped)
    }

    /// Restarts from the first declared parameter on every call.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> + '_ {
        self.specs
            .iter()
            .zip(self.values.iter())
            .map(|(spec, value)| (spec.name.as_str(), *value))
    }

    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, ParamValue),
    {
        for (name, value) in self.iter() {
            visitor(name, value);
        }
    }

    fn index_of(&self, name: &str) -> Result<usize, LabError> {
        self.specs
            .iter()
            .position(|spec| spec.name == name)
            .ok_or_else(|| LabError::UnknownParameter(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MaterialParameters {
        MaterialParameters::new(vec![
            ParameterSpec::scalar("roughness", "roughnessValue", 0.5, ParamRange::UNIT),
            ParameterSpec::scalar("ior", "iorValue", 1.5, ParamRange::new(1.0, 3.5)),
            ParameterSpec::vec3(
                "objectColor",
                "objectColor",
                Vec3::new(0.5, 0.0, 0.0),
                ParamRange::UNIT,
            ),
        ])
    }

    #[test]
    fn set_clamps_at_the_boundary() {
        let mut params = store();
        assert_eq!(params.set("roughness", 1.7).unwrap(), ParamValue::Scalar(1.0));
        assert_eq!(params.get("roughness").unwrap(), ParamValue::Scalar(1.0));
        params.set("roughness", -0.3).unwrap();
        assert_eq!(params.get("roughness").unwrap(), ParamValue::Scalar(0.0));
        params.set("ior", 0.2).unwrap();
        assert_eq!(params.get("ior").unwrap(), ParamValue::Scalar(1.0));
    }

    #[test]
    fn non_finite_values_keep_the_stored_value() {
        let mut params = store();
        params.set("roughness", 0.25).unwrap();
        assert_eq!(
            params.set("roughness", f32::NAN),
            Err(LabError::NonFiniteValue("roughness".into()))
        );
        assert!(params.set("ior", f32::INFINITY).is_err());
        assert!(params
            .set("objectColor", Vec3::new(0.2, f32::NAN, 0.1))
            .is_err());
        assert_eq!(params.get("roughness").unwrap(), ParamValue::Scalar(0.25));
        assert_eq!(params.get("ior").unwrap(), ParamValue::Scalar(1.5));
        assert_eq!(
            params.get("objectColor").unwrap(),
            ParamValue::Vec3(Vec3::new(0.5, 0.0, 0.0))
        );
    }

    #[test]
    fn vectors_clamp_per_component() {
        let mut params = store();
        params
            .set("objectColor", Vec3::new(1.4, -2.0, 0.25))
            .unwrap();
        assert_eq!(
            params.get("objectColor").unwrap(),
            ParamValue::Vec3(Vec3::new(1.0, 0.0, 0.25))
        );
    }

    #[test]
    fn unknown_names_and_wrong_kinds_fail() {
        let mut params = store();
        assert_eq!(
            params.set("sheen", 0.1),
            Err(LabError::UnknownParameter("sheen".into()))
        );
        assert!(matches!(
            params.set("objectColor", 0.1),
            Err(LabError::ValueKindMismatch { expected: "vec3", .. })
        ));
        assert!(params.get("sheen").is_err());
    }

    #[test]
    fn iteration_follows_declaration_order_and_restarts() {
        let params = store();
        let first: Vec<_> = params.iter().map(|(name, _)| name).collect();
        let second: Vec<_> = params.iter().map(|(name, _)| name).collect();
        assert_eq!(first, ["roughness", "ior", "objectColor"]);
        assert_eq!(first, second);

        let mut visited = Vec::new();
        params.for_each(|name, value| visited.push((name.to_string(), value)));
        assert_eq!(visited.len(), 3);
        assert_eq!(visited[1], ("ior".to_string(), ParamValue::Scalar(1.5)));
    }
}
