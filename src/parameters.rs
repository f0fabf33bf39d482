//! Defines the data structure describing a serial manipulator for dynamics

use serde::Deserialize;

use crate::parameter_error::ParameterError;

/// One revolute joint and the link it moves.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JointParameters {
    /// Joint name, informative only.
    #[serde(default)]
    pub name: String,

    /// Position of the joint frame in the parent link frame.
    #[serde(default)]
    pub xyz: [f64; 3],

    /// Orientation of the joint frame in the parent link frame (roll, pitch, yaw),
    /// applied as in URDF.
    #[serde(default)]
    pub rpy: [f64; 3],

    /// Rotation axis of the joint in its own frame. Does not need to be normalized.
    #[serde(default = "default_axis")]
    pub axis: [f64; 3],

    /// Mass of the link moved by this joint.
    pub mass: f64,

    /// Centre of mass of the link, in the joint frame.
    #[serde(default)]
    pub com: [f64; 3],

    /// Inertia tensor about the centre of mass in URDF order: ixx, ixy, ixz, iyy, iyz, izz.
    #[serde(default)]
    pub inertia: [f64; 6],
}

fn default_axis() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

fn default_gravity() -> [f64; 3] {
    [0.0, 0.0, -9.81]
}

/// Parameters of the rigid body model of the robot. See [parameters_robots.rs](parameters_robots.rs)
/// for concrete robot models.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChainParameters {
    /// Gravity acceleration in the base frame.
    #[serde(default = "default_gravity")]
    pub gravity: [f64; 3],

    /// Joints from the base towards the tip.
    pub joints: Vec<JointParameters>,

    /// Initial viscous friction per joint. Defaults to 0.01 for every joint if empty.
    #[serde(default)]
    pub viscous_friction: Vec<f64>,

    /// Initial static friction per joint. Defaults to 0 if empty.
    #[serde(default)]
    pub static_friction: Vec<f64>,
}

impl ChainParameters {
    /// Degrees of freedom (number of revolute joints).
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    /// Checks what serde cannot: at least one joint, finite numbers, non-negative
    /// masses and friction vectors that are either empty or one entry per joint.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.joints.is_empty() {
            return Err(ParameterError::MissingField("joints".into()));
        }
        check_finite("gravity", &self.gravity)?;
        for (i, joint) in self.joints.iter().enumerate() {
            let label = |field: &str| format!("joints[{}].{}", i, field);
            check_finite(&label("xyz"), &joint.xyz)?;
            check_finite(&label("rpy"), &joint.rpy)?;
            check_finite(&label("axis"), &joint.axis)?;
            check_finite(&label("com"), &joint.com)?;
            check_finite(&label("inertia"), &joint.inertia)?;
            if !(joint.mass >= 0.0) || !joint.mass.is_finite() {
                return Err(ParameterError::ParseError(format!(
                    "{} must be finite and non-negative (got {})",
                    label("mass"),
                    joint.mass
                )));
            }
        }
        for (field, values) in [
            ("viscous_friction", &self.viscous_friction),
            ("static_friction", &self.static_friction),
        ] {
            if !values.is_empty() && values.len() != self.dof() {
                return Err(ParameterError::InvalidLength {
                    field: field.into(),
                    expected: self.dof(),
                    found: values.len(),
                });
            }
            check_finite(field, values)?;
        }
        Ok(())
    }

    /// Convert to string yaml representation (quick viewing, etc). Reads back with
    /// `from_yaml_str` to the same values.
    pub fn to_yaml(&self) -> String {
        // Debug keeps the decimal point, so whole numbers stay floats.
        fn list(values: &[f64]) -> String {
            values
                .iter()
                .map(|x| format!("{:?}", x))
                .collect::<Vec<_>>()
                .join(", ")
        }

        let mut yaml = format!("gravity: [{}]\njoints:\n", list(&self.gravity));
        for joint in &self.joints {
            yaml.push_str(&format!(
                "  - name: \"{}\"\n    \
                xyz: [{}]\n    \
                rpy: [{}]\n    \
                axis: [{}]\n    \
                mass: {:?}\n    \
                com: [{}]\n    \
                inertia: [{}]\n",
                joint.name,
                list(&joint.xyz),
                list(&joint.rpy),
                list(&joint.axis),
                joint.mass,
                list(&joint.com),
                list(&joint.inertia),
            ));
        }
        if !self.viscous_friction.is_empty() {
            yaml.push_str(&format!("viscous_friction: [{}]\n", list(&self.viscous_friction)));
        }
        if !self.static_friction.is_empty() {
            yaml.push_str(&format!("static_friction: [{}]\n", list(&self.static_friction)));
        }
        yaml
    }
}

fn check_finite(field: &str, values: &[f64]) -> Result<(), ParameterError> {
    match values.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(ParameterError::ParseError(format!(
            "{}[{}] must be finite (got {})",
            field, i, values[i]
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_robots_are_valid() {
        ChainParameters::manipulator_3dof().validate().unwrap();
        ChainParameters::planar_2dof().validate().unwrap();
        assert_eq!(ChainParameters::manipulator_3dof().dof(), 3);
    }

    #[test]
    fn test_friction_length_must_match_joints() {
        let mut parameters = ChainParameters::manipulator_3dof();
        parameters.static_friction = vec![0.0; 2];
        match parameters.validate() {
            Err(ParameterError::InvalidLength { field, expected, found }) => {
                assert_eq!(field, "static_friction");
                assert_eq!((expected, found), (3, 2));
            }
            other => panic!("Expected InvalidLength, got {:?}", other),
        }
        parameters.static_friction.clear();
        parameters.validate().unwrap();
    }

    #[test]
    fn test_non_finite_and_negative_mass_rejected() {
        let mut parameters = ChainParameters::planar_2dof();
        parameters.joints[1].com[2] = f64::NAN;
        assert!(matches!(parameters.validate(), Err(ParameterError::ParseError(_))));

        let mut parameters = ChainParameters::planar_2dof();
        parameters.joints[0].mass = -1.0;
        assert!(matches!(parameters.validate(), Err(ParameterError::ParseError(_))));

        let mut parameters = ChainParameters::planar_2dof();
        parameters.joints.clear();
        assert!(matches!(parameters.validate(), Err(ParameterError::MissingField(_))));
    }
}
