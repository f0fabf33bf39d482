#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::learner::{ChannelLayout, LearnerConfig, SystemIdLearner};
    use crate::parameter_error::ParameterError;
    use crate::parameters::ChainParameters;
    use crate::robot::Robot;

    const READ_ERROR: &'static str = "Failed to load parameters from file";

    #[test]
    fn test_chain_from_yaml() {
        let loaded = ChainParameters::from_yaml_file("src/tests/data/planar_2dof.yaml").expect(READ_ERROR);
        let expected = ChainParameters::planar_2dof();

        assert_eq!(loaded.dof(), 2);
        assert_eq!(loaded.gravity, expected.gravity);
        assert_eq!(loaded.joints[1].name, "elbow");
        assert_eq!(loaded.joints[1].xyz, expected.joints[1].xyz);
        assert_eq!(loaded.joints[0].axis, expected.joints[0].axis);
        assert_eq!(loaded.joints[1].com, expected.joints[1].com);
        for (a, b) in loaded.joints.iter().zip(expected.joints.iter()) {
            assert_eq!(a.mass, b.mass);
            for k in 0..6 {
                assert_relative_eq!(a.inertia[k], b.inertia[k], epsilon = 1e-15);
            }
        }
        assert_eq!(loaded.viscous_friction, expected.viscous_friction);
        assert_eq!(loaded.static_friction, expected.static_friction);
    }

    #[test]
    fn test_yaml_round_trip() {
        let parameters = ChainParameters::manipulator_3dof();
        let reloaded = ChainParameters::from_yaml_str(&parameters.to_yaml()).expect(READ_ERROR);
        assert_eq!(parameters, reloaded);
    }

    #[test]
    fn test_rotated_joint_frame() {
        // The rolled elbow frame describes the same arm, so the dynamics must agree.
        let planar = Robot::from_parameters(&ChainParameters::planar_2dof()).unwrap();
        let tilted = ChainParameters::from_yaml_file("src/tests/data/tilted_elbow.yaml").expect(READ_ERROR);
        assert_relative_eq!(tilted.joints[1].rpy[0], -std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        let tilted = Robot::from_parameters(&tilted).unwrap();

        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..10 {
            let q = DVector::from_fn(2, |_, _| rng.gen_range(-3.0..3.0));
            let v = DVector::from_fn(2, |_, _| rng.gen_range(-2.0..2.0));
            let a = DVector::from_fn(2, |_, _| rng.gen_range(-5.0..5.0));
            assert_relative_eq!(
                planar.inverse_dynamics(&q, &v, &a).unwrap(),
                tilted.inverse_dynamics(&q, &v, &a).unwrap(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_deg_in_yaml_string() {
        let yaml = "
joints:
  - name: shoulder
    axis: [0.0, 0.0, 1.0]
    mass: 1.0
    com: [0.1, 0.0, 0.0]
  - name: elbow
    xyz: [0.3, 0.0, 0.0]
    rpy: [0.0, deg(90.0), deg(-45.0)]
    axis: [0.0, 0.0, 1.0]
    mass: 0.5
    com: [0.1, 0.0, 0.0]
";
        let parameters = ChainParameters::from_yaml_str(yaml).expect(READ_ERROR);
        assert_relative_eq!(parameters.joints[1].rpy[1], std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(parameters.joints[1].rpy[2], -std::f64::consts::FRAC_PI_4, epsilon = 1e-12);
    }

    #[test]
    fn test_friction_length_checked() {
        let result = ChainParameters::from_yaml_file("src/tests/data/bad_friction.yaml");
        match result {
            Err(ParameterError::InvalidLength { field, expected, found }) => {
                assert_eq!(field, "viscous_friction");
                assert_eq!((expected, found), (2, 3));
            }
            other => panic!("Expected InvalidLength, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_and_bad_yaml() {
        assert!(matches!(
            ChainParameters::from_yaml_file("src/tests/data/no_such_robot.yaml"),
            Err(ParameterError::IoError(_))
        ));
        assert!(matches!(
            ChainParameters::from_yaml_str("joints: [{ xyz: [0.0, 0.0, 0.0] }]"),
            Err(ParameterError::ParseError(_))
        ));
        assert!(matches!(
            ChainParameters::from_yaml_str("joints: []"),
            Err(ParameterError::MissingField(_))
        ));
    }

    #[test]
    fn test_learner_config_from_yaml() {
        let config = LearnerConfig::from_yaml_file("src/tests/data/learner.yaml").expect(READ_ERROR);
        assert_eq!(config.history_length, 4);
        assert_eq!(config.prediction_horizon, 1);
        assert!(!config.averaging);
        assert_eq!(config.seed, 17);
        assert_eq!(
            config.layout,
            Some(ChannelLayout {
                angles: 3..6,
                velocities: 0..3,
                torques: 6..9,
            })
        );
        assert_eq!(config.preprocess.smoothing_sigma, 0.0);
        assert_eq!(config.preprocess.trim_margin, 2);
        assert_eq!(config.preprocess.desired_sample_count, 1000);
        assert_eq!(config.estimator.regularization_epsilon, 1e-10);
        assert_eq!(config.estimator.regularization_mu, 1e-6);

        let robot = Robot::from_parameters(&ChainParameters::manipulator_3dof()).unwrap();
        let learner = SystemIdLearner::new(robot, config).unwrap();
        assert_eq!(learner.layout().angles, 3..6);
    }

    #[test]
    fn test_unsupported_learner_config_loads_but_is_rejected() {
        let config = LearnerConfig::from_yaml_str("prediction_horizon: 5\n").expect(READ_ERROR);
        let robot = Robot::from_parameters(&ChainParameters::manipulator_3dof()).unwrap();
        assert!(SystemIdLearner::new(robot, config).is_err());
    }
}
