use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ndarray::{s, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use rs_manipulator_sysid::learner::{DynamicsLearner, LearnerConfig, SystemIdLearner};
use rs_manipulator_sysid::parameters::ChainParameters;
use rs_manipulator_sysid::preprocess::PreprocessConfig;
use rs_manipulator_sysid::robot::Robot;
use rs_manipulator_sysid::synthetic::SyntheticExcitation;
use rs_manipulator_sysid::utils::dump_params;

/// Identifies a robot from synthetic excitation data and checks one step predictions
/// on a held out run.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Robot description (YAML). The built-in three joint manipulator if not given.
    #[arg(short, long)]
    robot: Option<PathBuf>,

    /// Learner configuration (YAML). Its preprocess timestep should be 0.001 s.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recorded runs used for learning; one more is recorded and held out.
    #[arg(long, default_value_t = 8)]
    samples: usize,

    /// Timesteps of 1 ms per run.
    #[arg(long, default_value_t = 1000)]
    timesteps: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Usage example.
fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let parameters = match &args.robot {
        Some(path) => ChainParameters::from_yaml_file(path)
            .with_context(|| format!("reading robot from {}", path.display()))?,
        None => ChainParameters::manipulator_3dof(),
    };
    println!("Robot:\n{}", parameters.to_yaml());

    let config = match &args.config {
        Some(path) => LearnerConfig::from_yaml_file(path)
            .with_context(|| format!("reading learner configuration from {}", path.display()))?,
        None => LearnerConfig {
            preprocess: PreprocessConfig {
                desired_sample_count: 1000,
                smoothing_sigma: 0.0,
                trim_margin: 10,
                timestep: 0.001,
            },
            seed: args.seed,
            ..Default::default()
        },
    };

    let mut truth = Robot::from_parameters(&parameters)?;
    // Make the friction differ from the initial guess the learner starts with.
    let mut theta = truth.get_params();
    let friction = theta.len() - 2 * truth.dof();
    for j in 0..truth.dof() {
        theta[friction + j] = 0.02 + 0.01 * j as f64;
        theta[friction + truth.dof() + j] = 0.005;
    }
    truth.set_params(&theta)?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let worst = truth.self_test(&mut rng, 20)?;
    println!("Self test passed, worst regressor residual {:e}", worst);

    let excitation = SyntheticExcitation {
        samples: args.samples + 1,
        timesteps: args.timesteps,
        timestep: 0.001,
        ..Default::default()
    };
    let batch = excitation.generate(&truth, &mut rng)?;
    let (held_out, training) = batch.split_samples(1)?;

    let mut learner = SystemIdLearner::new(Robot::from_parameters(&parameters)?, config)?;
    let observations = learner.layout().pack(&training)?;
    learner.learn(observations.view(), training.torques().view())?;

    if let Some(report) = learner.fit_report() {
        println!(
            "Fitted {} parameters on {} samples: normal equation residual {:e}, torque RMS {:e}",
            report.parameters, report.samples, report.normal_equation_residual, report.torque_rms
        );
    }
    println!("True parameters:");
    dump_params(&truth.get_params());
    println!("Identified parameters (inertial ones only up to the null space of the regressor):");
    dump_params(&learner.robot().get_params());

    let layout = learner.layout().clone();
    let observations = layout.pack(&held_out)?;
    let torques = held_out.torques();
    let mut worst_angle: f64 = 0.0;
    let mut worst_velocity: f64 = 0.0;
    for t in 0..held_out.timesteps().saturating_sub(1) {
        let predicted = learner.predict(
            observations.slice(s![.., t..=t, ..]),
            torques.slice(s![.., t..=t, ..]),
            None,
        )?;
        let actual = observations.index_axis(Axis(1), t + 1);
        let error = |range: std::ops::Range<usize>| {
            (&predicted.slice(s![.., range.clone()]) - &actual.slice(s![.., range]))
                .iter()
                .fold(0.0_f64, |m, x| m.max(x.abs()))
        };
        worst_angle = worst_angle.max(error(layout.angles.clone()));
        worst_velocity = worst_velocity.max(error(layout.velocities.clone()));
    }
    println!(
        "One step predictions on the held out run: worst angle error {:e}, worst velocity error {:e}",
        worst_angle, worst_velocity
    );
    Ok(())
}
