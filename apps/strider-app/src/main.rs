//! Strider locomotion planner CLI.
//!
//! Provides three modes of operation:
//! - `simulate`: Walk a kinematic quadruped with the planner and print a per-stride summary
//! - `check-config`: Load and validate a TOML configuration
//! - `info`: Print workspace crate versions and configuration defaults

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};
use nalgebra::Vector3;

use strider_core::{HorizontalPlane, LegId, MotionCommand, StriderError};
use strider_planner::{LocomotionConfig, LocomotionController, NoValidation, PlacementKind};
use strider_test_utils::{IdentityKinematics, KinematicQuadruped, nominal_stance};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Real-time locomotion planner for quadrupeds.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a kinematic quadruped and print a per-stride summary.
    Simulate {
        /// TOML configuration file. Defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Simulated time in seconds.
        #[arg(short, long, default_value_t = 20.0)]
        duration: f64,

        /// Control period in seconds.
        #[arg(long, default_value_t = 0.0025)]
        dt: f64,

        /// Heading velocity (m/s).
        #[arg(long, default_value_t = 0.1, allow_hyphen_values = true)]
        heading: f64,

        /// Lateral velocity (m/s).
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        lateral: f64,

        /// Turning rate (rad/s).
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        turn: f64,

        /// Ground height (m).
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        ground: f64,

        /// Use the dynamic-gait foot placement.
        #[arg(long)]
        dynamic: bool,

        /// Return to stand after this many seconds.
        #[arg(long)]
        stand_after: Option<f64>,
    },

    /// Load and validate a configuration file.
    CheckConfig {
        /// TOML configuration file.
        path: PathBuf,
    },

    /// Print crate information.
    Info,
}

/// Options of the `simulate` mode.
struct SimulateOptions {
    config: Option<PathBuf>,
    duration: f64,
    dt: f64,
    command: MotionCommand,
    ground: f64,
    dynamic: bool,
    stand_after: Option<f64>,
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

/// Step length used when running without a configuration file.
const DEFAULT_MAX_STEP_LENGTH: f64 = 0.15;

fn load_config(path: Option<&Path>) -> Result<LocomotionConfig, StriderError> {
    match path {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            Ok(LocomotionConfig::from_file(path)?)
        }
        None => Ok(LocomotionConfig::with_max_step_length(DEFAULT_MAX_STEP_LENGTH)),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn run_simulate(options: &SimulateOptions) -> Result<(), StriderError> {
    let mut config = load_config(options.config.as_deref())?;
    if options.dynamic {
        config.placement = PlacementKind::DynamicGait;
    }

    let sensed = nominal_stance(options.ground);
    let mut controller = LocomotionController::new(
        config,
        Box::new(HorizontalPlane::new(options.ground)),
        Box::new(IdentityKinematics::default()),
        Box::new(NoValidation),
        &sensed,
    )?;
    let mut robot = KinematicQuadruped::new(sensed, Box::new(HorizontalPlane::new(options.ground)));

    controller.set_velocity(options.command);
    controller.resume_walking();

    let ticks = (options.duration / options.dt).ceil() as usize;
    let stand_tick = options
        .stand_after
        .map(|seconds| (seconds / options.dt).ceil() as usize);
    let mut cycles = controller.gait().num_cycles();
    let mut steps = 0_u64;

    for tick in 0..ticks {
        if stand_tick == Some(tick) {
            controller.go_to_stand();
        }
        let output = controller.tick(options.dt, robot.sensed())?;
        robot.apply(&output, options.dt);

        for leg in LegId::ALL {
            if let Some(record) = controller.foothold(leg) {
                steps = steps.max(record.foothold.step_number);
            }
        }

        if controller.gait().num_cycles() != cycles {
            cycles = controller.gait().num_cycles();
            let position = output.torso_pose.position;
            let modes: Vec<String> = LegId::ALL
                .iter()
                .map(|&leg| format!("{leg}:{:?}", controller.mode(leg)))
                .collect();
            println!(
                "stride {cycles:3}: t={:6.2}s torso=({:+.3}, {:+.3}, {:.3}) steps={steps} {}",
                (tick + 1) as f64 * options.dt,
                position.x,
                position.y,
                position.z,
                modes.join(" ")
            );
        }
    }

    let torso = robot.sensed().torso.position;
    println!(
        "\ntotal: strides={}, footholds={steps}, distance={:.3} m, walking={}",
        controller.gait().num_cycles(),
        torso.xy().norm(),
        controller.is_walking()
    );
    Ok(())
}

fn run_check_config(path: &Path) -> Result<(), StriderError> {
    let config = LocomotionConfig::from_file(path)?;
    let timing = config.gait.timing_at(0.0);
    println!("{}: ok", path.display());
    println!("  placement:       {:?}", config.placement);
    println!("  cycle duration:  {:.3} s at rest", timing.cycle_duration);
    println!(
        "  duty factors:    fore {:.2}, hind {:.2}",
        timing.fore_duty_factor, timing.hind_duty_factor
    );
    println!(
        "  max step length: {:.3} m",
        config.foothold.max_step_length.unwrap_or_default()
    );
    println!(
        "  safety deltas:   forward {:.3} m, backward {:.3} m",
        config.support_polygon.delta_forward, config.support_polygon.delta_backward
    );
    Ok(())
}

fn run_info() {
    let defaults = LocomotionConfig::default();
    println!("strider v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  strider-core       {}", env!("CARGO_PKG_VERSION"));
    println!("  strider-planner    {}", env!("CARGO_PKG_VERSION"));
    println!("  strider-test-utils {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("defaults:");
    println!("  placement:     {:?}", defaults.placement);
    println!("  torso height:  {:.3} m", defaults.torso.fore_height_offset);
    println!("  swing height:  {:.3} m", defaults.foothold.swing_height);
    println!("  regain step:   {:.3} m", defaults.foothold.regain_step);
    println!();
    println!("edition: 2024");
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Simulate {
            config,
            duration,
            dt,
            heading,
            lateral,
            turn,
            ground,
            dynamic,
            stand_after,
        }) => run_simulate(&SimulateOptions {
            config,
            duration,
            dt,
            command: MotionCommand {
                linear_velocity: Vector3::new(heading, lateral, 0.0),
                angular_velocity: Vector3::new(0.0, 0.0, turn),
            },
            ground,
            dynamic,
            stand_after,
        }),
        Some(Commands::CheckConfig { path }) => run_check_config(&path),
        Some(Commands::Info) => {
            run_info();
            Ok(())
        }
        None => {
            // Default: short walk with defaults
            run_simulate(&SimulateOptions {
                config: None,
                duration: 10.0,
                dt: 0.0025,
                command: MotionCommand::heading(0.1),
                ground: 0.0,
                dynamic: false,
                stand_after: None,
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
