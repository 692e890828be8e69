//! Offline path following demonstration.
//!
//! Runs the trajectory controller against a simple kinematic simulation of
//! the base: each cycle the newest simulated odometry is written into the
//! controller's measurement slot, one control cycle is processed, and the
//! commanded velocities are integrated forward to make the next measurement.
//! The world is a flat cost grid with a single obstacle block beside the
//! path, so the cost steering terms have something to react to.
//!
//! Usage:
//!
//!     follow_sim [params.toml]
//!
//! With no argument the built-in default parameters are used.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Standard
use std::env;
use std::time::{Duration, Instant};

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::info;
use nalgebra::{Isometry2, Vector2};

// Internal
use traj_ctrl::goal::SimpleGoalChecker;
use traj_ctrl::cost_map::CostGrid;
use traj_ctrl::{Odometry, Params, Path, Pose, TrajCtrl, Twist};
use util::logger::{logger_init, LevelFilter};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period of one simulated control cycle.
const CYCLE_PERIOD_S: f64 = 0.05;

/// Give up if the goal hasn't been reached after this many cycles.
const MAX_CYCLES: usize = 4000;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    logger_init(LevelFilter::Debug, None).wrap_err("Failed to initialise logging")?;

    info!("Trajectory control path following demonstration\n");

    // ---- LOAD PARAMETERS ----

    let args: Vec<String> = env::args().collect();

    let params = match args.get(1) {
        Some(path) => Params::load(path).wrap_err("Could not load controller params")?,
        None => Params::default(),
    };

    // ---- WORLD SETUP ----

    // 20 x 20 m grid of 5 cm cells centred on the origin, with a soft-cost
    // block just left of the path so the lateral cost term pushes away
    let mut grid = CostGrid::new(400, 400, 0.05, Vector2::new(-10.0, -10.0));
    grid.set_world_rect(Vector2::new(2.0, 0.15), Vector2::new(3.0, 1.0), 180);

    let path = Path::direct(Vector2::new(0.0, 0.0), Vector2::new(6.0, 0.0), 0.1);
    info!("Following a {} point path to (6.0, 0.0)", path.len());

    // ---- CONTROLLER SETUP ----

    let mut ctrl = TrajCtrl::new(params.clone());
    ctrl.set_plan(path);

    let checker = SimpleGoalChecker::from_params(&params);
    let odometry_slot = ctrl.odometry_slot();

    // The simulation runs in the global frame
    let local_tf = Isometry2::identity();

    // ---- MAIN LOOP ----

    // Base starts slightly off the path, facing along it
    let mut pose = Pose::new(0.0, -0.2, 0.0);
    let mut twist = Twist::zero();

    let epoch = Instant::now();

    for cycle in 0..MAX_CYCLES {
        let now = epoch + Duration::from_secs_f64(cycle as f64 * CYCLE_PERIOD_S);

        // Measurement in, command out
        *odometry_slot
            .lock()
            .map_err(|_| eyre!("Odometry slot poisoned"))? = Some(Odometry { pose, twist });

        if ctrl
            .is_goal_reached(&checker, now)
            .wrap_err("Goal check failed")?
        {
            info!(
                "Goal reached after {} cycles ({:.1} s simulated)",
                cycle,
                cycle as f64 * CYCLE_PERIOD_S
            );
            return Ok(());
        }

        let (cmd, report) = ctrl
            .proc(now, Some(&local_tf), &grid)
            .wrap_err("Control cycle failed")?;

        if report.stuck {
            return Err(eyre!("Controller reported stuck at {:?}", pose));
        }

        if cycle % 20 == 0 {
            info!(
                "t = {:5.1} s: pose = ({:6.3}, {:6.3}, {:6.3}), cmd = ({:5.3}, {:5.3}), state = {:?}",
                cycle as f64 * CYCLE_PERIOD_S,
                pose.position_m[0],
                pose.position_m[1],
                pose.yaw_rad,
                cmd.lin_x_ms,
                cmd.ang_rads,
                report.state
            );
        }

        // Integrate the command forward as perfect kinematics
        twist = Twist::new(cmd.lin_x_ms, cmd.lin_y_ms, cmd.ang_rads);
        let next_pos = pose.body_to_world(Vector2::new(
            cmd.lin_x_ms * CYCLE_PERIOD_S,
            cmd.lin_y_ms * CYCLE_PERIOD_S,
        ));
        pose = Pose::new(
            next_pos[0],
            next_pos[1],
            pose.yaw_rad + cmd.ang_rads * CYCLE_PERIOD_S,
        );
    }

    Err(eyre!(
        "Goal not reached within {} cycles, final pose {:?}",
        MAX_CYCLES,
        pose
    ))
}
