mod config;
use config::RobotLoopConfig;
use shuffleboard_core::telemetry::init_logging;
use shuffleboard_core::{
    EventImportance, InMemoryNamespace, Namespace, Recorder, Sendable, Shuffleboard, TracingDiagnostics,
    Value,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Simulated arm motor, shown as a controllable speed controller widget
struct ArmMotor {
    output: Arc<Mutex<f64>>,
}

impl Sendable for ArmMotor {
    fn type_name(&self) -> String {
        "Speed Controller".to_string()
    }

    fn is_actuator(&self) -> bool {
        true
    }

    fn properties(&self) -> Vec<(String, Value)> {
        let output = *self.output.lock().unwrap_or_else(|p| p.into_inner());
        vec![("Value".to_string(), Value::Double(output))]
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info,shuffleboard_core=info,robot_loop=info");

    let cfg = RobotLoopConfig::load();
    info!(
        target: "robot_loop",
        period_ms = cfg.period.as_millis() as u64,
        iterations = cfg.iterations,
        "Starting robot loop"
    );

    let namespace = InMemoryNamespace::with_capacity(cfg.shuffleboard.channel_capacity);
    let board = Shuffleboard::from_config(
        &cfg.shuffleboard,
        namespace.clone(),
        Arc::new(TracingDiagnostics),
    );

    std::fs::create_dir_all(&cfg.shuffleboard.recording_dir)?;
    let recorder = Recorder::with_base_table(
        cfg.shuffleboard.recording_dir.clone(),
        &cfg.shuffleboard.base_table,
    )
    .spawn(namespace.subscribe());

    run(&cfg, &board).await?;

    board.add_event_marker("Match end", None, Some(EventImportance::High));
    board.stop_recording();
    board.update();

    // The recorder finishes once every namespace handle is gone
    drop(board);
    drop(namespace);
    let recorder = recorder.await?;
    for file in recorder.finished_files() {
        info!(target: "robot_loop", file = %file.display(), "Recording written");
    }
    Ok(())
}

/// Build the dashboard and drive it once per period until the budget or Ctrl+C
async fn run(
    cfg: &RobotLoopConfig,
    board: &Shuffleboard,
) -> Result<(), Box<dyn std::error::Error>> {
    let ticks = Arc::new(AtomicU64::new(0));
    let arm_output = Arc::new(Mutex::new(0.0));

    let drive = board.get_tab("Drive");
    let speed = drive
        .add("Speed", 0.0)?
        .with_widget("Number Bar")
        .with_properties([("Min", Value::Double(-1.0)), ("Max", Value::Double(1.0))])
        .with_size(2, 1)
        .with_position(0, 0)
        .entry();
    {
        let ticks = Arc::clone(&ticks);
        drive.add_supplied("Loop Count", move || {
            Value::Double(ticks.load(Ordering::Relaxed) as f64)
        })?;
    }

    let arm = board.get_tab("Arm").get_layout("List", "Mechanism")?;
    arm.add_sendable(
        "Arm Motor",
        Arc::new(ArmMotor {
            output: Arc::clone(&arm_output),
        }),
    )?
    .with_size(2, 2);
    let at_target = arm.add("At Target", false)?.with_widget("Boolean Box").entry();

    board.select_tab("Drive");
    board.enable_actuator_widgets();

    let mut ticker = interval(cfg.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(target: "robot_loop", "Shutting down...");
                break;
            }
            _ = ticker.tick() => {
                let tick = ticks.fetch_add(1, Ordering::Relaxed) + 1;
                let t = tick as f64 * cfg.period.as_secs_f64();

                if let Err(e) = speed.set(t.sin()) {
                    error!(target: "robot_loop", error = %e, "Failed to publish speed");
                }
                let output = (t * 0.5).cos() * 0.8;
                *arm_output.lock().unwrap_or_else(|p| p.into_inner()) = output;
                if let Err(e) = at_target.set(output.abs() < 0.1) {
                    error!(target: "robot_loop", error = %e, "Failed to publish arm state");
                }

                if tick == cfg.record_from {
                    board.disable_actuator_widgets();
                    board.start_recording();
                    board.add_event_marker(
                        "Match start",
                        Some("loop entered match mode"),
                        Some(EventImportance::Normal),
                    );
                }
                if tick % 100 == 0 {
                    board.add_event_marker(
                        &format!("Checkpoint {}", tick / 100),
                        None,
                        Some(EventImportance::Low),
                    );
                }

                board.update();

                if cfg.iterations > 0 && tick >= cfg.iterations {
                    info!(target: "robot_loop", ticks = tick, "Iteration budget reached");
                    break;
                }
            }
        }
    }

    Ok(())
}
