//! Gazecheck headless runner
//!
//! Drives one full gaze test against the simulated engine:
//! - starts the engine (or reports it unavailable)
//! - clicks through calibration
//! - waits out the countdown
//! - runs the tracking session and prints the result as JSON

use anyhow::Result;
use clap::Parser;
use gazecheck::engine::{SimulatedEngine, SimulationParams};
use gazecheck::render::{LogRenderer, RenderLoop};
use gazecheck::{GazeTest, GazeTestConfig, Point, TestPhase};
use log::LevelFilter;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "gazecheck")]
#[command(about = "Gazecheck - run a gaze tracking test against a simulated eye", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the tracking session length (ms)
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Viewport width (px)
    #[arg(long, default_value = "1280")]
    width: f64,

    /// Viewport height (px)
    #[arg(long, default_value = "720")]
    height: f64,

    /// Peak noise on each simulated estimate (px)
    #[arg(long, default_value = "15")]
    noise_px: f64,

    /// How far the simulated eye closes in on the stimulus per sample (0-1)
    #[arg(long, default_value = "0.6")]
    follow: f64,

    /// Share of samples with no detection
    #[arg(long, default_value = "0.05")]
    drop_rate: f64,

    /// Seed for the simulated noise
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Engine sample period (ms)
    #[arg(long, default_value = "33")]
    sample_interval_ms: u64,

    /// Pause between synthetic calibration clicks (ms)
    #[arg(long, default_value = "150")]
    click_interval_ms: u64,

    /// Pretend the camera cannot be opened
    #[arg(long)]
    no_camera: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => GazeTestConfig::load(path)?,
        None => GazeTestConfig::default(),
    };
    if let Some(duration_ms) = cli.duration_ms {
        config.tracking.duration_ms = duration_ms;
    }

    let engine = if cli.no_camera {
        SimulatedEngine::unavailable()
    } else {
        SimulatedEngine::new(SimulationParams {
            follow: cli.follow.clamp(0.01, 1.0),
            noise_px: cli.noise_px.max(0.0),
            drop_rate: cli.drop_rate.clamp(0.0, 1.0),
            seed: cli.seed,
        })
    };
    let mut sampler = engine.sampler();

    let mut test = GazeTest::new(config, Box::new(engine), cli.width, cli.height)?;
    let (tx, rx) = crossbeam_channel::unbounded();
    test.connect_events(tx);

    if let Err(e) = test.initialize() {
        log::error!("Failed to start gaze estimation: {}", e);
        log::error!("Make sure a camera is connected and not in use");
        return Err(e.into());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            log::info!("Received shutdown signal...");
            shutdown.store(true, Ordering::Relaxed);
        })?;
    }

    // Where the simulated eye is looking; None while there is nothing to follow
    let stimulus: Arc<Mutex<Option<Point>>> = Arc::new(Mutex::new(None));

    let engine_task = {
        let stimulus = Arc::clone(&stimulus);
        let period = Duration::from_millis(cli.sample_interval_ms.max(1));
        tokio::spawn(async move {
            let origin = Instant::now();
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let looking_at = *stimulus.lock();
                if let Some(p) = looking_at {
                    sampler.sample(p, origin.elapsed().as_secs_f64() * 1000.0);
                }
            }
        })
    };

    let click_every_ms = cli.click_interval_ms as f64;
    let mut last_click_ms = f64::NEG_INFINITY;
    let mut renderer = LogRenderer::default();

    let result = RenderLoop::display_rate()
        .run(&mut test, &mut renderer, Arc::clone(&shutdown), |test, frame, now_ms| {
            *stimulus.lock() = match frame.phase {
                TestPhase::Calibrating => frame.calibration.map(|c| c.position),
                TestPhase::Tracking => frame.target,
                _ => None,
            };

            if let Some(view) = frame.calibration.filter(|v| !v.inert) {
                if now_ms - last_click_ms >= click_every_ms {
                    test.click(view.position.x, view.position.y, now_ms);
                    last_click_ms = now_ms;
                }
            }

            for event in rx.try_iter() {
                log::debug!("event: {:?}", event);
            }
        })
        .await;

    engine_task.abort();
    test.shutdown();

    match result {
        Some(result) => {
            log::info!("Tracking test complete! Accuracy: {}%", result.accuracy);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        None => log::warn!("No result recorded"),
    }

    Ok(())
}
