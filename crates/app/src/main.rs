use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use status_orb_core::{
    decode_line, AnimationSnapshot, Channel, Event, FrameDriver, OrbConfig, OrbEngine, OrbError,
    RenderBackend, SurfaceMesh,
};
use tracing_subscriber::EnvFilter;

fn main() -> status_orb_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Stream {
            fps,
            every,
            linger,
        } => run_stream(config, fps, every, linger),
        Commands::Demo { fps, every } => run_demo(config, fps, every),
    }
}

fn load_config(path: Option<&Path>) -> status_orb_core::Result<OrbConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            OrbConfig::from_json_file(path)
        }
        None => Ok(OrbConfig::default()),
    }
}

fn run_stream(
    config: OrbConfig,
    fps: u32,
    every: u64,
    linger: f32,
) -> status_orb_core::Result<()> {
    tracing::info!(fps, "streaming events from stdin");

    let frame = frame_duration(fps)?;
    let engine = OrbEngine::new(config)?;
    let mut driver = FrameDriver::new(engine, JsonLinesBackend::new(every));
    let inbox = spawn_reader();
    let mut closed_at: Option<Instant> = None;
    let mut next_frame = Instant::now();

    loop {
        loop {
            match inbox.try_recv() {
                Ok(line) => apply_line(driver.engine_mut(), &line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if closed_at.is_none() {
                        tracing::info!("input closed");
                        closed_at = Some(Instant::now());
                    }
                    break;
                }
            }
        }

        if let Some(closed) = closed_at {
            if closed.elapsed().as_secs_f32() >= linger {
                break;
            }
        }

        driver.run_frame(frame);

        next_frame += frame;
        let now = Instant::now();
        if next_frame > now {
            thread::sleep(next_frame - now);
        } else {
            next_frame = now;
        }
    }

    tracing::info!(
        frames = driver.engine().clock().frame(),
        dropped = driver.dropped(),
        "stream finished"
    );
    Ok(())
}

/// Replays a fixed session on virtual time, printing sampled snapshots.
fn run_demo(config: OrbConfig, fps: u32, every: u64) -> status_orb_core::Result<()> {
    let frame = frame_duration(fps)?;
    let epsilon = config.field.normal_epsilon;
    let engine = OrbEngine::new(config)?;
    let mut driver = FrameDriver::new(engine, JsonLinesBackend::new(every));
    let mesh = SurfaceMesh::uv_sphere(24, 48, epsilon);

    let script: &[(u64, &str)] = &[
        (0, "!lock waiting"),
        (0, "!activate waiting"),
        (500, "🎬 ========== REQUEST STARTED =========="),
        (800, "💭 THINKING"),
        (2_500, "🌐 SEARCHING"),
        (4_000, "[ERROR] ❌ TOOL FAILED : timeout"),
        (4_200, "🔄 RETRY"),
        (6_000, "💾 WRITING report.md"),
        (7_000, "!advance"),
        (8_000, "✅ OK"),
        (8_000, "!unlock waiting"),
        (8_000, "!deactivate waiting"),
        (8_100, "🏁 ========== REQUEST FINISHED =========="),
    ];
    let total = Duration::from_millis(12_000);

    let mut pending = script.iter().peekable();
    while driver.engine().now() < total {
        let now = driver.engine().now();
        while let Some((_, line)) = pending.next_if(|(at, _)| Duration::from_millis(*at) <= now) {
            apply_line(driver.engine_mut(), line);
        }

        let snapshot = driver.run_frame(frame);
        if snapshot.frame % (u64::from(fps) * 2) == 0 {
            let stats = mesh.stats(&snapshot);
            tracing::info!(
                t = snapshot.elapsed_seconds,
                activity = snapshot.activity,
                error = snapshot.levels.error,
                energy = snapshot.energy,
                min = stats.min_displacement,
                max = stats.max_displacement,
                "surface"
            );
        }
    }

    Ok(())
}

fn frame_duration(fps: u32) -> status_orb_core::Result<Duration> {
    if fps == 0 {
        return Err(OrbError::msg("fps must be positive"));
    }
    Ok(Duration::from_secs_f64(1.0 / f64::from(fps)))
}

fn spawn_reader() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if sender.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "failed to read input");
                    break;
                }
            }
        }
    });
    receiver
}

/// Lines starting with `!` drive the control surface; everything else is an
/// event.
fn apply_line(engine: &mut OrbEngine, line: &str) {
    match line.trim().strip_prefix('!') {
        Some(command) => {
            if let Err(err) = apply_command(engine, command) {
                tracing::warn!(command, %err, "ignoring control command");
            }
        }
        None => {
            if let Some(event) = decode_line(line) {
                ingest(engine, event);
            }
        }
    }
}

fn ingest(engine: &mut OrbEngine, event: Event) {
    let class = engine.ingest(event);
    tracing::debug!(token = ?class.token, state = ?class.state_class, "ingested");
}

fn apply_command(engine: &mut OrbEngine, command: &str) -> status_orb_core::Result<()> {
    let mut parts = command.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let arg = parts.next();

    match verb {
        "activate" => engine.request_activate(parse_channel(arg)?),
        "deactivate" => engine.request_deactivate(parse_channel(arg)?),
        "lock" => engine.lock(parse_channel(arg)?),
        "unlock" => engine.unlock(parse_channel(arg)?),
        "advance" => engine.advance_color(),
        "pulse" => {
            let millis = parse_number::<u64>(arg)?;
            engine.pulse_error(Duration::from_millis(millis));
        }
        "impulse" => {
            let magnitude = parse_number::<f32>(arg)?;
            engine.trigger_impulse(magnitude);
        }
        other => return Err(OrbError::msg(format!("unknown command `{other}`"))),
    }

    Ok(())
}

fn parse_channel(arg: Option<&str>) -> status_orb_core::Result<Channel> {
    match arg {
        Some("working") => Ok(Channel::Working),
        Some("waiting") => Ok(Channel::Waiting),
        Some("error") => Ok(Channel::Error),
        Some(other) => Err(OrbError::msg(format!("unknown channel `{other}`"))),
        None => Err(OrbError::msg("missing channel")),
    }
}

fn parse_number<T: std::str::FromStr>(arg: Option<&str>) -> status_orb_core::Result<T> {
    arg.and_then(|raw| raw.parse().ok())
        .ok_or_else(|| OrbError::msg("expected a numeric argument"))
}

/// Writes every `every`-th snapshot to stdout as one JSON object per line.
struct JsonLinesBackend {
    every: u64,
    out: io::Stdout,
}

impl JsonLinesBackend {
    fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            out: io::stdout(),
        }
    }
}

impl RenderBackend for JsonLinesBackend {
    fn submit(&mut self, snapshot: &AnimationSnapshot) -> status_orb_core::Result<()> {
        if snapshot.frame % self.every != 0 {
            return Ok(());
        }

        let mut out = self.out.lock();
        serde_json::to_writer(&mut out, snapshot)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Animated status orb driven by agent logs", long_about = None)]
struct Cli {
    /// Optional JSON configuration preset.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read log lines (plain or JSON envelopes) from stdin and emit snapshots.
    Stream {
        /// Frames per second of the animation loop.
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Emit every n-th snapshot.
        #[arg(long, default_value_t = 30)]
        every: u64,
        /// Seconds to keep animating after stdin closes.
        #[arg(long, default_value_t = 3.0)]
        linger: f32,
    },
    /// Replay a scripted agent session on virtual time.
    Demo {
        #[arg(long, default_value_t = 60)]
        fps: u32,
        #[arg(long, default_value_t = 30)]
        every: u64,
    },
}
