use anyhow::{Context, Result, bail};
use calloop::EventLoop;
use clap::{Args, Parser, Subcommand};
use prize_wheel::config::{self, Settings};
use prize_wheel::geometry::{self, Easing};
use prize_wheel::render::font::Typeface;
use prize_wheel::render::{self, Frame, PixmapSurface, pixmap};
use prize_wheel::{Color, Layers, Segment, Wheel};
use serde::Serialize;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prize-wheel")]
#[command(about = "Spin an animated prize wheel and report where it lands")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (default: ~/.config/prize-wheel/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spin the wheel until it stops and save the final frame
    Spin {
        #[command(flatten)]
        segments: SegmentArgs,

        #[command(flatten)]
        spin: SpinArgs,

        /// Where to write the final frame
        #[arg(long, short, default_value = "wheel.png")]
        output: PathBuf,

        /// Also write every frame of the animation into this directory
        #[arg(long)]
        frames_dir: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Draw a still wheel at a given rotation
    Render {
        #[command(flatten)]
        segments: SegmentArgs,

        /// Rotation in radians
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        angle: f64,

        #[arg(long, short, default_value = "wheel.png")]
        output: PathBuf,
    },

    /// Show which segment sits under the pointer at a given rotation
    Resolve {
        #[command(flatten)]
        segments: SegmentArgs,

        /// Rotation in radians
        #[arg(long, allow_negative_numbers = true)]
        angle: f64,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config {
        /// Print the config file location instead
        #[arg(long)]
        path: bool,

        /// Write the effective configuration to the config file
        #[arg(long, conflicts_with = "path")]
        write: bool,
    },
}

#[derive(Args)]
struct SegmentArgs {
    /// Read segments from a JSON array or a TOML file with [[segments]]
    #[arg(long, conflicts_with = "segment")]
    segments: Option<PathBuf>,

    /// Add a segment; repeat for more (e.g. --segment "Tacos:#EE4040")
    #[arg(long, value_name = "TEXT[:COLOR]")]
    segment: Vec<String>,
}

#[derive(Args)]
struct SpinArgs {
    /// Stop on the segment with this text
    #[arg(long)]
    winner: Option<String>,

    /// Acceleration time per segment in milliseconds
    #[arg(long)]
    up_ms: Option<u64>,

    /// Deceleration time per segment in milliseconds
    #[arg(long)]
    down_ms: Option<u64>,

    /// Use the single sin+cos curve, running this long per segment
    #[arg(long, conflicts_with_all = ["up_ms", "down_ms"])]
    single_run_ms: Option<u64>,

    /// Hard stop for the spin in milliseconds
    #[arg(long)]
    max_duration_ms: Option<u64>,

    /// Don't draw the current segment's text under the wheel
    #[arg(long)]
    no_caption: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct SpinReport<'a> {
    winner: &'a str,
    index: usize,
    color: String,
    angle: f64,
    ticks: u64,
    elapsed_ms: u64,
    output: String,
}

#[derive(Serialize)]
struct ResolveReport<'a> {
    index: usize,
    text: &'a str,
    color: String,
    angle: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Spin {
            segments,
            spin,
            output,
            frames_dir,
            format,
        } => {
            let mut settings = load_settings(cli.config.as_deref(), &segments)?;
            apply_spin_args(&mut settings, &spin);
            settings.validate()?;
            run_spin(settings, &output, frames_dir.as_deref(), format)?;
        }

        Commands::Render {
            segments,
            angle,
            output,
        } => {
            let settings = load_settings(cli.config.as_deref(), &segments)?;
            settings.validate()?;
            render_still(&settings, angle, &output)?;
            println!("Saved {}", output.display());
        }

        Commands::Resolve {
            segments,
            angle,
            format,
        } => {
            let settings = load_settings(cli.config.as_deref(), &segments)?;
            settings.validate()?;

            let index = geometry::segment_index(settings.segments.len(), angle);
            let segment = &settings.segments[index];
            match format {
                OutputFormat::Text => println!("{}", segment.text),
                OutputFormat::Json => {
                    let report = ResolveReport {
                        index,
                        text: &segment.text,
                        color: segment.fill.to_string(),
                        angle: geometry::normalize_angle(angle),
                    };
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
        }

        Commands::Config { path, write } => {
            if path || write {
                if write {
                    write_settings(cli.config.as_deref())?;
                }
                match cli.config.or_else(config::config_path) {
                    Some(path) => println!("{}", path.display()),
                    None => bail!("Could not determine config directory"),
                }
            } else {
                let settings = match cli.config.as_deref() {
                    Some(path) => Settings::load_from(path)?,
                    None => Settings::load(),
                };
                print!("{}", settings.to_toml()?);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("prize_wheel=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("prize_wheel=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Settings from the config file, with segments replaced by any given on
/// the command line
fn load_settings(config_file: Option<&Path>, args: &SegmentArgs) -> Result<Settings> {
    let mut settings = match config_file {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };

    if let Some(path) = &args.segments {
        settings.segments = config::load_segments(path)?;
    } else if !args.segment.is_empty() {
        settings.segments = args
            .segment
            .iter()
            .enumerate()
            .map(|(index, arg)| Segment::parse_arg(arg, index))
            .collect::<Result<_, _>>()?;
    }

    Ok(settings)
}

/// Save the effective settings, starting from defaults when an explicit
/// config file doesn't exist yet
fn write_settings(config_file: Option<&Path>) -> Result<()> {
    match config_file {
        Some(path) => {
            let settings = if path.exists() {
                Settings::load_from(path)?
            } else {
                Settings::default()
            };
            settings.validate()?;
            settings.save_to(path)
        }
        None => {
            let settings = Settings::load();
            settings.validate()?;
            settings.save()
        }
    }
}

fn apply_spin_args(settings: &mut Settings, args: &SpinArgs) {
    let spin = &mut settings.spin;

    if let Some(winner) = &args.winner {
        spin.winning_segment = Some(winner.clone());
    }

    if let Some(run_ms) = args.single_run_ms {
        spin.easing = Easing::SingleRun { run_ms };
    } else if args.up_ms.is_some() || args.down_ms.is_some() {
        let (up_ms, down_ms) = match spin.easing {
            Easing::UpDown { up_ms, down_ms } => (up_ms, down_ms),
            Easing::SingleRun { .. } => (100, 1000),
        };
        spin.easing = Easing::UpDown {
            up_ms: args.up_ms.unwrap_or(up_ms),
            down_ms: args.down_ms.unwrap_or(down_ms),
        };
    }

    if args.max_duration_ms.is_some() {
        spin.max_duration_ms = args.max_duration_ms;
    }
    if args.no_caption {
        spin.display_winning_text = false;
    }
}

fn new_surface(settings: &Settings, typeface: &Typeface) -> Result<PixmapSurface> {
    let surface = PixmapSurface::new(settings.canvas.width, settings.canvas.height)?;
    Ok(surface.with_typeface(typeface.clone()))
}

fn run_spin(
    settings: Settings,
    output: &Path,
    frames_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let typeface = Typeface::load(&settings.wheel.font_family);
    let layers = Layers {
        wheel: new_surface(&settings, &typeface)?,
        overlay: new_surface(&settings, &typeface)?,
    };

    let mut event_loop: EventLoop<Wheel<PixmapSurface>> =
        EventLoop::try_new().context("Failed to create event loop")?;

    let winner: Rc<RefCell<Option<Segment>>> = Rc::default();
    let sink = winner.clone();
    let (mut wheel, _input) = Wheel::mount(event_loop.handle(), settings, layers, move |segment| {
        *sink.borrow_mut() = Some(segment.clone());
    })?;

    let frame_error: Rc<RefCell<Option<anyhow::Error>>> = Rc::default();
    if let Some(dir) = frames_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create frames directory: {}", dir.display()))?;

        let dir = dir.to_path_buf();
        let errors = frame_error.clone();
        let mut frame = 0u64;
        wheel.set_frame_observer(move |layers, _state| {
            if errors.borrow().is_some() {
                return;
            }
            let path = dir.join(format!("frame-{:05}.png", frame));
            frame += 1;
            if let Err(e) = save_layers(layers, &path) {
                *errors.borrow_mut() = Some(e);
            }
        });
    }

    let started = Instant::now();
    if !wheel.start()? {
        bail!("Wheel refused to start");
    }
    wheel.drive(&mut event_loop)?;
    let elapsed = started.elapsed();

    if let Some(e) = frame_error.borrow_mut().take() {
        return Err(e.context("Failed to write animation frames"));
    }

    let winner = winner
        .borrow_mut()
        .take()
        .context("Spin ended without reporting a winner")?;
    save_layers(wheel.layers(), output)?;

    let state = wheel.state();
    match format {
        OutputFormat::Text => {
            println!("Winner: {}", winner.text);
            println!(
                "Stopped at {:.4} rad after {} ticks ({:.1}s)",
                state.current_angle,
                state.tick_count,
                elapsed.as_secs_f32()
            );
            println!("Saved {}", output.display());
        }
        OutputFormat::Json => {
            let report = SpinReport {
                winner: &winner.text,
                index: geometry::segment_index(wheel.settings().segments.len(), state.current_angle),
                color: winner.fill.to_string(),
                angle: state.current_angle,
                ticks: state.tick_count,
                elapsed_ms: elapsed.as_millis() as u64,
                output: output.display().to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn render_still(settings: &Settings, angle: f64, output: &Path) -> Result<()> {
    let typeface = Typeface::load(&settings.wheel.font_family);
    let mut layers = Layers {
        wheel: new_surface(settings, &typeface)?,
        overlay: new_surface(settings, &typeface)?,
    };

    let frame = Frame {
        angle: geometry::normalize_angle(angle),
        segments: &settings.segments,
        canvas: &settings.canvas,
        wheel: &settings.wheel,
        caption: None,
    };
    render::draw_frame(&mut layers.wheel, &frame)?;
    render::draw_static_overlay(&mut layers.overlay, &settings.wheel, &settings.canvas)?;

    save_layers(&layers, output)
}

fn save_layers(layers: &Layers<PixmapSurface>, path: &Path) -> Result<()> {
    let image = pixmap::composite(&[&layers.wheel, &layers.overlay], Color::WHITE)?;
    pixmap::save_png(&image, path).with_context(|| format!("Failed to save {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spin_args() -> SpinArgs {
        SpinArgs {
            winner: None,
            up_ms: None,
            down_ms: None,
            single_run_ms: None,
            max_duration_ms: None,
            no_caption: false,
        }
    }

    #[test]
    fn test_cli_parses_spin() {
        let cli = Cli::try_parse_from([
            "prize-wheel",
            "spin",
            "--segment",
            "Tacos:#EE4040",
            "--segment",
            "Pizza",
            "--winner",
            "Pizza",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Spin { segments, spin, .. } => {
                assert_eq!(segments.segment.len(), 2);
                assert_eq!(spin.winner.as_deref(), Some("Pizza"));
            }
            _ => panic!("expected spin"),
        }
    }

    #[test]
    fn test_cli_accepts_negative_angle() {
        let cli = Cli::try_parse_from(["prize-wheel", "resolve", "--angle", "-1.5"]).unwrap();
        assert!(matches!(cli.command, Commands::Resolve { angle, .. } if angle == -1.5));
    }

    #[test]
    fn test_spin_args_override_easing() {
        let mut settings = Settings::default();
        apply_spin_args(
            &mut settings,
            &SpinArgs {
                down_ms: Some(500),
                winner: Some("Wendy's".to_string()),
                no_caption: true,
                ..spin_args()
            },
        );
        assert_eq!(
            settings.spin.easing,
            Easing::UpDown {
                up_ms: 100,
                down_ms: 500
            }
        );
        assert_eq!(settings.spin.winning_segment.as_deref(), Some("Wendy's"));
        assert!(!settings.spin.display_winning_text);

        apply_spin_args(
            &mut settings,
            &SpinArgs {
                single_run_ms: Some(250),
                ..spin_args()
            },
        );
        assert_eq!(settings.spin.easing, Easing::SingleRun { run_ms: 250 });
    }

    #[test]
    fn test_segment_flags_replace_config_segments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[wheel]\nradius = 200.0\n").unwrap();

        let args = SegmentArgs {
            segments: None,
            segment: vec!["One:#112233".to_string(), "Two".to_string()],
        };
        let settings = load_settings(Some(&path), &args).unwrap();
        assert_eq!(settings.wheel.radius, 200.0);
        assert_eq!(settings.segments.len(), 2);
        assert_eq!(settings.segments[0].fill, Color::rgb(0x11, 0x22, 0x33));
        assert_eq!(settings.segments[1].text, "Two");
    }

    #[test]
    fn test_render_still_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("still.png");
        let mut settings = Settings::default();
        settings.wheel.font_family = "no-such-font-family".to_string();

        render_still(&settings, 0.5, &output).unwrap();
        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    #[test]
    fn test_config_write_creates_file() {
        let cli = Cli::try_parse_from(["prize-wheel", "config", "--write"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { write: true, path: false }));
        assert!(Cli::try_parse_from(["prize-wheel", "config", "--write", "--path"]).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        write_settings(Some(&path)).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());

        // An existing file is kept as it is, plus any missing defaults
        std::fs::write(&path, "[wheel]\nradius = 200.0\n").unwrap();
        write_settings(Some(&path)).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[canvas]"));
        assert_eq!(Settings::load_from(&path).unwrap().wheel.radius, 200.0);
    }
}
