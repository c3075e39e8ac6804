use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use label_preview_core::audio::decode::decode_peaks;
use label_preview_core::{
    format_time, AppConfig, PeakEngineFactory, PlaybackCoordinator, PlaybackStore, PlayerEvent,
    PreviewError, TrackRef, WaveformPainter,
};
use tracing_subscriber::EnvFilter;

const FRAME_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> label_preview_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            files,
            seek,
            width,
            color,
        } => run_play(&config, &files, seek, width, color),
        Commands::Peaks { input, bars } => run_peaks(&config, &input, bars),
    }
}

fn run_play(
    config: &AppConfig,
    files: &[PathBuf],
    seek: Option<f64>,
    width: usize,
    color: bool,
) -> label_preview_core::Result<()> {
    tracing::info!(tracks = files.len(), "starting preview");

    let store = PlaybackStore::from_config(&config.player)?;
    let events = store.subscribe()?;
    let factory = PeakEngineFactory::new(config.decode.clone());
    let mut coordinator = PlaybackCoordinator::new(store.clone(), factory, config);
    let painter = WaveformPainter::new(width, &config.waveform)?.colored(color);

    let tracks: Vec<TrackRef> = files.iter().map(|path| TrackRef::from_path(path)).collect();
    let total = tracks.len();
    store.play_collection(tracks, 0)?;

    let mut pending_seek = seek;
    let mut done = 0usize;
    let mut failures = 0usize;
    let mut stdout = std::io::stdout();

    while done < total {
        let now = Instant::now();
        coordinator.step(now)?;

        for event in events.drain() {
            match event {
                PlayerEvent::Completed { .. } => done += 1,
                PlayerEvent::LoadFailed { track_id } => {
                    writeln!(stdout, "\n{track_id}: preview unavailable")?;
                    done += 1;
                    failures += 1;
                    if done < total {
                        store.play_next()?;
                    }
                }
                _ => {}
            }
        }

        if let Some(target) = pending_seek {
            if coordinator.renderer().controls_visible() {
                let duration = store.snapshot()?.duration;
                if duration > 0.0 {
                    coordinator.scrub(target / duration, now);
                }
                pending_seek = None;
            }
        }

        let state = store.snapshot()?;
        let title = state
            .current_track
            .as_ref()
            .map(|track| track.title.as_str())
            .unwrap_or("-");
        write!(
            stdout,
            "\r{} {} / {}  {}",
            coordinator.view(&painter),
            format_time(state.current_time),
            format_time(state.duration),
            title
        )?;
        stdout.flush()?;

        std::thread::sleep(FRAME_INTERVAL);
    }
    writeln!(stdout)?;
    coordinator.unmount();

    if failures == total {
        return Err(PreviewError::msg("no track could be previewed"));
    }
    tracing::info!(played = total - failures, failures, "preview finished");
    Ok(())
}

fn run_peaks(config: &AppConfig, input: &Path, bars: Option<usize>) -> label_preview_core::Result<()> {
    tracing::info!(?input, "computing waveform peaks");

    let mut options = config.waveform.clone();
    if let Some(bars) = bars {
        options.bars = bars;
    }
    let src = input.to_string_lossy();
    let peaks = decode_peaks(&src, &options, &config.decode, &AtomicBool::new(false))?
        .ok_or_else(|| PreviewError::msg("decode was cancelled"))?;

    println!("{}", serde_json::to_string_pretty(&peaks)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio preview player for the label catalog", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Preview one or more local audio files in order.
    Play {
        /// Audio files to queue.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Jump to this many seconds into the first track once it loads.
        #[arg(short, long)]
        seek: Option<f64>,
        /// Width of the waveform line in columns.
        #[arg(short, long, default_value_t = 60)]
        width: usize,
        /// Draw the waveform with ANSI colours.
        #[arg(long)]
        color: bool,
    },
    /// Decode a file and print its waveform peaks as JSON.
    Peaks {
        /// Path to the audio file that should be analysed.
        input: PathBuf,
        /// Number of bars to reduce the waveform to.
        #[arg(short, long)]
        bars: Option<usize>,
    },
}
