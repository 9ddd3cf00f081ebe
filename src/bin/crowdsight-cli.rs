use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use crowdsight::{
    FfmpegLogLevel, FfmpegVideoSource, KeyframeOptions, ProgressCallback, ProgressInfo, Rotation,
    StillOptions, VideoSource, capture_still, extract_smart_keyframes,
};

const CLI_AFTER_HELP: &str = "Examples:\n  crowdsight keyframes concourse.mp4 --out frames --progress\n  crowdsight keyframes gate_b.mov --out frames --rotation 90 --json\n  crowdsight still concourse.mp4 --at 00:01:15 --out still.jpg\n  crowdsight completions zsh > _crowdsight";

#[derive(Debug, Parser)]
#[command(
    name = "crowdsight",
    version,
    about = "Pick sharp, motion-rich keyframes from venue footage for crowd-safety review",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract smart keyframes into a directory.
    #[command(
        about = "Extract smart keyframes",
        after_help = "Examples:\n  crowdsight keyframes input.mp4 --out frames --max-frames 12\n  crowdsight keyframes input.mp4 --out frames --data-urls > payload.txt"
    )]
    Keyframes {
        /// Input media path.
        input: PathBuf,
        /// Output directory for keyframe JPEGs.
        #[arg(long)]
        out: PathBuf,
        /// Maximum number of keyframes.
        #[arg(long, default_value_t = 20)]
        max_frames: u32,
        /// Samples per second in the scoring pass.
        #[arg(long, default_value_t = 2.0)]
        sample_rate: f64,
        /// Minimum motion a sample needs to replace a bucket winner.
        #[arg(long)]
        diff_threshold: Option<f64>,
        /// Longest output edge in pixels.
        #[arg(long, default_value_t = 800)]
        size: u32,
        /// Clockwise rotation in degrees (multiple of 90).
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        rotation: i32,
        /// JPEG quality (1-100).
        #[arg(long, default_value_t = 80)]
        quality: u8,
        /// Seconds to wait for a single seek before giving up.
        #[arg(long, default_value_t = 10.0)]
        seek_timeout: f64,
        /// Print a JSON manifest of the written frames.
        #[arg(long)]
        json: bool,
        /// Print each frame as a data URL, one per line.
        #[arg(long)]
        data_urls: bool,
    },

    /// Capture a single still.
    #[command(
        about = "Capture a single still",
        after_help = "Examples:\n  crowdsight still input.mp4 --out still.jpg\n  crowdsight still input.mp4 --at 42.5 --out still.jpg --rotation 270"
    )]
    Still {
        /// Input media path.
        input: PathBuf,
        /// Output JPEG path.
        #[arg(long)]
        out: PathBuf,
        /// Position to capture (seconds, MM:SS or HH:MM:SS).
        #[arg(long)]
        at: Option<String>,
        /// Longest output edge in pixels.
        #[arg(long, default_value_t = 800)]
        size: u32,
        /// Clockwise rotation in degrees (multiple of 90).
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        rotation: i32,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_timecode(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return seconds_to_duration(seconds, trimmed);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("invalid time format: {trimmed}").into());
    }

    let (hours, minutes, seconds_str) = if parts.len() == 3 {
        (parts[0].parse::<u64>()?, parts[1].parse::<u64>()?, parts[2])
    } else {
        (0_u64, parts[0].parse::<u64>()?, parts[1])
    };

    let seconds = seconds_str.parse::<f64>()?;
    let total_seconds = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    seconds_to_duration(total_seconds, trimmed)
}

fn seconds_to_duration(
    seconds: f64,
    original: &str,
) -> Result<Duration, Box<dyn std::error::Error>> {
    if !seconds.is_finite() {
        return Err(format!("time value out of range: {original}").into());
    }
    Ok(Duration::try_from_secs_f64(seconds.max(0.0))?)
}

fn parse_seek_timeout(seconds: f64) -> Result<Duration, Box<dyn std::error::Error>> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err("--seek-timeout must be a positive number of seconds".into());
    }
    Ok(Duration::try_from_secs_f64(seconds)?)
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !overwrite {
        return Err(format!(
            "output file already exists: {} (use --overwrite)",
            path.display()
        )
        .into());
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let level: FfmpegLogLevel = level.parse()?;
        crowdsight::set_ffmpeg_log_level(level);
    } else if !global.verbose {
        crowdsight::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    }
    Ok(())
}

/// Mirrors overall extraction progress onto an indicatif bar.
struct BarProgress {
    bar: ProgressBar,
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(u64::from(info.percentage));
        self.bar.set_message(format!("{:?}", info.phase).to_lowercase());
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Keyframes {
            input,
            out,
            max_frames,
            sample_rate,
            diff_threshold,
            size,
            rotation,
            quality,
            seek_timeout,
            json,
            data_urls,
        } => {
            let seek_timeout = parse_seek_timeout(seek_timeout)?;

            let mut options = KeyframeOptions::new()
                .with_max_frames(max_frames)
                .with_sample_rate(sample_rate)
                .with_default_size(size)
                .with_rotation(rotation)
                .with_jpeg_quality(quality)
                .with_seek_timeout(seek_timeout);
            if let Some(threshold) = diff_threshold {
                options = options.with_diff_threshold(threshold);
            }
            options.validate()?;

            let progress_bar = if cli.global.progress {
                let pb = ProgressBar::new(100);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}% {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                options = options.with_progress(Arc::new(BarProgress { bar: pb.clone() }));
                Some(pb)
            } else {
                None
            };

            fs::create_dir_all(&out)?;
            let mut source = FfmpegVideoSource::open(&input)?;
            if cli.global.verbose {
                let (width, height) = source.dimensions();
                eprintln!(
                    "opened {} ({}x{}, {:.2}s)",
                    input.display(),
                    width,
                    height,
                    source.duration().as_secs_f64()
                );
            }

            let frames = extract_smart_keyframes(&mut source, &options)?;

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            let mut manifest = Vec::with_capacity(frames.len());
            for (index, frame) in frames.iter().enumerate() {
                let output_path = out.join(format!(
                    "keyframe_{index:02}_{:08}ms.jpg",
                    frame.timestamp.as_millis()
                ));
                ensure_writable_path(&output_path, cli.global.overwrite)?;
                frame.save(&output_path)?;

                if cli.global.verbose {
                    eprintln!(
                        "saved keyframe at {:.2}s -> {}",
                        frame.timestamp.as_secs_f64(),
                        output_path.display()
                    );
                }
                if data_urls {
                    println!("{}", frame.to_data_url());
                }

                manifest.push(json!({
                    "index": index,
                    "timestamp_seconds": frame.timestamp.as_secs_f64(),
                    "width": frame.width,
                    "height": frame.height,
                    "bytes": frame.data.len(),
                    "path": output_path.display().to_string(),
                }));
            }

            if json {
                let payload = json!({
                    "input": input.display().to_string(),
                    "duration_seconds": source.duration().as_secs_f64(),
                    "frames": manifest,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if !data_urls {
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!("Extracted {} keyframe(s) to {}", frames.len(), out.display()).green()
                );
            }
        }
        Commands::Still {
            input,
            out,
            at,
            size,
            rotation,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let options = StillOptions::new()
                .with_max_size(size)
                .with_rotation(Rotation::from_degrees(rotation)?);

            let mut source = FfmpegVideoSource::open(&input)?;
            let position = match at {
                Some(value) => parse_timecode(&value)?,
                None => Duration::ZERO,
            };
            source.seek(position, Duration::from_secs(10))?;

            let frame = capture_still(&mut source, &options)?;
            frame.save(&out)?;

            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "Captured {}x{} still at {:.2}s -> {}",
                    frame.width,
                    frame.height,
                    frame.timestamp.as_secs_f64(),
                    out.display()
                )
                .green()
            );
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "crowdsight", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{parse_seek_timeout, parse_timecode};

    #[test]
    fn parse_timecode_formats() {
        let seconds = parse_timecode("75").unwrap();
        assert_eq!(seconds.as_secs(), 75);

        let mm_ss = parse_timecode("01:15").unwrap();
        assert_eq!(mm_ss.as_secs(), 75);

        let hh_mm_ss = parse_timecode("00:01:15.5").unwrap();
        assert_eq!(hh_mm_ss.as_secs(), 75);
    }

    #[test]
    fn parse_timecode_rejects_garbage() {
        assert!(parse_timecode("").is_err());
        assert!(parse_timecode("1:2:3:4").is_err());
        assert!(parse_timecode("ab:cd").is_err());
    }

    #[test]
    fn parse_timecode_rejects_unrepresentable_values() {
        assert!(parse_timecode("inf").is_err());
        assert!(parse_timecode("NaN").is_err());
        assert!(parse_timecode("1e300").is_err());
        assert!(parse_timecode("00:00:1e300").is_err());
    }

    #[test]
    fn seek_timeout_must_be_finite_and_positive() {
        assert_eq!(parse_seek_timeout(2.5).unwrap(), Duration::from_millis(2500));
        assert!(parse_seek_timeout(0.0).is_err());
        assert!(parse_seek_timeout(-1.0).is_err());
        assert!(parse_seek_timeout(f64::INFINITY).is_err());
        assert!(parse_seek_timeout(f64::NAN).is_err());
        assert!(parse_seek_timeout(1e300).is_err());
    }
}
