use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use image::imageops;
use indicatif::{ProgressBar, ProgressStyle};
use reclip::{
    ExportOptions, Exporter, ExporterOptions, FfmpegLogLevel, FileSource, Frame, FrameSource,
    IdentityTransform, Recording, TimeWindow, VideoCodec, find_source_video, read_timestamps,
    recording::DEFAULT_VIDEO_EXTENSIONS, resolve_export_range,
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  reclip export recording --start 12.5 --end 00:20 --out exports --progress\n  reclip resolve --timestamps world_timestamps.txt --source-timestamps eye_timestamps.txt --start 1 --end 2\n  reclip probe recording/world.mp4 --json\n  reclip completions zsh > _reclip";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(
    name = "reclip",
    version,
    about = "Re-encode time-bounded clips out of video recordings",
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
    /// Print every status change.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while exporting.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Export a time window of a recording into a new clip.
    #[command(
        about = "Export a clip from a recording",
        after_help = "Examples:\n  reclip export recording --start 10 --end 20 --out exports\n  reclip export recording --start 00:01:00 --end 00:01:30 --out exports --codec h264 --flip"
    )]
    Export {
        /// Recording directory containing the source video and info.csv.
        recording: PathBuf,
        /// Window start, in seconds or [hh:]mm:ss.
        #[arg(long)]
        start: String,
        /// Window end, in seconds or [hh:]mm:ss.
        #[arg(long)]
        end: String,
        /// Directory the export folder is created in.
        #[arg(long)]
        out: PathBuf,
        /// Global timestamp file (one value per line). Defaults to the source
        /// video's own frame timestamps.
        #[arg(long)]
        timestamps: Option<PathBuf>,
        /// Exporter name used for the export folder.
        #[arg(long, default_value = "Video_Export")]
        plugin: String,
        /// Base name of the source video.
        #[arg(long, default_value = "world")]
        input_name: String,
        /// Base name of the exported video.
        #[arg(long, default_value = "scene")]
        output_name: String,
        /// Output codec: mpeg4 | h264 | h265.
        #[arg(long, default_value = "mpeg4")]
        codec: String,
        /// Target bit rate in bits per second.
        #[arg(long)]
        bit_rate: Option<usize>,
        /// Encoder thread count.
        #[arg(long)]
        threads: Option<usize>,
        /// Report progress every N source frames.
        #[arg(long)]
        update_rate: Option<usize>,
        /// Flip every frame vertically before encoding.
        #[arg(long)]
        flip: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Resolve a time window into a source frame range without exporting.
    #[command(about = "Resolve a time window to source frame indices")]
    Resolve {
        /// Global timestamp file.
        #[arg(long)]
        timestamps: PathBuf,
        /// Source timestamp file. Defaults to the global timestamps.
        #[arg(long)]
        source_timestamps: Option<PathBuf>,
        /// Window start, in seconds or [hh:]mm:ss.
        #[arg(long)]
        start: String,
        /// Window end, in seconds or [hh:]mm:ss.
        #[arg(long)]
        end: String,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print frame size, frame count and timestamp span of a video.
    #[command(about = "Inspect a source video", visible_alias = "info")]
    Probe {
        /// Video file path.
        input: PathBuf,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_timecode(value: &str) -> Result<f64, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(seconds);
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
    Ok((hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds)
}

fn parse_window(start: &str, end: &str) -> Result<TimeWindow, Box<dyn std::error::Error>> {
    Ok(TimeWindow::new(parse_timecode(start)?, parse_timecode(end)?)?)
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed =
            FfmpegLogLevel::parse(level).ok_or(format!("unsupported --log-level: {level}"))?;
        reclip::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

/// Use the source video's frame timestamps as the recording clock.
fn source_video_timestamps(
    recording: &Path,
    input_name: &str,
) -> Result<Vec<f64>, Box<dyn std::error::Error>> {
    let source = find_source_video(recording, input_name, &DEFAULT_VIDEO_EXTENSIONS)?
        .ok_or(format!("no {input_name}.* video in {}", recording.display()))?;
    let mut source = FileSource::open(source)?;
    let timestamps = source.timestamps().to_vec();
    source.close();
    Ok(timestamps)
}

fn progress_bar(enabled: bool) -> Result<Option<ProgressBar>, Box<dyn std::error::Error>> {
    if !enabled {
        return Ok(None);
    }
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos:>3}% {msg}")?;
    bar.set_style(style.progress_chars("##-"));
    Ok(Some(bar))
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Export {
            recording,
            start,
            end,
            out,
            timestamps,
            plugin,
            input_name,
            output_name,
            codec,
            bit_rate,
            threads,
            update_rate,
            flip,
            json,
        } => {
            let window = parse_window(&start, &end)?;
            let codec = VideoCodec::parse(&codec).ok_or(format!("unsupported --codec: {codec}"))?;

            let mut export_options = ExportOptions::new().with_codec(codec);
            if let Some(bit_rate) = bit_rate {
                export_options = export_options.with_bit_rate(bit_rate);
            }
            if let Some(threads) = threads {
                export_options = export_options.with_thread_count(threads);
            }
            if let Some(update_rate) = update_rate {
                export_options = export_options.with_update_rate(update_rate);
            }

            let timestamps = match timestamps {
                Some(path) => read_timestamps(&path)?,
                None => source_video_timestamps(&recording, &input_name)?,
            };

            let options = ExporterOptions::new(plugin)
                .with_input_name(input_name)
                .with_output_name(output_name);
            let mut exporter = Exporter::new(Recording::new(recording, timestamps), options)
                .with_export_options(export_options);

            let folder = if flip {
                exporter.start_export(window, &out, |_: &dyn FrameSource, frame: &Frame| {
                    imageops::flip_vertical(&frame.image)
                })?
            } else {
                exporter.start_export(window, &out, IdentityTransform)?
            };

            if cli.global.verbose {
                eprintln!("{} {}", "exporting to".cyan().bold(), folder.display());
            }

            let bar = progress_bar(cli.global.progress)?;
            let mut last_status = String::new();
            while exporter.has_running_tasks() {
                exporter.poll();
                if let Some(bar) = &bar {
                    bar.set_position(exporter.progress() as u64);
                    bar.set_message(exporter.status().to_string());
                }
                if cli.global.verbose && exporter.status() != last_status {
                    last_status = exporter.status().to_string();
                    eprintln!(
                        "{} {} ({:.0}%)",
                        "status".cyan().bold(),
                        last_status,
                        exporter.progress()
                    );
                }
                thread::sleep(POLL_INTERVAL);
            }
            if let Some(bar) = bar {
                bar.finish_with_message(exporter.status().to_string());
            }

            let succeeded = exporter.progress() >= 100.0;
            if json {
                let payload = json!({
                    "folder": folder.display().to_string(),
                    "status": exporter.status(),
                    "progress": exporter.progress(),
                    "succeeded": succeeded,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if succeeded {
                println!("{} {}", "exported".green().bold(), folder.display());
            }

            if !succeeded {
                return Err(exporter.status().to_string().into());
            }
        }
        Commands::Resolve {
            timestamps,
            source_timestamps,
            start,
            end,
            json,
        } => {
            let window = parse_window(&start, &end)?;
            let global = read_timestamps(&timestamps)?;
            let source = match source_timestamps {
                Some(path) => read_timestamps(&path)?,
                None => global.clone(),
            };

            let range = resolve_export_range(&global, &source, window);
            if json {
                let payload = json!({
                    "window": [window.start(), window.end()],
                    "range": range.map(|range| json!({
                        "start": range.start,
                        "end": range.end,
                        "frames": range.frame_count(),
                    })),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                match range {
                    Some(range) => println!(
                        "Frames {} ({} frames, {:.3}s to {:.3}s)",
                        range,
                        range.frame_count(),
                        source[range.start],
                        source[range.end],
                    ),
                    None => println!("{}", "Nothing to export in the selected range".yellow()),
                }
            }
        }
        Commands::Probe { input, json } => {
            let mut source = FileSource::open(&input)?;
            let (width, height) = source.frame_size();
            let timestamps = source.timestamps();
            let first = timestamps.first().copied();
            let last = timestamps.last().copied();

            if json {
                let payload = json!({
                    "path": input.display().to_string(),
                    "width": width,
                    "height": height,
                    "frame_count": source.frame_count(),
                    "first_timestamp": first,
                    "last_timestamp": last,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Path: {}", input.display());
                println!("Frame size: {width}x{height}");
                println!("Frames: {}", source.frame_count());
                if let (Some(first), Some(last)) = (first, last) {
                    println!("Timestamps: {first:.3}s to {last:.3}s");
                }
            }
            source.close();
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "reclip", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
