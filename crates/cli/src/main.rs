//! lobbyvox CLI: long game voice-chat session synthesis.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use lobbyvox_core::library::ClipLibrary;
use lobbyvox_core::session::assembler::{run_job, SessionReport};
use lobbyvox_core::session::config::{Preset, SessionConfig};
use lobbyvox_core::splitter::{split_directory, SplitConfig};
use lobbyvox_core::stream::{run_stream, FolderPool, StreamConfig, StreamOutput, StreamReport};
use lobbyvox_core::types::{JobSpec, NoiseProfile, OutputTarget, VoiceStyle};

// ─── Top-level CLI ───────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "lobbyvox",
    about = "Synthesize long multiplayer voice-chat sessions from a clip library",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate one session
    Generate(GenerateArgs),
    /// Generate sessions for several noise profiles in parallel
    Batch(BatchArgs),
    /// Cut raw recordings into library clips
    Split(SplitArgs),
    /// Stream loudness-matched clips from one folder with noise-filled pauses
    Stream(StreamArgs),
}

// ─── Shared arguments (embedded in each generating subcommand) ───

#[derive(Args, Debug)]
struct SessionArgs {
    /// Clip library root (category folders plus bg_noise/)
    #[arg(long)]
    library: PathBuf,

    /// Built-in configuration
    #[arg(long, default_value = "classic", value_parser = ["classic", "ai-voices"])]
    preset: String,

    /// JSON session config (overrides --preset)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Voice style applied to every clip
    #[arg(long, conflicts_with = "user", value_parser = ["natural", "soft", "hard", "bright", "deep"])]
    voice: Option<String>,

    /// Identity name, resolved to a voice style through the config
    #[arg(long)]
    user: Option<String>,

    /// RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Print session statistics as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ─── Generate ────────────────────────────────────────────────────

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Write to <output-root>/<noise>/<next version>.wav
    #[arg(long, required_unless_present = "output", conflicts_with = "output")]
    output_root: Option<PathBuf>,

    /// Write to exactly this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Background noise profile ("none" to disable)
    #[arg(long, default_value = "none")]
    noise: String,
}

// ─── Batch ───────────────────────────────────────────────────────

#[derive(Args, Debug)]
struct BatchArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Output root; each profile gets its own subdirectory
    #[arg(long)]
    output_root: PathBuf,

    /// Noise profiles, one worker each: "fan,white_noise,none"
    #[arg(long, value_delimiter = ',', default_value = "fan,white_noise,none")]
    profiles: Vec<String>,

    /// Sessions per profile
    #[arg(long, default_value_t = 1)]
    count: u32,
}

// ─── Split ───────────────────────────────────────────────────────

#[derive(Args, Debug)]
struct SplitArgs {
    /// Directory of raw .mp3/.wav recordings
    #[arg(long)]
    input: PathBuf,

    /// Directory to write clips into
    #[arg(long)]
    output: PathBuf,

    /// Silence threshold below the loudest frame (dB)
    #[arg(long, default_value_t = 20.0)]
    top_db: f64,

    /// Bridge gaps up to this many seconds
    #[arg(long, default_value_t = 0.1)]
    merge_gap: f64,

    /// Drop clips shorter than this many seconds
    #[arg(long, default_value_t = 0.25)]
    min_duration: f64,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ─── Stream ──────────────────────────────────────────────────────

#[derive(Args, Debug)]
struct StreamArgs {
    /// Folder of clips (typically the output of `split`)
    #[arg(long)]
    clips: PathBuf,

    /// Write to <output-dir>/session_<seconds>s.wav
    #[arg(long, required_unless_present = "output", conflicts_with = "output")]
    output_dir: Option<PathBuf>,

    /// Write to exactly this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON stream config
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Print stream statistics as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ─── Main ────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    // Init logging
    let log_level = match &cli.command {
        Command::Generate(a) if a.session.verbose => "debug",
        Command::Batch(a) if a.session.verbose => "debug",
        Command::Split(a) if a.verbose => "debug",
        Command::Stream(a) if a.verbose => "debug",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Batch(args) => run_batch(args),
        Command::Split(args) => run_split(args),
        Command::Stream(args) => run_stream_command(args),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

/// Config from --config, else from --preset.
fn load_config(args: &SessionArgs) -> Result<SessionConfig> {
    match &args.config {
        Some(path) => SessionConfig::from_json_file(path),
        None => {
            let preset: Preset = args.preset.parse().map_err(anyhow::Error::msg)?;
            Ok(preset.config())
        }
    }
}

/// Voice style from --voice, else --user through the config identities.
fn resolve_voice(args: &SessionArgs, config: &SessionConfig) -> Result<VoiceStyle> {
    match (&args.voice, &args.user) {
        (Some(voice), _) => voice.parse().map_err(anyhow::Error::msg),
        (None, Some(user)) => {
            let voice = config.voice_for(user);
            log::info!("User {} speaks with a {} voice", user, voice);
            Ok(voice)
        }
        (None, None) => Ok(VoiceStyle::default()),
    }
}

fn validate_library(path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!("Clip library not found: {}", path.display());
    }
    Ok(())
}

fn print_report(report: &SessionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("Output: {}", report.artifact.path.display());
        println!(
            "Rounds: {}, clips: {}, duration: {:.1}s",
            report.stats.rounds, report.stats.clips_played, report.stats.duration_seconds
        );
    }
    Ok(())
}

/// Parse --profiles, keeping the first occurrence of each profile.
///
/// Two workers on one profile would race for the same version numbers.
fn unique_profiles(raw: &[String]) -> Result<Vec<NoiseProfile>> {
    let mut profiles: Vec<NoiseProfile> = Vec::with_capacity(raw.len());
    for name in raw {
        let profile: NoiseProfile = name.parse().map_err(anyhow::Error::msg)?;
        if profiles.contains(&profile) {
            log::warn!("Ignoring duplicate noise profile '{}'", profile);
            continue;
        }
        profiles.push(profile);
    }
    Ok(profiles)
}

/// Seed for the `job`-th session of the `worker`-th profile.
fn job_seed(base: Option<u64>, worker: usize, job: u32) -> Option<u64> {
    base.map(|s| s.wrapping_add(((worker as u64) << 32) | job as u64))
}

// ─── Generate runner ─────────────────────────────────────────────

fn run_generate(args: GenerateArgs) -> Result<()> {
    validate_library(&args.session.library)?;
    let config = load_config(&args.session)?;
    let voice = resolve_voice(&args.session, &config)?;
    let noise: NoiseProfile = args.noise.parse().map_err(anyhow::Error::msg)?;

    let output = match (args.output, args.output_root) {
        (Some(path), _) => OutputTarget::Exact(path),
        (None, Some(root)) => OutputTarget::Versioned { root },
        (None, None) => bail!("Either --output or --output-root is required"),
    };

    let library = ClipLibrary::open(&args.session.library, config.sample_rate)?;
    let job = JobSpec {
        output,
        voice,
        noise,
        seed: args.session.seed,
    };

    let report = run_job(&config, &library, &job)?;
    print_report(&report, args.session.json)
}

// ─── Batch runner ────────────────────────────────────────────────

fn run_batch(args: BatchArgs) -> Result<()> {
    validate_library(&args.session.library)?;
    let config = load_config(&args.session)?;
    let voice = resolve_voice(&args.session, &config)?;

    let profiles = unique_profiles(&args.profiles)?;
    if profiles.is_empty() {
        bail!("At least one noise profile is required");
    }

    let library = ClipLibrary::open(&args.session.library, config.sample_rate)?;
    let root = args.output_root;
    let (count, seed) = (args.count, args.session.seed);

    // One worker per profile; each writes only into its own directory.
    let outcomes: Vec<(NoiseProfile, Result<Vec<SessionReport>>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = profiles
            .iter()
            .enumerate()
            .map(|(worker, profile)| {
                let (config, library, root) = (&config, &library, &root);
                let handle = scope.spawn(move || {
                    (1..=count)
                        .map(|n| {
                            let job = JobSpec {
                                output: OutputTarget::Versioned { root: root.clone() },
                                voice,
                                noise: profile.clone(),
                                seed: job_seed(seed, worker, n),
                            };
                            run_job(config, library, &job).with_context(|| {
                                format!("Job {}/{} for profile {} failed", n, count, profile)
                            })
                        })
                        .collect::<Result<Vec<_>>>()
                });
                (profile.clone(), handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(profile, handle)| {
                let outcome = handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("worker panicked")));
                (profile, outcome)
            })
            .collect()
    });

    let mut failed = 0;
    for (profile, outcome) in &outcomes {
        match outcome {
            Ok(reports) => {
                for report in reports {
                    print_report(report, args.session.json)?;
                }
            }
            Err(e) => {
                log::error!("Profile {}: {:#}", profile, e);
                failed += 1;
            }
        }
    }

    println!("All audio generation jobs completed.");
    if failed > 0 {
        bail!("{} of {} profile worker(s) failed", failed, outcomes.len());
    }
    Ok(())
}

// ─── Split runner ────────────────────────────────────────────────

fn run_split(args: SplitArgs) -> Result<()> {
    if !args.input.is_dir() {
        bail!("Input directory not found: {}", args.input.display());
    }
    let config = SplitConfig {
        top_db: args.top_db,
        merge_gap: args.merge_gap,
        min_duration: args.min_duration,
        ..SplitConfig::default()
    };
    let summary = split_directory(&args.input, &args.output, &config)?;
    println!(
        "Exported {} clips from {} file(s) to {}",
        summary.clips.len(),
        summary.files,
        args.output.display()
    );
    Ok(())
}

// ─── Stream runner ───────────────────────────────────────────────

fn run_stream_command(args: StreamArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => StreamConfig::from_json_file(path)?,
        None => StreamConfig::default(),
    };
    let output = match (args.output, args.output_dir) {
        (Some(path), _) => StreamOutput::Exact(path),
        (None, Some(dir)) => StreamOutput::Directory(dir),
        (None, None) => bail!("Either --output or --output-dir is required"),
    };

    let pool = FolderPool::open(&args.clips, config.sample_rate)?;
    let report = run_stream(&config, &pool, &output, args.seed)?;
    print_stream_report(&report, args.json)
}

fn print_stream_report(report: &StreamReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("Generated: {}", report.path.display());
        println!(
            "Clips: {}, duration: {:.2} minutes",
            report.clips_played,
            report.duration_seconds / 60.0
        );
    }
    Ok(())
}
