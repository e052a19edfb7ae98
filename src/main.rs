use audiosplit::chord_library::{all_chords, chord_notes_in_octave};
use audiosplit::lab::read_chords_lab;
use audiosplit::{filters, separation, AudioSplit, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Stem separation and chord detection
#[derive(Parser)]
#[command(name = "audiosplit")]
#[command(about = "Split tracks into stems, detect chords and map them to piano notes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Custom configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Separate one track and detect its chords
    Split {
        /// Input audio file (WAV/MP3)
        input: PathBuf,

        /// Output root for stems
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also split the "other" stem into low/high bands
        #[arg(long)]
        filters: bool,

        /// Write a ZIP archive of the stems
        #[arg(long)]
        zip: bool,

        /// Render a waveform/chord plot
        #[arg(long)]
        plot: bool,
    },
    /// Process every supported file in a directory
    Batch {
        /// Directory with input tracks
        #[arg(long)]
        audio_dir: Option<PathBuf>,

        /// Output root for stems
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only separate, skip chord detection
        #[arg(long)]
        no_chords: bool,
    },
    /// Detect chords in a stem and write a .lab file
    Chords {
        /// Stem WAV file
        input: PathBuf,

        /// Output .lab file (defaults to chords.lab next to the stem)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Split a stem into low and high band files
    Filter {
        /// Stem WAV file
        input: PathBuf,
    },
    /// Print a .lab file with the piano notes of each chord
    ShowLab {
        lab: PathBuf,
    },
    /// List every known chord label with its notes
    ListChords,
    /// Remove everything inside the working directory
    Clean {
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        file: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose && cli.quiet {
        anyhow::bail!("Cannot specify both --verbose and --quiet");
    }
    init_tracing(cli.verbose, cli.quiet);

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        audiosplit::config::load_config(config_path)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Split {
            input,
            output,
            filters,
            zip,
            plot,
        } => {
            config.filters.enabled |= filters;
            config.export.zip_stems |= zip;
            config.export.write_plot |= plot;
            let output = output.unwrap_or_else(|| config.paths.output_dir.clone());

            let processor = AudioSplit::new(config);
            let report = processor.process(&input, &output)?;
            println!("Stems saved to {}", report.stems_dir.display());
            if let Some(lab) = &report.chords_lab {
                println!(
                    "{} chord segments written to {}",
                    report.chord_segments,
                    lab.display()
                );
            }
        }
        Commands::Batch {
            audio_dir,
            output,
            no_chords,
        } => {
            if no_chords {
                config.chords.enabled = false;
            }
            let audio_dir = audio_dir.unwrap_or_else(|| config.paths.audio_dir.clone());
            let output = output.unwrap_or_else(|| config.paths.output_dir.clone());

            let processor = AudioSplit::new(config);
            let report = processor.process_batch(&audio_dir, &output)?;
            println!(
                "{} processed, {} failed",
                report.processed.len(),
                report.failed.len()
            );
            for failure in &report.failed {
                println!("  {}: {}", failure.input.display(), failure.error);
            }
        }
        Commands::Chords { input, output } => {
            audiosplit::config::validate_config(&config)?;
            let output = output.unwrap_or_else(|| {
                audiosplit::recognition::lab_path_for(
                    input.parent().unwrap_or_else(|| std::path::Path::new(".")),
                    &config.chords,
                )
            });
            let processor = AudioSplit::new(config);
            let segments = processor.predict_chords(&input, &output)?;
            println!("{} chord segments written to {}", segments.len(), output.display());
        }
        Commands::Filter { input } => {
            let f = &config.filters;
            let out =
                filters::apply_simple_filters(&input, f.low_center_hz, f.high_cutoff_hz, f.q)?;
            println!("{}", out.lowband.display());
            println!("{}", out.highband.display());
        }
        Commands::ShowLab { lab } => {
            for segment in read_chords_lab(&lab)? {
                let notes = chord_notes_in_octave(&segment.label, config.chords.base_octave);
                let notes = if notes.is_empty() {
                    "-".to_string()
                } else {
                    notes.join(" ")
                };
                println!(
                    "{:>8.2}s → {:>8.2}s  {:<8} {}",
                    segment.start_s, segment.end_s, segment.label, notes
                );
            }
        }
        Commands::ListChords => {
            for label in all_chords() {
                let notes = chord_notes_in_octave(&label, config.chords.base_octave);
                println!("{:<8} {}", label, notes.join(" "));
            }
        }
        Commands::Clean { work_dir } => {
            let work_dir = work_dir.unwrap_or_else(|| config.paths.work_dir.clone());
            separation::clear_workspace(&work_dir);
            println!("Workspace cleared: {}", work_dir.display());
        }
        Commands::ValidateConfig { file } => {
            let config = audiosplit::config::load_config(&file)?;
            println!("Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::ShowConfig => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}
