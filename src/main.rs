// drumseq - play or export the default drum kit pattern

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use drumseq::audio::context::AudioOutput;
use drumseq::audio::export::ProgressCallback;
use drumseq::sampler::SymphoniaDecoder;
use drumseq::sequencer::kit;
use drumseq::synth::noise::NoiseGenerator;
use drumseq::{
    EngineConfig, PatternExporter, Scheduler, SequencerState, SharedState, SoundEngine,
    VoiceSynthesizer, open_default_output,
};

/// Step-sequencer drum engine
#[derive(Parser)]
#[command(name = "drumseq")]
#[command(version)]
struct Cli {
    /// JSON engine configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory with <Track>.wav files replacing the synth voices
    #[arg(long, global = true)]
    kit: Option<PathBuf>,

    /// Tempo in BPM (40-240)
    #[arg(long, global = true)]
    bpm: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one pass of the pattern to a 16-bit WAV file
    Export {
        /// Output path
        output: PathBuf,

        /// Noise seed for a reproducible render
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Play the pattern on the default output device
    Play {
        /// How long to play
        #[arg(long, default_value = "8")]
        seconds: f64,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Export { output, seed } => {
            let mut settings = config.export.clone();
            if seed.is_some() {
                settings.noise_seed = seed;
            }
            let state = build_state(cli.bpm, cli.kit.as_deref(), settings.sample_rate);
            export(&state, settings, &config, &output)
        }
        Commands::Play { seconds } => play(cli.bpm, cli.kit.as_deref(), seconds, &config),
    }
}

fn build_state(bpm: Option<u32>, kit_dir: Option<&Path>, sample_rate: u32) -> SequencerState {
    let mut state = kit::default_state();
    if let Some(bpm) = bpm {
        state.set_bpm(bpm);
    }
    if let Some(dir) = kit_dir {
        let decoder = SymphoniaDecoder::new(sample_rate);
        kit::load_kit_samples(&mut state, dir, &decoder);
    }
    state
}

fn export(
    state: &SequencerState,
    settings: drumseq::ExportSettings,
    config: &EngineConfig,
    output: &Path,
) -> Result<(), Box<dyn Error>> {
    let exporter = PatternExporter::new(settings).with_reverb(config.reverb);
    let progress: ProgressCallback = Box::new(|p: f32| log::info!("Rendering... {:.0}%", p * 100.0));
    exporter.export_to_file(state, output, Some(progress))?;
    Ok(())
}

fn play(
    bpm: Option<u32>,
    kit_dir: Option<&Path>,
    seconds: f64,
    config: &EngineConfig,
) -> Result<(), Box<dyn Error>> {
    let (output, stream) = open_default_output(config)?;
    let sample_rate = output.sample_rate();

    let state = SharedState::new(build_state(bpm, kit_dir, sample_rate));
    let synth = VoiceSynthesizer::new(sample_rate, NoiseGenerator::new(config.noise_seed));
    let playhead = |step: Option<usize>| match step {
        Some(step) => log::debug!("Step {}", step),
        None => log::debug!("Stopped"),
    };

    let scheduler = Scheduler::new(
        output,
        Arc::new(state),
        Box::new(playhead),
        synth,
        config.scheduler,
    );
    let mut engine = SoundEngine::new(scheduler);

    engine.start()?;
    std::thread::sleep(Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or_default());
    engine.stop();

    let overruns = engine.scheduler().overruns();
    if overruns > 0 {
        log::warn!("{} scheduling overruns during playback", overruns);
    }

    // Let the last hits ring out before closing the stream
    std::thread::sleep(Duration::from_millis(500));
    stream.pause()?;
    Ok(())
}
