use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use sightline::clock::SystemClock;
use sightline::config::VoiceConfig;
use sightline::providers::{OsrmClient, OverpassClient, RouteProvider, TransitFinder, TransitKind};
use sightline::replay::Scenario;
use sightline::route::StepFormatter;
use sightline::sources::PositionFeed;
use sightline::voice::ConsoleVoice;
use sightline::{
    Config, Coordinate, Daemon, DaemonHandle, DaemonServices, DaemonSettings, SpeechArbiter,
    SpeechOutput,
};

/// Sightline - spoken walking guidance and object announcements
#[derive(Parser)]
#[command(name = "sightline", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a walking route and print its instructions
    Route {
        /// Start as "lat,lon"
        #[arg(long, allow_hyphen_values = true)]
        from: Coordinate,
        /// Destination as "lat,lon"
        #[arg(long, allow_hyphen_values = true)]
        to: Coordinate,
    },
    /// Find the nearest transit stop
    Nearest {
        /// train, bus or subway
        kind: TransitKind,
        /// Search origin as "lat,lon" (defaults to the configured location)
        #[arg(long, allow_hyphen_values = true)]
        from: Option<Coordinate>,
        /// Search radius in meters
        #[arg(long)]
        radius: Option<f64>,
    },
    /// Speak text through the configured voice
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Run a JSON-lines scenario on a manual clock and print what is said
    Replay {
        /// Scenario file
        file: PathBuf,
        /// Also speak through the configured voice
        #[arg(long)]
        speak: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,sightline=info",
        1 => "info,sightline=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Command::Route { from, to }) => cmd_route(&config, from, to).await,
        Some(Command::Nearest { kind, from, radius }) => {
            cmd_nearest(&config, kind, from, radius).await
        }
        Some(Command::Say { text }) => cmd_say(config.voice, &text).await,
        Some(Command::Replay { file, speak }) => cmd_replay(config, &file, speak).await,
        None => listen(config).await,
    }
}

/// Print the instructions for a walking route
async fn cmd_route(config: &Config, from: Coordinate, to: Coordinate) -> anyhow::Result<()> {
    let osrm = OsrmClient::new(
        config.providers.osrm_url.clone(),
        config.providers.request_timeout,
    )?;
    let route = osrm.walking_route(from, to).await?;
    let formatter = StepFormatter::default();

    println!(
        "{:.0} m, about {:.0} min",
        route.total_distance_meters(),
        route.total_duration_seconds() / 60.0
    );
    for (i, step) in route.steps().iter().enumerate() {
        println!("{:>3}. {}", i + 1, formatter.format(step));
    }

    Ok(())
}

/// Print the nearest stop of a kind
async fn cmd_nearest(
    config: &Config,
    kind: TransitKind,
    from: Option<Coordinate>,
    radius: Option<f64>,
) -> anyhow::Result<()> {
    let origin = from.or(config.guidance.default_location).ok_or_else(|| {
        anyhow::anyhow!("no origin: pass --from or set SIGHTLINE_DEFAULT_LOCATION")
    })?;
    let radius_m = radius.unwrap_or(config.providers.transit_radius_m);

    let overpass = OverpassClient::new(
        config.providers.overpass_url.clone(),
        config.providers.request_timeout,
    )?;
    let place = overpass.find_nearest(kind, origin, radius_m).await?;

    println!(
        "{} at {} ({:.0} m away)",
        place.name,
        place.location,
        origin.distance_to(&place.location)
    );
    Ok(())
}

/// Speak one utterance and wait for it
async fn cmd_say(voice: VoiceConfig, text: &str) -> anyhow::Result<()> {
    let speech = build_speech(voice);
    speech.speak(text).await;
    speech.finish().await;
    Ok(())
}

/// Replay a scenario and print the transcript
async fn cmd_replay(config: Config, file: &Path, speak: bool) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file).await?;
    let scenario = Scenario::parse(&text)?;
    tracing::info!(
        path = %file.display(),
        actions = scenario.actions().len(),
        "replaying scenario"
    );

    let mut settings = DaemonSettings::from_config(&config);
    // Same script, same phrasing
    settings.phrase_seed = Some(0);

    let voice: Arc<dyn SpeechOutput> = if speak {
        build_voice(config.voice)
    } else {
        Arc::new(sightline::voice::SilentVoice)
    };

    for line in scenario.run(settings, voice).await? {
        println!("{:>8} ms  {}", line.at_ms, line.text);
    }
    Ok(())
}

/// Run the daemon against stdin
///
/// Each line is a spoken command; `@lat,lon` reports a position fix.
async fn listen(config: Config) -> anyhow::Result<()> {
    let settings = DaemonSettings::from_config(&config);
    let timeout = config.providers.request_timeout;

    let feed = Arc::new(PositionFeed::new());
    let services = DaemonServices {
        positions: feed.clone(),
        routes: Arc::new(OsrmClient::new(config.providers.osrm_url.clone(), timeout)?),
        transit: Arc::new(OverpassClient::new(
            config.providers.overpass_url.clone(),
            timeout,
        )?),
        detections: None,
        speech: Arc::new(build_speech(config.voice)),
        clock: Arc::new(SystemClock),
    };

    let (daemon, handle) = Daemon::new(settings, services);
    let daemon_task = tokio::spawn(daemon.run());

    tracing::info!("sightline ready - say \"take me to the train station\", or type @lat,lon");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => handle_input(&handle, &feed, line.trim())?,
                None => break,
            },
        }
    }

    // Already gone if the loop exited on its own
    let _ = handle.shutdown();
    daemon_task.await??;
    Ok(())
}

fn handle_input(handle: &DaemonHandle, feed: &PositionFeed, line: &str) -> anyhow::Result<()> {
    if line.is_empty() {
        return Ok(());
    }

    if let Some(fix) = line.strip_prefix('@') {
        match fix.parse::<Coordinate>() {
            Ok(fix) => feed.publish(fix),
            Err(e) => tracing::warn!(error = %e, "ignoring position"),
        }
        return Ok(());
    }

    handle.command(line)?;
    Ok(())
}

/// Primary voice from configuration, falling back to the console
fn build_speech(voice: VoiceConfig) -> SpeechArbiter {
    let primary = build_voice(voice);
    if primary.name() == ConsoleVoice.name() {
        SpeechArbiter::new(primary)
    } else {
        SpeechArbiter::new(primary).with_fallback(Arc::new(ConsoleVoice))
    }
}

#[cfg(feature = "audio")]
fn build_voice(voice: VoiceConfig) -> Arc<dyn SpeechOutput> {
    use sightline::voice::{TextToSpeech, TtsProvider, TtsVoice};

    let Some(provider) = voice.provider else {
        return Arc::new(ConsoleVoice);
    };

    let tts = match provider {
        TtsProvider::OpenAI => voice
            .openai_api_key
            .ok_or_else(|| sightline::Error::Config("OPENAI_API_KEY not set".to_string()))
            .and_then(|key| {
                let name = voice
                    .tts_voice
                    .unwrap_or_else(|| voice.voice_type.openai_voice().to_string());
                TextToSpeech::new_openai(key, name, voice.tts_speed)
            }),
        TtsProvider::ElevenLabs => voice
            .elevenlabs_api_key
            .ok_or_else(|| sightline::Error::Config("ELEVENLABS_API_KEY not set".to_string()))
            .and_then(|key| {
                let id = voice
                    .tts_voice
                    .unwrap_or_else(|| voice.voice_type.elevenlabs_voice().to_string());
                TextToSpeech::new_elevenlabs(key, id)
            }),
    };

    match tts.and_then(TtsVoice::new) {
        Ok(tts_voice) => {
            tracing::info!(%provider, "using remote speech synthesis");
            Arc::new(tts_voice)
        }
        Err(e) => {
            tracing::warn!(%provider, error = %e, "speech synthesis unavailable, using console voice");
            Arc::new(ConsoleVoice)
        }
    }
}

#[cfg(not(feature = "audio"))]
fn build_voice(voice: VoiceConfig) -> Arc<dyn SpeechOutput> {
    if let Some(provider) = voice.provider {
        tracing::warn!(%provider, "built without the `audio` feature, using console voice");
    }
    Arc::new(ConsoleVoice)
}
