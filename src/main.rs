// src/main.rs

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use trim_wizard_lib::audio::{probe, render_clip};
use trim_wizard_lib::{
    Catalog, DevicePlayer, LocalUrlStore, ManualPlayer, ObjectUrlStore, PlaybackAdapter,
    PlaybackState, Preset, TrackReference, TrackSource, TrimConfig, TrimOutcome, TrimSession,
    UploadedFile, WizardSession,
};

/// Pick a track, trim it, and hand the selection to video generation
#[derive(Parser, Debug)]
#[command(name = "trim-wizard")]
#[command(about = "Select a trim range from a catalog song or an uploaded file", long_about = None)]
struct Args {
    /// Song catalog (JSON array of songs)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Id of the catalog song to use
    #[arg(long, requires = "catalog", conflicts_with = "upload")]
    song: Option<String>,

    /// Audio file to use instead of a catalog song
    #[arg(long)]
    upload: Option<PathBuf>,

    /// Trim start in seconds
    #[arg(short, long)]
    start: Option<f64>,

    /// Trim end in seconds
    #[arg(short, long)]
    end: Option<f64>,

    /// Selection length preset (15, 30 or 60 seconds)
    #[arg(short, long)]
    preset: Option<u32>,

    /// Play the selection once before confirming
    #[arg(long)]
    preview: bool,

    /// Write the confirmed selection to this WAV file
    #[arg(short = 'o', long)]
    export: Option<PathBuf>,

    /// Do not open an audio device; use the declared or probed duration
    #[arg(long)]
    headless: bool,

    /// Trimmer configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prompt passed through to generation
    #[arg(long, default_value = "")]
    prompt: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter support
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trim_wizard=info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TrimConfig::load(path)?,
        None => TrimConfig::default(),
    };

    let mut wizard = WizardSession::new(LocalUrlStore::new());
    wizard.set_prompt(args.prompt.clone());

    if let Some(path) = &args.upload {
        wizard.select_upload(UploadedFile::from_path(path));
    } else if let (Some(catalog), Some(id)) = (&args.catalog, &args.song) {
        let catalog = Catalog::load(catalog)?;
        let song = catalog
            .find(id)
            .with_context(|| format!("No song with id '{}' in catalog", id))?;
        wizard.select_song(song.clone());
    } else {
        bail!("Pass --upload <FILE> or --catalog <FILE> --song <ID>");
    }

    let Some(source) = wizard.playback_source() else {
        bail!("No track selected");
    };
    let audio_path = local_file(&wizard);

    println!("🎵 Trim Wizard");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    match wizard.track() {
        Some(TrackReference::Catalog(song)) => {
            println!("\n📊 Song: {} by {}", song.title, song.artist)
        }
        Some(TrackReference::Upload { file, .. }) => println!("\n📊 Upload: {}", file.name),
        None => {}
    }

    let initial = wizard.trim();
    let outcome = if args.headless {
        let duration = match source.declared_duration {
            Some(duration) => duration,
            None => {
                let path = audio_path.as_ref().context("Upload has no local file")?;
                probe(path)?.duration_seconds
            }
        };

        let mut session = TrimSession::new(config.clone());
        session.attach(ManualPlayer::new());
        session.open(source, initial);
        if let Some(player) = session.adapter_mut() {
            player.finish_loading(duration);
        }
        run_trimmer(&mut session, &args, &config).await?
    } else {
        // The device player reads from disk, so uploads go in by path
        let source = TrackSource {
            url: wizard
                .store()
                .resolve(&source.url)
                .map(|path| path.to_string_lossy().to_string())
                .unwrap_or(source.url),
            ..source
        };

        let mut session = TrimSession::new(config.clone());
        session.attach(DevicePlayer::new(config.time_update_interval()));
        session.open(source, initial);
        run_trimmer(&mut session, &args, &config).await?
    };

    if !wizard.apply_outcome(outcome) {
        println!("\n↩️  Cancelled");
        return Ok(());
    }

    if let Some(request) = wizard.creation_request() {
        println!("\n📦 Creation request:");
        println!("{}", serde_json::to_string_pretty(&request)?);
    }

    if let Some(output) = args.export.clone() {
        let input = audio_path.context("Cannot export: track is not a local file")?;
        let range = wizard.trim();

        println!("\n💾 Exporting clip...");
        let started = Instant::now();
        let clip = tokio::task::spawn_blocking(move || render_clip(input, output, &range))
            .await
            .context("Export task failed")??;

        println!(
            "\n✅ Done! {:.2}s clip saved to: {} ({:.2}s)",
            clip.duration_seconds,
            clip.path.display(),
            started.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

/// File on disk behind the wizard's current track, if there is one
fn local_file(wizard: &WizardSession) -> Option<PathBuf> {
    match wizard.track()? {
        TrackReference::Catalog(song) if !song.audio_url.contains("://") => {
            Some(PathBuf::from(&song.audio_url))
        }
        TrackReference::Catalog(_) => None,
        TrackReference::Upload { url, .. } => wizard.store().resolve(url.as_str()),
    }
}

/// Drive one trimmer session to a confirmed (or cancelled) outcome
async fn run_trimmer<A: PlaybackAdapter>(
    session: &mut TrimSession<A>,
    args: &Args,
    config: &TrimConfig,
) -> anyhow::Result<TrimOutcome> {
    let mut ticker = tokio::time::interval(config.time_update_interval());

    println!("\n⏳ Loading...");
    loop {
        ticker.tick().await;
        session.pump();
        if session.state().is_ready() {
            break;
        }
        session.check_stall(Instant::now())?;
    }

    if let Some(seconds) = args.preset {
        let preset = Preset::from_seconds(seconds)
            .with_context(|| format!("Unknown preset {}s (use 15, 30 or 60)", seconds))?;
        session.select_preset(preset);
    }

    if args.start.is_some() || args.end.is_some() {
        let current = session.range();
        session.set_range(
            args.start.unwrap_or(current.start),
            args.end.unwrap_or(current.end),
        )?;
    }

    let view = session.view();
    println!("\n✂️  Trim Range:");
    println!("   Start: {}", view.labels.start);
    println!("   Selected: {} of {}", view.labels.selected, view.labels.total);
    println!(
        "   Waveform: {}",
        view.bars
            .iter()
            .map(|bar| match bar.class {
                trim_wizard_lib::BarClass::Dimmed => '·',
                _ => '█',
            })
            .collect::<String>()
    );

    if args.preview {
        if args.headless {
            tracing::warn!("Preview needs an audio device, skipping");
        } else {
            preview(session, &mut ticker).await?;
        }
    }

    Ok(session.confirm())
}

/// Play the selection once, then stop
async fn preview<A: PlaybackAdapter>(
    session: &mut TrimSession<A>,
    ticker: &mut tokio::time::Interval,
) -> anyhow::Result<()> {
    let range = session.range();
    println!("\n🔊 Previewing...");

    session.seek(range.start);
    session.play_pause();
    loop {
        ticker.tick().await;
        session.pump();

        let done = session.state() == PlaybackState::Finished
            || (session.state().is_playing() && session.current_time() >= range.end);
        if done {
            break;
        }
    }
    session.stop();

    Ok(())
}
