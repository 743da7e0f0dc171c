//! # Playback Orchestration Example
//!
//! This example registers two in-memory engines and a source-rewriting
//! middleware, then drives a player through a source change, a play request
//! and an engine swap while printing every player event.
//!
//! Run with: `cargo run --example orchestration_demo --package core-playback`

use core_playback::error::{PlaybackError, Result};
use core_playback::tracks::EngineTracks;
use core_playback::{
    CanPlay, EngineEvents, EngineFactory, EngineInit, EngineRegistry, MediaEvent, Middleware,
    MiddlewareRegistry, PlaybackEngine, PlayerConfig, PlayerController, PlayerEvent,
    SourceDescriptor, SourceStep, TextTrackKind, TextTrackMode, TextTrackSnapshot, TimeRanges,
};
use core_runtime::events::Receiver;
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};

// ============================================================================
// Simple In-Memory Engine (for demonstration)
// ============================================================================

struct MemoryFactory {
    name: &'static str,
    types: &'static [&'static str],
}

impl EngineFactory for MemoryFactory {
    fn is_supported(&self) -> bool {
        true
    }

    fn can_play_type(&self, mime_type: &str) -> CanPlay {
        if self.types.contains(&mime_type) {
            CanPlay::Probably
        } else {
            CanPlay::No
        }
    }

    fn create(&self, init: EngineInit) -> Result<Box<dyn PlaybackEngine>> {
        println!("  [{}] created as {}", self.name, init.engine_id);

        let mut engine = MemoryEngine {
            name: self.name,
            events: init.events,
            tracks: EngineTracks::new(),
            src: String::new(),
            paused: true,
            current_time: init.start_time.unwrap_or(0.0),
            volume: 1.0,
            muted: init.muted,
            rate: 1.0,
            disposed: false,
        };
        engine.tracks.audio = init.audio_tracks;
        engine.tracks.video = init.video_tracks;

        engine.events.ready();
        if let Some(source) = init.source {
            engine.set_source(&source)?;
        }

        Ok(Box::new(engine))
    }
}

struct MemoryEngine {
    name: &'static str,
    events: EngineEvents,
    tracks: EngineTracks,
    src: String,
    paused: bool,
    current_time: f64,
    volume: f64,
    muted: bool,
    rate: f64,
    disposed: bool,
}

impl MemoryEngine {
    fn check(&self, method: &str) -> Result<()> {
        if self.disposed {
            return Err(PlaybackError::unavailable(self.name, method));
        }
        Ok(())
    }
}

impl PlaybackEngine for MemoryEngine {
    fn play(&mut self) -> Result<()> {
        self.check("play")?;
        self.paused = false;
        self.events.emit(MediaEvent::Play);
        self.events.emit(MediaEvent::Playing);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.check("pause")?;
        self.paused = true;
        self.events.emit(MediaEvent::Pause);
        Ok(())
    }

    fn paused(&self) -> Result<bool> {
        Ok(self.paused)
    }

    fn current_time(&self) -> Result<f64> {
        Ok(self.current_time)
    }

    fn set_current_time(&mut self, seconds: f64) -> Result<()> {
        self.current_time = seconds;
        self.events.emit(MediaEvent::Seeking);
        self.events.emit(MediaEvent::Seeked);
        Ok(())
    }

    fn duration(&self) -> Result<f64> {
        Ok(120.0)
    }

    fn buffered(&self) -> Result<TimeRanges> {
        Ok(TimeRanges::single(0.0, 30.0))
    }

    fn seekable(&self) -> Result<TimeRanges> {
        Ok(TimeRanges::single(0.0, 120.0))
    }

    fn volume(&self) -> Result<f64> {
        Ok(self.volume)
    }

    fn set_volume(&mut self, volume: f64) -> Result<()> {
        self.volume = volume;
        self.events.emit(MediaEvent::VolumeChange);
        Ok(())
    }

    fn muted(&self) -> Result<bool> {
        Ok(self.muted)
    }

    fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.muted = muted;
        self.events.emit(MediaEvent::VolumeChange);
        Ok(())
    }

    fn playback_rate(&self) -> Result<f64> {
        Ok(self.rate)
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        self.rate = rate;
        self.events.emit(MediaEvent::RateChange);
        Ok(())
    }

    fn seeking(&self) -> Result<bool> {
        Ok(false)
    }

    fn ended(&self) -> Result<bool> {
        Ok(false)
    }

    fn set_source(&mut self, source: &SourceDescriptor) -> Result<()> {
        self.check("setSource")?;
        self.src = source.url.clone();
        self.events.emit(MediaEvent::LoadStart);
        self.events.emit(MediaEvent::DurationChange);
        self.events.emit(MediaEvent::CanPlay);
        Ok(())
    }

    fn src(&self) -> Result<String> {
        Ok(self.src.clone())
    }

    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.src.clear();
        self.paused = true;
        self.current_time = 0.0;
        Ok(())
    }

    fn tracks(&self) -> &EngineTracks {
        &self.tracks
    }

    fn tracks_mut(&mut self) -> &mut EngineTracks {
        &mut self.tracks
    }

    fn dispose(&mut self) {
        println!("  [{}] disposed", self.name);
        self.disposed = true;
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Rewrites DASH manifests to a transmuxed blob the native engine can play.
struct Transmuxer;

impl Middleware for Transmuxer {
    fn name(&self) -> &str {
        "transmuxer"
    }

    fn set_source(&self, source: &SourceDescriptor) -> SourceStep {
        println!("  [transmuxer] rewriting {}", source.url);
        SourceStep::Continue(SourceDescriptor::new("blob:transmuxed-dash", "video/mp4"))
    }

    fn set_engine(&self, engine: &str) {
        println!("  [transmuxer] attached to {}", engine);
    }
}

// ============================================================================
// Demo
// ============================================================================

fn print_events(events: &mut Receiver<PlayerEvent>) {
    while let Ok(event) = events.try_recv() {
        println!("  event: {:<16} {}", event.name(), event.description());
    }
}

fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug),
    )?;

    println!("=== Playback Orchestration Demo ===\n");

    let engines = EngineRegistry::new();
    engines.register(
        "html5",
        MemoryFactory {
            name: "html5",
            types: &["video/mp4", "video/webm"],
        },
    )?;
    engines.register(
        "hls",
        MemoryFactory {
            name: "hls",
            types: &["application/x-mpegURL"],
        },
    )?;

    let middleware = MiddlewareRegistry::new();
    middleware.register("application/dash+xml", || Box::new(Transmuxer));

    let mut player = PlayerController::builder()
        .engines(engines)
        .middleware(middleware)
        .config(PlayerConfig::builder().engine_order(["html5", "hls"]).build()?)
        .build()?;
    let mut events = player.subscribe();

    println!("1. Initial engine");
    player.run_until_idle();
    println!("  engine: {:?}", player.engine_name());
    print_events(&mut events);

    println!("\n2. MP4 source and play()");
    player.src("https://cdn.example.com/vod/movie.mp4?token=secret");
    let mut handle = player.play();
    player.run_until_idle();
    println!("  play resolved: {:?}", handle.try_resolution());
    print_events(&mut events);

    println!("\n3. Remote captions");
    player.add_remote_text_track(TextTrackSnapshot {
        kind: TextTrackKind::Captions,
        label: "English".into(),
        language: "en".into(),
        id: "en".into(),
        mode: TextTrackMode::Showing,
        src: Some("https://cdn.example.com/vod/en.vtt".into()),
        cues: Vec::new(),
    });
    println!(
        "  text tracks: {}",
        player.text_tracks().map_or(0, |tracks| tracks.len())
    );

    println!("\n4. Engine swap to HLS");
    player.src(SourceDescriptor::new(
        "https://cdn.example.com/live/master.m3u8",
        "application/x-mpegURL",
    ));
    player.run_until_idle();
    println!(
        "  engine: {:?}, text tracks carried: {}",
        player.engine_name(),
        player.text_tracks().map_or(0, |tracks| tracks.len())
    );
    print_events(&mut events);

    println!("\n5. DASH source rewritten by middleware");
    player.src(SourceDescriptor::new(
        "https://cdn.example.com/vod/manifest.mpd",
        "application/dash+xml",
    ));
    player.run_until_idle();
    println!(
        "  engine: {:?}, src: {}, middleware: {:?}",
        player.engine_name(),
        player.current_src(),
        player.middleware_names()
    );
    print_events(&mut events);

    println!("\n6. Controls");
    player.set_volume(0.5)?;
    player.set_current_time(42.0)?;
    player.run_until_idle();
    println!(
        "  volume: {}, time: {}, duration: {}",
        player.volume(),
        player.current_time(),
        player.duration()
    );

    println!("\n7. Dispose");
    player.dispose();
    print_events(&mut events);

    println!("\n=== Demo Complete ===");
    Ok(())
}
