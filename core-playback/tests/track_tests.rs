//! Integration tests for carrying track lists across engine swaps.

mod common;

use common::*;
use core_playback::tracks::AudioTrack;
use core_playback::{
    Cue, MediaEvent, PlayerEvent, TextTrackKind, TextTrackMode, TextTrackSnapshot,
    TrackListSnapshot,
};

fn commentary() -> TextTrackSnapshot {
    TextTrackSnapshot {
        kind: TextTrackKind::Captions,
        label: "Commentary".into(),
        language: "en".into(),
        id: "commentary".into(),
        mode: TextTrackMode::Showing,
        src: None,
        cues: vec![
            Cue::new(0.0, 1.5, "Hello").with_id("c1"),
            Cue::new(1.5, 3.0, "World").with_id("c2"),
        ],
    }
}

fn french_subtitles() -> TextTrackSnapshot {
    TextTrackSnapshot {
        kind: TextTrackKind::Subtitles,
        label: "Français".into(),
        language: "fr".into(),
        id: "fr".into(),
        mode: TextTrackMode::Hidden,
        src: Some("https://cdn.example.com/fr.vtt".into()),
        cues: Vec::new(),
    }
}

fn main_audio() -> AudioTrack {
    AudioTrack {
        id: "a1".into(),
        kind: "main".into(),
        label: "English".into(),
        language: "en".into(),
        enabled: true,
    }
}

fn text_snapshots(player: &core_playback::PlayerController) -> Vec<TextTrackSnapshot> {
    player
        .text_tracks()
        .map(|tracks| tracks.iter().map(TextTrackSnapshot::from).collect())
        .unwrap_or_default()
}

#[test]
fn test_tracks_survive_engine_swaps() {
    let harness = Harness::new()
        .with_engine(FakeFactory::new("html5", &["video/mp4"]).with_audio_tracks(vec![main_audio()]))
        .with_engine(FakeFactory::new("hls", &["application/x-mpegURL"]));
    let mut player = harness.default_player();
    player.run_until_idle();

    player.add_remote_text_track(commentary());
    player.add_remote_text_track(french_subtitles());
    let before = text_snapshots(&player);
    assert_eq!(before, vec![commentary(), french_subtitles()]);

    player.src(hls("live.m3u8"));
    player.run_until_idle();

    assert_eq!(player.engine_name(), Some("hls"));
    assert_eq!(text_snapshots(&player), before);
    assert_eq!(harness.last("hls").audio_tracks, vec![main_audio()]);
    assert_eq!(
        player.engine_tracks().map(|tracks| tracks.audio.clone()),
        Some(vec![main_audio()])
    );

    // And back again.
    player.src(mp4("vod.mp4"));
    player.run_until_idle();

    assert_eq!(player.engine_name(), Some("html5"));
    assert_eq!(text_snapshots(&player), before);
    let tracks = player.text_tracks().unwrap();
    let replayed = tracks.find_by_id("commentary").unwrap();
    assert_eq!(replayed.cues().len(), 2);
    assert!(replayed.remote);
}

#[test]
fn test_signals_from_disposed_engine_are_dropped() {
    let harness = Harness::standard();
    let mut player = harness.default_player();
    player.run_until_idle();
    let old = harness.last("html5");

    player.src(hls("live.m3u8"));
    player.run_until_idle();
    let state = player.state();
    let mut events = player.subscribe();

    old.emit(MediaEvent::Play);
    old.ready();
    old.events.source_set("https://stale.example.com/x.mp4");
    player.run_until_idle();

    assert!(drain(&mut events).is_empty());
    assert_eq!(player.state(), state);
    assert_eq!(player.engine_name(), Some("hls"));
    assert_eq!(player.current_src(), "live.m3u8");
    assert!(old.is_disposed());
}

#[test]
fn test_tracks_added_without_engine_are_queued() {
    let harness = Harness::new();
    let mut player = harness.default_player();
    assert_eq!(player.engine_name(), None);

    assert_eq!(player.add_remote_text_track(french_subtitles()), None);
    assert!(player.text_tracks().is_none());

    harness
        .engines
        .register("html5", FakeFactory::new("html5", &["video/mp4"]))
        .unwrap();
    player.src(mp4("a.mp4"));
    player.run_until_idle();

    assert_eq!(text_snapshots(&player), vec![french_subtitles()]);
}

#[test]
fn test_snapshot_json_shape() {
    let harness = Harness::standard();
    let mut player = harness.default_player();
    player.run_until_idle();
    player.add_remote_text_track(commentary());

    let snapshot = TrackListSnapshot::capture(player.engine_tracks().unwrap());
    let json = snapshot.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value[0]["kind"], "captions");
    assert_eq!(value[0]["mode"], "showing");
    assert_eq!(value[0]["src"], serde_json::Value::Null);
    assert_eq!(value[0]["cues"][1]["startTime"], 1.5);
    assert_eq!(value[0]["cues"][1]["text"], "World");

    let parsed = TrackListSnapshot::from_json(&json).unwrap();
    assert_eq!(parsed.text, snapshot.text);
}

#[test]
fn test_reset_clears_text_tracks() {
    let harness = Harness::standard();
    let mut player = harness.default_player();
    player.run_until_idle();
    player.add_remote_text_track(commentary());
    let mut events = player.subscribe();

    player.reset();
    player.run_until_idle();

    assert!(text_snapshots(&player).is_empty());
    assert!(drain(&mut events).contains(&PlayerEvent::PlayerReset));
}
