//! Integration tests for engine selection and source fallback.

mod common;

use common::*;
use core_playback::{MediaErrorCode, PlayerConfig, PlayerEvent, Selection, SourceDescriptor};
use serde_json::json;

fn unknown(url: &str) -> SourceDescriptor {
    SourceDescriptor::new(url, "video/x-unknown")
}

#[test]
fn test_falls_back_to_next_playable_source() {
    let harness = Harness::standard();
    let mut player = harness.default_player();
    let mut events = player.subscribe();

    player.src(vec![unknown("a.xyz"), hls("b.m3u8")]);
    player.run_until_idle();

    assert_eq!(player.engine_name(), Some("hls"));
    assert_eq!(harness.last("hls").source, Some(hls("b.m3u8")));
    assert_eq!(player.current_src(), "b.m3u8");
    assert!(player.error().is_none());

    let events = drain(&mut events);
    assert_eq!(count(&events, |e| matches!(e, PlayerEvent::Error(_))), 0);
}

#[test]
fn test_exhausted_sources_raise_one_async_error() {
    let harness = Harness::standard();
    let mut player = harness.default_player();
    let mut events = player.subscribe();

    player.src(vec![unknown("a.xyz"), unknown("b.xyz")]);
    assert!(player.error().is_none());
    player.run_until_idle();

    let error = player.error().expect("source error");
    assert_eq!(error.code, MediaErrorCode::SrcNotSupported);
    assert_eq!(error.code.as_u16(), 4);

    let events = drain(&mut events);
    assert_eq!(count(&events, |e| matches!(e, PlayerEvent::Error(_))), 1);
}

#[test]
fn test_empty_src_errors_asynchronously() {
    let harness = Harness::standard();
    let mut player = harness.default_player();
    player.run_until_idle();

    player.src("");
    assert!(player.error().is_none());

    player.run_until_idle();
    assert_eq!(
        player.error().map(|error| error.code),
        Some(MediaErrorCode::SrcNotSupported)
    );
}

#[test]
fn test_engine_order_dominates_unless_source_first() {
    let harness = Harness::new()
        .with_engine(FakeFactory::new("html5", &["video/mp4"]))
        .with_engine(FakeFactory::new("hls", &["application/x-mpegURL", "video/mp4"]));
    let sources = vec![hls("a.m3u8"), mp4("b.mp4")];

    let engine_first = harness.default_player();
    assert_eq!(
        engine_first.select_source(&sources),
        Some(Selection {
            engine: "html5".into(),
            source: mp4("b.mp4"),
        })
    );

    let source_first = harness.player(PlayerConfig::builder().source_order(true).build().unwrap());
    assert_eq!(
        source_first.select_source(&sources),
        Some(Selection {
            engine: "hls".into(),
            source: hls("a.m3u8"),
        })
    );
}

#[test]
fn test_selection_is_deterministic() {
    let harness = Harness::standard();
    let sources = vec![unknown("x.xyz"), mp4("a.mp4"), hls("b.m3u8")];

    let first = harness.default_player().select_source(&sources);
    for _ in 0..5 {
        assert_eq!(harness.default_player().select_source(&sources), first);
    }
    assert_eq!(first.map(|selection| selection.engine), Some("html5".to_string()));
}

#[test]
fn test_unsupported_engines_are_skipped() {
    let harness = Harness::new()
        .with_engine(FakeFactory::new("flash", &["video/mp4"]).unsupported())
        .with_engine(FakeFactory::new("html5", &["video/mp4"]));

    let mut player = harness.default_player();
    assert_eq!(player.engine_name(), Some("html5"));

    player.src(mp4("a.mp4"));
    player.run_until_idle();

    assert!(harness.handles("flash").is_empty());
    assert_eq!(player.engine_name(), Some("html5"));
}

#[test]
fn test_configured_engine_order() {
    let harness = Harness::standard();
    let config = PlayerConfig::builder().engine_order(["hls", "html5"]).build().unwrap();
    let player = harness.player(config);

    assert_eq!(player.engine_name(), Some("hls"));
    assert!(harness.handles("html5").is_empty());
}

#[test]
fn test_engine_options_merge_case_insensitively() {
    let harness = Harness::standard();
    let config = PlayerConfig::builder()
        .engine_options("HTML5", json!({ "a": 1 }))
        .engine_options("html5", json!({ "b": 2 }))
        .engine_options("hls", json!({ "c": 3 }))
        .build()
        .unwrap();
    let _player = harness.player(config);

    assert_eq!(harness.last("html5").options, json!({ "a": 1, "b": 2 }));
}

#[test]
fn test_engine_swap_mounts_new_engine() {
    let harness = Harness::standard();
    let mut player = harness.default_player();
    let mut events = player.subscribe();
    player.run_until_idle();

    player.src(hls("live.m3u8"));
    player.run_until_idle();

    let expected_id = format!("{}_hls_api", player.id());
    let events = drain(&mut events);
    let loaded = events
        .iter()
        .find_map(|event| match event {
            PlayerEvent::EngineLoaded {
                engine,
                engine_id,
                mounted,
            } => Some((engine.clone(), engine_id.clone(), *mounted)),
            _ => None,
        })
        .expect("engine loaded");

    assert_eq!(loaded, ("hls".to_string(), expected_id.clone(), true));
    assert_eq!(player.engine_id(), Some(expected_id.as_str()));
    assert_eq!(harness.last("hls").engine_id, expected_id);
    assert!(harness.last("html5").is_disposed());
}

#[test]
fn test_failed_engine_construction_is_reported() {
    let harness = Harness::new()
        .with_engine(FakeFactory::new("html5", &["video/mp4"]))
        .with_engine(FakeFactory::new("broken", &["application/x-mpegURL"]).failing());
    let mut player = harness.default_player();
    player.run_until_idle();

    player.src(hls("a.m3u8"));
    player.run_until_idle();

    let error = player.error().expect("construction error");
    assert_eq!(error.code, MediaErrorCode::Custom);
    assert!(error.message.contains("broken"));
    assert!(!player.is_changing_source());
}
