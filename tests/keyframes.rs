//! End-to-end keyframe extraction against scripted video sources.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crowdsight::{
    CancellationToken, CrowdsightError, ExtractionPhase, KeyframeOptions, ProgressInfo,
    extract_smart_keyframes,
};

use common::{ScriptedVideo, cut_scene, flash_scene, seconds, sharp_scene, still_scene};

fn recording_options(
    options: KeyframeOptions,
) -> (KeyframeOptions, Arc<Mutex<Vec<ProgressInfo>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let options = options.with_progress(Arc::new(move |info: &ProgressInfo| {
        sink.lock().unwrap().push(info.clone());
    }));
    (options, events)
}

// ── Selection ──────────────────────────────────────────────────────

#[test]
fn static_clip_yields_one_frame_per_second_bucket() {
    let mut video = ScriptedVideo::new(7.5, (1280, 720), still_scene());
    let frames = extract_smart_keyframes(&mut video, &KeyframeOptions::new()).unwrap();

    assert_eq!(frames.len(), 7);
    let times = seconds(&frames);
    assert!(times.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn frame_count_is_capped_by_max_frames() {
    let mut video = ScriptedVideo::new(30.0, (1280, 720), still_scene());
    let options = KeyframeOptions::new().with_max_frames(3);
    let frames = extract_smart_keyframes(&mut video, &options).unwrap();

    assert_eq!(seconds(&frames), vec![0.0, 10.0, 20.0]);
}

#[test]
fn short_clip_still_gets_one_bucket() {
    let mut video = ScriptedVideo::new(0.6, (1280, 720), still_scene());
    let frames = extract_smart_keyframes(&mut video, &KeyframeOptions::new()).unwrap();

    assert_eq!(seconds(&frames), vec![0.0]);
}

#[test]
fn motion_wins_its_bucket() {
    let mut video = ScriptedVideo::new(4.0, (640, 360), flash_scene(1.0));
    let options = KeyframeOptions::new().with_max_frames(2);
    let frames = extract_smart_keyframes(&mut video, &options).unwrap();

    // The frame after the flash scores the same motion; the earlier one keeps the bucket.
    assert_eq!(seconds(&frames), vec![1.0, 2.0]);
}

#[test]
fn motion_outranks_static_sharpness() {
    // The textured opening is sharper than the white cut, but never moves.
    let mut video = ScriptedVideo::new(2.0, (640, 360), cut_scene(1.0));
    let options = KeyframeOptions::new().with_max_frames(1);
    let frames = extract_smart_keyframes(&mut video, &options).unwrap();

    assert_eq!(seconds(&frames), vec![1.0]);
}

#[test]
fn clip_shorter_than_one_sample_interval_yields_nothing() {
    let mut video = ScriptedVideo::new(0.3, (640, 360), still_scene());
    let options = KeyframeOptions::new().with_max_frames(1);
    let frames = extract_smart_keyframes(&mut video, &options).unwrap();

    assert!(frames.is_empty());
    assert!(video.seeks.is_empty());
}

#[test]
fn single_bucket_returns_global_best() {
    let mut video = ScriptedVideo::new(6.0, (640, 360), sharp_scene(3.0));
    let options = KeyframeOptions::new().with_max_frames(1);
    let frames = extract_smart_keyframes(&mut video, &options).unwrap();

    assert_eq!(seconds(&frames), vec![3.0]);
}

#[test]
fn motion_gate_keeps_first_sample_when_nothing_clears_it() {
    // Without the gate the sharp frame at 1.0 would win.
    let mut video = ScriptedVideo::new(2.0, (640, 360), sharp_scene(1.0));
    let options = KeyframeOptions::new()
        .with_max_frames(1)
        .with_diff_threshold(10_000.0);
    let frames = extract_smart_keyframes(&mut video, &options).unwrap();

    // Nothing clears the gate, so the first sample fills the bucket and stays.
    assert_eq!(seconds(&frames), vec![0.0]);
}

#[test]
fn zero_duration_yields_nothing_without_seeking() {
    let mut video = ScriptedVideo::new(0.0, (1280, 720), still_scene());
    let (options, events) = recording_options(KeyframeOptions::new());
    let frames = extract_smart_keyframes(&mut video, &options).unwrap();

    assert!(frames.is_empty());
    assert!(video.seeks.is_empty());
    assert!(events.lock().unwrap().is_empty());
}

// ── Output geometry ────────────────────────────────────────────────

#[test]
fn landscape_source_scaled_to_default_size() {
    let mut video = ScriptedVideo::new(2.0, (1920, 1080), still_scene());
    let frames = extract_smart_keyframes(&mut video, &KeyframeOptions::new()).unwrap();

    assert!(!frames.is_empty());
    for frame in &frames {
        assert_eq!((frame.width, frame.height), (800, 450));
        let decoded = frame.decode().unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 450));
    }
    assert!(video.renders.contains(&(100, 100)));
    assert!(video.renders.contains(&(800, 450)));
}

#[test]
fn quarter_turn_swaps_output_dimensions() {
    let mut video = ScriptedVideo::new(2.0, (1920, 1080), still_scene());
    let options = KeyframeOptions::new().with_rotation(90);
    let frames = extract_smart_keyframes(&mut video, &options).unwrap();

    assert!(!frames.is_empty());
    for frame in &frames {
        assert_eq!((frame.width, frame.height), (450, 800));
    }
}

#[test]
fn half_turn_keeps_output_dimensions() {
    let mut video = ScriptedVideo::new(2.0, (1920, 1080), still_scene());
    let options = KeyframeOptions::new().with_rotation(-180);
    let frames = extract_smart_keyframes(&mut video, &options).unwrap();

    assert_eq!((frames[0].width, frames[0].height), (800, 450));
}

#[test]
fn small_source_is_not_upscaled() {
    let mut video = ScriptedVideo::new(2.0, (640, 480), still_scene());
    let frames = extract_smart_keyframes(&mut video, &KeyframeOptions::new()).unwrap();

    assert_eq!((frames[0].width, frames[0].height), (640, 480));
}

#[test]
fn frames_are_jpeg_data_urls() {
    let mut video = ScriptedVideo::new(1.0, (320, 240), still_scene());
    let frames = extract_smart_keyframes(&mut video, &KeyframeOptions::new()).unwrap();

    assert_eq!(&frames[0].data[..2], &[0xFF, 0xD8]);
    assert!(frames[0].to_data_url().starts_with("data:image/jpeg;base64,/9j/"));
}

// ── Playback position ──────────────────────────────────────────────

#[test]
fn position_restored_after_success() {
    let mut video = ScriptedVideo::new(5.0, (640, 360), still_scene()).starting_at(2.25);
    extract_smart_keyframes(&mut video, &KeyframeOptions::new()).unwrap();

    assert!(video.paused);
    assert_eq!(video.position, Duration::from_secs_f64(2.25));
    assert_eq!(video.seeks.last(), Some(&Duration::from_secs_f64(2.25)));
}

#[test]
fn seek_timeout_aborts_and_restores_position() {
    let mut video = ScriptedVideo::new(4.0, (640, 360), still_scene()).starting_at(0.25);
    video.stall_at = Some(2.0);

    let result = extract_smart_keyframes(&mut video, &KeyframeOptions::new());

    match result {
        Err(CrowdsightError::SeekTimeout { timestamp, .. }) => {
            assert_eq!(timestamp, Duration::from_secs(2));
        }
        other => panic!("expected SeekTimeout, got {other:?}"),
    }
    assert_eq!(video.position, Duration::from_secs_f64(0.25));
}

#[test]
fn revoked_source_aborts_and_restores_position() {
    let mut video = ScriptedVideo::new(4.0, (640, 360), still_scene()).starting_at(0.25);
    video.revoked_from = Some(1.5);

    let result = extract_smart_keyframes(&mut video, &KeyframeOptions::new());

    assert!(matches!(result, Err(CrowdsightError::SourceUnavailable(_))));
    assert_eq!(video.position, Duration::from_secs_f64(0.25));
}

#[test]
fn invalid_options_never_touch_the_source() {
    let mut video = ScriptedVideo::new(4.0, (640, 360), still_scene());
    let options = KeyframeOptions::new().with_max_frames(0);

    let result = extract_smart_keyframes(&mut video, &options);

    assert!(matches!(result, Err(CrowdsightError::InvalidOption(_))));
    assert!(video.seeks.is_empty());
    assert!(!video.paused);
}

// ── Render failures ────────────────────────────────────────────────

#[test]
fn unrenderable_sample_is_skipped() {
    let mut video = ScriptedVideo::new(4.0, (640, 360), still_scene()).starting_at(3.25);
    video.unrenderable_at = vec![1.0];
    let options = KeyframeOptions::new().with_max_frames(4);

    let frames = extract_smart_keyframes(&mut video, &options).unwrap();

    assert_eq!(seconds(&frames), vec![0.0, 1.5, 2.0, 3.0]);
    assert_eq!(video.position, Duration::from_secs_f64(3.25));
}

#[test]
fn unrenderable_candidate_is_dropped() {
    let mut video = ScriptedVideo::new(4.0, (640, 360), still_scene()).starting_at(0.75);
    video.unrefinable_at = vec![2.0];
    let (options, events) = recording_options(KeyframeOptions::new().with_max_frames(4));

    let frames = extract_smart_keyframes(&mut video, &options).unwrap();

    assert_eq!(seconds(&frames), vec![0.0, 1.0, 3.0]);
    assert_eq!(video.position, Duration::from_secs_f64(0.75));
    assert_eq!(events.lock().unwrap().last().unwrap().percentage, 100);
}

// ── Progress and cancellation ──────────────────────────────────────

#[test]
fn progress_is_monotonic_and_completes() {
    let mut video = ScriptedVideo::new(10.0, (640, 360), flash_scene(4.5));
    let (options, events) = recording_options(KeyframeOptions::new().with_max_frames(5));

    extract_smart_keyframes(&mut video, &options).unwrap();

    let events = events.lock().unwrap();
    // 20 samples followed by 5 candidates.
    assert_eq!(events.len(), 25);
    assert!(events.windows(2).all(|pair| pair[0].percentage <= pair[1].percentage));
    assert_eq!(events[19].phase, ExtractionPhase::Sampling);
    assert_eq!(events[19].percentage, 50);
    assert_eq!(events[20].phase, ExtractionPhase::Refining);
    assert_eq!(events.last().unwrap().percentage, 100);
}

#[test]
fn cancellation_stops_and_restores_position() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let options = KeyframeOptions::new()
        .with_cancellation(token)
        .with_progress(Arc::new(move |info: &ProgressInfo| {
            if info.current >= 2 {
                trigger.cancel();
            }
        }));

    let mut video = ScriptedVideo::new(10.0, (640, 360), still_scene()).starting_at(7.25);
    let result = extract_smart_keyframes(&mut video, &options);

    assert!(matches!(result, Err(CrowdsightError::Cancelled)));
    // Two sample seeks, then the restore.
    assert_eq!(video.seeks.len(), 3);
    assert_eq!(video.position, Duration::from_secs_f64(7.25));
}
