use std::sync::Arc;

use super::*;
use crate::assets::media::AudioPcm;
use crate::audio::context::{CaptureContext, ManualClock, ManualContext};
use crate::model::scene::SceneId;
use crate::timeline::Timeline;

fn tone(value: f32, secs: f64) -> Arc<AudioPcm> {
    Arc::new(AudioPcm {
        sample_rate: 1000,
        channels: 1,
        interleaved_f32: vec![value; (secs * 1000.0) as usize],
    })
}

/// Three scenes of 2 s, 3 s and 1.5 s narration at 1000 Hz.
fn inputs(speed: f64) -> GraphInputs {
    let tl = Timeline::from_durations([
        (SceneId(1), 2.0 / speed),
        (SceneId(2), 3.0 / speed),
        (SceneId(3), 1.5 / speed),
    ]);
    let buffers = [tone(0.5, 2.0), tone(0.5, 3.0), tone(0.5, 1.5)];
    GraphInputs {
        total: tl.total(),
        speed,
        narration: tl
            .spans()
            .iter()
            .zip(buffers)
            .map(|(span, buffer)| NarrationSlot { span: *span, buffer })
            .collect(),
        bgm: None,
    }
}

#[test]
fn sources_are_single_use() {
    let mut src = BufferSource::new(tone(0.1, 1.0), SourceRole::Narration);
    src.start(0.0, 0.0).unwrap();
    let err = src.start(1.0, 0.0).unwrap_err();
    assert!(matches!(err, ReelError::AudioGraph(_)));
}

#[test]
fn build_from_zero_schedules_every_span() {
    let clock = ManualClock::new(10.0);
    let session = PlaybackSession::build(ManualContext::new(clock.clone()), &inputs(1.0), 0.0).unwrap();
    assert_eq!(session.master_start(), 10.0);
    let starts: Vec<(f64, f64)> = session
        .schedule()
        .sources()
        .iter()
        .map(|s| (s.start_at, s.offset))
        .collect();
    assert_eq!(starts, vec![(10.0, 0.0), (12.0, 0.0), (15.0, 0.0)]);
    clock.advance(1.25);
    assert!((session.elapsed() - 1.25).abs() < 1e-9);
}

#[test]
fn build_mid_scene_offsets_into_the_buffer() {
    let clock = ManualClock::new(0.0);
    let session = PlaybackSession::build(ManualContext::new(clock), &inputs(2.0), 1.5).unwrap();
    // Spans at speed 2: [0, 1), [1, 2.5), [2.5, 3.25). The first one is over.
    let sources = session.schedule().sources();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].start_at, 0.0);
    assert!((sources[0].offset - 1.0).abs() < 1e-9);
    assert_eq!(sources[0].playback_rate, 2.0);
    assert!((sources[1].start_at - 1.0).abs() < 1e-9);
    assert_eq!(sources[1].offset, 0.0);
    assert!((session.elapsed() - 1.5).abs() < 1e-9);
}

#[test]
fn bgm_loops_from_the_phase_offset() {
    let mut inputs = inputs(1.0);
    inputs.bgm = Some(BgmInput {
        buffer: tone(0.2, 4.0),
        volume: 0.3,
    });
    let session = PlaybackSession::build(ManualContext::new(ManualClock::new(0.0)), &inputs, 5.0).unwrap();
    let bgm = session
        .schedule()
        .sources()
        .iter()
        .find(|s| s.role == SourceRole::Music)
        .unwrap();
    assert!(bgm.looping);
    assert_eq!(bgm.gain, 0.3);
    assert!((bgm.offset - 1.0).abs() < 1e-9);
}

#[test]
fn blocked_context_fails_the_build() {
    let ctx = ManualContext::new(ManualClock::new(0.0)).blocked();
    let err = PlaybackSession::build(ctx, &inputs(1.0), 0.0).err().unwrap();
    assert!(matches!(err, ReelError::AudioContextBlocked(_)));
}

#[test]
fn analyser_tracks_narration_but_not_music() {
    let mut inputs = inputs(1.0);
    inputs.bgm = Some(BgmInput {
        buffer: tone(0.9, 1.0),
        volume: 1.0,
    });
    let mut session = PlaybackSession::build(CaptureContext::new(1000), &inputs, 0.0).unwrap();
    session.context_mut().advance_to(1.0);
    assert!((session.amplitude() - 0.5).abs() < 1e-3);
    session.context_mut().advance_to(7.0);
    assert_eq!(session.amplitude(), 0.0);
}

#[test]
fn stopped_session_closes_its_context() {
    let clock = ManualClock::new(3.0);
    let session = PlaybackSession::build(ManualContext::new(clock.clone()), &inputs(1.0), 0.5).unwrap();
    clock.advance(1.0);
    let ctx = session.finish();
    assert!(ctx.is_closed());
    assert!(ctx.schedule().is_none());
}
