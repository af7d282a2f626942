use super::*;

#[test]
fn helper_constructors_pick_variants() {
    assert!(matches!(ReelError::validation("x"), ReelError::Validation(_)));
    assert!(matches!(
        ReelError::audio_blocked("gesture"),
        ReelError::AudioContextBlocked(_)
    ));
    assert!(matches!(ReelError::encoder_init("x"), ReelError::EncoderInit(_)));
    assert!(matches!(ReelError::audio_graph("x"), ReelError::AudioGraph(_)));
}

#[test]
fn display_messages_carry_context() {
    let e = ReelError::EncodeTimeout {
        elapsed_secs: 12.0,
        frames_done: 3,
        frames_total: 10,
    };
    let msg = e.to_string();
    assert!(msg.contains("3/10"));
    assert!(ReelError::Cancelled.to_string().contains("cancelled"));
}

#[test]
fn anyhow_errors_convert_transparently() {
    let e: ReelError = anyhow::anyhow!("disk on fire").into();
    assert_eq!(e.to_string(), "disk on fire");
}
