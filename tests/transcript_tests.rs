use solace::session::transcript::{Speaker, TranscriptAccumulator, TranscriptSegment};

fn seg(speaker: Speaker, text: &str, is_final: bool) -> TranscriptSegment {
    TranscriptSegment {
        speaker,
        text: text.to_string(),
        is_final,
    }
}

#[test]
fn test_segments_preserve_arrival_order_across_speakers() {
    let mut acc = TranscriptAccumulator::new();
    acc.append(seg(Speaker::Caller, "I can't sleep", true));
    acc.append(seg(Speaker::Companion, "I'm listening", true));
    acc.append(seg(Speaker::Caller, "the debt keeps growing", true));
    acc.append(seg(Speaker::Companion, "let's take it slowly", true));

    let texts: Vec<&str> = acc.segments().iter().map(|s| s.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "I can't sleep",
            "I'm listening",
            "the debt keeps growing",
            "let's take it slowly"
        ],
        "log must be strict arrival order regardless of speaker interleaving"
    );
}

#[test]
fn test_finalized_text_joins_with_speaker_labels() {
    let mut acc = TranscriptAccumulator::new();
    acc.append(seg(Speaker::Caller, "hello", true));
    acc.append(seg(Speaker::Companion, "welcome back", true));

    assert_eq!(
        acc.finalized_text(None),
        "Caller: hello\nCompanion: welcome back"
    );
}

#[test]
fn test_finalized_text_skips_partials() {
    let mut acc = TranscriptAccumulator::new();
    acc.append(seg(Speaker::Caller, "I was thin", false));
    acc.append(seg(Speaker::Caller, "I was thinking about it all night", true));

    assert!(acc.has_finalized());
    assert_eq!(
        acc.finalized_text(None),
        "Caller: I was thinking about it all night",
        "a superseded partial must not leak into the summary input"
    );
}

#[test]
fn test_speaker_filter() {
    let mut acc = TranscriptAccumulator::new();
    acc.append(seg(Speaker::Caller, "one", true));
    acc.append(seg(Speaker::Companion, "two", true));
    acc.append(seg(Speaker::Caller, "three", true));

    assert_eq!(
        acc.finalized_text(Some(Speaker::Caller)),
        "Caller: one\nCaller: three"
    );
    assert_eq!(
        acc.finalized_text(Some(Speaker::Companion)),
        "Companion: two"
    );
}

#[test]
fn test_empty_log_has_no_finalized_text() {
    let mut acc = TranscriptAccumulator::new();
    assert!(acc.is_empty());
    assert!(!acc.has_finalized());
    assert_eq!(acc.finalized_text(None), "");

    acc.append(seg(Speaker::Caller, "still typing", false));
    assert!(!acc.is_empty());
    assert!(!acc.has_finalized(), "partials alone do not finalize the log");
}
