/// Which side of the duplex session produced a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Caller,
    Companion,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Caller => "Caller",
            Speaker::Companion => "Companion",
        }
    }
}

/// An incremental transcript fragment. Partial (`is_final == false`)
/// fragments may be superseded by a later final one for the same
/// utterance; every arriving segment is taken as authoritative at arrival
/// time, with no fuzzy merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSegment {
    pub speaker: Speaker,
    pub text: String,
    pub is_final: bool,
}

/// Session-scoped, append-only log of transcript segments in arrival
/// order. Discarded with the session; nothing here is persisted.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    log: Vec<TranscriptSegment>,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, segment: TranscriptSegment) {
        self.log.push(segment);
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn has_finalized(&self) -> bool {
        self.log.iter().any(|s| s.is_final)
    }

    /// Joins all final segments in arrival order, one speaker-labeled line
    /// per segment, optionally filtered to one speaker.
    pub fn finalized_text(&self, speaker: Option<Speaker>) -> String {
        let lines: Vec<String> = self
            .log
            .iter()
            .filter(|s| s.is_final)
            .filter(|s| speaker.map_or(true, |who| s.speaker == who))
            .map(|s| format!("{}: {}", s.speaker.label(), s.text))
            .collect();
        lines.join("\n")
    }
}
