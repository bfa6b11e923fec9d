use mentionwatch_core::SentimentLabel;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 100;
pub const NEUTRAL_SCORE: u8 = 50;

fn anchor(label: SentimentLabel) -> f64 {
    match label {
        SentimentLabel::Negative => 10.0,
        SentimentLabel::Neutral => 50.0,
        SentimentLabel::Positive => 90.0,
    }
}

fn direction(label: SentimentLabel) -> f64 {
    match label {
        SentimentLabel::Negative => -1.0,
        SentimentLabel::Neutral => 0.0,
        SentimentLabel::Positive => 1.0,
    }
}

/// Maps a label and confidence onto the 1-100 brand health scale.
///
/// `round(anchor + confidence * 10 * direction)` clamped to `[1, 100]`, with
/// anchors 10/50/90. Neutral is always 50. Confidence is not range-checked;
/// a non-finite confidence counts as 0.
pub fn map_score(label: SentimentLabel, confidence: f64) -> u8 {
    let confidence = if confidence.is_finite() { confidence } else { 0.0 };
    let raw = anchor(label) + confidence * 10.0 * direction(label);
    raw.round().clamp(MIN_SCORE as f64, MAX_SCORE as f64) as u8
}
