use std::sync::LazyLock;

use regex::Regex;

use crate::types::{QuizQuestion, Segment, Transcript};

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})(?::(\d{2}))?\b").unwrap());

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format seconds as HH:MM:SS timestamp
pub fn format_timestamp_long(seconds: f64) -> String {
    let total = seconds as u64;
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Parse an MM:SS or HH:MM:SS timestamp into seconds.
pub fn parse_timestamp(timestamp: &str) -> Option<f64> {
    let parts: Vec<&str> = timestamp.trim().split(':').collect();
    let parsed: Option<Vec<u64>> = parts.iter().map(|p| p.parse::<u64>().ok()).collect();
    match parsed?.as_slice() {
        [hours, mins, secs] => Some((hours * 3600 + mins * 60 + secs) as f64),
        [mins, secs] => Some((mins * 60 + secs) as f64),
        _ => None,
    }
}

/// Extract the first timestamp mentioned in free text (like "at 5:30"
/// or "around 1:20:15"), together with its value in seconds.
pub fn extract_first_timestamp(text: &str) -> Option<(String, f64)> {
    let matched = TIMESTAMP_RE.find(text)?;
    let raw = matched.as_str().to_string();
    let seconds = parse_timestamp(&raw)?;
    Some((raw, seconds))
}

/// Format transcript segments with timestamps
pub fn format_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|seg| format!("[{}] {}", format_timestamp(seg.start), seg.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_transcript_with_timestamps(transcript: &Transcript) -> String {
    format_segments(&transcript.segments)
}

/// Format a quiz as human-readable markdown
pub fn format_quiz_readable(questions: &[QuizQuestion]) -> String {
    let mut output = String::new();
    let letters = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H'];

    for (i, q) in questions.iter().enumerate() {
        output.push_str(&format!("{}. {}\n", i + 1, q.question));
        for (j, option) in q.options.iter().enumerate() {
            let letter = letters.get(j).copied().unwrap_or('?');
            output.push_str(&format!("   {}) {}\n", letter, option));
        }
        let correct = letters.get(q.correct_answer_index).copied().unwrap_or('?');
        output.push_str(&format!("   Answer: {}\n\n", correct));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_to_expected_format() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(95.4), "01:35");
        assert_eq!(format_timestamp_long(3725.0), "01:02:05");
    }

    #[test]
    fn parses_both_timestamp_shapes() {
        assert_eq!(parse_timestamp("5:30"), Some(330.0));
        assert_eq!(parse_timestamp("01:20:15"), Some(4815.0));
        assert_eq!(parse_timestamp("not a timestamp"), None);
        assert_eq!(parse_timestamp("1:2:3:4"), None);
    }

    #[test]
    fn extracts_first_timestamp_from_prose() {
        let (raw, secs) = extract_first_timestamp("jump to 12:30 please").unwrap();
        assert_eq!(raw, "12:30");
        assert_eq!(secs, 750.0);

        assert!(extract_first_timestamp("show me the part about owls").is_none());
    }

    #[test]
    fn segments_render_with_timestamps() {
        let segments = vec![
            Segment {
                start: 0.0,
                end: 4.0,
                text: " Hello there. ".to_string(),
            },
            Segment {
                start: 65.0,
                end: 70.0,
                text: "Recursion explained.".to_string(),
            },
        ];
        let formatted = format_segments(&segments);
        assert_eq!(formatted, "[00:00] Hello there.\n[01:05] Recursion explained.");
    }
}
