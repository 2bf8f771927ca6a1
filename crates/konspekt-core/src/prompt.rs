//! Prompt templates for the response engines.
//!
//! Each engine hands the gateway a system prompt from here plus a user
//! message assembled from its context bundle. The strict variants are
//! used for the single retry after the model produced output that could
//! not be validated.

/// Appended to a system prompt when the first attempt produced
/// unusable output.
const STRICT_SUFFIX: &str = "\n\nIMPORTANT: Your previous response could not be used. \
Follow the output format EXACTLY as specified. Output ONLY the requested content, \
with no markdown fences, no preamble and no commentary.";

pub const QA_SYSTEM: &str = "You are a helpful AI assistant who provides information about videos.\n\
Answer the user's question based on the provided video content. \
If the video content doesn't address the question, say so.";

pub const SUMMARY_SYSTEM: &str = "You are a video content analyzer.\n\
Create a concise summary of the provided video transcript in about 3-5 sentences.\n\
Focus on the main points and key insights. Output ONLY the summary text.";

pub const WINDOW_SUMMARY_SYSTEM: &str = "You are a video content analyzer.\n\
The user message contains one part of a longer video transcript.\n\
Summarize this part in 2-3 sentences, keeping concrete facts and names. \
Output ONLY the summary text.";

pub const MERGE_SUMMARY_SYSTEM: &str = "You are a video content analyzer.\n\
The user message contains summaries of consecutive parts of one video.\n\
Combine them into a single concise summary of the whole video in about 3-5 sentences.\n\
Focus on the main points and key insights. Output ONLY the summary text.";

pub const NAV_SYSTEM: &str = "You help users navigate to a specific part of a video.\n\
Based on the transcript segments in the user message, identify the most relevant timestamp.\n\
You MUST output ONLY valid JSON matching this exact structure (no markdown, no explanation):\n\
{\"timestamp\": \"MM:SS\", \"reason\": \"Brief explanation of why this is the right part\"}";

pub fn quiz_system(questions: usize, options: usize) -> String {
    format!(
        r#"You are a quiz generator for educational videos.

Based on the video content in the user message, generate {questions} multiple-choice questions that test understanding of the key concepts.

You MUST output ONLY a valid JSON array matching this exact structure (no markdown, no explanation):
[
  {{"question": "Question text", "options": ["Option 1", "Option 2", "Option 3", "Option 4"], "correctAnswerIndex": 0}}
]

Rules:
- Exactly {options} options per question
- correctAnswerIndex is the zero-based position of the correct option and MUST be less than the number of options
- Questions must be answerable from the video content alone
- Output ONLY the JSON array, nothing else"#
    )
}

pub fn stricter(system: &str) -> String {
    format!("{system}{STRICT_SUFFIX}")
}

pub fn qa_user(excerpt: &str, prior_summary: Option<&str>, query: &str) -> String {
    let mut parts = Vec::new();
    if let Some(summary) = prior_summary {
        parts.push(format!("Video summary:\n{summary}"));
    }
    parts.push(format!(
        "Here are relevant parts of the video transcript:\n\n{excerpt}"
    ));
    parts.push(format!("User question: {query}"));
    parts.join("\n\n")
}

pub fn summary_user(excerpt: &str) -> String {
    format!("Here is the transcript of a video that needs to be summarized:\n\n{excerpt}")
}

pub fn window_user(index: usize, total: usize, window: &str) -> String {
    format!("Transcript part {} of {}:\n\n{}", index + 1, total, window)
}

pub fn merge_user(parts: &[String]) -> String {
    let numbered = parts
        .iter()
        .enumerate()
        .map(|(i, p)| format!("Part {}: {}", i + 1, p.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Summaries of the video's parts:\n\n{numbered}")
}

pub fn quiz_user(excerpt: &str) -> String {
    format!("Here is the video content to create a quiz for:\n\n{excerpt}")
}

pub fn nav_user(excerpt: &str, query: &str) -> String {
    format!(
        "The user wants to navigate to a specific part of the video.\n\n\
Here are relevant parts of the transcript:\n\n{excerpt}\n\nUser query: \"{query}\""
    )
}

/// Strip markdown code fences the model sometimes wraps JSON in.
pub fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    match rest.find("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}
