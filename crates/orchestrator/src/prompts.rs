//! Prompt construction and machine-readable suggestion markers.
//!
//! Suggestion turns are tagged with HTML-comment markers so a later bare
//! numeral reply can be resolved back to the offered candidates without
//! re-running analysis.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::collaborators::Roster;
use crate::events::DelegationStep;

static MEDIA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(https?://cdn[^\s<>"]+|https?://[^\s<>"]+\.(?:png|jpe?g|webp|gif|mp4|webm|mp3|wav|ogg))\b"#,
    )
    .expect("media url regex")
});

static IMAGE_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(png|jpe?g|webp|gif)\b").expect("image ext regex"));

static MARKER_OPTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"model_options:\s*(\[.*?\])").expect("options marker regex"));
static MARKER_PROMPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"media_prompt:\s*(.+?)\s*-->").expect("prompt marker regex"));
static MARKER_TASK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"media_task_type:\s*(\S+?)\s*-->").expect("task marker regex"));

/// Keywords that flag a request as wanting motion output.
const VIDEO_KEYWORDS: [&str; 3] = ["video", "animate", "motion"];

/// Extract media URLs from text, deduplicated, in order of appearance.
pub fn extract_media_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for m in MEDIA_URL.find_iter(text) {
        let url = m.as_str().to_string();
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

pub fn looks_like_image_url(url: &str) -> bool {
    IMAGE_EXT.is_match(url)
}

pub fn mentions_video(message: &str) -> bool {
    let lower = message.to_lowercase();
    VIDEO_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// One candidate offered in a suggestion turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateModel {
    pub owner: String,
    pub project: String,
    pub name: String,
}

/// The machine-readable payload embedded in a suggestion turn.
#[derive(Debug, Clone)]
pub struct SuggestionMarker {
    pub options: Vec<CandidateModel>,
    pub prompt: String,
    pub task_type: String,
}

impl SuggestionMarker {
    /// Prefix `answer` with the marker comments.
    pub fn tag(&self, answer: &str) -> String {
        let options = serde_json::to_string(&self.options).unwrap_or_else(|_| "[]".to_string());
        format!(
            "<!-- model_options: {} -->\n<!-- media_prompt: {} -->\n<!-- media_task_type: {} -->\n{}",
            options, self.prompt, self.task_type, answer
        )
    }

    /// Recover a marker from a tagged assistant entry.
    pub fn parse(content: &str) -> Option<Self> {
        let options_json = MARKER_OPTIONS.captures(content)?.get(1)?.as_str().to_string();
        let options: Vec<CandidateModel> = serde_json::from_str(&options_json).ok()?;
        let prompt = MARKER_PROMPT
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let task_type = MARKER_TASK
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "text-to-image".to_string());
        Some(Self { options, prompt, task_type })
    }
}

/// The routing prompt sent to the orchestrator agent during analysis.
pub fn analysis_prompt(
    roster: &Roster,
    message: &str,
    media_hint: &str,
    selection_hint: &str,
    document_context: &str,
) -> String {
    format!(
        "SYSTEM: You are a task router. Respond with ONLY a raw JSON object. \
         No markdown fences, no explanation, no text before or after.\n\n\
         Available agents:\n{roster}\n\n\
         You can generate AI media content (images, video, audio).\n\
         When the user wants to generate/create/draw an image, video, or audio:\n\
         - FIRST TIME: use suggest_media to show model options with costs\n\
         - AFTER USER SELECTS: use generate_media with the chosen model\n\
         For image-to-video, include \"input_media\":\"URL\" in generate_media.\n\
         {media_hint}{selection_hint}{document_context}\n\
         User request: {message}\n\n\
         You are Agent {orch_id}. Do NOT delegate to yourself.\n\
         Only delegate when the task genuinely needs a specialist. \
         For simple questions, answer directly.\n\n\
         JSON format:\n\
         {{\"plan\":\"brief plan\",\"delegations\":[{{\"agent_id\":N,\"task\":\"task\"}}],\"direct_answer\":null}}\n\
         For simple/direct: \
         {{\"plan\":\"direct\",\"delegations\":[],\"direct_answer\":\"your answer\"}}\n\
         To suggest models (first time): \
         {{\"plan\":\"suggest models\",\"delegations\":[],\"direct_answer\":null,\"suggest_media\":{{\"prompt\":\"detailed prompt\",\"task_type\":\"text-to-image\"}}}}\n\
         To generate with a chosen model: \
         {{\"plan\":\"generate\",\"delegations\":[],\"direct_answer\":null,\"generate_media\":{{\"prompt\":\"detailed prompt\",\"task_type\":\"text-to-image\",\"model\":\"owner/project\"}}}}",
        roster = roster.text(),
        media_hint = media_hint,
        selection_hint = selection_hint,
        document_context = document_context,
        message = message,
        orch_id = roster.orchestrator_id,
    )
}

/// Context hint listing media generated earlier in the conversation.
pub fn media_hint(urls: &[String]) -> String {
    if urls.is_empty() {
        return String::new();
    }
    let recent = urls.last().map(String::as_str).unwrap_or_default();
    let shown = urls.iter().rev().take(10).rev();
    let listing = shown.map(|u| format!("  - {u}")).collect::<Vec<_>>().join("\n");
    format!(
        "\nMedia generated in this conversation ({} total):\n{}\n\
         Most recent: {}\n\
         If the user refers to \"this image/video\", \"convert this\", \"make this a video\", \
         use the most recent relevant URL as input_media.\n\
         For image-to-video: set task_type to \"image-to-video\" and include \
         \"input_media\":\"<URL>\" in generate_media.\n",
        urls.len(),
        listing,
        recent
    )
}

/// The merge prompt sent after delegations complete.
pub fn combine_prompt(message: &str, chain: &[DelegationStep]) -> String {
    format!(
        "Combine these specialist responses into one clear, unified answer for the user. \
         Attribute contributions where useful.\n\n\
         ## Original Request\n{}\n\n\
         ## Agent Responses\n{}\n\n\
         Write a well-structured final response.",
        message,
        concatenated_responses(chain)
    )
}

/// Fallback answer when the combine call fails: labeled concatenation of
/// the per-agent responses.
pub fn concatenated_responses(chain: &[DelegationStep]) -> String {
    chain
        .iter()
        .map(|step| format!("### {} ({})\n{}", step.agent_name, step.role, step.response))
        .collect::<Vec<_>>()
        .join("\n\n")
}
