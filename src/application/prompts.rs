//! Prompt builders for the writer, editor and visual-director passes.

use std::fmt::Write as _;

use time::Date;

use crate::domain::personas::{self, Persona};

/// Constraints every generated image must respect.
pub const VISUAL_CONSTRAINTS: &str = "restricted palette of at most three colours, \
    visible scanlines and digital glitch artefacts, no legible text, \
    no clearly identifiable human faces";

/// Style tags appended to the summary when the visual director fails.
pub const FALLBACK_STYLE_TAGS: &str = "glitch art, scanlines, muted palette, \
    cinematic lighting, no faces";

/// Context for the writer pass.
#[derive(Debug, Clone)]
pub struct WriterBrief<'a> {
    pub persona: &'a Persona,
    pub pinned_date: Date,
    pub topic: Option<&'a str>,
    pub recent_titles: &'a [String],
    pub style_memory: &'a [String],
}

pub fn writer_prompt(brief: &WriterBrief<'_>) -> String {
    let persona = brief.persona;
    let mut prompt = String::new();

    let _ = writeln!(prompt, "{}", persona.instructions);
    let _ = writeln!(prompt, "Tone: {}.", persona.tone);
    let _ = writeln!(prompt, "Beat: {}.", persona.category);
    let _ = writeln!(
        prompt,
        "Today's date inside the story world is {}. Write as if it is that day.",
        brief.pinned_date
    );

    if !brief.style_memory.is_empty() {
        prompt.push_str("\nExcerpts from your recent pieces, for voice continuity only:\n");
        for excerpt in brief.style_memory {
            let _ = writeln!(prompt, "---\n{excerpt}");
        }
        prompt.push_str("---\n");
    }

    match brief.topic.map(str::trim).filter(|topic| !topic.is_empty()) {
        Some(topic) => {
            let _ = writeln!(prompt, "\nWrite a new article about: {topic}");
        }
        None => {
            prompt.push_str("\nInvent a fresh topic that fits your beat.");
            if !brief.recent_titles.is_empty() {
                prompt.push_str(" Do not revisit any of these recent titles:\n");
                for title in brief.recent_titles {
                    let _ = writeln!(prompt, "- {title}");
                }
            } else {
                prompt.push('\n');
            }
        }
    }

    prompt.push_str(
        "\nReturn the article body as markdown, 600 to 900 words, starting with a \
         single `#` headline. You may insert at most one editorial interruption \
         written exactly as [[SENTINEL: \"message\"]].",
    );
    prompt
}

/// Context for the editorial pass.
#[derive(Debug, Clone)]
pub struct EditorBrief<'a> {
    pub persona: &'a Persona,
    pub editor_identity: &'a str,
    pub draft: &'a str,
}

pub fn editor_prompt(brief: &EditorBrief<'_>) -> String {
    let persona = brief.persona;
    format!(
        "You are {editor}, the editorial system of a fictional newsroom. \
         Review the draft below written by {writer} for the {category} desk. \
         Tighten the prose without changing the voice, then return ONLY a JSON \
         object, no commentary, with exactly these keys:\n\
         {{\n  \"ai_writer\": \"{writer}\",\n  \"ai_editor\": \"{editor}\",\n  \
         \"category\": \"{category}\",\n  \"title\": string,\n  \
         \"slug\": lowercase-hyphenated string,\n  \
         \"summary\": string of at most 140 characters,\n  \
         \"system_alert\": \"[SYSTEM ALERT // {editor}] INTEGRITY SCAN: <0-100>% | FACT-CHECK: <finding> | ACTION: <decision>\",\n  \
         \"integrity_scan\": number between 0 and 100,\n  \
         \"fact_check\": string,\n  \"editorial_action\": string,\n  \
         \"seo_keywords\": array of 3 to 6 strings,\n  \
         \"content\": the edited markdown article\n}}\n\n\
         DRAFT:\n{draft}",
        editor = brief.editor_identity,
        writer = persona.full_name,
        category = persona.category,
        draft = brief.draft.trim(),
    )
}

/// Prompt asking a text model to act as visual director for one post.
pub fn visual_director_prompt(summary: &str, writer: &str) -> String {
    let style = personas::visual_style(writer);
    format!(
        "You are a visual director for a glitch-aesthetic publication. Write a \
         single image-generation prompt, one paragraph, no preamble, for a header \
         image illustrating this story:\n\"{summary}\"\n\
         Visual style: {style}.\n\
         Mandatory constraints: {VISUAL_CONSTRAINTS}.",
        summary = summary.trim(),
    )
}

/// Deterministic prompt used when the visual director produces nothing usable.
pub fn fallback_visual_prompt(summary: &str, writer: &str) -> String {
    let summary = summary.trim();
    let style = personas::visual_style(writer);
    if summary.is_empty() {
        format!("{style}, {FALLBACK_STYLE_TAGS}")
    } else {
        format!("{summary}, {style}, {FALLBACK_STYLE_TAGS}")
    }
}
