//! The structured record returned by the editorial pass.
//!
//! The editor model is an untrusted oracle. Every schema revision it has ever
//! produced must still deserialise, so metadata fields are optional and older
//! key names are folded onto the current ones. Normalisation against the chosen persona happens in
//! [`EditorialRecord::into_new_post`]; slug uniqueness is settled by the caller
//! because it needs the store.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::{
    domain::{
        alert::{ParsedAlert, compose_system_alert, parse_system_alert},
        entities::NewPost,
        personas::Persona,
        slug::{SlugError, derive_slug, is_valid_slug},
        types::PostStatus,
    },
    util::text::{collapse_whitespace, normalize_escaped_newlines, strip_code_fences},
};

#[derive(Debug, Error)]
pub enum EditorialError {
    #[error("editorial response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("editorial response is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("editorial title cannot produce a slug: {0}")]
    Slug(#[from] SlugError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorialRecord {
    pub ai_writer: Option<String>,
    pub ai_editor: Option<String>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub summary: Option<String>,
    pub system_alert: Option<String>,
    #[serde(deserialize_with = "lenient_score")]
    pub integrity_scan: Option<f64>,
    pub fact_check: Option<String>,
    pub editorial_action: Option<String>,
    pub editorial_note: Option<String>,
    #[serde(deserialize_with = "lenient_keywords")]
    pub seo_keywords: Vec<String>,
    pub content: Option<String>,
    pub source_url: Option<String>,
}

/// Identity the editorial pass writes under, plus the persona it edits for.
#[derive(Debug, Clone, Copy)]
pub struct EditorialContext<'a> {
    pub persona: &'a Persona,
    pub editor_identity: &'a str,
    pub published_at: OffsetDateTime,
}

/// A correction applied while normalising the editor's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adjustment {
    Writer { returned: String },
    Editor { returned: String },
    Category { returned: String },
    SlugRederived { returned: Option<String> },
    AlertComposed,
}

/// Older and sloppier names the editor has used for each field. The canonical
/// key wins when a response carries both.
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("ai_writer", &["aiWriter", "writer"]),
    ("ai_editor", &["aiEditor", "editor"]),
    ("summary", &["excerpt"]),
    ("system_alert", &["systemAlert", "alert"]),
    ("integrity_scan", &["integrityScan", "integrity"]),
    ("fact_check", &["factCheck"]),
    ("editorial_action", &["editorialAction", "action"]),
    ("editorial_note", &["editorialNote", "note"]),
    ("seo_keywords", &["seoKeywords", "keywords"]),
    ("content", &["body", "markdown"]),
    ("source_url", &["sourceUrl"]),
];

/// Parse the raw editor response, tolerating a surrounding code fence.
pub fn parse_editorial_response(raw: &str) -> Result<EditorialRecord, EditorialError> {
    let body = strip_code_fences(raw);
    let value = canonicalize_keys(serde_json::from_str(body)?);
    let record: EditorialRecord = serde_json::from_value(value)?;
    record.require_fields()?;
    Ok(record)
}

/// Fold alias keys onto their canonical names so no field is seen twice.
fn canonicalize_keys(value: Value) -> Value {
    let Value::Object(mut fields) = value else {
        return value;
    };
    for (canonical, aliases) in FIELD_ALIASES {
        for alias in *aliases {
            if let Some(aliased) = fields.remove(*alias)
                && !fields.contains_key(*canonical)
            {
                fields.insert((*canonical).to_string(), aliased);
            }
        }
    }
    Value::Object(fields)
}

impl EditorialRecord {
    fn require_fields(&self) -> Result<(), EditorialError> {
        if non_empty(self.title.as_deref()).is_none() {
            return Err(EditorialError::MissingField("title"));
        }
        if non_empty(self.content.as_deref()).is_none() {
            return Err(EditorialError::MissingField("content"));
        }
        Ok(())
    }

    /// Normalise the record into an insertable post.
    ///
    /// The returned slug is URL-safe but not yet checked for uniqueness.
    pub fn into_new_post(
        self,
        ctx: EditorialContext<'_>,
    ) -> Result<(NewPost, Vec<Adjustment>), EditorialError> {
        self.require_fields()?;
        let mut adjustments = Vec::new();

        if let Some(returned) = non_empty(self.ai_writer.as_deref())
            && returned != ctx.persona.full_name
        {
            adjustments.push(Adjustment::Writer {
                returned: returned.to_string(),
            });
        }
        if let Some(returned) = non_empty(self.ai_editor.as_deref())
            && returned != ctx.editor_identity
        {
            adjustments.push(Adjustment::Editor {
                returned: returned.to_string(),
            });
        }
        if let Some(returned) = non_empty(self.category.as_deref())
            && !returned.eq_ignore_ascii_case(ctx.persona.category)
        {
            adjustments.push(Adjustment::Category {
                returned: returned.to_string(),
            });
        }

        let title = collapse_whitespace(self.title.as_deref().unwrap_or_default());
        let content = normalize_escaped_newlines(self.content.as_deref().unwrap_or_default())
            .trim()
            .to_string();

        let slug = match non_empty(self.slug.as_deref()) {
            Some(slug) if is_valid_slug(slug) => slug.to_string(),
            returned => {
                adjustments.push(Adjustment::SlugRederived {
                    returned: returned.map(str::to_string),
                });
                derive_slug(&title)?
            }
        };

        let summary = self
            .summary
            .as_deref()
            .map(collapse_whitespace)
            .unwrap_or_default();

        let mut fact_check = non_empty(self.fact_check.as_deref()).map(str::to_string);
        let mut editorial_action = non_empty(self.editorial_action.as_deref()).map(str::to_string);
        let mut integrity_scan = self.integrity_scan;

        let system_alert = match non_empty(self.system_alert.as_deref()) {
            Some(alert) => {
                let parsed = parse_system_alert(Some(alert));
                integrity_scan = integrity_scan.or(parsed.integrity);
                fact_check = fact_check.or(parsed.fact_check);
                editorial_action = editorial_action.or(parsed.action);
                Some(alert.to_string())
            }
            None => {
                let structured = ParsedAlert {
                    integrity: integrity_scan,
                    fact_check: fact_check.clone(),
                    action: editorial_action.clone(),
                };
                if structured.is_empty() {
                    None
                } else {
                    adjustments.push(Adjustment::AlertComposed);
                    Some(compose_system_alert(ctx.editor_identity, &structured))
                }
            }
        };

        let post = NewPost {
            title,
            slug,
            summary,
            content,
            category: ctx.persona.category.to_string(),
            source_url: non_empty(self.source_url.as_deref()).map(str::to_string),
            status: PostStatus::Published,
            ai_writer: ctx.persona.full_name.to_string(),
            ai_editor: ctx.editor_identity.to_string(),
            system_alert,
            integrity_scan,
            fact_check,
            editorial_action,
            editorial_note: non_empty(self.editorial_note.as_deref()).map(str::to_string),
            seo_keywords: dedupe_keywords(self.seo_keywords),
            published_at: Some(ctx.published_at),
        };

        Ok((post, adjustments))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn dedupe_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .map(|keyword| collapse_whitespace(&keyword))
        .filter(|keyword| !keyword.is_empty())
        .filter(|keyword| seen.insert(keyword.to_lowercase()))
        .collect()
}

/// Accept `87`, `87.5`, `"87%"` or `null`.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .ok(),
        _ => None,
    })
}

/// Accept a JSON array of strings or a single comma-separated string.
fn lenient_keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        Some(Value::String(text)) => text.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    })
}
