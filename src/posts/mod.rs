//! Blog posts: text preparation, display dates and search results
//!
//! Storage lives in [`crate::store`]; this module turns author input into
//! a [`Post`] row and describes what a search returns.

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Utc};
use pulldown_cmark::{html, Parser};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::OnceLock;

/// Columns indexed for full-text search, in index order
pub const SEARCH_FIELDS: [&str; 4] = ["immutable_title", "title", "keywords", "searchable_text"];

/// One revision of a post
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Post {
    /// Assigned on insert
    pub id: Option<i64>,
    pub immutable_title: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    /// Pipe-delimited
    pub keywords: String,
    pub is_draft: bool,
    pub preview: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub content_html: Option<String>,
    pub scripts_html: Option<String>,
    pub content_md: Option<String>,
    pub searchable_text: String,
    pub formatted_date: Option<String>,
}

impl Post {
    pub fn keyword_list(&self) -> Vec<&str> {
        self.keywords.split('|').filter(|k| !k.is_empty()).collect()
    }

    /// Value of one of [`SEARCH_FIELDS`]
    pub fn search_field(&self, field: &str) -> &str {
        match field {
            "immutable_title" => &self.immutable_title,
            "title" => &self.title,
            "keywords" => &self.keywords,
            _ => &self.searchable_text,
        }
    }
}

/// Author-supplied values that replace derived ones
#[derive(Debug, Clone, Default)]
pub struct PostOverrides {
    pub preview: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Input for [`parse_post_text`]
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub immutable_title: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub publish_now: bool,
    pub markdown: Option<String>,
    pub html: Option<String>,
    pub overrides: PostOverrides,
}

fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&day) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// `May 5th, 2024`
pub fn formatted_date(at: DateTime<Utc>) -> String {
    format!(
        "{} {}{}, {}",
        at.format("%B"),
        at.day(),
        ordinal_suffix(at.day()),
        at.year()
    )
}

/// Strip the indentation shared by every non-blank line
pub fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[indent.min(line.len())..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `{% ... %}` template tags
fn strip_template_tags(text: &str) -> String {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    match PATTERN.get_or_init(|| Regex::new(r"\{%.*?%\}").ok()) {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// Join keywords with `|`, dropping any pipes inside them
pub fn join_keywords(keywords: &[String]) -> String {
    keywords
        .iter()
        .map(|k| k.replace('|', ""))
        .collect::<Vec<_>>()
        .join("|")
}

fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new(markdown);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Build a post row from author input.
///
/// HTML wins over Markdown when both are given. Inline `<script>` elements
/// are moved out of the content into `scripts_html`.
pub fn parse_post_text(draft: PostDraft, now: DateTime<Utc>) -> Result<Post> {
    let markdown = draft.markdown.filter(|md| !md.trim().is_empty());
    let content = match (draft.html.filter(|h| !h.trim().is_empty()), &markdown) {
        (Some(html), _) => html,
        (None, Some(md)) => markdown_to_html(md),
        (None, None) => {
            return Err(Error::InvalidPost(format!(
                "'{}' has neither markdown nor html",
                draft.immutable_title
            )))
        }
    };

    let mut document = Html::parse_fragment(&content);

    let preview = match draft.overrides.preview {
        Some(preview) => preview,
        None => Selector::parse("p")
            .ok()
            .and_then(|p| document.select(&p).next().map(|el| el.text().collect::<String>()))
            .map(|text| dedent(&text))
            .unwrap_or_default(),
    };

    let mut scripts = Vec::new();
    if let Ok(selector) = Selector::parse("script") {
        let found: Vec<_> = document
            .select(&selector)
            .map(|el| (el.id(), el.html()))
            .collect();
        for (id, html) in found {
            scripts.push(html);
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    let root = document.root_element();
    let visible = root.text().collect::<Vec<_>>().join("");
    let collapsed = visible.split_whitespace().collect::<Vec<_>>().join(" ");
    let searchable_text = strip_template_tags(&collapsed);

    let posted_at = draft
        .publish_now
        .then(|| draft.overrides.posted_at.unwrap_or(now));

    Ok(Post {
        id: None,
        immutable_title: draft.immutable_title,
        title: draft.title,
        updated_at: now,
        keywords: join_keywords(&draft.keywords),
        is_draft: !draft.publish_now,
        preview,
        posted_at,
        content_html: Some(root.inner_html()),
        scripts_html: Some(scripts.join("\n")),
        content_md: markdown,
        searchable_text,
        formatted_date: posted_at.map(formatted_date),
    })
}

/// Highlight for one indexed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnippet {
    pub field: String,
    /// `<b>`-marked excerpt
    pub snippet: String,
    /// Whether the excerpt text occurs verbatim in the stored field
    pub matches_source: bool,
}

/// A published post matching a search, with per-field highlights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub post: Post,
    pub snippets: Vec<FieldSnippet>,
}

/// Snippet text without highlight markers or the leading/trailing ellipses
pub fn snippet_body(snippet: &str) -> String {
    snippet
        .replace("<b>", "")
        .replace("</b>", "")
        .trim_matches('.')
        .to_string()
}

pub fn snippet_matches_source(source: &str, snippet: &str) -> bool {
    source.contains(&snippet_body(snippet))
}

/// Quote each whitespace-separated term as an FTS5 string, so user input
/// is never parsed as query syntax. Terms without any letter or digit are
/// dropped; `None` when nothing is left.
pub fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" "))
}
