// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Design-log scribe.
//!
//! `track_milestone` asks the model whether an event is worth a design log
//! and, if so, writes `<YYYY-MM-DD>-<slug>.md` with a front-matter block.
//! Logging is best-effort: classifier and filesystem failures are reported
//! as a skipped milestone, never as an error.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};
use waypoint_core::traits::{GenerateRequest, LlmProvider};
use waypoint_core::{MAX_SLUG_LEN, WaypointError, extract_json, slugify};

/// Agent name used for usage accounting and model overrides.
pub const AGENT: &str = "scribe";

/// Suffixes tried before giving up on a free file name.
const MAX_NAME_ATTEMPTS: usize = 20;

/// The classifier's verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct MilestoneVerdict {
    pub worthy: bool,
    pub title: String,
    pub tags: Vec<String>,
    pub body: String,
    pub reason: String,
}

/// What `track_milestone` did.
#[derive(Debug, Clone, PartialEq)]
pub enum Milestone {
    Logged { path: PathBuf, title: String },
    Skipped { reason: String },
}

/// Normalise the classifier JSON. A missing or non-boolean `worthy` means no.
pub fn parse_verdict(value: &Value, summary: &str) -> Result<MilestoneVerdict, WaypointError> {
    let obj = value
        .as_object()
        .ok_or_else(|| WaypointError::parse("verdict is not a JSON object"))?;
    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    let worthy = match obj.get("worthy").or_else(|| obj.get("log")) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    };
    let title = Some(text("title"))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| summary.trim().to_string());
    let tags = match obj.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    Ok(MilestoneVerdict {
        worthy,
        title,
        tags,
        body: text("body"),
        reason: text("reason"),
    })
}

/// Whitespace runs, newlines included, collapsed to single spaces.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A YAML double-quoted scalar. JSON string syntax is a subset of it.
fn yaml_quoted(text: &str) -> String {
    Value::String(single_line(text)).to_string()
}

/// Markdown for one design log.
pub fn render_log(verdict: &MilestoneVerdict, date: NaiveDate, summary: &str, state: &Value) -> String {
    let title = single_line(&verdict.title);
    let tags: Vec<String> = verdict.tags.iter().map(|t| yaml_quoted(t)).collect();
    let mut doc = String::new();
    let _ = writeln!(doc, "---");
    let _ = writeln!(doc, "title: {}", yaml_quoted(&title));
    let _ = writeln!(doc, "date: {}", date.format("%Y-%m-%d"));
    let _ = writeln!(doc, "tags: [{}]", tags.join(", "));
    let _ = writeln!(doc, "---");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "# {title}");
    let _ = writeln!(doc);
    if verdict.body.is_empty() {
        let _ = writeln!(doc, "{}", summary.trim());
    } else {
        let _ = writeln!(doc, "{}", verdict.body);
    }
    if !state.is_null() {
        let _ = writeln!(doc);
        let _ = writeln!(doc, "## State");
        let _ = writeln!(doc);
        let _ = writeln!(doc, "```json");
        let _ = writeln!(
            doc,
            "{}",
            serde_json::to_string_pretty(state).unwrap_or_else(|_| state.to_string())
        );
        let _ = writeln!(doc, "```");
    }
    doc
}

/// `<dir>/<YYYY-MM-DD>-<slug>.md`.
pub fn log_path(dir: &Path, date: NaiveDate, title: &str) -> PathBuf {
    dir.join(format!(
        "{}-{}.md",
        date.format("%Y-%m-%d"),
        slugify(title, MAX_SLUG_LEN)
    ))
}

fn classification_prompt(summary: &str, state: &Value) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You keep the design log of a travel recommendation backend."
    );
    let _ = writeln!(
        prompt,
        "Decide whether this event is a milestone worth a design log entry: an architectural decision, a fixed root cause, a new capability, or a changed contract. Routine edits are not."
    );
    let _ = writeln!(prompt, "EVENT: {}", summary.trim());
    if !state.is_null() {
        let _ = writeln!(prompt, "STATE: {state}");
    }
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Respond with one JSON object and nothing else: {{\"worthy\": true or false, \"reason\": one sentence, \"title\": log title, \"tags\": list of short tags, \"body\": markdown body of the log}}"
    );
    prompt
}

/// Writes design logs for milestones the classifier accepts.
pub struct Scribe {
    llm: Arc<dyn LlmProvider>,
    dir: PathBuf,
}

impl Scribe {
    pub fn new(llm: Arc<dyn LlmProvider>, dir: impl Into<PathBuf>) -> Self {
        Self {
            llm,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Classify the event and write a log for it if warranted.
    pub async fn track_milestone(
        &self,
        summary: &str,
        state: &Value,
    ) -> Result<Milestone, WaypointError> {
        self.track_milestone_on(summary, state, chrono::Utc::now().date_naive())
            .await
    }

    /// Like [`track_milestone`](Self::track_milestone) with an explicit log date.
    pub async fn track_milestone_on(
        &self,
        summary: &str,
        state: &Value,
        date: NaiveDate,
    ) -> Result<Milestone, WaypointError> {
        if summary.trim().is_empty() {
            return Err(WaypointError::bad_request(AGENT, "empty milestone summary"));
        }

        let request = GenerateRequest::new(AGENT, classification_prompt(summary, state)).expect_json();
        let verdict = match self.llm.generate(request).await {
            Ok(generation) => {
                extract_json(&generation.text).and_then(|v| parse_verdict(&v, summary))
            }
            Err(e) => Err(e),
        };
        let verdict = match verdict {
            Ok(v) => v,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "milestone classifier unavailable");
                return Ok(Milestone::Skipped {
                    reason: format!("classifier unavailable: {}", e.kind()),
                });
            }
        };

        if !verdict.worthy {
            metrics::counter!("waypoint_milestones_total", "outcome" => "skipped").increment(1);
            return Ok(Milestone::Skipped {
                reason: if verdict.reason.is_empty() {
                    "not a milestone".to_string()
                } else {
                    verdict.reason
                },
            });
        }

        let doc = render_log(&verdict, date, summary, state);
        match self.write_log(date, &verdict.title, doc.as_bytes()).await {
            Ok(path) => {
                metrics::counter!("waypoint_milestones_total", "outcome" => "logged").increment(1);
                info!(path = %path.display(), title = %verdict.title, "design log written");
                Ok(Milestone::Logged {
                    path,
                    title: verdict.title,
                })
            }
            Err(e) => {
                metrics::counter!("waypoint_milestones_total", "outcome" => "failed").increment(1);
                warn!(dir = %self.dir.display(), error = %e, "design log write failed");
                Ok(Milestone::Skipped {
                    reason: format!("write failed: {e}"),
                })
            }
        }
    }

    /// Creates the directory on demand and never overwrites an existing log.
    async fn write_log(&self, date: NaiveDate, title: &str, contents: &[u8]) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let base = log_path(&self.dir, date, title);
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = if attempt == 0 {
                base.clone()
            } else {
                self.dir.join(format!("{stem}-{}.md", attempt + 1))
            };
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    use tokio::io::AsyncWriteExt;
                    file.write_all(contents).await?;
                    file.flush().await?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free file name for {}", base.display()),
        ))
    }
}
