//! **Spoken instructions** and the route context they are rendered against.
//!
//! A `SpokenInstruction` is what the routing layer wants said at a point along a step. The
//! controller renders it either as plain text or as `AttributedText`, where road names of the
//! upcoming step carry their IPA pronunciation so the engine says them correctly.

use serde::{Deserialize, Serialize};

/// One voice instruction, as delivered with a route step.
///
/// Field names follow the Directions API `voiceInstructions` payload so instructions can be
/// deserialized straight from a route response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpokenInstruction {
    /// Plain text to speak.
    #[serde(rename = "announcement")]
    pub text: String,
    /// SSML form of the same announcement, if the server produced one.
    #[serde(rename = "ssmlAnnouncement", default, skip_serializing_if = "Option::is_none")]
    pub ssml_text: Option<String>,
    /// Distance (meters) from the end of the step at which the instruction should be spoken.
    #[serde(rename = "distanceAlongGeometry", default)]
    pub distance_along_step: f64,
    /// Caller-supplied rich form. When set it is used as-is instead of deriving one.
    #[serde(skip)]
    pub attributed: Option<AttributedText>,
}

impl SpokenInstruction {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ssml_text: None,
            distance_along_step: 0.0,
            attributed: None,
        }
    }

    pub fn with_ssml(mut self, ssml: impl Into<String>) -> Self {
        self.ssml_text = Some(ssml.into());
        self
    }

    pub fn with_attributed(mut self, attributed: AttributedText) -> Self {
        self.attributed = Some(attributed);
        self
    }

    pub fn with_distance_along_step(mut self, meters: f64) -> Self {
        self.distance_along_step = meters;
        self
    }

    /// Rich rendering of this instruction for the given leg progress.
    ///
    /// An explicit `attributed` form wins. Otherwise every road name of the upcoming step that
    /// has a phonetic spelling and appears in `text` becomes its own run carrying that IPA
    /// pronunciation; the remaining text is split into plain runs around it.
    pub fn attributed_text(&self, progress: &RouteLegProgress) -> AttributedText {
        if let Some(ref attributed) = self.attributed {
            return attributed.clone();
        }

        let mut runs = vec![TextRun::plain(self.text.clone())];
        let Some(step) = progress.upcoming_step.as_ref() else {
            return AttributedText { runs };
        };

        for (name, phonetic) in step.names.iter().zip(step.phonetic_names.iter()) {
            let (Some(name), Some(phonetic)) = (non_empty(name), phonetic.as_deref().and_then(non_empty)) else {
                continue;
            };
            runs = runs
                .into_iter()
                .flat_map(|run| split_run(run, name, phonetic))
                .collect();
        }

        AttributedText { runs }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

/// Split a plain run around every occurrence of `name`, tagging the matches with `phonetic`.
/// Runs that already carry a pronunciation are left alone.
fn split_run(run: TextRun, name: &str, phonetic: &str) -> Vec<TextRun> {
    if run.pronunciation.is_some() || !run.text.contains(name) {
        return vec![run];
    }

    let mut out = Vec::new();
    let mut rest = run.text.as_str();
    while let Some(pos) = rest.find(name) {
        if pos > 0 {
            out.push(TextRun {
                text: rest[..pos].to_string(),
                pronunciation: None,
                language: run.language.clone(),
            });
        }
        out.push(TextRun {
            text: name.to_string(),
            pronunciation: Some(phonetic.to_string()),
            language: run.language.clone(),
        });
        rest = &rest[pos + name.len()..];
    }
    if !rest.is_empty() {
        out.push(TextRun {
            text: rest.to_string(),
            pronunciation: None,
            language: run.language,
        });
    }
    out
}

/// A contiguous span of text with optional speech attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    /// IPA notation the engine should use for this span.
    pub pronunciation: Option<String>,
    /// Language tag (e.g. `de-DE`) the span is written in.
    pub language: Option<String>,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pronunciation: None,
            language: None,
        }
    }
}

/// Text with per-run speech attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributedText {
    pub runs: Vec<TextRun>,
}

impl AttributedText {
    pub fn new(runs: Vec<TextRun>) -> Self {
        Self { runs }
    }

    /// Concatenated text of all runs, attributes dropped.
    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// First language declared on any run.
    pub fn language(&self) -> Option<&str> {
        self.runs.iter().find_map(|r| r.language.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.text.is_empty())
    }

    /// SSML rendering: runs with a pronunciation become `<phoneme alphabet="ipa">` elements,
    /// runs with a language become `<lang>` elements.
    pub fn to_ssml(&self) -> String {
        let mut out = String::from("<speak>");
        for run in &self.runs {
            let mut body = escape_xml(&run.text);
            if let Some(ref ipa) = run.pronunciation {
                body = format!(
                    "<phoneme alphabet=\"ipa\" ph=\"{}\">{}</phoneme>",
                    escape_xml(ipa),
                    body
                );
            }
            if let Some(ref lang) = run.language {
                body = format!("<lang xml:lang=\"{}\">{}</lang>", escape_xml(lang), body);
            }
            out.push_str(&body);
        }
        out.push_str("</speak>");
        out
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// A maneuver step as far as speech rendering is concerned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    /// Road names, in display order.
    #[serde(default)]
    pub names: Vec<String>,
    /// IPA spellings aligned with `names`; `None` where the server had none.
    #[serde(default)]
    pub phonetic_names: Vec<Option<String>>,
}

/// Progress along the current route leg, passed alongside every instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteLegProgress {
    pub leg_index: usize,
    /// Meters left on this leg.
    pub distance_remaining: f64,
    /// The step the next maneuver belongs to.
    pub upcoming_step: Option<RouteStep>,
}
