//! Campaign analysis: from a premise and a character to a roadmap.
//!
//! The analyzer asks the generation backend for a roadmap first. If that
//! call fails, times out, or returns nothing usable, it builds one from
//! keyword analysis of the prompt instead. Either way a valid roadmap comes
//! back; campaign start never fails here.

mod keywords;
mod parse;
mod template;

pub use keywords::{classify_theme, extract_title, Archetype, GoalKind, PromptAnalysis};
pub use parse::DraftSource;

use crate::config::EngineConfig;
use crate::roadmap::{DifficultyTable, Roadmap};
use parse::{build_roadmap, read_draft};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use template::Template;
use textgen::{GenerationOptions, TextGenerator};
use thiserror::Error;

/// What the player told us about their character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterInfo {
    pub name: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl CharacterInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = Some(background.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// One-line summary for prompts, e.g. "Aria, Ranger (Outlander)".
    pub fn summary(&self) -> String {
        let name = if self.name.trim().is_empty() {
            "An unnamed adventurer"
        } else {
            self.name.trim()
        };
        let mut summary = name.to_string();
        if let Some(class) = &self.class {
            summary.push_str(&format!(", {class}"));
        }
        if let Some(background) = &self.background {
            summary.push_str(&format!(" ({background})"));
        }
        if !self.description.trim().is_empty() {
            summary.push_str(&format!(". {}", self.description.trim()));
        }
        summary
    }

    /// Lowercased class, background and description for keyword scans.
    pub(crate) fn keyword_text(&self) -> String {
        [
            self.class.as_deref().unwrap_or_default(),
            self.background.as_deref().unwrap_or_default(),
            self.description.as_str(),
        ]
        .join(" ")
        .to_lowercase()
    }
}

/// Where a roadmap came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoadmapSource {
    /// Parsed from a JSON object in the backend's reply.
    Generated,
    /// Pulled from labeled lines in the backend's reply.
    Extracted,
    /// Built from keyword analysis of the prompt.
    Fallback,
}

/// Why the backend path produced nothing usable. Never escapes the analyzer.
#[derive(Debug, Error)]
enum AnalyzeError {
    #[error("generation failed: {0}")]
    Generation(#[from] textgen::Error),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("reply contained no usable roadmap")]
    Unparsable,
}

/// Derives a roadmap from a campaign premise and a character.
pub struct CampaignAnalyzer {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
    timeout: Duration,
    difficulty: DifficultyTable,
}

impl CampaignAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &EngineConfig) -> Self {
        Self {
            generator,
            options: config.roadmap.clone(),
            timeout: config.generation_timeout,
            difficulty: config.difficulty.clone(),
        }
    }

    /// Generate a roadmap. Always succeeds.
    pub async fn generate_roadmap(&self, prompt: &str, character: &CharacterInfo) -> Roadmap {
        self.generate_with_source(prompt, character).await.0
    }

    /// Generate a roadmap and report which path produced it.
    pub async fn generate_with_source(
        &self,
        prompt: &str,
        character: &CharacterInfo,
    ) -> (Roadmap, RoadmapSource) {
        let analysis = PromptAnalysis::analyze(prompt, character);
        let template = Template::new(&analysis, character);

        match self.request_roadmap(prompt, character, &template).await {
            Ok((roadmap, source)) => {
                tracing::info!(
                    title = %roadmap.title,
                    chapters = roadmap.chapters.len(),
                    ?source,
                    "Roadmap generated"
                );
                (roadmap, source)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Roadmap generation failed, using keyword analysis");
                let roadmap = fallback_roadmap(prompt, character, &self.difficulty);
                (roadmap, RoadmapSource::Fallback)
            }
        }
    }

    async fn request_roadmap(
        &self,
        prompt: &str,
        character: &CharacterInfo,
        template: &Template<'_>,
    ) -> Result<(Roadmap, RoadmapSource), AnalyzeError> {
        let request = build_request(prompt, character);
        tracing::debug!(chars = request.len(), "Requesting roadmap");

        let reply = tokio::time::timeout(
            self.timeout,
            self.generator.generate(&request, &self.options),
        )
        .await
        .map_err(|_| AnalyzeError::Timeout(self.timeout))??;

        let (draft, draft_source) = read_draft(&reply).ok_or(AnalyzeError::Unparsable)?;
        let roadmap = build_roadmap(draft, template, &self.difficulty);
        if let Err(e) = roadmap.validate() {
            tracing::warn!(error = %e, "Parsed roadmap failed validation");
            return Err(AnalyzeError::Unparsable);
        }

        let source = match draft_source {
            DraftSource::Json => RoadmapSource::Generated,
            DraftSource::LabeledLines => RoadmapSource::Extracted,
        };
        Ok((roadmap, source))
    }
}

/// Build a roadmap from keyword analysis alone, with no backend involved.
///
/// Deterministic: the same prompt and character always give the same roadmap.
pub fn fallback_roadmap(prompt: &str, character: &CharacterInfo, table: &DifficultyTable) -> Roadmap {
    let analysis = PromptAnalysis::analyze(prompt, character);
    let roadmap = Template::new(&analysis, character).roadmap(table);
    if roadmap.validate().is_ok() {
        return roadmap;
    }
    tracing::error!("Keyword roadmap failed validation, using defaults");
    let defaults = PromptAnalysis::default();
    Template::new(&defaults, &CharacterInfo::default()).roadmap(table)
}

fn build_request(prompt: &str, character: &CharacterInfo) -> String {
    let mut request = String::from(include_str!("prompts/roadmap_request.txt"));
    request.push_str("\n## Premise\n");
    request.push_str(prompt.trim());
    request.push_str("\n\n## Character\n");
    request.push_str(&character.summary());
    request.push('\n');
    request
}
