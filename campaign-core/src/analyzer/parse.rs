//! Turning generated text into a validated roadmap.
//!
//! Two readers feed one lenient draft: an embedded JSON object is tried
//! first, then labeled lines ("Title: ...", "Chapter 2: ..."). Whatever the
//! draft is missing comes from the template.

use super::template::{estimate_sessions, normalize_all, Template};
use crate::roadmap::{
    same_text, Chapter, DifficultyProgression, DifficultyTable, Location, Npc, PlotThread,
    Roadmap, Scene, SceneType, Theme, ThreadStatus, MAX_DIFFICULTY, MIN_DIFFICULTY,
};
use crate::text::extract_json_object;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

lazy_static! {
    /// `Label 2 (extra): value`, tolerating bullets, headings and bold markers.
    static ref LABELED_LINE: Regex = Regex::new(
        r"(?i)^[\s\-*#>]*\**\s*([a-z][a-z ]*?)\s*\d*\s*(?:\(([^)]*)\))?\s*\**\s*[:.\-–]\s*(.+)$"
    )
    .expect("valid regex");
    static ref FIRST_NUMBER: Regex = Regex::new(r"\d+").expect("valid regex");
}

/// Which reader produced the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSource {
    Json,
    LabeledLines,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct DraftRoadmap {
    title: Option<String>,
    theme: Option<String>,
    #[serde(alias = "goal")]
    overall_goal: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    estimated_sessions: Option<u32>,
    difficulty_progression: Option<String>,
    chapters: Vec<DraftChapter>,
    npcs: Vec<Value>,
    locations: Vec<Value>,
    plot_threads: Vec<DraftThread>,
    emergency_scenarios: Vec<DraftScene>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DraftChapter {
    title: Option<String>,
    description: Option<String>,
    #[serde(deserialize_with = "lenient_strings")]
    objectives: Vec<String>,
    scenes: Vec<DraftScene>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DraftScene {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    scene_type: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    difficulty: Option<u32>,
    #[serde(deserialize_with = "lenient_strings")]
    objectives: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    choices: Vec<String>,
    difficulty_override: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DraftThread {
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
}

impl DraftRoadmap {
    /// A draft worth building on names the campaign or at least one chapter.
    fn is_useful(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty()) || !self.chapters.is_empty()
    }
}

/// Read a draft from generated text, trying JSON before labeled lines.
pub(crate) fn read_draft(text: &str) -> Option<(DraftRoadmap, DraftSource)> {
    if let Some((value, _)) = extract_json_object(text) {
        match serde_json::from_value::<DraftRoadmap>(value) {
            Ok(draft) if draft.is_useful() => return Some((draft, DraftSource::Json)),
            Ok(_) => tracing::debug!("JSON roadmap had no title or chapters"),
            Err(e) => tracing::debug!(error = %e, "JSON roadmap did not match schema"),
        }
    }

    let draft = read_labeled_lines(text);
    draft
        .is_useful()
        .then_some((draft, DraftSource::LabeledLines))
}

fn read_labeled_lines(text: &str) -> DraftRoadmap {
    let mut draft = DraftRoadmap::default();

    for line in text.lines() {
        let Some(caps) = LABELED_LINE.captures(line) else {
            continue;
        };
        let label = caps[1].trim().to_lowercase();
        let extra = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let value = clean_value(&caps[3]);
        if value.is_empty() {
            continue;
        }

        match label.as_str() {
            "chapter" | "act" => draft.chapters.push(DraftChapter {
                title: Some(value),
                ..DraftChapter::default()
            }),
            "scene" | "encounter" => {
                let mut scene = DraftScene {
                    title: Some(value),
                    ..DraftScene::default()
                };
                apply_scene_hint(&mut scene, extra);
                if draft.chapters.is_empty() {
                    draft.chapters.push(DraftChapter::default());
                }
                if let Some(chapter) = draft.chapters.last_mut() {
                    chapter.scenes.push(scene);
                }
            }
            "title" | "campaign title" | "campaign" | "name" if draft.chapters.is_empty() => {
                draft.title.get_or_insert(value);
            }
            "theme" | "tone" => {
                draft.theme.get_or_insert(value);
            }
            "goal" | "overall goal" | "main goal" | "main quest" => {
                draft.overall_goal.get_or_insert(value);
            }
            "sessions" | "estimated sessions" => {
                draft.estimated_sessions = first_number(&value);
            }
            "difficulty progression" | "progression" => {
                draft.difficulty_progression.get_or_insert(value);
            }
            "type" => {
                if let Some(scene) = last_scene(&mut draft) {
                    scene.scene_type = Some(value);
                }
            }
            "difficulty" => {
                if let Some(scene) = last_scene(&mut draft) {
                    scene.difficulty = first_number(&value);
                }
            }
            "choice" | "choices" | "option" => {
                if let Some(scene) = last_scene(&mut draft) {
                    scene.choices.push(value);
                }
            }
            "description" | "summary" => {
                if let Some(chapter) = draft.chapters.last_mut() {
                    match chapter.scenes.last_mut() {
                        Some(scene) => scene.description = Some(value),
                        None => chapter.description = Some(value),
                    }
                }
            }
            "objective" | "objectives" | "goals" => match draft.chapters.last_mut() {
                Some(chapter) => match chapter.scenes.last_mut() {
                    Some(scene) => scene.objectives.push(value),
                    None => chapter.objectives.push(value),
                },
                None => {
                    draft.overall_goal.get_or_insert(value);
                }
            },
            _ => {}
        }
    }

    draft
}

fn last_scene(draft: &mut DraftRoadmap) -> Option<&mut DraftScene> {
    draft.chapters.last_mut()?.scenes.last_mut()
}

/// Parenthetical hints such as `(combat, 6)`.
fn apply_scene_hint(scene: &mut DraftScene, hint: &str) {
    for part in hint.split([',', '/', ';']) {
        if let Some(number) = first_number(part) {
            scene.difficulty = Some(number);
        } else if SceneType::parse(part).is_some() {
            scene.scene_type = Some(part.trim().to_string());
        }
    }
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '*' || c == '"' || c == '`')
        .trim()
        .to_string()
}

fn first_number(text: &str) -> Option<u32> {
    FIRST_NUMBER.find(text)?.as_str().parse().ok()
}

/// Build a playable roadmap from a draft, filling gaps from the template.
pub(crate) fn build_roadmap(
    draft: DraftRoadmap,
    template: &Template<'_>,
    table: &DifficultyTable,
) -> Roadmap {
    let mut chapters: Vec<Chapter> = draft
        .chapters
        .into_iter()
        .enumerate()
        .map(|(index, chapter)| build_chapter(index, chapter, table))
        .collect();
    if chapters.is_empty() {
        tracing::debug!("Draft had no chapters, using template chapters");
        chapters = template.chapters();
    }

    let mut emergency_scenarios: Vec<Scene> = draft
        .emergency_scenarios
        .into_iter()
        .enumerate()
        .map(|(index, scene)| build_scene(index, scene, table))
        .collect();
    if emergency_scenarios.is_empty() {
        emergency_scenarios = template.emergency_scenarios();
    }

    let total_scenes = chapters.iter().map(|c| c.scenes.len()).sum();
    let mut roadmap = Roadmap {
        title: non_blank(draft.title).unwrap_or_else(|| template.title()),
        theme: draft
            .theme
            .as_deref()
            .and_then(Theme::parse)
            .unwrap_or_else(|| template.theme()),
        overall_goal: non_blank(draft.overall_goal).unwrap_or_else(|| template.goal()),
        estimated_sessions: draft
            .estimated_sessions
            .filter(|s| *s >= 1)
            .unwrap_or_else(|| estimate_sessions(total_scenes)),
        difficulty_progression: draft
            .difficulty_progression
            .as_deref()
            .and_then(DifficultyProgression::parse)
            .unwrap_or_else(|| template.progression()),
        chapters,
        npcs: Vec::new(),
        locations: Vec::new(),
        plot_threads: Vec::new(),
        emergency_scenarios,
    };

    let npcs: Vec<Npc> = draft
        .npcs
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .filter(|n: &Npc| !n.name.trim().is_empty())
        .collect();
    let npcs = if npcs.is_empty() { template.npcs() } else { npcs };
    for npc in npcs {
        roadmap.upsert_npc(npc);
    }

    let locations: Vec<Location> = draft
        .locations
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .filter(|l: &Location| !l.name.trim().is_empty())
        .collect();
    let locations = if locations.is_empty() {
        template.locations()
    } else {
        locations
    };
    for location in locations {
        roadmap.upsert_location(location);
    }

    let threads: Vec<PlotThread> = draft
        .plot_threads
        .into_iter()
        .filter_map(build_thread)
        .collect();
    let threads = if threads.is_empty() {
        template.plot_threads()
    } else {
        threads
    };
    for thread in threads {
        if !roadmap
            .plot_threads
            .iter()
            .any(|t| same_text(&t.title, &thread.title))
        {
            roadmap.plot_threads.push(thread);
        }
    }

    normalize_all(&mut roadmap, table);
    roadmap
}

fn build_chapter(index: usize, draft: DraftChapter, table: &DifficultyTable) -> Chapter {
    let title = non_blank(draft.title).unwrap_or_else(|| format!("Chapter {}", index + 1));
    let description = non_blank(draft.description).unwrap_or_default();
    let mut chapter = Chapter::new(title, description);
    for objective in draft.objectives {
        chapter.add_objective(objective);
    }

    chapter.scenes = draft
        .scenes
        .into_iter()
        .enumerate()
        .map(|(i, scene)| build_scene(i, scene, table))
        .collect();
    if chapter.scenes.is_empty() {
        // A chapter must be playable; give it one scene drawn from itself.
        chapter.scenes.push(Scene::new(
            chapter.title.clone(),
            chapter.description.clone(),
            SceneType::Story,
            3,
        ));
    }
    chapter
}

fn build_scene(index: usize, draft: DraftScene, table: &DifficultyTable) -> Scene {
    let scene_type = draft
        .scene_type
        .as_deref()
        .and_then(SceneType::parse)
        .unwrap_or_default();
    let difficulty = match draft.difficulty {
        Some(d) => u8::try_from(d)
            .unwrap_or(MAX_DIFFICULTY)
            .clamp(MIN_DIFFICULTY, MAX_DIFFICULTY),
        None => {
            let range = table.range(scene_type);
            (range.start() + range.end()) / 2
        }
    };

    let mut scene = Scene::new(
        non_blank(draft.title).unwrap_or_else(|| format!("Scene {}", index + 1)),
        non_blank(draft.description).unwrap_or_default(),
        scene_type,
        difficulty,
    );
    for objective in draft.objectives {
        scene.add_objective(objective);
    }
    scene.choices = draft
        .choices
        .into_iter()
        .filter(|c| !c.trim().is_empty())
        .collect();
    scene.difficulty_override = draft.difficulty_override;
    scene
}

fn build_thread(draft: DraftThread) -> Option<PlotThread> {
    let title = non_blank(draft.title)?;
    let status = match draft.status.as_deref().map(|s| s.trim().to_lowercase()) {
        Some(s) if s == "developing" => ThreadStatus::Developing,
        Some(s) if s == "resolved" => ThreadStatus::Resolved,
        Some(s) if s == "dormant" => ThreadStatus::Dormant,
        Some(s) if s == "abandoned" => ThreadStatus::Abandoned,
        _ => ThreadStatus::Active,
    };
    Some(PlotThread {
        title,
        description: non_blank(draft.description).unwrap_or_default(),
        status,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Accept a list of strings, skipping anything that is not a string.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    })
}

/// Accept a number or a string containing one.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => first_number(&s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::keywords::PromptAnalysis;
    use crate::analyzer::CharacterInfo;

    fn build(text: &str) -> Option<(Roadmap, DraftSource)> {
        let character = CharacterInfo::new("Aria");
        let analysis = PromptAnalysis::analyze("a dragon threatens the realm", &character);
        let template = Template::new(&analysis, &character);
        let table = DifficultyTable::default();
        read_draft(text).map(|(draft, source)| (build_roadmap(draft, &template, &table), source))
    }

    #[test]
    fn test_json_roadmap() {
        let text = r#"Here you go:
```json
{
  "title": "Embers of Karth",
  "theme": "dark",
  "overallGoal": "Rekindle the last forge",
  "estimatedSessions": "6",
  "chapters": [
    {"title": "Cold Hearths", "scenes": [
      {"title": "Ash Market", "type": "social", "difficulty": 2, "objectives": ["Find the smith", 7]},
      {"title": "The Foundry", "type": "combat", "difficulty": 1}
    ]},
    {"title": "Empty", "description": "Nothing planned yet"}
  ],
  "npcs": [{"name": "Hesk", "role": "mentor"}, {"role": "ally"}],
  "plotThreads": [{"title": "The Cold", "status": "developing"}]
}
```"#;
        let (roadmap, source) = build(text).unwrap();

        assert_eq!(source, DraftSource::Json);
        assert_eq!(roadmap.title, "Embers of Karth");
        assert_eq!(roadmap.theme, Theme::Dark);
        assert_eq!(roadmap.estimated_sessions, 6);
        assert_eq!(roadmap.chapters[0].scenes[0].objectives, vec!["Find the smith"]);
        // Combat floor is 3.
        assert_eq!(roadmap.chapters[0].scenes[1].difficulty, 3);
        // Scene-less chapter gets a placeholder scene.
        assert_eq!(roadmap.chapters[1].scenes.len(), 1);
        assert_eq!(roadmap.npcs.len(), 1);
        assert_eq!(roadmap.plot_threads[0].status, ThreadStatus::Developing);
        // Missing sections come from the template.
        assert!(roadmap.location("Millbrook").is_some());
        assert_eq!(roadmap.emergency_scenarios.len(), 1);
        assert!(roadmap.validate().is_ok());
    }

    #[test]
    fn test_difficulty_override_kept() {
        let text = r#"{"title": "T", "chapters": [{"title": "C", "scenes": [
            {"title": "Easy Fight", "type": "combat", "difficulty": 1, "difficultyOverride": true}
        ]}]}"#;
        let (roadmap, _) = build(text).unwrap();
        assert_eq!(roadmap.chapters[0].scenes[0].difficulty, 1);
    }

    #[test]
    fn test_labeled_lines() {
        let text = "\
**Title:** The Drowned Bell
Theme: Mystery
Goal: Learn who rang the bell
## Chapter 1: Low Tide
Description: The harbor empties overnight.
- Scene 1 (exploration, 4): The Empty Docks
  Objective: Search the boats
- Scene 2: The Harbormaster
  Type: social
Chapter 2 - High Water
Scene: The Bell Tower
Difficulty: 12
";
        let (roadmap, source) = build(text).unwrap();

        assert_eq!(source, DraftSource::LabeledLines);
        assert_eq!(roadmap.title, "The Drowned Bell");
        assert_eq!(roadmap.theme, Theme::Mystery);
        assert_eq!(roadmap.overall_goal, "Learn who rang the bell");
        assert_eq!(roadmap.chapters.len(), 2);

        let low_tide = &roadmap.chapters[0];
        assert_eq!(low_tide.title, "Low Tide");
        assert_eq!(low_tide.description, "The harbor empties overnight.");
        assert_eq!(low_tide.scenes[0].title, "The Empty Docks");
        assert_eq!(low_tide.scenes[0].scene_type, SceneType::Exploration);
        assert_eq!(low_tide.scenes[0].difficulty, 4);
        assert_eq!(low_tide.scenes[0].objectives, vec!["Search the boats"]);
        assert_eq!(low_tide.scenes[1].scene_type, SceneType::Social);

        assert_eq!(roadmap.chapters[1].title, "High Water");
        // Story range tops out at 5.
        assert_eq!(roadmap.chapters[1].scenes[0].difficulty, 5);
    }

    #[test]
    fn test_unusable_text() {
        assert!(build("I'm sorry, I can't help with that.").is_none());
        assert!(build("{\"unrelated\": true}").is_none());
    }
}
