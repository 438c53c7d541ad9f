//! Prompt assembly for the narrator.

use super::history::ConversationHistory;
use crate::analyzer::CharacterInfo;
use crate::roadmap::{NpcRole, RoadmapStore};
use std::fmt::Write as _;

/// Returned in place of narration when generation fails.
pub const APOLOGY: &str = "The narrator falters for a moment, the thread of the tale slipping \
away. Give them a breath and try that again.";

/// Shown when a reply held nothing but signals.
pub const QUIET_NARRATION: &str = "A quiet moment passes, and the story moves on.";

const MAX_NPCS: usize = 5;
const MAX_THREADS: usize = 3;
const MAX_NOTES: usize = 3;

/// The standing instructions and campaign state sent as system context.
pub fn system_context(
    store: &RoadmapStore,
    character: &CharacterInfo,
    structured_signals: bool,
) -> String {
    let mut context = String::new();

    context.push_str(include_str!("prompts/narrator_style.txt"));

    context.push('\n');
    context.push_str(include_str!("prompts/signal_tokens.txt"));

    if structured_signals {
        context.push('\n');
        context.push_str(include_str!("prompts/structured_signals.txt"));
    }

    context.push_str("\n## Player Character\n");
    context.push_str(&character.summary());
    context.push_str("\n\n");
    context.push_str(&campaign_context(store));
    context
}

/// Where the campaign stands: plan, position, and the people and threads
/// that matter right now.
pub fn campaign_context(store: &RoadmapStore) -> String {
    let Some(roadmap) = store.roadmap() else {
        return "## Campaign\nNo campaign is loaded.\n".to_string();
    };
    let cursor = store.cursor();
    let mut out = String::new();

    let _ = writeln!(out, "## Campaign: {}", roadmap.title);
    let _ = writeln!(out, "Theme: {}", roadmap.theme.name());
    let _ = writeln!(out, "Overall goal: {}", roadmap.overall_goal);

    if let Some(chapter) = store.current_chapter() {
        let _ = writeln!(
            out,
            "\n## Chapter {} of {}: {}",
            cursor.chapter + 1,
            roadmap.chapters.len(),
            chapter.title
        );
        if !chapter.description.is_empty() {
            let _ = writeln!(out, "{}", chapter.description);
        }
        if !chapter.objectives.is_empty() {
            let _ = writeln!(out, "Chapter objectives: {}", chapter.objectives.join("; "));
        }
    }

    if let Some(scene) = store.current_scene() {
        let _ = writeln!(
            out,
            "\n## Current Scene: {} ({}, difficulty {}/10)",
            scene.title,
            scene.scene_type.name(),
            scene.difficulty
        );
        if !scene.description.is_empty() {
            let _ = writeln!(out, "{}", scene.description);
        }
        if !scene.objectives.is_empty() {
            let _ = writeln!(out, "Objectives:");
            let unmet = scene.unmet_objectives();
            for objective in &scene.objectives {
                let mark = if unmet.contains(&objective.as_str()) { " " } else { "x" };
                let _ = writeln!(out, "- [{mark}] {objective}");
            }
        }
        if !scene.choices.is_empty() {
            let _ = writeln!(out, "Possible directions: {}", scene.choices.join("; "));
        }
        let notes_start = scene.notes.len().saturating_sub(MAX_NOTES);
        for note in &scene.notes[notes_start..] {
            let _ = writeln!(out, "Note: {note}");
        }
    }

    if store.is_complete() {
        let _ = writeln!(
            out,
            "\nThe planned story is complete. Bring things to a satisfying close \
             or follow the player into an epilogue."
        );
    }

    if !roadmap.npcs.is_empty() {
        let _ = writeln!(out, "\n## Key NPCs");
        for npc in roadmap.npcs.iter().take(MAX_NPCS) {
            let role = match npc.role {
                NpcRole::QuestGiver => "quest giver",
                NpcRole::Mentor => "mentor",
                NpcRole::Antagonist => "antagonist",
                NpcRole::Ally => "ally",
                NpcRole::Neutral => "neutral",
            };
            let _ = writeln!(out, "- {} ({role}): {}", npc.name, npc.description);
        }
    }

    let threads: Vec<_> = roadmap.open_threads().take(MAX_THREADS).collect();
    if !threads.is_empty() {
        let _ = writeln!(out, "\n## Open Plot Threads");
        for thread in threads {
            let _ = writeln!(out, "- {}: {}", thread.title, thread.description);
        }
    }

    out
}

/// The per-turn prompt: recent conversation plus the new action.
///
/// `history` already ends with `action`; that entry is not repeated in the
/// transcript.
pub fn narration_prompt(history: &ConversationHistory, turns: usize, action: &str) -> String {
    let mut recent: Vec<_> = history.recent(turns + 1).collect();
    if recent.last().is_some_and(|t| t.text == action) {
        recent.pop();
    }
    let recent = &recent[recent.len().saturating_sub(turns)..];

    let mut prompt = String::new();
    if !recent.is_empty() {
        prompt.push_str("## Recent Conversation\n");
        for turn in recent {
            let _ = writeln!(prompt, "{}: {}", turn.role.label(), turn.text);
        }
        prompt.push('\n');
    }
    prompt.push_str("## Player Action\n");
    prompt.push_str(action.trim());
    prompt.push_str("\n\nNarrate what happens next.");
    prompt
}

/// The request for the campaign's opening narration.
pub fn opening_prompt(store: &RoadmapStore, character: &CharacterInfo) -> String {
    let mut prompt = String::from(include_str!("prompts/opening_request.txt"));
    prompt.push_str("\n## Player Character\n");
    prompt.push_str(&character.summary());
    prompt.push_str("\n\n");
    prompt.push_str(&campaign_context(store));
    prompt
}
