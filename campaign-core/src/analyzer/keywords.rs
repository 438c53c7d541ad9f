//! Deterministic keyword analysis of a campaign prompt and character.
//!
//! Every classifier here is a first-match scan over fixed keyword lists, so
//! the same text always yields the same analysis.

use super::CharacterInfo;
use crate::roadmap::Theme;

const DARK_KEYWORDS: &[&str] = &[
    "dark",
    "shadow",
    "curse",
    "evil",
    "corruption",
    "necromancer",
    "undead",
];
const MYSTERY_KEYWORDS: &[&str] = &[
    "mystery",
    "mysterious",
    "detective",
    "investigate",
    "secret",
    "murder",
    "clue",
];
const POLITICAL_KEYWORDS: &[&str] = &[
    "political",
    "politics",
    "intrigue",
    "noble",
    "court",
    "throne",
    "conspiracy",
];
const EXPLORATION_KEYWORDS: &[&str] = &[
    "explore",
    "exploration",
    "journey",
    "discover",
    "uncharted",
    "expedition",
    "wilderness",
];

/// Theme keyword sets in precedence order. Heroic is the default.
const THEME_RULES: &[(Theme, &[&str])] = &[
    (Theme::Dark, DARK_KEYWORDS),
    (Theme::Mystery, MYSTERY_KEYWORDS),
    (Theme::Political, POLITICAL_KEYWORDS),
    (Theme::Exploration, EXPLORATION_KEYWORDS),
];

const VILLAIN_KEYWORDS: &[&str] = &[
    "villain",
    "evil",
    "dragon",
    "curse",
    "tyrant",
    "necromancer",
    "cult",
    "warlord",
    "sorcerer",
    "dark lord",
    "threat",
];
const FOREST_KEYWORDS: &[&str] = &["forest", "woods", "grove", "jungle"];
const DUNGEON_KEYWORDS: &[&str] = &["dungeon", "cave", "ruins", "crypt", "tomb"];

/// Goal trigger phrases in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalKind {
    SlayDragon,
    StopEvil,
    FindTreasure,
    ProtectKingdom,
    Generic,
}

const GOAL_RULES: &[(GoalKind, &[&str])] = &[
    (GoalKind::SlayDragon, &["dragon"]),
    (GoalKind::StopEvil, &["evil", "villain"]),
    (GoalKind::FindTreasure, &["treasure", "artifact"]),
    (GoalKind::ProtectKingdom, &["kingdom", "realm"]),
];

impl GoalKind {
    pub fn goal_text(&self) -> &'static str {
        match self {
            GoalKind::SlayDragon => "Defeat the dragon before it lays waste to the land",
            GoalKind::StopEvil => "Stop the villain's evil scheme before it is too late",
            GoalKind::FindTreasure => "Find the legendary treasure before it falls into the wrong hands",
            GoalKind::ProtectKingdom => "Protect the kingdom from the gathering threat",
            GoalKind::Generic => "Complete the quest and prove yourself a true hero",
        }
    }
}

/// Broad class family, used to pick a fitting mentor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Archetype {
    Warrior,
    Mage,
    Rogue,
    Ranger,
    Cleric,
}

const ARCHETYPE_RULES: &[(Archetype, &[&str])] = &[
    (
        Archetype::Warrior,
        &["warrior", "fighter", "barbarian", "knight", "paladin", "soldier"],
    ),
    (
        Archetype::Mage,
        &["mage", "wizard", "sorcerer", "warlock", "magic", "arcane"],
    ),
    (
        Archetype::Rogue,
        &["rogue", "thief", "assassin", "scoundrel", "bard"],
    ),
    (
        Archetype::Ranger,
        &["ranger", "hunter", "druid", "archer", "scout"],
    ),
    (
        Archetype::Cleric,
        &["cleric", "priest", "monk", "healer", "holy"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Noble,
    Criminal,
    Soldier,
    Scholar,
    Outlander,
    Commoner,
}

const BACKGROUND_RULES: &[(Background, &[&str])] = &[
    (Background::Noble, &["noble", "royal", "prince", "princess", "heir"]),
    (Background::Criminal, &["criminal", "thief", "outlaw", "smuggler"]),
    (Background::Soldier, &["soldier", "veteran", "mercenary", "guard"]),
    (Background::Scholar, &["scholar", "sage", "student", "librarian"]),
    (Background::Outlander, &["outlander", "nomad", "hermit", "wanderer"]),
    (Background::Commoner, &["farmer", "peasant", "commoner", "villager"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motivation {
    Revenge,
    Redemption,
    Wealth,
    Knowledge,
    Duty,
}

const MOTIVATION_RULES: &[(Motivation, &[&str])] = &[
    (Motivation::Revenge, &["revenge", "vengeance", "avenge"]),
    (Motivation::Redemption, &["redemption", "atone", "forgive"]),
    (Motivation::Wealth, &["gold", "wealth", "fortune", "riches"]),
    (Motivation::Knowledge, &["knowledge", "truth", "learn", "lore"]),
    (Motivation::Duty, &["duty", "oath", "honor", "protect"]),
];

/// What the keyword scan found in a prompt and character description.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptAnalysis {
    pub theme: Theme,
    /// Title lifted from the prompt, if one was found.
    pub title: Option<String>,
    pub goal: GoalKind,
    pub archetype: Option<Archetype>,
    pub background: Option<Background>,
    pub motivation: Option<Motivation>,
    pub has_villain: bool,
    pub has_dragon: bool,
    pub has_forest: bool,
    pub has_dungeon: bool,
}

impl Default for PromptAnalysis {
    /// The analysis of a prompt with no keywords at all.
    fn default() -> Self {
        Self {
            theme: Theme::Heroic,
            title: None,
            goal: GoalKind::Generic,
            archetype: None,
            background: None,
            motivation: None,
            has_villain: false,
            has_dragon: false,
            has_forest: false,
            has_dungeon: false,
        }
    }
}

impl PromptAnalysis {
    pub fn analyze(prompt: &str, character: &CharacterInfo) -> Self {
        let lower = prompt.to_lowercase();
        let character_text = character.keyword_text();

        Self {
            theme: classify_theme(&lower),
            title: extract_title(prompt),
            goal: first_match(&lower, GOAL_RULES).unwrap_or(GoalKind::Generic),
            archetype: first_match(&character_text, ARCHETYPE_RULES),
            background: first_match(&character_text, BACKGROUND_RULES),
            motivation: first_match(&character_text, MOTIVATION_RULES)
                .or_else(|| first_match(&lower, MOTIVATION_RULES)),
            has_villain: contains_any(&lower, VILLAIN_KEYWORDS),
            has_dragon: lower.contains("dragon"),
            has_forest: contains_any(&lower, FOREST_KEYWORDS),
            has_dungeon: contains_any(&lower, DUNGEON_KEYWORDS),
        }
    }

    /// The title to use, falling back to a generic one for the theme.
    pub fn title_or_generic(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| generic_title(self.theme).to_string())
    }
}

/// Classify the theme of lowercased text. Dark, mystery, political and
/// exploration are checked in that order; heroic otherwise.
pub fn classify_theme(lower: &str) -> Theme {
    first_match(lower, THEME_RULES).unwrap_or(Theme::Heroic)
}

pub fn generic_title(theme: Theme) -> &'static str {
    match theme {
        Theme::Heroic => "The Hero's Calling",
        Theme::Dark => "Shadows of the Forsaken",
        Theme::Mystery => "The Veiled Truth",
        Theme::Political => "Crowns and Daggers",
        Theme::Exploration => "Beyond the Known Lands",
        Theme::Horror => "Whispers in the Dark",
    }
}

/// The first run of two or more capitalized words, e.g. "The Shattered Crown".
///
/// Punctuation that ends a word also ends the run.
pub fn extract_title(prompt: &str) -> Option<String> {
    let mut run: Vec<&str> = Vec::new();

    for raw in prompt.split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'');
        let capitalized = word.chars().next().is_some_and(char::is_uppercase);

        if capitalized {
            run.push(word);
        } else if run.len() >= 2 {
            break;
        } else {
            run.clear();
        }

        let ends_clause = raw.ends_with([',', '.', ';', ':', '!', '?']);
        if ends_clause {
            if run.len() >= 2 {
                break;
            }
            run.clear();
        }
    }

    (run.len() >= 2).then(|| run.join(" "))
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

fn first_match<T: Copy>(text: &str, rules: &[(T, &[&str])]) -> Option<T> {
    rules
        .iter()
        .find(|(_, keywords)| contains_any(text, keywords))
        .map(|(value, _)| *value)
}
