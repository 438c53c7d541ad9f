//! The deterministic four-chapter template.
//!
//! Used whole when generation fails, and piecewise to fill whatever a
//! generated roadmap left out.

use super::keywords::{Archetype, Background, GoalKind, Motivation, PromptAnalysis};
use super::CharacterInfo;
use crate::roadmap::{
    Chapter, DifficultyProgression, DifficultyTable, Location, LocationKind, Npc, NpcRole,
    PlotThread, Roadmap, Scene, SceneType, Theme, ThreadStatus,
};

const VILLAGE: &str = "Millbrook";
const FOREST: &str = "The Whispering Wood";
const DUNGEON: &str = "The Sunken Crypt";
const QUEST_GIVER: &str = "Elder Maren";

/// Builds template roadmap pieces for one analysis.
pub struct Template<'a> {
    analysis: &'a PromptAnalysis,
    hero: String,
}

impl<'a> Template<'a> {
    pub fn new(analysis: &'a PromptAnalysis, character: &CharacterInfo) -> Self {
        let hero = if character.name.trim().is_empty() {
            "the hero".to_string()
        } else {
            character.name.trim().to_string()
        };
        Self { analysis, hero }
    }

    /// The complete fallback roadmap, difficulties normalized against `table`.
    pub fn roadmap(&self, table: &DifficultyTable) -> Roadmap {
        let chapters = self.chapters();
        let total_scenes: usize = chapters.iter().map(|c| c.scenes.len()).sum();

        let mut roadmap = Roadmap {
            title: self.title(),
            theme: self.theme(),
            overall_goal: self.goal(),
            estimated_sessions: estimate_sessions(total_scenes),
            difficulty_progression: self.progression(),
            chapters,
            npcs: self.npcs(),
            locations: self.locations(),
            plot_threads: self.plot_threads(),
            emergency_scenarios: self.emergency_scenarios(),
        };
        normalize_all(&mut roadmap, table);
        roadmap
    }

    pub fn title(&self) -> String {
        self.analysis.title_or_generic()
    }

    pub fn theme(&self) -> Theme {
        self.analysis.theme
    }

    pub fn goal(&self) -> String {
        self.analysis.goal.goal_text().to_string()
    }

    pub fn progression(&self) -> DifficultyProgression {
        match self.analysis.theme {
            Theme::Dark | Theme::Horror => DifficultyProgression::Steep,
            Theme::Exploration => DifficultyProgression::Plateau,
            _ => DifficultyProgression::Gradual,
        }
    }

    /// Call to Adventure, Journey Begins, Trials, Final Confrontation.
    pub fn chapters(&self) -> Vec<Chapter> {
        let ramp = self.ramp();
        let antagonist = self.antagonist_name();
        let mentor = self.mentor_name();

        let call = Chapter::new(
            "The Call to Adventure",
            format!("Trouble reaches {VILLAGE}, and a plea for help sets {} on the path.", self.hero),
        )
        .with_objective("Learn what threatens the land")
        .with_objective("Accept the quest")
        .with_scene(
            Scene::new(
                "A Plea for Help",
                format!("{QUEST_GIVER} seeks out {} with troubling news.", self.hero),
                SceneType::Social,
                2,
            )
            .with_objective(format!("Hear {QUEST_GIVER} out"))
            .with_choice("Accept the quest at once")
            .with_choice("Ask what is in it for you")
            .with_choice("Look into the rumors first"),
        )
        .with_scene(
            Scene::new("Setting Out", self.departure_text(), SceneType::Story, 1)
                .with_objective("Gather supplies")
                .with_choice("Visit the market")
                .with_choice("Leave at first light"),
        );

        let mut journey = Chapter::new(
            "The Journey Begins",
            "The road leads away from everything familiar.",
        )
        .with_objective("Reach the heart of the danger")
        .with_scene(
            Scene::new(
                "The Open Road",
                "Miles of road, and signs that something has passed this way before.",
                SceneType::Exploration,
                3,
            )
            .with_objective("Follow the trail"),
        );
        if self.analysis.has_forest {
            journey.scenes.push(
                Scene::new(
                    format!("Into {FOREST}"),
                    "Ancient trees close overhead and the path grows uncertain.",
                    SceneType::Exploration,
                    4,
                )
                .with_objective("Find a way through the forest"),
            );
        }
        journey.scenes.push(
            Scene::new(
                "Ambush on the Road",
                match &antagonist {
                    Some(name) => format!("Agents of {name} lie in wait."),
                    None => "Bandits spring from cover.".to_string(),
                },
                SceneType::Combat,
                4 + ramp,
            )
            .with_objective("Survive the ambush")
            .with_choice("Fight")
            .with_choice("Flee")
            .with_choice("Parley"),
        );

        let mut trials = Chapter::new(
            "Trials and Tribulations",
            "Setbacks test resolve, and the true shape of the threat emerges.",
        )
        .with_objective("Uncover the enemy's weakness")
        .with_scene(
            Scene::new(
                format!("Counsel of {mentor}"),
                format!("{mentor} offers hard-won wisdom, for a price."),
                SceneType::Social,
                3,
            )
            .with_objective("Earn the mentor's trust"),
        );
        trials.scenes.push(if self.analysis.has_dungeon {
            Scene::new(
                format!("Into {DUNGEON}"),
                "Cold stone, old bones, and something that should have stayed buried.",
                SceneType::Exploration,
                5 + ramp,
            )
            .with_objective("Reach the lowest chamber")
        } else if self.analysis.theme == Theme::Mystery {
            Scene::new(
                "The Hidden Truth",
                "The clues gathered so far point somewhere no one expected.",
                SceneType::Puzzle,
                5 + ramp,
            )
            .with_objective("Piece the clues together")
        } else {
            Scene::new(
                "The Sealed Door",
                "An ancient mechanism guards the way forward.",
                SceneType::Puzzle,
                5 + ramp,
            )
            .with_objective("Open the way")
        });
        trials.scenes.push(
            Scene::new(
                "The Gauntlet",
                "Everything learned so far is put to the test.",
                SceneType::Combat,
                6 + ramp,
            )
            .with_objective("Break through"),
        );

        let finale = Chapter::new(
            "The Final Confrontation",
            "Everything comes down to one last stand.",
        )
        .with_objective(self.goal())
        .with_scene(
            Scene::new(
                "The Final Confrontation",
                match &antagonist {
                    Some(name) => format!("{} faces {name} at last.", self.hero),
                    None => format!("{} faces the heart of the danger at last.", self.hero),
                },
                SceneType::Climax,
                8 + ramp,
            )
            .with_objective(self.goal()),
        );

        vec![call, journey, trials, finale]
    }

    pub fn npcs(&self) -> Vec<Npc> {
        let mut npcs = vec![
            Npc {
                name: QUEST_GIVER.to_string(),
                role: NpcRole::QuestGiver,
                description: self.quest_giver_text(),
                location: Some(VILLAGE.to_string()),
            },
            Npc {
                name: self.mentor_name().to_string(),
                role: NpcRole::Mentor,
                description: mentor_text(self.analysis.archetype).to_string(),
                location: None,
            },
        ];
        if let Some(name) = self.antagonist_name() {
            npcs.push(Npc {
                name,
                role: NpcRole::Antagonist,
                description: antagonist_text(self.analysis).to_string(),
                location: self.analysis.has_dungeon.then(|| DUNGEON.to_string()),
            });
        }
        npcs
    }

    pub fn locations(&self) -> Vec<Location> {
        let mut locations = vec![Location {
            name: VILLAGE.to_string(),
            description: "A quiet village of thatched roofs and wary faces.".to_string(),
            kind: LocationKind::Settlement,
        }];
        if self.analysis.has_forest {
            locations.push(Location {
                name: FOREST.to_string(),
                description: "An old forest where the paths shift when no one is looking."
                    .to_string(),
                kind: LocationKind::Wilderness,
            });
        }
        if self.analysis.has_dungeon {
            locations.push(Location {
                name: DUNGEON.to_string(),
                description: "Flooded halls beneath a forgotten chapel.".to_string(),
                kind: LocationKind::Dungeon,
            });
        }
        locations
    }

    pub fn plot_threads(&self) -> Vec<PlotThread> {
        let mut threads = vec![PlotThread {
            title: "The Main Quest".to_string(),
            description: self.goal(),
            status: ThreadStatus::Active,
        }];
        if let Some(name) = self.antagonist_name() {
            threads.push(PlotThread {
                title: format!("{name}'s Scheme"),
                description: format!("{name} is working toward something terrible."),
                status: ThreadStatus::Developing,
            });
        }
        threads
    }

    pub fn emergency_scenarios(&self) -> Vec<Scene> {
        vec![Scene::new(
            "An Unexpected Turn",
            "Events overtake the hero and steer the story back toward its heart.",
            SceneType::Story,
            3,
        )
        .with_objective("Find a way back to the main quest")]
    }

    /// The antagonist, present only when the prompt names some kind of villain.
    pub fn antagonist_name(&self) -> Option<String> {
        if !self.analysis.has_villain {
            return None;
        }
        let name = if self.analysis.has_dragon {
            "Vorathrax the Ashen Wyrm"
        } else {
            match self.analysis.theme {
                Theme::Dark | Theme::Horror => "The Hollow King",
                Theme::Mystery => "The Faceless One",
                Theme::Political => "Chancellor Vey",
                Theme::Heroic | Theme::Exploration => "Malgrath the Betrayer",
            }
        };
        Some(name.to_string())
    }

    fn mentor_name(&self) -> &'static str {
        match self.analysis.archetype {
            Some(Archetype::Warrior) => "Sir Aldric",
            Some(Archetype::Mage) => "Archmage Veyla",
            Some(Archetype::Rogue) => "Whisper",
            Some(Archetype::Ranger) => "Old Tamsin",
            Some(Archetype::Cleric) => "Mother Ilse",
            None => "Brother Corwin",
        }
    }

    fn ramp(&self) -> u8 {
        match self.progression() {
            DifficultyProgression::Steep => 1,
            _ => 0,
        }
    }

    fn departure_text(&self) -> String {
        let reason = match self.analysis.motivation {
            Some(Motivation::Revenge) => "an old wrong still burns",
            Some(Motivation::Redemption) => "there is a debt to the past to repay",
            Some(Motivation::Wealth) => "there is coin to be made",
            Some(Motivation::Knowledge) => "the truth is out there waiting",
            Some(Motivation::Duty) => "an oath demands it",
            None => "someone has to",
        };
        format!("{} prepares to leave {VILLAGE}, because {reason}.", self.hero)
    }

    fn quest_giver_text(&self) -> String {
        let angle = match self.analysis.background {
            Some(Background::Noble) => "who remembers the hero's family name",
            Some(Background::Criminal) => "who knows more of the hero's past than is comfortable",
            Some(Background::Soldier) => "who served in the same war long ago",
            Some(Background::Scholar) => "who keeps the village's oldest records",
            Some(Background::Outlander) => "who distrusts strangers but is out of options",
            Some(Background::Commoner) | None => "who has watched over the village for decades",
        };
        format!("The village elder of {VILLAGE}, {angle}.")
    }
}

fn mentor_text(archetype: Option<Archetype>) -> &'static str {
    match archetype {
        Some(Archetype::Warrior) => "A scarred veteran knight who teaches through drills and bruises.",
        Some(Archetype::Mage) => "A reclusive spellcaster with a tower full of dangerous books.",
        Some(Archetype::Rogue) => "A fence and informant who never gives a straight answer.",
        Some(Archetype::Ranger) => "A weathered tracker who reads the land like a map.",
        Some(Archetype::Cleric) => "A temple elder whose faith has survived worse than this.",
        None => "A traveling monk with a habit of showing up when needed.",
    }
}

fn antagonist_text(analysis: &PromptAnalysis) -> &'static str {
    if analysis.has_dragon {
        return "An ancient dragon whose hoard grows with every village it burns.";
    }
    match analysis.goal {
        GoalKind::StopEvil => "A patient schemer whose plan is nearly complete.",
        _ => "A rising power that sees the hero as an obstacle.",
    }
}

/// Two scenes per session, at least one session.
pub fn estimate_sessions(total_scenes: usize) -> u32 {
    let sessions = total_scenes.div_ceil(2).max(1);
    u32::try_from(sessions).unwrap_or(u32::MAX)
}

/// Clamp every scene's difficulty into its type's range.
pub fn normalize_all(roadmap: &mut Roadmap, table: &DifficultyTable) {
    roadmap
        .chapters
        .iter_mut()
        .flat_map(|c| c.scenes.iter_mut())
        .chain(roadmap.emergency_scenarios.iter_mut())
        .for_each(|scene| scene.normalize(table));
}
