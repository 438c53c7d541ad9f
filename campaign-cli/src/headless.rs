//! Headless mode for the campaign engine.
//!
//! A simple text-based interface for running a campaign from scripts,
//! automated tests, and AI agents.

use campaign_core::events::CampaignEvent;
use campaign_core::roadmap::RoadmapStore;
use campaign_core::{ActionStatus, CampaignSession, CharacterInfo, SessionError};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tokio::sync::broadcast::Receiver;

/// How to start the session.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub prompt: String,
    pub character: CharacterInfo,
    /// Resume from this save instead of starting fresh.
    pub load: Option<PathBuf>,
    /// Directory used by `#save` with no path.
    pub save_dir: PathBuf,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            character: CharacterInfo::new("Adventurer"),
            load: None,
            save_dir: PathBuf::from("saves"),
        }
    }
}

/// Run the campaign in headless mode.
///
/// This provides a simple line-oriented protocol:
/// - Lines starting with `#` are commands (save, load, status, roadmap, quit)
/// - Every other line is a player action
/// - Output lines are tagged (`[NARRATOR]`, `[EVENT]`, `[ERROR]`, ...)
pub async fn run_headless(config: HeadlessConfig) -> Result<(), SessionError> {
    let session = CampaignSession::from_env();
    let mut events = session.subscribe();

    println!("=== Campaign Headless Mode ===");
    match &config.load {
        Some(path) => {
            let metadata = session.load(path).await?;
            println!("[LOADED] {} from {}", metadata.campaign_title, path.display());
            if let Some(last) = session
                .inspect(|_, history| history.turns().last().map(|t| t.text.clone()))
                .await
            {
                print_narration(&last);
            }
        }
        None => {
            println!("Character: {}", config.character.summary());
            println!();
            let opening = session.start(&config.prompt, config.character.clone()).await;
            if let Some(source) = opening.roadmap_source {
                tracing::info!(?source, generated = opening.generated, "Campaign ready");
            }
            print_narration(&opening.text);
        }
    }
    print_events(&mut events);
    print_help();
    println!("Enter your actions (one per line):");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.first().copied() {
                Some("quit") | Some("exit") => {
                    println!("Farewell!");
                    break;
                }
                Some("save") => {
                    let result = match parts.get(1) {
                        Some(path) => session.save(*path).await.map(|_| PathBuf::from(*path)),
                        None => session.auto_save(&config.save_dir).await,
                    };
                    match result {
                        Ok(path) => println!("[SAVED] Campaign saved to {}", path.display()),
                        Err(e) => println!("[ERROR] Save failed: {e}"),
                    }
                }
                Some("load") => {
                    if let Some(path) = parts.get(1) {
                        match session.load(*path).await {
                            Ok(metadata) => {
                                println!("[LOADED] {} from {path}", metadata.campaign_title);
                                println!("{}", session.inspect(|store, _| status(store)).await);
                            }
                            Err(e) => println!("[ERROR] Load failed: {e}"),
                        }
                    } else {
                        println!("[ERROR] Usage: #load <path>");
                    }
                }
                Some("status") => {
                    println!("{}", session.inspect(|store, _| status(store)).await);
                }
                Some("roadmap") => {
                    println!("{}", session.inspect(|store, _| roadmap_outline(store)).await);
                }
                Some("help") => print_help(),
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            stdout.flush().ok();
            continue;
        }

        print!("[PROCESSING]");
        stdout.flush().ok();

        let result = session.player_action(line).await;
        print!("\r            \r");
        stdout.flush().ok();

        match result.status {
            ActionStatus::Ok => print_narration(&result.response),
            ActionStatus::Error => {
                print_narration(&result.response);
                println!("[ERROR] The narrator could not respond; nothing changed.");
            }
            ActionStatus::Busy | ActionStatus::NotInitialized => {
                println!("[WAIT] {}", result.response);
            }
        }
        if result.signals.roll_dice {
            println!("[ROLL] The narrator asks for a dice roll.");
        }
        print_events(&mut events);
    }

    Ok(())
}

fn print_narration(text: &str) {
    println!("[NARRATOR]");
    for para in text.split("\n\n") {
        println!("{para}");
    }
    println!();
}

fn print_events(events: &mut Receiver<CampaignEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            CampaignEvent::CampaignStarted { title, theme } => {
                println!("[EVENT] Campaign started: {title} ({})", theme.name());
            }
            CampaignEvent::SceneComplete { completed, next } => {
                println!(
                    "[EVENT] Scene {}.{} complete, now {}.{}",
                    completed.chapter + 1,
                    completed.scene + 1,
                    next.chapter + 1,
                    next.scene + 1
                );
            }
            CampaignEvent::ChapterAdvance { chapter, title } => {
                println!("[EVENT] Chapter {}: {title}", chapter + 1);
            }
            CampaignEvent::EmergencyMode { scenario } => {
                println!("[EVENT] The story takes a turn: {scenario}");
            }
            CampaignEvent::CampaignComplete => println!("[EVENT] Campaign complete!"),
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  #quit          - Exit");
    println!("  #save [path]   - Save the campaign (auto-save slot without a path)");
    println!("  #load <path>   - Load a saved campaign");
    println!("  #status        - Show the current chapter and scene");
    println!("  #roadmap       - Show the whole plan");
    println!("  #help          - Show this help");
    println!("  (anything else is sent as a player action)");
    println!();
}

fn status(store: &RoadmapStore) -> String {
    let Some(roadmap) = store.roadmap() else {
        return "[STATUS] No campaign loaded".to_string();
    };
    let cursor = store.cursor();
    let mut lines = vec![
        "[STATUS]".to_string(),
        format!("  Campaign: {} ({})", roadmap.title, roadmap.theme.name()),
        format!("  Goal: {}", roadmap.overall_goal),
    ];
    if let Some(chapter) = store.current_chapter() {
        lines.push(format!(
            "  Chapter {}/{}: {}",
            cursor.chapter + 1,
            roadmap.chapters.len(),
            chapter.title
        ));
    }
    if let Some(scene) = store.current_scene() {
        lines.push(format!(
            "  Scene: {} ({}, difficulty {})",
            scene.title,
            scene.scene_type.name(),
            scene.difficulty
        ));
        let unmet = scene.unmet_objectives();
        if !unmet.is_empty() {
            lines.push(format!("  Objectives: {}", unmet.join("; ")));
        }
    }
    lines.push(format!(
        "  Actions: {}, adaptations: {}",
        store.choices().len(),
        store.adaptations().len()
    ));
    if store.is_complete() {
        lines.push("  The campaign is complete.".to_string());
    }
    lines.join("\n")
}

fn roadmap_outline(store: &RoadmapStore) -> String {
    let Some(roadmap) = store.roadmap() else {
        return "[ROADMAP] No campaign loaded".to_string();
    };
    let cursor = store.cursor();
    let mut lines = vec![format!("[ROADMAP] {}", roadmap.title)];
    for (c, chapter) in roadmap.chapters.iter().enumerate() {
        lines.push(format!("  Chapter {}: {}", c + 1, chapter.title));
        for (s, scene) in chapter.scenes.iter().enumerate() {
            let marker = if c == cursor.chapter && s == cursor.scene { ">" } else { " " };
            lines.push(format!(
                "   {marker} {}. {} [{} {}]",
                s + 1,
                scene.title,
                scene.scene_type.name(),
                scene.difficulty
            ));
        }
    }
    let threads: Vec<_> = roadmap.open_threads().map(|t| t.title.as_str()).collect();
    if !threads.is_empty() {
        lines.push(format!("  Open threads: {}", threads.join(", ")));
    }
    lines.join("\n")
}

/// Parse the session configuration from command line arguments.
pub fn parse_config_from_args(args: &[String]) -> HeadlessConfig {
    let mut config = HeadlessConfig::default();

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--prompt", Some(prompt)) => config.prompt = prompt.clone(),
            ("--name", Some(name)) => config.character.name = name.clone(),
            ("--class", Some(class)) => config.character.class = Some(class.clone()),
            ("--background", Some(background)) => {
                config.character.background = Some(background.clone())
            }
            ("--description", Some(description)) => {
                config.character.description = description.clone()
            }
            ("--load", Some(path)) => config.load = Some(PathBuf::from(path)),
            ("--save-dir", Some(dir)) => config.save_dir = PathBuf::from(dir),
            _ => {
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    config
}
