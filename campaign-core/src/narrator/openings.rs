//! Canned openings used when the backend cannot write one.

use crate::roadmap::Theme;
use rand::seq::SliceRandom;
use rand::Rng;

const HEROIC: &[&str] = &[
    "Morning sun spills across the rooftops as the village bell rings out, not for a feast, \
     but for help. Faces turn toward you in the square. Word has already spread that you are \
     the one who might answer.",
    "A rider staggers through the gate at dusk, horse lathered, banner torn. Before anyone can \
     ask, the rider's eyes find yours across the crowd. \"You,\" comes the gasp. \"They said \
     you would be here.\"",
    "The road has been quiet for days, until now. Smoke rises beyond the next hill, thin and \
     grey, and on the wind comes the faint sound of someone calling for aid.",
];

const DARK: &[&str] = &[
    "The lanterns gutter though there is no wind. Somewhere beyond the village wall a dog \
     howls and then, abruptly, falls silent. The elders say the curse has come back. They say \
     it is looking for someone.",
    "Ash drifts from a sky the color of old bruises. The town you grew up in is half empty now, \
     doors marked with chalk sigils no one will explain. Tonight, one of those doors is yours.",
    "You wake to the sound of your own name whispered from the dark corner of the room. When \
     you light the candle there is no one there, only a black feather resting on your pillow.",
];

const MYSTERY: &[&str] = &[
    "The letter arrives without a seal, written in a hand you almost recognize. It names a \
     place, a time, and a person who was buried three winters ago.",
    "Fog rolls in off the harbor as the watch captain pulls back the sheet. \"Third one this \
     month,\" comes the mutter. \"Same mark on the wrist. Tell me you've seen it before.\"",
    "Everyone in the inn goes quiet when you enter, then too loudly resumes talking. On your \
     usual table someone has left a single brass key and a note: Do not trust the mayor.",
];

const POLITICAL: &[&str] = &[
    "The throne room glitters with courtiers who smile with their mouths only. When the herald \
     calls your name, a dozen conversations pause and a dozen alliances quietly recalculate.",
    "A masked envoy finds you in the crowded market and presses a signet ring into your palm. \
     \"The Duke's,\" comes the whisper. \"He will want it back. Others will want it more.\"",
    "The council has been deadlocked for a month, and the city is starving for it. Tonight, a \
     summons arrives bearing two seals from two rival houses, each asking to meet at the same hour.",
];

const EXPLORATION: &[&str] = &[
    "The map ends at the river. Beyond it, the old cartographer drew only a single word, \
     Unknown, and a small sketch of a door set into a mountain.",
    "The ship's bell rings as land finally breaks the horizon: green cliffs, white birds, and a \
     thread of smoke where no settlement should be.",
    "Dawn finds you at the edge of the last charted trail. Ahead, the forest rises like a wall, \
     older than any kingdom, and somewhere inside it is the thing you came to find.",
];

const HORROR: &[&str] = &[
    "The children of the village have stopped sleeping. They sit at their windows all night, \
     faces pressed to the glass, watching the hill where the old chapel stands.",
    "The house is exactly as you remember it, down to the crack in the third stair. That is \
     the problem. It burned to the ground when you were nine.",
    "Something scratches beneath the floorboards of the inn, slow and patient. The innkeeper \
     doesn't look up from the bar. \"Don't answer it,\" comes the warning. \"Whatever it asks.\"",
];

/// The fixed opening pool for a theme.
pub fn pool(theme: Theme) -> &'static [&'static str] {
    match theme {
        Theme::Heroic => HEROIC,
        Theme::Dark => DARK,
        Theme::Mystery => MYSTERY,
        Theme::Political => POLITICAL,
        Theme::Exploration => EXPLORATION,
        Theme::Horror => HORROR,
    }
}

/// Pick an opening uniformly at random from the theme's pool.
pub fn fallback_opening<R: Rng + ?Sized>(theme: Theme, rng: &mut R) -> &'static str {
    pool(theme).choose(rng).copied().unwrap_or(HEROIC[0])
}
