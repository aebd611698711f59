//! Console commands for driving simulated players.

use bending_plugin_api::GameMode;

pub const HELP: &[&str] = &[
    "join <name>                 connect a simulated player",
    "quit <name>                 disconnect a player",
    "list                        show online players",
    "move <name> <x> <y> <z>     teleport (fires a move event)",
    "look <name> <dx> <dy> <dz>  set the look direction",
    "slot <name> <1-9>           select a hotbar slot",
    "swing <name>                left click",
    "use <name>                  right click",
    "sneak <name>                toggle sneaking",
    "fall <name> <damage>        take fall damage",
    "world <name> <world>        change world",
    "mode <name> <gamemode>      survival, creative, adventure or spectator",
    "cmd <name> <command> [args] run a command as the player, e.g. cmd Aang bending bind air-blast 1",
    "stop                        save and shut down",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Help,
    List,
    Stop,
    Join { name: String },
    Quit { name: String },
    Move { name: String, position: (f32, f32, f32) },
    Look { name: String, direction: (f32, f32, f32) },
    /// 0-based.
    Slot { name: String, slot: usize },
    Swing { name: String },
    Use { name: String },
    Sneak { name: String },
    Fall { name: String, damage: f32 },
    World { name: String, world: String },
    Mode { name: String, mode: GameMode },
    Command {
        name: String,
        command: String,
        args: Vec<String>,
    },
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, rest)) = parts.split_first() else {
            return Err("Empty command".into());
        };
        let verb = verb.trim_start_matches('/').to_ascii_lowercase();
        let name = || {
            rest.first()
                .map(|n| n.to_string())
                .ok_or_else(|| format!("Usage: {verb} <name> ..."))
        };

        let command = match verb.as_str() {
            "help" | "?" => Self::Help,
            "list" => Self::List,
            "stop" => Self::Stop,
            "join" => Self::Join { name: name()? },
            "quit" => Self::Quit { name: name()? },
            "swing" => Self::Swing { name: name()? },
            "use" => Self::Use { name: name()? },
            "sneak" => Self::Sneak { name: name()? },
            "move" => Self::Move {
                name: name()?,
                position: parse_vec(&rest[1..], "move <name> <x> <y> <z>")?,
            },
            "look" => Self::Look {
                name: name()?,
                direction: parse_vec(&rest[1..], "look <name> <dx> <dy> <dz>")?,
            },
            "slot" => {
                let name = name()?;
                let slot = rest
                    .get(1)
                    .and_then(|s| s.parse::<usize>().ok())
                    .filter(|s| (1..=9).contains(s))
                    .ok_or("Usage: slot <name> <1-9>")?;
                Self::Slot {
                    name,
                    slot: slot - 1,
                }
            }
            "fall" => {
                let name = name()?;
                let damage = rest
                    .get(1)
                    .and_then(|s| s.parse::<f32>().ok())
                    .filter(|d| d.is_finite() && *d >= 0.0)
                    .ok_or("Usage: fall <name> <damage>")?;
                Self::Fall { name, damage }
            }
            "world" => {
                let name = name()?;
                let world = rest.get(1).ok_or("Usage: world <name> <world>")?;
                Self::World {
                    name,
                    world: world.to_string(),
                }
            }
            "mode" => {
                let name = name()?;
                let mode = match rest.get(1).map(|m| m.to_ascii_lowercase()).as_deref() {
                    Some("survival") => GameMode::Survival,
                    Some("creative") => GameMode::Creative,
                    Some("adventure") => GameMode::Adventure,
                    Some("spectator") => GameMode::Spectator,
                    _ => return Err("Usage: mode <name> <survival|creative|adventure|spectator>".into()),
                };
                Self::Mode { name, mode }
            }
            "cmd" => {
                let name = name()?;
                let command = rest
                    .get(1)
                    .ok_or("Usage: cmd <name> <command> [args]")?
                    .trim_start_matches('/')
                    .to_ascii_lowercase();
                Self::Command {
                    name,
                    command,
                    args: rest[2..].iter().map(|s| s.to_string()).collect(),
                }
            }
            other => return Err(format!("Unknown console command: {other}. Type help.")),
        };
        Ok(command)
    }
}

fn parse_vec(args: &[&str], usage: &str) -> Result<(f32, f32, f32), String> {
    let values: Vec<f32> = args
        .iter()
        .take(3)
        .map(|s| s.parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("Usage: {usage}"))?;
    match values[..] {
        [x, y, z] if x.is_finite() && y.is_finite() && z.is_finite() => Ok((x, y, z)),
        _ => Err(format!("Usage: {usage}")),
    }
}
