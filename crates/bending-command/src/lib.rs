//! `/bending` subcommands: parsing and the registry that maps them onto
//! [`Game`] operations.

use std::collections::BTreeMap;
use std::time::Instant;

use bending_game::{Element, Game, PlayerId, SLOT_COUNT};
use tracing::debug;

/// Context passed to a subcommand handler.
pub struct CommandContext<'a> {
    pub game: &'a mut Game,
    /// Player executing the command.
    pub sender: PlayerId,
    /// Arguments after the subcommand name.
    pub args: Vec<String>,
    pub now: Instant,
}

/// Result returned by a subcommand handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command executed successfully.
    pub success: bool,
    /// Messages to send back to the command sender.
    pub messages: Vec<String>,
    /// The sender's profile was edited and should be saved.
    pub profile_changed: bool,
}

impl CommandResult {
    /// Create a successful result with a single message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            messages: vec![message.into()],
            profile_changed: false,
        }
    }

    /// Create a failed result with a single message.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            messages: vec![message.into()],
            profile_changed: false,
        }
    }

    /// Successful result that edited the sender's profile.
    pub fn changed(message: impl Into<String>) -> Self {
        Self {
            profile_changed: true,
            ..Self::ok(message)
        }
    }

    fn lines(messages: Vec<String>) -> Self {
        Self {
            success: true,
            messages,
            profile_changed: false,
        }
    }
}

/// Function pointer type for subcommand handlers.
pub type CommandFn = fn(&mut CommandContext<'_>) -> CommandResult;

/// A registered subcommand.
pub struct CommandEntry {
    pub name: String,
    pub usage: String,
    pub description: String,
    pub handler: CommandFn,
}

/// Registry of `/bending` subcommands.
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandEntry>,
}

impl CommandRegistry {
    /// Create a registry with every built-in subcommand.
    pub fn new() -> Self {
        let mut registry = Self {
            commands: BTreeMap::new(),
        };
        registry.register("bind", "<ability> [slot]", "Bind an ability to a slot", cmd_bind);
        registry.register("unbind", "<slot>", "Clear one slot", cmd_unbind);
        registry.register("clear", "", "Clear every slot", cmd_clear);
        registry.register(
            "display",
            "[element]",
            "Show your binds or an element's abilities",
            cmd_display,
        );
        registry.register("choose", "<element>", "Become a bender of one element", cmd_choose);
        registry.register("add", "<element>", "Learn another element", cmd_add);
        registry.register("remove", "<element>", "Forget an element", cmd_remove);
        registry.register(
            "preset",
            "<list|create|bind|delete> [name]",
            "Manage saved bind presets",
            cmd_preset,
        );
        registry.register("cooldowns", "", "Show abilities on cooldown", cmd_cooldowns);
        registry.register("version", "", "Show the plugin version", cmd_version);
        registry
    }

    fn register(&mut self, name: &str, usage: &str, description: &str, handler: CommandFn) {
        self.commands.insert(
            name.to_string(),
            CommandEntry {
                name: name.to_string(),
                usage: usage.to_string(),
                description: description.to_string(),
                handler,
            },
        );
    }

    /// Run `/bending <args..>` for `sender`. An empty argument list shows help.
    pub fn execute(
        &self,
        game: &mut Game,
        sender: PlayerId,
        args: &[String],
        now: Instant,
    ) -> CommandResult {
        let Some((name, rest)) = args.split_first() else {
            return self.help();
        };
        let name = name.to_ascii_lowercase();
        if name == "help" || name == "h" {
            return self.help();
        }
        let Some(entry) = self.commands.get(&name) else {
            return CommandResult::err(format!(
                "Unknown subcommand: {name}. Type /bending help for a list."
            ));
        };
        debug!("{sender} ran /bending {name} {}", rest.join(" "));
        let mut ctx = CommandContext {
            game,
            sender,
            args: rest.to_vec(),
            now,
        };
        (entry.handler)(&mut ctx)
    }

    fn help(&self) -> CommandResult {
        let mut lines = vec![
            "Bending commands:".to_string(),
            "  /bending help - Show this list".to_string(),
        ];
        for entry in self.commands.values() {
            let usage = if entry.usage.is_empty() {
                String::new()
            } else {
                format!(" {}", entry.usage)
            };
            lines.push(format!(
                "  /bending {}{usage} - {}",
                entry.name, entry.description
            ));
        }
        CommandResult::lines(lines)
    }

    pub fn get_commands(&self) -> &BTreeMap<String, CommandEntry> {
        &self.commands
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Parse a user-facing slot number (1..=9) into an index.
fn parse_slot(arg: &str) -> Result<usize, CommandResult> {
    match arg.parse::<usize>() {
        Ok(n) if (1..=SLOT_COUNT).contains(&n) => Ok(n - 1),
        _ => Err(CommandResult::err(format!(
            "Slot must be a number from 1 to {SLOT_COUNT}, got `{arg}`."
        ))),
    }
}

fn parse_element(arg: Option<&String>, usage: &str) -> Result<Element, CommandResult> {
    let Some(arg) = arg else {
        return Err(CommandResult::err(format!("Usage: {usage}")));
    };
    Element::parse(arg).ok_or_else(|| {
        CommandResult::err(format!(
            "Unknown element `{arg}`. Choose air, water, earth or fire."
        ))
    })
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn cmd_bind(ctx: &mut CommandContext<'_>) -> CommandResult {
    let Some(ability) = ctx.args.first() else {
        return CommandResult::err("Usage: /bending bind <ability> [slot]");
    };
    let slot = match ctx.args.get(1).map(|s| parse_slot(s)).transpose() {
        Ok(slot) => slot,
        Err(result) => return result,
    };
    match ctx.game.bind(&ctx.sender, ability, slot) {
        Ok(slot) => CommandResult::changed(format!(
            "Bound {} to slot {}.",
            ability.to_ascii_lowercase(),
            slot + 1
        )),
        Err(e) => CommandResult::err(capitalize(&e.to_string())),
    }
}

fn cmd_unbind(ctx: &mut CommandContext<'_>) -> CommandResult {
    let Some(arg) = ctx.args.first() else {
        return CommandResult::err("Usage: /bending unbind <slot>");
    };
    let slot = match parse_slot(arg) {
        Ok(slot) => slot,
        Err(result) => return result,
    };
    match ctx.game.unbind(&ctx.sender, slot) {
        Ok(Some(ability)) => CommandResult::changed(format!("Unbound {ability} from slot {arg}.")),
        Ok(None) => CommandResult::ok(format!("Slot {arg} is already empty.")),
        Err(e) => CommandResult::err(capitalize(&e.to_string())),
    }
}

fn cmd_clear(ctx: &mut CommandContext<'_>) -> CommandResult {
    match ctx.game.clear_binds(&ctx.sender) {
        Ok(()) => CommandResult::changed("Cleared all slots."),
        Err(e) => CommandResult::err(capitalize(&e.to_string())),
    }
}

fn cmd_display(ctx: &mut CommandContext<'_>) -> CommandResult {
    if let Some(arg) = ctx.args.first() {
        let element = match parse_element(Some(arg), "/bending display [element]") {
            Ok(element) => element,
            Err(result) => return result,
        };
        let registry = ctx.game.registry();
        let mut abilities = registry.by_element(element);
        abilities.sort_by(|a, b| a.id.cmp(&b.id));
        if abilities.is_empty() {
            return CommandResult::ok(format!("No {element} abilities are enabled."));
        }
        let mut lines = vec![format!("{} abilities:", capitalize(element.name()))];
        for ability in abilities {
            lines.push(format!(
                "  {} ({:?}, {:?})",
                ability.id, ability.category, ability.activation
            ));
        }
        return CommandResult::lines(lines);
    }

    let Some(user) = ctx.game.user(&ctx.sender) else {
        return CommandResult::err("You are not bending right now.");
    };
    let profile = user.profile();
    let elements = if profile.elements.is_empty() {
        "none".to_string()
    } else {
        profile
            .elements
            .iter()
            .map(|e| e.name())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut lines = vec![format!("Elements: {elements}")];
    let bound: Vec<String> = (0..SLOT_COUNT)
        .filter_map(|slot| {
            profile.bound(slot).map(|ability| {
                let marker = if slot == user.selected_slot() { "*" } else { " " };
                format!(" {marker}{}: {ability}", slot + 1)
            })
        })
        .collect();
    if bound.is_empty() {
        lines.push("No abilities bound.".to_string());
    } else {
        lines.extend(bound);
    }
    CommandResult::lines(lines)
}

fn cmd_choose(ctx: &mut CommandContext<'_>) -> CommandResult {
    let element = match parse_element(ctx.args.first(), "/bending choose <element>") {
        Ok(element) => element,
        Err(result) => return result,
    };
    match ctx.game.choose_element(&ctx.sender, element) {
        Ok(()) => CommandResult::changed(format!("You are now a {element}bender.")),
        Err(e) => CommandResult::err(capitalize(&e.to_string())),
    }
}

fn cmd_add(ctx: &mut CommandContext<'_>) -> CommandResult {
    let element = match parse_element(ctx.args.first(), "/bending add <element>") {
        Ok(element) => element,
        Err(result) => return result,
    };
    match ctx.game.add_element(&ctx.sender, element) {
        Ok(true) => CommandResult::changed(format!("You can now bend {element}.")),
        Ok(false) => CommandResult::err(format!("You are already a {element}bender.")),
        Err(e) => CommandResult::err(capitalize(&e.to_string())),
    }
}

fn cmd_remove(ctx: &mut CommandContext<'_>) -> CommandResult {
    let element = match parse_element(ctx.args.first(), "/bending remove <element>") {
        Ok(element) => element,
        Err(result) => return result,
    };
    match ctx.game.remove_element(&ctx.sender, element) {
        Ok(true) => CommandResult::changed(format!("You can no longer bend {element}.")),
        Ok(false) => CommandResult::err(format!("You are not a {element}bender.")),
        Err(e) => CommandResult::err(capitalize(&e.to_string())),
    }
}

fn cmd_preset(ctx: &mut CommandContext<'_>) -> CommandResult {
    const USAGE: &str = "Usage: /bending preset <list|create|bind|delete> [name]";
    let Some(action) = ctx.args.first().map(|a| a.to_ascii_lowercase()) else {
        return CommandResult::err(USAGE);
    };
    if action == "list" {
        let presets = ctx.game.presets(&ctx.sender);
        if presets.is_empty() {
            return CommandResult::ok("You have no presets.");
        }
        let names: Vec<&str> = presets.iter().map(|p| p.name.as_str()).collect();
        return CommandResult::ok(format!("Presets: {}", names.join(", ")));
    }

    let Some(name) = ctx.args.get(1) else {
        return CommandResult::err(USAGE);
    };
    let result = match action.as_str() {
        "create" => ctx
            .game
            .create_preset(&ctx.sender, name)
            .map(|()| format!("Saved your binds as preset {}.", name.to_ascii_lowercase())),
        "bind" => ctx
            .game
            .apply_preset(&ctx.sender, name)
            .map(|()| format!("Applied preset {}.", name.to_ascii_lowercase())),
        "delete" => ctx
            .game
            .delete_preset(&ctx.sender, name)
            .map(|()| format!("Deleted preset {}.", name.to_ascii_lowercase())),
        _ => return CommandResult::err(USAGE),
    };
    match result {
        Ok(message) => CommandResult::changed(message),
        Err(e) => CommandResult::err(capitalize(&e.to_string())),
    }
}

fn cmd_cooldowns(ctx: &mut CommandContext<'_>) -> CommandResult {
    let cooldowns = ctx.game.cooldowns(&ctx.sender, ctx.now);
    if cooldowns.is_empty() {
        return CommandResult::ok("No abilities on cooldown.");
    }
    let mut lines = vec!["On cooldown:".to_string()];
    for cooldown in cooldowns {
        lines.push(format!(
            "  {}: {:.1}s",
            cooldown.ability,
            cooldown.remaining_ms as f64 / 1000.0
        ));
    }
    CommandResult::lines(lines)
}

fn cmd_version(_ctx: &mut CommandContext<'_>) -> CommandResult {
    CommandResult::ok(format!("Bending v{}", env!("CARGO_PKG_VERSION")))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
