use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{
        application::{CommandInteraction, CommandOptionType},
        id::GuildId,
    },
    prelude::Context,
};

/// A chat command, parsed from a prefixed message or a slash interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Query or URL; empty when the user gave none
    Play(String),
    Pause,
    Resume,
    Skip,
    Stop,
    Leave,
    Queue,
    Loop,
    NowPlaying,
    Help,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play(_) => "play",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Skip => "skip",
            Command::Stop => "stop",
            Command::Leave => "leave",
            Command::Queue => "queue",
            Command::Loop => "loop",
            Command::NowPlaying => "nowplaying",
            Command::Help => "help",
        }
    }

    fn from_name(name: &str, argument: &str) -> Option<Self> {
        let command = match name.to_lowercase().as_str() {
            "play" | "p" => Command::Play(argument.trim().to_string()),
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "skip" | "s" => Command::Skip,
            "stop" => Command::Stop,
            "leave" | "disconnect" | "dc" => Command::Leave,
            "queue" | "q" => Command::Queue,
            "loop" => Command::Loop,
            "nowplaying" | "np" => Command::NowPlaying,
            "help" | "help_music" | "commands" => Command::Help,
            _ => return None,
        };
        Some(command)
    }

    /// Parses `<prefix><name> [argument]`. Unknown names are not commands.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        let rest = content.trim_start().strip_prefix(prefix)?;
        let (name, argument) = rest
            .split_once(char::is_whitespace)
            .unwrap_or((rest, ""));

        if name.is_empty() {
            return None;
        }
        Self::from_name(name, argument)
    }

    pub fn from_interaction(command: &CommandInteraction) -> Option<Self> {
        let query = command
            .data
            .options
            .iter()
            .find(|opt| opt.name == "query")
            .and_then(|opt| opt.value.as_str())
            .unwrap_or_default();

        Self::from_name(&command.data.name, query)
    }
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in definitions() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, definitions()).await?;

    Ok(())
}

fn definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("play")
            .description("Play a song, album or playlist (YouTube/Spotify)")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "query", "URL or search term")
                    .required(true),
            ),
        CreateCommand::new("pause").description("Pause playback"),
        CreateCommand::new("resume").description("Resume playback"),
        CreateCommand::new("skip").description("Skip the current song"),
        CreateCommand::new("stop").description("Stop playback and clear the queue"),
        CreateCommand::new("leave").description("Disconnect the bot from voice"),
        CreateCommand::new("queue").description("Show the queue"),
        CreateCommand::new("loop").description("Toggle loop for the current song"),
        CreateCommand::new("nowplaying").description("Show the current song"),
        CreateCommand::new("help").description("Show all commands"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_with_aliases() {
        assert_eq!(
            Command::parse("!p  never gonna give you up ", "!"),
            Some(Command::Play("never gonna give you up".to_string()))
        );
        assert_eq!(Command::parse("!s", "!"), Some(Command::Skip));
        assert_eq!(Command::parse("!dc", "!"), Some(Command::Leave));
        assert_eq!(Command::parse("!NP", "!"), Some(Command::NowPlaying));
        assert_eq!(Command::parse("!help_music", "!"), Some(Command::Help));
        assert_eq!(Command::parse("!q", "!"), Some(Command::Queue));
    }

    #[test]
    fn test_play_without_query() {
        assert_eq!(Command::parse("!play", "!"), Some(Command::Play(String::new())));
    }

    #[test]
    fn test_not_commands() {
        assert_eq!(Command::parse("play something", "!"), None);
        assert_eq!(Command::parse("!", "!"), None);
        assert_eq!(Command::parse("! play", "!"), None);
        assert_eq!(Command::parse("!volume 50", "!"), None);
    }

    #[test]
    fn test_custom_prefix() {
        assert_eq!(Command::parse("$$loop", "$$"), Some(Command::Loop));
        assert_eq!(Command::parse("!loop", "$$"), None);
    }

    #[test]
    fn test_definitions_match_command_names() {
        let names: Vec<String> = definitions()
            .iter()
            .map(|c| serde_json::to_value(c).unwrap()["name"].as_str().unwrap().to_string())
            .collect();

        for name in &names {
            let parsed = Command::from_name(name, "x").unwrap();
            assert_eq!(parsed.name(), name);
        }
        assert_eq!(names.len(), 10);
    }
}
