use crate::channels::util::{DISCORD_MESSAGE_LIMIT, split_message};
use crate::commands::{self, Reply};
use crate::delivery::Delivery;
use crate::worker::WorkerHandle;
use async_trait::async_trait;
use serenity::all::{
    Client, Command as SlashCommand, CommandInteraction, CommandOptionType, Context, CreateCommand,
    CreateCommandOption, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, EditInteractionResponse, EventHandler, GatewayIntents,
    Interaction, Ready, UserId,
};
use serenity::http::Http;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Discord drops interactions not acknowledged within 3 seconds
const ACK_DEADLINE: Duration = Duration::from_millis(2500);

fn string_option(name: &str, description: &str, required: bool) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::String, name, description).required(required)
}

/// The four global slash commands and their options
pub fn command_definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("add")
            .description("Add a new reminder")
            .add_option(string_option("subject", "Subject name", true))
            .add_option(string_option("event", "Event name", true))
            .add_option(string_option("deadline", "Deadline (DD-MM-YYYY)", true)),
        CreateCommand::new("schedule").description("View your reminder schedule"),
        CreateCommand::new("delete")
            .description("Delete a reminder")
            .add_option(string_option("subject", "Subject name of the reminder to delete", true))
            .add_option(string_option("event", "Event name of the reminder to delete", false)),
        CreateCommand::new("edit")
            .description("Edit an existing reminder event")
            .add_option(string_option("subject", "Subject name of the reminder to edit", true))
            .add_option(string_option("event", "Event name to edit", true))
            .add_option(string_option("new_event", "New event name", false))
            .add_option(string_option("new_deadline", "New deadline (DD-MM-YYYY)", false)),
    ]
}

/// Collect the string options of a slash command by name
fn string_options(command: &CommandInteraction) -> HashMap<String, String> {
    command
        .data
        .options
        .iter()
        .filter_map(|opt| opt.value.as_str().map(|v| (opt.name.clone(), v.to_string())))
        .collect()
}

struct DiscordHandler {
    worker: WorkerHandle,
}

#[serenity::async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        log::info!("Discord: Bot connected as {}", ready.user.name);

        log::info!("Discord: Registering slash commands...");
        match SlashCommand::set_global_commands(&ctx.http, command_definitions()).await {
            Ok(registered) => log::info!(
                "Discord: Registered {} slash command(s)",
                registered.len()
            ),
            Err(e) => log::error!("Discord: Error registering slash commands: {}", e),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        let user_id = command.user.id.to_string();
        log::info!("Discord: /{} from {} ({})", command.data.name, command.user.name, user_id);

        let Some(cmd) = commands::parse(&command.data.name, &string_options(&command)) else {
            respond(&ctx, &command, Reply::ephemeral("Unknown command or missing options.")).await;
            return;
        };

        let defer = async {
            log::debug!("Discord: /{} is queued, deferring the response", command.data.name);
            if let Err(e) = command.defer(&ctx.http).await {
                log::error!("Discord: Failed to defer /{}: {}", command.data.name, e);
            }
        };
        let (result, deferred) =
            with_late_notice(self.worker.submit(&user_id, cmd), ACK_DEADLINE, defer).await;

        let reply = result.unwrap_or_else(|e| {
            log::error!("Discord: Failed to run /{}: {}", command.data.name, e);
            Reply::ephemeral("Something went wrong. Please try again later.")
        });

        if deferred {
            respond_deferred(&ctx, &command, reply).await;
        } else {
            respond(&ctx, &command, reply).await;
        }
    }
}

/// Await `fut`; if it is not done within `deadline`, run `on_late` first and
/// keep waiting. The flag tells whether `on_late` ran.
async fn with_late_notice<F, L>(fut: F, deadline: Duration, on_late: L) -> (F::Output, bool)
where
    F: Future,
    L: Future<Output = ()>,
{
    tokio::pin!(fut);
    match tokio::time::timeout(deadline, &mut fut).await {
        Ok(output) => (output, false),
        Err(_) => {
            on_late.await;
            (fut.await, true)
        }
    }
}

/// Fill in a deferred interaction. A deferred response is public, so private
/// replies replace it with ephemeral follow-ups.
async fn respond_deferred(ctx: &Context, command: &CommandInteraction, reply: Reply) {
    let mut chunks = split_message(&reply.content, DISCORD_MESSAGE_LIMIT).into_iter();

    if reply.ephemeral {
        if let Err(e) = command.delete_response(&ctx.http).await {
            log::warn!("Discord: Failed to clear deferred /{}: {}", command.data.name, e);
        }
    } else {
        let first = chunks.next().unwrap_or_default();
        if let Err(e) = command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(first))
            .await
        {
            log::error!("Discord: Failed to respond to /{}: {}", command.data.name, e);
            return;
        }
    }

    for chunk in chunks {
        let followup = CreateInteractionResponseFollowup::new()
            .content(chunk)
            .ephemeral(reply.ephemeral);
        if let Err(e) = command.create_followup(&ctx.http, followup).await {
            log::error!("Discord: Failed to send follow-up for /{}: {}", command.data.name, e);
            break;
        }
    }
}

/// Answer an interaction; overflow beyond Discord's limit goes out as follow-ups
async fn respond(ctx: &Context, command: &CommandInteraction, reply: Reply) {
    let mut chunks = split_message(&reply.content, DISCORD_MESSAGE_LIMIT).into_iter();
    let first = chunks.next().unwrap_or_default();

    let message = CreateInteractionResponseMessage::new()
        .content(first)
        .ephemeral(reply.ephemeral);
    if let Err(e) = command
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await
    {
        log::error!("Discord: Failed to respond to /{}: {}", command.data.name, e);
        return;
    }

    for chunk in chunks {
        let followup = CreateInteractionResponseFollowup::new()
            .content(chunk)
            .ephemeral(reply.ephemeral);
        if let Err(e) = command.create_followup(&ctx.http, followup).await {
            log::error!("Discord: Failed to send follow-up for /{}: {}", command.data.name, e);
            break;
        }
    }
}

/// Sends notifications as direct messages
pub struct DiscordDelivery {
    http: Arc<Http>,
}

impl DiscordDelivery {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Delivery for DiscordDelivery {
    async fn send(&self, user_id: &str, text: &str) -> Result<(), String> {
        let id = user_id
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .ok_or_else(|| format!("'{}' is not a Discord user id", user_id))?;

        let channel = UserId::new(id)
            .create_dm_channel(&self.http)
            .await
            .map_err(|e| format!("Failed to open DM channel: {}", e))?;

        for chunk in split_message(text, DISCORD_MESSAGE_LIMIT) {
            channel
                .say(&self.http, chunk)
                .await
                .map_err(|e| format!("Failed to send DM: {}", e))?;
        }

        Ok(())
    }
}

/// Build the Discord client; commands it receives are queued on `worker`
pub async fn create_discord_client(bot_token: &str, worker: WorkerHandle) -> Result<Client, String> {
    log::info!("Discord: Token length = {}", bot_token.len());

    // Slash commands and DMs need no privileged intents
    let intents = GatewayIntents::GUILDS;

    let client = Client::builder(bot_token, intents)
        .event_handler(DiscordHandler { worker })
        .await
        .map_err(|e| format!("Failed to create Discord client: {}", e))?;

    log::info!("Discord: Client created successfully");
    Ok(client)
}

/// Run the gateway connection until it fails or a shutdown signal arrives
pub async fn start_discord_listener(
    mut client: Client,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), String> {
    let shard_manager = client.shard_manager.clone();

    tokio::select! {
        _ = &mut shutdown_rx => {
            log::info!("Discord listener received shutdown signal");
            shard_manager.shutdown_all().await;
        }
        result = client.start() => {
            match result {
                Ok(()) => log::info!("Discord listener stopped"),
                Err(e) => {
                    let error = format!("Discord client error: {}", e);
                    log::error!("{}", error);
                    return Err(error);
                }
            }
        }
    }

    Ok(())
}
