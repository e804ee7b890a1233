pub mod discord;
pub mod util;

pub use discord::{DiscordDelivery, create_discord_client, start_discord_listener};
