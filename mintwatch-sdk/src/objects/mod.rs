pub mod discord;
pub mod feed;
pub mod ledger;

pub use discord::{DiscordEmbed, DiscordEmbedField, DiscordEmbedFooter, DiscordWebhookPayload};
pub use feed::{FeedItem, FeedPage};
pub use ledger::{
    Commitment, LogsNotification, ParsedInstruction, RpcNotification, TransactionResponse,
};
