pub mod client;
pub mod rich_menu;
pub mod signature;

pub use client::LineClient;
pub use signature::verify_signature;

use anyhow::Result;
use async_trait::async_trait;

use checkin_types::line::Profile;
use rich_menu::RichMenu;

/// Outbound side of the bot. Handlers only talk to LINE through this, so
/// tests can swap in a recording implementation.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Push a text message to a user, group or room id.
    async fn push_text(&self, to: &str, text: &str) -> Result<()>;

    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<()>;

    /// `Ok(None)` when LINE does not know the user (not a friend of the bot).
    async fn profile(&self, user_id: &str) -> Result<Option<Profile>>;

    /// Delete every existing rich menu, create `menu` and make it the
    /// default for all users. Returns the new menu id.
    async fn install_rich_menu(&self, menu: &RichMenu) -> Result<String>;
}
