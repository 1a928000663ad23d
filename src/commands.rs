use crate::domain::{TravisRepoUrl, UserId};
use crate::subscription_store::{StoreError, SubscriptionStore};
use crate::watcher::Watcher;
use std::sync::Arc;
use tracing::{error, info, instrument};

pub const HOW_REPLY: &str = "You send me your Travis CI repository link. Example: \nhttps://travis-ci.org/emberjs/ember.js \nThen I will watch for changes and will notify you each time when your build is done. \n\nI will also include some basic information about your build. \nCurrently I can watch only one repository from each user.";
pub const START_REPLY: &str = "Ok, since now I will watch for changes.";
pub const STOP_REPLY: &str = "Ok, since now I will stop watching for changes.";
pub const UNKNOWN_REPLY: &str = "Unknown command.";
pub const NO_LINK_REPLY: &str = "You are not watching any repository yet. Send me your Travis CI repository link.";
pub const DELETED_REPLY: &str = "Ok, I forgot your repository link.";
pub const STORE_FAILURE_REPLY: &str = "Something went wrong on my side. Please try again later.";

/// A chat message interpreted as a bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    How,
    Start,
    Stop,
    Link,
    Delete,
    Subscribe(TravisRepoUrl),
    MalformedLink(String),
    Unknown,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let first = text.split_whitespace().next().unwrap_or_default();
        // Group chats append the bot name: `/start@travis_bot`.
        let command = first.split('@').next().unwrap_or_default();

        match command {
            "/how" | "/help" => Command::How,
            "/start" => Command::Start,
            "/stop" => Command::Stop,
            "/link" => Command::Link,
            "/delete" => Command::Delete,
            _ if first.starts_with("https://") || first.starts_with("http://") => {
                match TravisRepoUrl::new(first) {
                    Ok(url) => Command::Subscribe(url),
                    Err(reason) => Command::MalformedLink(reason),
                }
            }
            _ => Command::Unknown,
        }
    }
}

/// Executes commands against the subscription store and the watch loop.
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<dyn SubscriptionStore>,
    watcher: Arc<Watcher>,
    api_base_url: String,
}

impl CommandHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        watcher: Arc<Watcher>,
        api_base_url: String,
    ) -> Self {
        Self {
            store,
            watcher,
            api_base_url,
        }
    }

    /// Runs `command` for `user_id` and returns the reply text.
    #[instrument(skip(self))]
    pub async fn handle(&self, user_id: UserId, command: Command) -> String {
        match self.execute(user_id, command).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Failed to execute command: {}", e);
                STORE_FAILURE_REPLY.to_string()
            }
        }
    }

    async fn execute(&self, user_id: UserId, command: Command) -> Result<String, StoreError> {
        let reply = match command {
            Command::How => HOW_REPLY.to_string(),
            Command::Start => {
                self.watcher.start();
                START_REPLY.to_string()
            }
            Command::Stop => {
                self.watcher.stop();
                STOP_REPLY.to_string()
            }
            Command::Link => match self.store.find(user_id).await? {
                Some(subscription) => subscription.source_url,
                None => NO_LINK_REPLY.to_string(),
            },
            Command::Delete => {
                if self.store.delete(user_id).await? {
                    DELETED_REPLY.to_string()
                } else {
                    NO_LINK_REPLY.to_string()
                }
            }
            Command::Subscribe(url) => {
                let status_url = url.status_url(&self.api_base_url);
                self.store.upsert(user_id, url.url(), &status_url).await?;
                info!("Watching {} via {}", url.url(), status_url);
                START_REPLY.to_string()
            }
            Command::MalformedLink(reason) => {
                format!("I can not watch this link. {reason}")
            }
            Command::Unknown => UNKNOWN_REPLY.to_string(),
        };
        Ok(reply)
    }
}
