use std::sync::Arc;
use teloxide::dispatching::ShutdownToken;
use teloxide::{prelude::*, utils::command::BotCommands};
use tokio::task::JoinHandle;

use crate::storage::UserRepository;
use crate::utils::error::{AppError, Result};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "receive the daily price report in this chat.")]
    Start,
    #[command(description = "stop receiving the price report.")]
    Stop,
    #[command(description = "display this text.")]
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Subscribed,
    AlreadySubscribed,
    Unsubscribed,
    NotSubscribed,
    NotRegistered,
    OtherChat,
    NoUsername,
    Failed,
}

impl Reply {
    pub fn text(self) -> &'static str {
        match self {
            Reply::Subscribed => "Subscribed. The price report will arrive here every day.",
            Reply::AlreadySubscribed => "You are already receiving the price report.",
            Reply::Unsubscribed => "Unsubscribed. No more price reports here.",
            Reply::NotSubscribed => "You are not subscribed to the price report.",
            Reply::NotRegistered => {
                "Your Telegram username is not registered. Sign up with your email first."
            }
            Reply::OtherChat => "Your reports are already delivered to another chat.",
            Reply::NoUsername => "Set a Telegram username to subscribe.",
            Reply::Failed => "Something went wrong, please try again later.",
        }
    }

    pub fn for_subscribe(result: &Result<()>) -> Self {
        match result {
            Ok(()) => Reply::Subscribed,
            Err(e) if e.is_already_exists() => Reply::AlreadySubscribed,
            Err(e) if e.is_not_found() => Reply::NotRegistered,
            Err(AppError::Validation(_)) => Reply::OtherChat,
            Err(_) => Reply::Failed,
        }
    }

    pub fn for_unsubscribe(result: &Result<()>) -> Self {
        match result {
            Ok(()) => Reply::Unsubscribed,
            Err(e) if e.is_not_found() => Reply::NotSubscribed,
            Err(_) => Reply::Failed,
        }
    }
}

async fn answer(bot: Bot, msg: Message, cmd: Command, users: Arc<UserRepository>) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let username = msg.from.as_ref().and_then(|user| user.username.clone());
    tracing::debug!(chat_id = chat_id.0, command = ?cmd, "Bot command received");

    let text = match (cmd, username) {
        (Command::Help, _) => Command::descriptions().to_string(),
        (_, None) => Reply::NoUsername.text().to_string(),
        (Command::Start, Some(username)) => {
            let result = users.set_chat_id(&username, chat_id.0).await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "Failed to subscribe chat");
            }
            Reply::for_subscribe(&result).text().to_string()
        }
        (Command::Stop, Some(username)) => {
            let result = users.drop_chat_id(&username, chat_id.0).await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "Failed to unsubscribe chat");
            }
            Reply::for_unsubscribe(&result).text().to_string()
        }
    };

    bot.send_message(chat_id, text).await?;
    Ok(())
}

/// Long-polling subscription bot running on its own task.
pub struct SubscriptionBot {
    handle: JoinHandle<()>,
    shutdown: ShutdownToken,
}

impl SubscriptionBot {
    pub fn spawn(bot: Bot, users: Arc<UserRepository>) -> Self {
        let handler = Update::filter_message()
            .filter_command::<Command>()
            .endpoint(answer);

        let mut dispatcher = Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![users])
            .build();
        let shutdown = dispatcher.shutdown_token();

        let handle = tokio::spawn(async move {
            dispatcher.dispatch().await;
        });

        tracing::info!("Subscription bot started");
        Self { handle, shutdown }
    }

    pub async fn stop(self) {
        match self.shutdown.shutdown() {
            Ok(done) => done.await,
            Err(_) => self.handle.abort(),
        }
        tracing::info!("Subscription bot stopped");
    }
}
