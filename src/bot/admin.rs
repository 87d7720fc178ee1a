//! Admin checks for playback control commands

use crate::media::Requester;
use teloxide::prelude::*;
use teloxide::requests::Requester as _;
use tracing::warn;

/// Whether the sender may control playback in this chat.
///
/// Anonymous admins post as the group itself, so a message whose sender
/// chat is the group counts as an admin.
pub async fn is_admin(bot: &Bot, msg: &Message, sudo_users: &[u64]) -> bool {
    if let Some(sender_chat) = &msg.sender_chat {
        return sender_chat.id == msg.chat.id;
    }

    let Some(user) = msg.from.as_ref() else {
        return false;
    };

    if sudo_users.contains(&user.id.0) {
        return true;
    }

    match bot.get_chat_member(msg.chat.id, user.id).await {
        Ok(member) => member.kind.is_privileged(),
        Err(e) => {
            warn!("Failed to look up member {} in {}: {}", user.id, msg.chat.id, e);
            false
        }
    }
}

/// The requester of a message: user, sender chat or anonymous
pub fn requester_of(msg: &Message) -> Requester {
    if let Some(user) = &msg.from {
        if msg.sender_chat.is_none() {
            return Requester::user(user.id.0 as i64, user.full_name(), user.username.clone());
        }
    }

    match &msg.sender_chat {
        Some(chat) => Requester::chat(
            chat.id.0,
            chat.title().unwrap_or("Anonymous Admin"),
            chat.username().map(str::to_string),
        ),
        None => Requester::anonymous(),
    }
}
