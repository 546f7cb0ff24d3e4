use frames::ChatMessage;

use super::super::dispatch::{Ctx, Outcome};
use crate::frame::Frame;

pub const MAX_CHAT_CHARS: usize = 500;

/// Append a message; history is capped at `chat_history` entries.
pub fn message(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    let Some(content) = req.get_str("content").map(str::trim).filter(|c| !c.is_empty()) else {
        return Outcome::Ignored("empty message");
    };
    let content: String = content.chars().take(MAX_CHAT_CHARS).collect();

    ctx.runtime.chat_seq += 1;
    ctx.state.chat.push_back(ChatMessage {
        seq: ctx.runtime.chat_seq,
        author: sender.to_owned(),
        content,
        created_at_ms: ctx.now_ms,
    });
    while ctx.state.chat.len() > ctx.config.chat_history {
        ctx.state.chat.pop_front();
    }
    Outcome::Done
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
