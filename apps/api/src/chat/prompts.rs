// Prompts for the chat service. Each service that talks to the completion
// provider keeps its prompts beside its handlers.

/// System prompt sent with every chat turn.
pub const CHAT_SYSTEM_PROMPT: &str = "You are Lumen, a helpful and intelligent AI assistant. \
    You provide accurate, well-structured, and helpful responses. Be concise but thorough.";
