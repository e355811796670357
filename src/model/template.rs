//! Chat markup for instruct-tuned models

/// Fixed chat markup around a single user turn.
///
/// Every field is a literal; the user message is inserted between
/// `user_header` and `end_of_turn` without escaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Start-of-sequence marker
    pub begin_of_text: &'static str,
    /// Opens the system turn
    pub system_header: &'static str,
    /// Fixed system instruction
    pub system_prompt: &'static str,
    /// Opens the user turn
    pub user_header: &'static str,
    /// Opens the assistant turn the model completes
    pub assistant_header: &'static str,
    /// Closes a turn
    pub end_of_turn: &'static str,
}

/// Llama 3.x Instruct chat template
pub const LLAMA3_TEMPLATE: PromptTemplate = PromptTemplate {
    begin_of_text: "<|begin_of_text|>",
    system_header: "<|start_header_id|>system<|end_header_id|>\n\n",
    system_prompt: "You are a helpful assistant.",
    user_header: "<|start_header_id|>user<|end_header_id|>\n\n",
    assistant_header: "<|start_header_id|>assistant<|end_header_id|>\n\n",
    end_of_turn: "<|eot_id|>",
};

impl PromptTemplate {
    /// Wrap `user_message` in the template
    pub fn format(&self, user_message: &str) -> String {
        let mut formatted = String::with_capacity(self.overhead() + user_message.len());
        formatted.push_str(self.begin_of_text);
        formatted.push_str(self.system_header);
        formatted.push_str(self.system_prompt);
        formatted.push_str(self.end_of_turn);
        formatted.push_str(self.user_header);
        formatted.push_str(user_message);
        formatted.push_str(self.end_of_turn);
        formatted.push_str(self.assistant_header);
        formatted
    }

    /// Length in bytes of everything except the user message.
    pub fn overhead(&self) -> usize {
        self.begin_of_text.len()
            + self.system_header.len()
            + self.system_prompt.len()
            + self.user_header.len()
            + self.assistant_header.len()
            + 2 * self.end_of_turn.len()
    }
}

/// Wrap a user message in the Llama 3 chat template.
pub fn format_prompt(user_message: &str) -> String {
    LLAMA3_TEMPLATE.format(user_message)
}
