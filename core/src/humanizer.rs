//! Turning a raw API response into a natural-language answer.

use tracing::warn;

use crate::llm::Completion;

pub const HUMANIZER_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates human-readable responses based on API data.";

/// Returned in place of an answer when the completion call fails.
pub const HUMANIZER_FALLBACK: &str = "Sorry, I couldn't generate a response. Please try again later.";

pub struct ResponseHumanizer<'a, C> {
    completion: &'a C,
}

impl<'a, C: Completion> ResponseHumanizer<'a, C> {
    pub fn new(completion: &'a C) -> Self {
        Self { completion }
    }

    /// Ask the model to answer `query` from `api_response`. The reply is
    /// returned unmodified; a failed call yields `HUMANIZER_FALLBACK`.
    pub fn humanize(&self, query: &str, api_response: &str) -> String {
        match self
            .completion
            .complete(HUMANIZER_SYSTEM_PROMPT, &user_message(query, api_response))
        {
            Ok(answer) => answer,
            Err(err) => {
                warn!(error = %err, "completion request failed");
                HUMANIZER_FALLBACK.to_string()
            }
        }
    }
}

pub fn user_message(query: &str, api_response: &str) -> String {
    format!(
        "The user asked: \"{query}\".\n\
         The API returned the following response: {api_response}.\n\
         Please provide a human-readable response based on the user's prompt and the API response."
    )
}
