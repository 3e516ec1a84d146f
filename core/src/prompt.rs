//! System prompts for request synthesis.
//!
//! The system prompt is the model's only description of the target API and
//! of the `HttpRequest` schema, so it always spells out the six field names,
//! the JSON-only output rule and the `"error"` escape hatch, followed by the
//! profile's worked examples rendered exactly as the schema serializes them.

use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::catalog::{ApiProfile, Catalog};
use crate::error::{Error, Result};

/// Build the request-synthesis prompt for `api_id`.
///
/// `today` adds a date line so the model can compute timestamps for
/// relative dates ("last week", "yesterday").
pub fn build_system_prompt(catalog: &Catalog, api_id: &str, today: Option<NaiveDate>) -> Result<String> {
    let profile = catalog
        .profile(api_id)
        .ok_or_else(|| Error::UnknownApi(api_id.to_string()))?;
    Ok(render(profile, today))
}

/// Render the prompt for a single profile.
pub fn render(profile: &ApiProfile, today: Option<NaiveDate>) -> String {
    let mut prompt = format!(
        r#"You are an advanced HTTP request builder for the {name} API. Your task is to analyze user prompts and generate structured HTTP request objects in JSON format. Follow these rules:

1. **Understand the Intent**:
    - Extract the necessary information from the user's prompt.
    - Identify the endpoint and parameters required to fulfill the request.

2. **Construct the HTTP Request Object**:
    - Include the following fields in the JSON response:
        - **method**: The HTTP method, one of GET, POST, PUT, PATCH, DELETE.
        - **server**: The base server URL of the API, which is currently "{server}".
        - **path**: The endpoint path, such as "{path}".
        - **query**: An object of string query parameters, or null.
        - **headers**: An object of string headers (e.g., for authentication), or null.
        - **body**: The JSON request body for POST, PUT and PATCH requests, or null.

3. **Output Requirements**:
    - Always return a single valid JSON object.
    - Ensure the response is correctly structured for execution.
    - Do not include explanations or comments.

4. **Behavior**:
    - If the {name} API is not capable of fulfilling the request, return an object with the single property "error" explaining the reason why you can not answer, instead of the fields above.
    - Use the language of the prompt to generate the response.
"#,
        name = profile.name,
        server = profile.server,
        path = profile.example_path,
    );

    if !profile.notes.is_empty() || today.is_some() {
        prompt.push_str("\n### Additional Notes:\n");
        for note in &profile.notes {
            let _ = writeln!(prompt, "    - {note}");
        }
        if let Some(today) = today {
            let _ = writeln!(prompt, "    - Today is {}.", today.format("%A, %B %-d, %Y"));
        }
    }

    prompt.push_str("\n### Example Interaction:\n");
    for example in &profile.examples {
        let response = serde_json::to_string_pretty(&example.request).unwrap_or_default();
        let _ = write!(
            prompt,
            "\n**User Prompt**: \"{}\"\n\n**Response**:\n```json\n{}\n```\n",
            example.prompt, response
        );
    }
    prompt
}
