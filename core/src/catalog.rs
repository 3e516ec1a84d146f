//! The routing table and API profiles, loaded once at startup.
//!
//! # Design
//! A catalog is a single JSON document: the ordered routes (intent name,
//! example utterances, optional target API), the API profiles the prompt
//! builder draws on, and the message returned for queries no API covers.
//! Everything is validated on load so that a bad catalog fails at startup,
//! never in the middle of a query. In particular every worked example must
//! itself be a valid `HttpRequest`, since the examples are the only
//! description of the schema the model ever sees.
//!
//! `${VAR}` placeholders inside profile notes and example requests are
//! expanded from the environment during loading.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::http::HttpRequest;

/// The catalog compiled into the library.
pub const BUILTIN_CATALOG: &str = include_str!("../catalog/default.json");

/// An intent and the utterances that anchor it.
#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub name: String,
    /// Id of the API profile that answers this intent, if any.
    #[serde(default)]
    pub api: Option<String>,
    pub utterances: Vec<String>,
}

/// Everything the prompt builder knows about one external API.
#[derive(Debug, Clone)]
pub struct ApiProfile {
    pub id: String,
    /// Display name, e.g. "CoinCap v2".
    pub name: String,
    pub server: String,
    pub example_path: String,
    /// Free-text caveats appended to the system prompt.
    pub notes: Vec<String>,
    pub examples: Vec<Example>,
}

/// A worked prompt → request pair.
#[derive(Debug, Clone)]
pub struct Example {
    pub prompt: String,
    pub request: HttpRequest,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    routes: Vec<Route>,
    profiles: Vec<ApiProfile>,
    unsupported_message: String,
}

#[derive(Deserialize)]
struct RawCatalog {
    #[serde(default = "default_unsupported_message")]
    unsupported_message: String,
    routes: Vec<Route>,
    #[serde(default)]
    apis: Vec<RawProfile>,
}

#[derive(Deserialize)]
struct RawProfile {
    id: String,
    name: String,
    server: String,
    example_path: String,
    #[serde(default)]
    notes: Vec<String>,
    examples: Vec<RawExample>,
}

#[derive(Deserialize)]
struct RawExample {
    prompt: String,
    response: Value,
}

fn default_unsupported_message() -> String {
    "I can only answer questions about the topics I have been configured for.".to_string()
}

impl Catalog {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate, expanding placeholders from the process environment.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_json_with(json, |name| std::env::var(name).ok())
    }

    pub fn from_json_with(json: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        let mut missing = BTreeSet::new();

        let profiles = raw
            .apis
            .into_iter()
            .map(|profile| compile_profile(profile, &lookup, &mut missing))
            .collect::<Result<Vec<_>>>()?;

        for name in &missing {
            warn!(variable = %name, "catalog placeholder is not set; expanded to an empty string");
        }

        let catalog = Self {
            routes: raw.routes,
            profiles,
            unsupported_message: raw.unsupported_message,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn profiles(&self) -> &[ApiProfile] {
        &self.profiles
    }

    pub fn profile(&self, id: &str) -> Option<&ApiProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// The API id configured for `route`, if the route exists and has one.
    pub fn api_for_route(&self, route: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|r| r.name == route)
            .and_then(|r| r.api.as_deref())
    }

    pub fn unsupported_message(&self) -> &str {
        &self.unsupported_message
    }

    fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for profile in &self.profiles {
            if profile.id.is_empty() {
                return Err(invalid("API profile with an empty id"));
            }
            if !ids.insert(profile.id.as_str()) {
                return Err(invalid(format!("duplicate API profile `{}`", profile.id)));
            }
            if profile.examples.is_empty() {
                return Err(invalid(format!("API profile `{}` has no examples", profile.id)));
            }
            for (i, example) in profile.examples.iter().enumerate() {
                let server = example.request.server.trim_end_matches('/');
                if server != profile.server.trim_end_matches('/') {
                    return Err(invalid(format!(
                        "example {} of `{}` targets `{}` instead of `{}`",
                        i + 1,
                        profile.id,
                        example.request.server,
                        profile.server
                    )));
                }
            }
        }

        let mut names = HashSet::new();
        for route in &self.routes {
            if route.name.is_empty() {
                return Err(invalid("route with an empty name"));
            }
            if !names.insert(route.name.as_str()) {
                return Err(invalid(format!("duplicate route `{}`", route.name)));
            }
            if route.utterances.is_empty() {
                return Err(invalid(format!("route `{}` has no utterances", route.name)));
            }
            if let Some(api) = &route.api {
                if !ids.contains(api.as_str()) {
                    return Err(invalid(format!(
                        "route `{}` points at unknown API `{api}`",
                        route.name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidCatalog(message.into())
}

fn compile_profile(
    raw: RawProfile,
    lookup: &impl Fn(&str) -> Option<String>,
    missing: &mut BTreeSet<String>,
) -> Result<ApiProfile> {
    let notes = raw
        .notes
        .iter()
        .map(|note| expand_placeholders(note, lookup, missing))
        .collect();

    let mut examples = Vec::with_capacity(raw.examples.len());
    for (i, example) in raw.examples.into_iter().enumerate() {
        let mut response = example.response;
        expand_value(&mut response, lookup, missing);
        let request: HttpRequest = serde_json::from_value(response).map_err(|e| {
            invalid(format!(
                "example {} of `{}` is not a valid request: {e}",
                i + 1,
                raw.id
            ))
        })?;
        examples.push(Example {
            prompt: example.prompt,
            request,
        });
    }

    Ok(ApiProfile {
        id: raw.id,
        name: raw.name,
        server: raw.server,
        example_path: raw.example_path,
        notes,
        examples,
    })
}

fn expand_value(
    value: &mut Value,
    lookup: &impl Fn(&str) -> Option<String>,
    missing: &mut BTreeSet<String>,
) {
    match value {
        Value::String(text) => *text = expand_placeholders(text, lookup, missing),
        Value::Array(items) => {
            for item in items {
                expand_value(item, lookup, missing);
            }
        }
        Value::Object(fields) => {
            for field in fields.values_mut() {
                expand_value(field, lookup, missing);
            }
        }
        _ => {}
    }
}

/// Replace every `${NAME}` with `lookup(NAME)`. Unset names expand to the
/// empty string and are recorded in `missing`; an unterminated `${` is kept
/// literally.
fn expand_placeholders(
    text: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    missing: &mut BTreeSet<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => {
                missing.insert(name.to_string());
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn weather_key(name: &str) -> Option<String> {
        (name == "WEATHER_API_KEY").then(|| "wk-123".to_string())
    }

    const MINIMAL: &str = r#"{
        "routes": [
            {"name": "coin", "api": "coincap", "utterances": ["What is the price of Bitcoin?"]},
            {"name": "news", "utterances": ["Son haberler neler?"]}
        ],
        "apis": [{
            "id": "coincap",
            "name": "CoinCap v2",
            "server": "https://api.coincap.io",
            "example_path": "v2/assets/bitcoin",
            "examples": [{
                "prompt": "Get the current price of Ethereum.",
                "response": {"method": "GET", "server": "https://api.coincap.io", "path": "/v2/assets/ethereum"}
            }]
        }]
    }"#;

    #[test]
    fn builtin_catalog_loads() {
        let catalog = Catalog::from_json_with(BUILTIN_CATALOG, weather_key).unwrap();
        let names: Vec<&str> = catalog.routes().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["weather", "finance", "news", "coin", "public_holidays"]);
        assert_eq!(catalog.api_for_route("coin"), Some("coincap"));
        assert_eq!(catalog.api_for_route("public_holidays"), Some("nager"));
        assert_eq!(catalog.api_for_route("weather"), Some("weatherapi"));
        assert_eq!(catalog.api_for_route("finance"), None);
        assert_eq!(catalog.api_for_route("astrology"), None);
        assert_eq!(
            catalog.unsupported_message(),
            "I can only answer questions about the weather, finance, news, and cryptocurrencies."
        );
    }

    #[test]
    fn builtin_examples_expand_weather_key() {
        let catalog = Catalog::from_json_with(BUILTIN_CATALOG, weather_key).unwrap();
        let weather = catalog.profile("weatherapi").unwrap();
        assert!(weather.notes[0].contains("key=wk-123"));
        let request = &weather.examples[0].request;
        assert_eq!(request.query, vec![
            ("q".to_string(), "New York City".to_string()),
            ("key".to_string(), "wk-123".to_string()),
        ]);
    }

    #[test]
    fn missing_placeholder_expands_empty() {
        let catalog = Catalog::from_json_with(BUILTIN_CATALOG, no_env).unwrap();
        let weather = catalog.profile("weatherapi").unwrap();
        assert_eq!(weather.examples[1].request.query.last().unwrap().1, "");
    }

    #[test]
    fn unsupported_message_has_default() {
        let catalog = Catalog::from_json_with(MINIMAL, no_env).unwrap();
        assert!(!catalog.unsupported_message().is_empty());
        assert_eq!(catalog.profile("coincap").unwrap().examples.len(), 1);
    }

    #[test]
    fn rejects_route_with_unknown_api() {
        let json = MINIMAL.replace(r#""api": "coincap""#, r#""api": "coingecko""#);
        let err = Catalog::from_json_with(&json, no_env).unwrap_err();
        assert!(matches!(err, Error::InvalidCatalog(msg) if msg.contains("coingecko")));
    }

    #[test]
    fn rejects_example_that_is_not_a_request() {
        let json = MINIMAL.replace(r#""method": "GET""#, r#""method": "FETCH""#);
        let err = Catalog::from_json_with(&json, no_env).unwrap_err();
        assert!(matches!(err, Error::InvalidCatalog(msg) if msg.contains("example 1 of `coincap`")));
    }

    #[test]
    fn rejects_example_for_another_server() {
        let json = MINIMAL.replace(
            r#""server": "https://api.coincap.io", "path""#,
            r#""server": "https://api.coingecko.com", "path""#,
        );
        let err = Catalog::from_json_with(&json, no_env).unwrap_err();
        assert!(matches!(err, Error::InvalidCatalog(_)));
    }

    #[test]
    fn rejects_duplicate_routes_and_empty_utterances() {
        let json = MINIMAL.replace(r#""name": "news""#, r#""name": "coin""#);
        assert!(matches!(
            Catalog::from_json_with(&json, no_env),
            Err(Error::InvalidCatalog(_))
        ));

        let json = MINIMAL.replace(r#"["Son haberler neler?"]"#, "[]");
        assert!(matches!(
            Catalog::from_json_with(&json, no_env),
            Err(Error::InvalidCatalog(_))
        ));
    }

    #[test]
    fn malformed_json_is_json_error() {
        assert!(matches!(
            Catalog::from_json_with("{", no_env),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn placeholder_expansion() {
        let mut missing = BTreeSet::new();
        let lookup = |name: &str| (name == "A").then(|| "1".to_string());
        assert_eq!(expand_placeholders("x=${A}&y=${B}", &lookup, &mut missing), "x=1&y=");
        assert_eq!(expand_placeholders("open ${A", &lookup, &mut missing), "open ${A");
        assert_eq!(expand_placeholders("plain", &lookup, &mut missing), "plain");
        assert_eq!(missing.into_iter().collect::<Vec<_>>(), ["B"]);
    }
}
