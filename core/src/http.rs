//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! synthesizer produces `HttpRequest` values from model output, and a
//! `Transport` turns them into `HttpResponse` values. Nothing in this module
//! touches the network.
//!
//! `HttpRequest` is also the JSON contract the model must honor, so its serde
//! shape is exactly the documented wire schema: upper-case `method`, string
//! maps (or `null`) for `query` and `headers`, an object (or `null`) for
//! `body`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// HTTP method for a request. Anything outside these five verbs is rejected
/// during deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether a JSON body is sent for this method.
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// `query` and `headers` keep insertion order; an empty list serializes as
/// `null` and a `null` (or missing) field deserializes as an empty list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub server: String,
    pub path: String,
    #[serde(default, with = "ordered_pairs")]
    pub query: Vec<(String, String)>,
    #[serde(default, with = "ordered_pairs")]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<Map<String, Value>>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, server: &str, path: &str) -> Self {
        Self {
            method,
            server: server.to_string(),
            path: path.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = Some(body);
        self
    }

    /// Render `server` + `path` + `?query` into a single URL.
    ///
    /// Exactly one `/` separates server and path regardless of how the model
    /// punctuated them. Query keys and values are percent-encoded; strings
    /// made only of unreserved characters come through unchanged.
    pub fn full_url(&self) -> String {
        let server = self.server.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        let mut url = if path.is_empty() {
            server.to_string()
        } else {
            format!("{server}/{path}")
        };

        if !self.query.is_empty() {
            let query = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('?');
            url.push_str(&query);
        }
        url
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by a `Transport` after executing an `HttpRequest`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Serde adapter between a JSON object of strings and an ordered pair list.
mod ordered_pairs {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        pairs: &[(String, String)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        if pairs.is_empty() {
            return serializer.serialize_none();
        }
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (key, value) in pairs {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, String)>, D::Error> {
        deserializer.deserialize_option(NullablePairs)
    }

    struct NullablePairs;

    impl<'de> Visitor<'de> for NullablePairs {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an object of string values or null")
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
            deserializer.deserialize_map(Pairs)
        }
    }

    struct Pairs;

    impl<'de> Visitor<'de> for Pairs {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an object of string values")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, String>()? {
                pairs.push((key, value));
            }
            Ok(pairs)
        }
    }
}
