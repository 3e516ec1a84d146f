//! Natural-language front end for third-party REST APIs.
//!
//! # Overview
//! A query is classified into an intent by nearest-utterance similarity.
//! If the intent maps to a configured API, a language model turns the query
//! into an `HttpRequest`, the request is executed, and the model turns the
//! raw response back into a natural-language answer.
//!
//! # Design
//! - The pipeline is synchronous and sequential; every stage makes at most
//!   one outbound call.
//! - External collaborators sit behind small traits (`Encoder`,
//!   `Completion`, `Transport`) so each stage is testable with stubs.
//! - Stages report user-facing outcomes instead of errors. `Error` is
//!   reserved for configuration problems, which are fatal.
//! - Routes, API profiles and worked examples live in one JSON `Catalog`.

pub mod catalog;
pub mod config;
pub mod encoder;
pub mod error;
pub mod executor;
pub mod http;
pub mod humanizer;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod router;
pub mod synthesizer;

pub use catalog::{ApiProfile, Catalog, Example, Route};
pub use config::{ChatConfig, EncoderConfig, RouterConfig};
pub use encoder::{Encoder, HashingEncoder, HttpEncoder};
pub use error::{CompletionError, EncoderError, Error, Result, TransportError};
pub use executor::{ExecutionOutcome, RequestExecutor, Transport, UreqTransport};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use humanizer::ResponseHumanizer;
pub use llm::{ChatClient, Completion};
pub use orchestrator::{Answer, Orchestrator};
pub use prompt::build_system_prompt;
pub use router::{Intent, SemanticRouter};
pub use synthesizer::{RequestSynthesizer, SynthesisOutcome};
