//! The query pipeline: route, build prompt, synthesize, execute, humanize.
//!
//! # Design
//! Each stage returns an outcome rather than an error, and the first
//! failure short-circuits: its message becomes the answer and no later
//! stage runs. Queries whose intent has no configured API get the
//! catalog's unsupported message. The only `Err` is a configuration error
//! surfacing from the prompt builder.

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::catalog::Catalog;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::executor::{ExecutionOutcome, RequestExecutor, Transport, UreqTransport};
use crate::http::HttpRequest;
use crate::humanizer::ResponseHumanizer;
use crate::llm::Completion;
use crate::prompt::build_system_prompt;
use crate::router::{Intent, SemanticRouter};
use crate::synthesizer::{RequestSynthesizer, SynthesisOutcome};

/// The final text plus what each stage produced on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub intent: Intent,
    /// Target API id, when the intent has one.
    pub api: Option<String>,
    pub request: Option<HttpRequest>,
    /// Re-encoded JSON body of the API response.
    pub api_response: Option<String>,
    pub text: String,
}

impl Answer {
    fn stopped(intent: Intent, api: Option<String>, text: String) -> Self {
        Self {
            intent,
            api,
            request: None,
            api_response: None,
            text,
        }
    }
}

pub struct Orchestrator<E, C, T = UreqTransport> {
    catalog: Catalog,
    router: SemanticRouter<E>,
    completion: C,
    executor: RequestExecutor<T>,
    today: Option<NaiveDate>,
}

impl<E: Encoder, C: Completion, T: Transport> Orchestrator<E, C, T> {
    pub fn new(
        catalog: Catalog,
        router: SemanticRouter<E>,
        completion: C,
        executor: RequestExecutor<T>,
    ) -> Self {
        Self {
            catalog,
            router,
            completion,
            executor,
            today: None,
        }
    }

    /// Pin the date written into system prompts instead of using the
    /// current UTC date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn answer(&self, query: &str) -> Result<Answer> {
        let intent = self.router.route(query);
        info!(%intent, "routed query");

        let Some(api) = intent.name().and_then(|name| self.catalog.api_for_route(name)) else {
            info!(%intent, "no API configured for intent");
            let text = self.catalog.unsupported_message().to_string();
            return Ok(Answer::stopped(intent, None, text));
        };
        let api = api.to_string();

        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let system_prompt = build_system_prompt(&self.catalog, &api, Some(today))?;

        let request = match RequestSynthesizer::new(&self.completion).synthesize(query, &system_prompt) {
            SynthesisOutcome::Success(request) => request,
            SynthesisOutcome::Failure(message) => {
                info!(%api, "request synthesis stopped the pipeline");
                return Ok(Answer::stopped(intent, Some(api), message));
            }
        };
        info!(%api, method = %request.method, url = %request.full_url(), "synthesized request");

        let api_response = match self.executor.execute(&request) {
            ExecutionOutcome::Success(body) => body,
            ExecutionOutcome::Failure(message) => {
                return Ok(Answer {
                    request: Some(request),
                    ..Answer::stopped(intent, Some(api), message)
                });
            }
        };

        let text = ResponseHumanizer::new(&self.completion).humanize(query, &api_response);
        Ok(Answer {
            intent,
            api: Some(api),
            request: Some(request),
            api_response: Some(api_response),
            text,
        })
    }
}
