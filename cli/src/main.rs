//! askapi: answer a question by routing it to a public REST API.
//!
//! Reads one query (argument or a line from stdin), prints each pipeline
//! stage to stdout and the final answer last. Diagnostics go to stderr and
//! are controlled with `RUST_LOG`.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use askapi_core::{
    Answer, Catalog, ChatClient, ChatConfig, Encoder, EncoderConfig, HashingEncoder, HttpEncoder,
    Orchestrator, RequestExecutor, RouterConfig, SemanticRouter, UreqTransport,
};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncoderKind {
    /// Local character-trigram hashing; needs no network.
    Hashing,
    /// OpenAI-compatible embeddings endpoint (ASKAPI_EMBED_URL).
    Http,
}

#[derive(Parser)]
#[command(name = "askapi")]
#[command(about = "Answer questions by calling public REST APIs through an LLM")]
struct Args {
    /// The question; read from stdin when omitted
    query: Option<String>,

    /// Catalog JSON with routes and API profiles (defaults to the built-in one)
    #[arg(long, env = "ASKAPI_CATALOG")]
    catalog: Option<PathBuf>,

    /// Utterance encoder used by the router
    #[arg(long, value_enum, default_value = "hashing", env = "ASKAPI_ENCODER")]
    encoder: EncoderKind,

    /// Minimum similarity to accept a route (defaults to the encoder's own)
    #[arg(long)]
    threshold: Option<f32>,

    /// Nearest utterances that vote for a route
    #[arg(long, default_value = "5")]
    top_k: usize,

    /// Timeout for every outbound HTTP call; none by default
    #[arg(long, env = "ASKAPI_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Only classify the query; no LLM or API calls are made
    #[arg(long)]
    route_only: bool,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let timeout = args.timeout_secs.map(Duration::from_secs);

    let catalog = match &args.catalog {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("failed to load catalog {}", path.display()))?,
        None => Catalog::builtin().context("built-in catalog is invalid")?,
    };

    let encoder: Box<dyn Encoder> = match args.encoder {
        EncoderKind::Hashing => Box::new(HashingEncoder::default()),
        EncoderKind::Http => Box::new(HttpEncoder::new(
            EncoderConfig::from_env()?.with_timeout(timeout),
        )),
    };
    let router_config = RouterConfig {
        top_k: args.top_k,
        threshold: args.threshold,
    };
    let router = SemanticRouter::new(encoder, catalog.routes(), router_config)
        .context("failed to embed route utterances")?;
    info!(
        routes = catalog.routes().len(),
        threshold = router.threshold(),
        "router ready"
    );

    if args.route_only {
        let query = read_query(args.query)?;
        println!("User query: {query}");
        println!("Selected route: {}", router.route(&query));
        return Ok(());
    }

    // Credentials are checked before any query is read.
    let chat = ChatClient::new(ChatConfig::from_env()?.with_timeout(timeout));
    info!(model = chat.model(), "completion client ready");

    let orchestrator = Orchestrator::new(
        catalog,
        router,
        chat,
        RequestExecutor::new(UreqTransport::new(timeout)),
    );

    let query = read_query(args.query)?;
    println!("User query: {query}");
    let answer = orchestrator.answer(&query)?;
    print_answer(&answer)?;
    Ok(())
}

fn read_query(arg: Option<String>) -> Result<String> {
    if let Some(query) = arg {
        return Ok(query);
    }
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read query from stdin")?;
    let query = line.trim_end_matches(['\r', '\n']).to_string();
    if query.trim().is_empty() {
        bail!("no query given");
    }
    Ok(query)
}

fn print_answer(answer: &Answer) -> Result<()> {
    println!("Selected route: {}", answer.intent);
    if let Some(request) = &answer.request {
        println!("Generated API Request:");
        println!("{}", serde_json::to_string_pretty(request)?);
        println!("URL: {} {}", request.method, request.full_url());
    }
    if let Some(response) = &answer.api_response {
        println!("API Response: {response}");
    }
    println!();
    println!("{}", answer.text);
    Ok(())
}
