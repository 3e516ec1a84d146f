//! Nearest-utterance intent classification.
//!
//! # Design
//! Every utterance in the catalog is embedded once, when the router is
//! built. A query is embedded on its own and compared with all of them by
//! cosine similarity. The `top_k` closest utterances vote for their routes
//! by summing their scores; the route with the largest sum wins, but only
//! if its single best utterance clears the threshold. Equal scores and
//! equal sums resolve to whichever came first in the catalog, so routing is
//! deterministic for a given encoder.

use std::fmt;

use tracing::{debug, warn};

use crate::catalog::Route;
use crate::config::RouterConfig;
use crate::encoder::{cosine_similarity, Encoder};
use crate::error::{Error, Result};

/// The outcome of routing a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Matched(String),
    NoMatch,
}

impl Intent {
    pub fn name(&self) -> Option<&str> {
        match self {
            Intent::Matched(name) => Some(name),
            Intent::NoMatch => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Matched(name) => f.write_str(name),
            Intent::NoMatch => f.write_str("no match"),
        }
    }
}

struct Anchor {
    route: usize,
    vector: Vec<f32>,
}

pub struct SemanticRouter<E> {
    encoder: E,
    names: Vec<String>,
    anchors: Vec<Anchor>,
    top_k: usize,
    threshold: f32,
}

impl<E: Encoder> SemanticRouter<E> {
    /// Embed every utterance of `routes`. An encoder failure here is fatal.
    pub fn new(encoder: E, routes: &[Route], config: RouterConfig) -> Result<Self> {
        let texts: Vec<&str> = routes
            .iter()
            .flat_map(|r| r.utterances.iter().map(String::as_str))
            .collect();
        let vectors = encoder.encode(&texts)?;
        if vectors.len() != texts.len() {
            return Err(Error::InvalidCatalog(format!(
                "encoder returned {} vectors for {} utterances",
                vectors.len(),
                texts.len()
            )));
        }

        let owners = routes
            .iter()
            .enumerate()
            .flat_map(|(i, r)| std::iter::repeat(i).take(r.utterances.len()));
        let anchors = owners
            .zip(vectors)
            .map(|(route, vector)| Anchor { route, vector })
            .collect();

        let threshold = config.threshold.unwrap_or_else(|| encoder.default_threshold());
        Ok(Self {
            names: routes.iter().map(|r| r.name.clone()).collect(),
            encoder,
            anchors,
            top_k: config.top_k.max(1),
            threshold,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Classify `query`. Never fails: blank input and encoder errors both
    /// yield `Intent::NoMatch`.
    pub fn route(&self, query: &str) -> Intent {
        if query.trim().is_empty() {
            return Intent::NoMatch;
        }

        let vector = match self.encoder.encode(&[query]) {
            Ok(mut vectors) if vectors.len() == 1 => vectors.remove(0),
            Ok(vectors) => {
                warn!(count = vectors.len(), "encoder returned an unexpected number of vectors");
                return Intent::NoMatch;
            }
            Err(err) => {
                warn!(error = %err, "could not embed query");
                return Intent::NoMatch;
            }
        };

        let mut scored: Vec<(f32, usize)> = self
            .anchors
            .iter()
            .enumerate()
            .map(|(i, anchor)| (cosine_similarity(&vector, &anchor.vector), i))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(self.top_k);

        let mut totals = vec![0.0f32; self.names.len()];
        let mut best = vec![f32::NEG_INFINITY; self.names.len()];
        for &(score, i) in &scored {
            let route = self.anchors[i].route;
            totals[route] += score;
            best[route] = best[route].max(score);
        }

        let winner = (0..self.names.len())
            .filter(|&r| best[r].is_finite())
            .fold(None, |leader: Option<usize>, r| match leader {
                Some(l) if totals[l] >= totals[r] => Some(l),
                _ => Some(r),
            });

        let Some(winner) = winner else {
            return Intent::NoMatch;
        };
        debug!(
            route = %self.names[winner],
            total = totals[winner],
            best = best[winner],
            threshold = self.threshold,
            "routing scores"
        );

        if best[winner] >= self.threshold {
            Intent::Matched(self.names[winner].clone())
        } else {
            Intent::NoMatch
        }
    }
}
