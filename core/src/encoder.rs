//! Text encoders used by the semantic router.
//!
//! # Design
//! `Encoder` maps a batch of texts into a shared vector space. Two backends
//! ship with the crate: `HashingEncoder` runs locally with no model files
//! (character-trigram feature hashing, good enough for lexically close
//! utterances in any script), and `HttpEncoder` calls an OpenAI-compatible
//! `/embeddings` endpoint such as a sentence-transformers server.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EncoderConfig;
use crate::error::{EncoderError, TransportError};

pub trait Encoder {
    /// Embed every text; the result has one vector per input, in order.
    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError>;

    /// Similarity threshold that suits this encoder's score distribution.
    fn default_threshold(&self) -> f32 {
        0.5
    }
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError> {
        (**self).encode(texts)
    }

    fn default_threshold(&self) -> f32 {
        (**self).default_threshold()
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Local encoder hashing each lower-cased word and its `#`-padded character
/// trigrams into a fixed number of buckets. Vectors are L2-normalized.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dims: usize,
}

impl HashingEncoder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        let lowered = text.to_lowercase();
        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            vector[self.bucket(word)] += 1.0;

            let padded: Vec<char> = std::iter::once('#')
                .chain(word.chars())
                .chain(std::iter::once('#'))
                .collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                vector[self.bucket(&gram)] += 1.0;
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn bucket(&self, feature: &str) -> usize {
        (fnv1a(feature.as_bytes()) % self.dims as u64) as usize
    }
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Encoder for HashingEncoder {
    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn default_threshold(&self) -> f32 {
        0.35
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Encoder backed by an OpenAI-compatible embeddings API.
#[derive(Debug, Clone)]
pub struct HttpEncoder {
    config: EncoderConfig,
    agent: ureq::Agent,
}

impl HttpEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .build()
            .new_agent();
        Self { config, agent }
    }
}

impl Encoder for HttpEncoder {
    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let payload = serde_json::to_vec(&EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        })
        .map_err(|e| TransportError::Decode(e.to_string()))?;

        let mut builder = self.agent.post(&url);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        let mut response = builder
            .content_type("application/json")
            .send(&payload[..])
            .map_err(TransportError::from)?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(TransportError::Status { status, body }.into());
        }

        let mut parsed: EmbeddingResponse =
            serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))?;
        if parsed.data.len() != texts.len() {
            return Err(EncoderError::CountMismatch {
                expected: texts.len(),
                actual: parsed.data.len(),
            });
        }
        parsed.data.sort_by_key(|d| d.index);
        debug!(count = texts.len(), model = %self.config.model, "embedded texts");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_degenerate_input() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn hashing_encoder_is_deterministic_and_normalized() {
        let encoder = HashingEncoder::default();
        let vectors = encoder.encode(&["Bitcoin fiyatı nedir?", "Bitcoin fiyatı nedir?"]).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vectors[1]);
        let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hashing_encoder_ignores_case_and_punctuation() {
        let encoder = HashingEncoder::default();
        let vectors = encoder.encode(&["What is the price of Bitcoin?", "what is the price of bitcoin"]).unwrap();
        assert!((cosine_similarity(&vectors[0], &vectors[1]) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hashing_encoder_ranks_related_text_higher() {
        let encoder = HashingEncoder::default();
        let vectors = encoder
            .encode(&[
                "Get the current price of Ethereum.",
                "What is the current price of Ethereum?",
                "Will it rain tomorrow?",
            ])
            .unwrap();
        let related = cosine_similarity(&vectors[0], &vectors[1]);
        let unrelated = cosine_similarity(&vectors[0], &vectors[2]);
        assert!(related > 0.7, "related = {related}");
        assert!(related > unrelated);
    }

    #[test]
    fn hashing_encoder_blank_text_is_zero_vector() {
        let encoder = HashingEncoder::new(16);
        let vectors = encoder.encode(&["  ?! "]).unwrap();
        assert!(vectors[0].iter().all(|x| *x == 0.0));
    }
}
