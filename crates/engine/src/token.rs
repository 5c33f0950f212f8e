//! Token estimation.
//!
//! A [`TokenEstimator`] counts tokens with a precise subword encoder when
//! one could be initialised, and with a character heuristic otherwise:
//! ~4 characters per token, rounded up.
//!
//! Failures never surface to callers. An encoder that fails to initialise
//! downgrades the estimator to the heuristic for its whole lifetime
//! (warned once); an encoder that fails on one string costs only that
//! call (warned each time).

use ctxmesh_config::EstimatorConfig;
use ctxmesh_core::EstimatorError;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

/// A precise tokenizer behind the estimator.
pub trait SubwordEncoder: Send + Sync {
    /// Name for logs (e.g. "cl100k_base").
    fn name(&self) -> &str;

    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> Result<usize, EstimatorError>;
}

/// Estimate tokens with the character heuristic: `ceil(chars / 4)`.
pub fn heuristic_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Byte-pair encoder from `tiktoken-rs`.
pub struct BpeEncoder {
    name: String,
    bpe: tiktoken_rs::CoreBPE,
}

impl BpeEncoder {
    /// Load a named BPE vocabulary.
    pub fn load(encoding: &str) -> Result<Self, EstimatorError> {
        let bpe = match encoding {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            other => {
                return Err(EstimatorError::Init(format!("unknown encoding '{other}'")));
            }
        }
        .map_err(|e| EstimatorError::Init(e.to_string()))?;

        Ok(Self {
            name: encoding.to_string(),
            bpe,
        })
    }
}

impl SubwordEncoder for BpeEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self, text: &str) -> Result<usize, EstimatorError> {
        Ok(self.bpe.encode_ordinary(text).len())
    }
}

/// HuggingFace `tokenizer.json` encoder.
#[cfg(feature = "hf-tokenizers")]
pub struct HfEncoder {
    name: String,
    tokenizer: tokenizers::Tokenizer,
}

#[cfg(feature = "hf-tokenizers")]
impl HfEncoder {
    pub fn load(path: &std::path::Path) -> Result<Self, EstimatorError> {
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| EstimatorError::Init(format!("{}: {e}", path.display())))?;
        Ok(Self {
            name: path.display().to_string(),
            tokenizer,
        })
    }
}

#[cfg(feature = "hf-tokenizers")]
impl SubwordEncoder for HfEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self, text: &str) -> Result<usize, EstimatorError> {
        self.tokenizer
            .encode(text, false)
            .map(|encoding| encoding.len())
            .map_err(|e| EstimatorError::Encode(e.to_string()))
    }
}

/// Token estimator with precise and heuristic modes.
pub struct TokenEstimator {
    encoder: Option<Box<dyn SubwordEncoder>>,
}

impl TokenEstimator {
    /// Build from configuration, falling back to the heuristic when the
    /// configured encoder cannot be initialised.
    pub fn from_config(config: &EstimatorConfig) -> Self {
        match Self::init_encoder(config) {
            Ok(Some(encoder)) => Self::with_encoder(encoder),
            Ok(None) => Self::heuristic(),
            Err(e) => Self::with_fallback(Err(e)),
        }
    }

    fn init_encoder(
        config: &EstimatorConfig,
    ) -> Result<Option<Box<dyn SubwordEncoder>>, EstimatorError> {
        if let Some(path) = &config.tokenizer_path {
            #[cfg(feature = "hf-tokenizers")]
            {
                return HfEncoder::load(path).map(|e| Some(Box::new(e) as Box<dyn SubwordEncoder>));
            }
            #[cfg(not(feature = "hf-tokenizers"))]
            warn!(
                path = %path.display(),
                "tokenizer_path ignored: built without the hf-tokenizers feature"
            );
        }

        if config.encoding == "heuristic" {
            return Ok(None);
        }
        BpeEncoder::load(&config.encoding).map(|e| Some(Box::new(e) as Box<dyn SubwordEncoder>))
    }

    /// Heuristic-only estimator.
    pub fn heuristic() -> Self {
        Self { encoder: None }
    }

    /// Precise estimator over `encoder`.
    pub fn with_encoder(encoder: Box<dyn SubwordEncoder>) -> Self {
        Self {
            encoder: Some(encoder),
        }
    }

    /// Precise estimator if `init` succeeded; otherwise the heuristic for
    /// the lifetime of the instance.
    pub fn with_fallback(init: Result<Box<dyn SubwordEncoder>, EstimatorError>) -> Self {
        match init {
            Ok(encoder) => Self::with_encoder(encoder),
            Err(e) => {
                warn!(error = %e, "Token estimator falling back to character heuristic");
                Self::heuristic()
            }
        }
    }

    /// Estimated token cost of `text`.
    pub fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let Some(encoder) = &self.encoder else {
            return heuristic_tokens(text);
        };

        let counted = panic::catch_unwind(AssertUnwindSafe(|| encoder.count(text)))
            .unwrap_or_else(|_| Err(EstimatorError::Encode("encoder panicked".into())));

        match counted {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(
                    encoder = encoder.name(),
                    error = %e,
                    chars = text.chars().count(),
                    "Token encoding failed, using character heuristic for this text"
                );
                heuristic_tokens(text)
            }
        }
    }

    /// Whether a precise encoder is in use.
    pub fn is_precise(&self) -> bool {
        self.encoder.is_some()
    }

    /// "heuristic", or the encoder's name.
    pub fn mode_name(&self) -> &str {
        self.encoder.as_ref().map_or("heuristic", |e| e.name())
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::from_config(&EstimatorConfig::default())
    }
}

impl std::fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEstimator")
            .field("mode", &self.mode_name())
            .finish()
    }
}
