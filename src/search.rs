// Flight search orchestration around the response parser.
// The language-model provider is a black box behind `CompletionProvider`;
// this module adds the timeout, retry and enrichment a caller needs.

use crate::id::{IdGenerator, RandomIdGenerator};
use crate::models::{
    ChartPoint, DropStats, FlightOffer, RankingItem, SearchParams, UNKNOWN_DESTINATION,
};
use crate::parser::ResponseParser;
use crate::summary::extract_summary;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_FALLBACK_DESTINATION: &str = "Destino Variado";

const RETRY_USER_MESSAGE: &str =
    "Hubo un error al buscar los vuelos o no se encontraron resultados. Por favor intenta de nuevo.";

// Errors a provider reports for a single completion attempt
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {status_code} - {message}")]
    Api {
        status_code: u16,
        message: String,
        is_retryable: bool,
    },

    #[error("Provider returned no candidates")]
    EmptyResponse,
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Api { is_retryable, .. } => *is_retryable,
            ProviderError::EmptyResponse => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<SearchError>,
    },
}

impl SearchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Timeout(_) => true,
            SearchError::Provider(e) => e.is_retryable(),
            SearchError::InvalidQuery(_) | SearchError::RetriesExhausted { .. } => false,
        }
    }

    /// Message safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            SearchError::InvalidQuery(reason) => reason.clone(),
            _ => RETRY_USER_MESSAGE.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub timeout_ms: u64,
    pub retry: RetryConfig,
    // Used when neither the reply nor the query names a destination
    pub fallback_destination: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retry: RetryConfig::default(),
            fallback_destination: DEFAULT_FALLBACK_DESTINATION.to_string(),
        }
    }
}

impl SearchConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SearchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive".to_string()));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "retry.backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ConfigError::Invalid(
                "retry.jitter_factor must be within 0.0..=1.0".to_string(),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.initial_backoff_ms exceeds retry.max_backoff_ms".to_string(),
            ));
        }
        if self.fallback_destination.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "fallback_destination must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exponential backoff with jitter for the given retry attempt (0-based).
pub fn calculate_backoff(retry_attempt: u32, config: &RetryConfig) -> Duration {
    let base_backoff_ms = (config.initial_backoff_ms as f64
        * config.backoff_multiplier.powf(retry_attempt as f64))
    .min(config.max_backoff_ms as f64);

    let jitter = rand::random::<f64>() * config.jitter_factor * base_backoff_ms;
    let backoff_ms = base_backoff_ms * (1.0 - config.jitter_factor / 2.0) + jitter;

    Duration::from_millis(backoff_ms as u64)
}

// Raw reply from the language-model provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub received_at: DateTime<Utc>,
}

impl Completion {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            received_at: Utc::now(),
        }
    }
}

/// Upstream text generator. Implementations own prompt construction and
/// transport; they return the reply text untouched.
#[async_trait]
pub trait CompletionProvider: Send + Sync + 'static {
    async fn complete(&self, params: &SearchParams) -> Result<Completion, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub flights: Vec<FlightOffer>,
    pub rankings: Vec<RankingItem>,
    pub chart_data: Vec<ChartPoint>,
    pub summary: String,
    pub raw_text: String,
    pub model: String,
    pub received_at: DateTime<Utc>,
    pub dropped: DropStats,
}

impl SearchOutcome {
    // A successful search can still come back without flights
    pub fn has_flights(&self) -> bool {
        !self.flights.is_empty()
    }
}

/// Fill in what the parser leaves to the caller: the origin always comes
/// from the query, and an unknown destination falls back to the queried one
/// or to `fallback`.
pub fn enrich_flights(
    flights: Vec<FlightOffer>,
    params: &SearchParams,
    fallback: &str,
) -> Vec<FlightOffer> {
    let queried_destination = params
        .destination
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    flights
        .into_iter()
        .map(|flight| {
            let destination = if flight.destination == UNKNOWN_DESTINATION {
                queried_destination.unwrap_or(fallback).to_string()
            } else {
                flight.destination
            };
            FlightOffer {
                origin: params.origin.clone(),
                destination,
                ..flight
            }
        })
        .collect()
}

pub struct FlightSearchService<P, G = RandomIdGenerator> {
    provider: P,
    parser: ResponseParser<G>,
    config: SearchConfig,
}

impl<P: CompletionProvider> FlightSearchService<P, RandomIdGenerator> {
    pub fn new(provider: P, config: SearchConfig) -> Result<Self, ConfigError> {
        Self::with_parser(provider, ResponseParser::new(), config)
    }
}

impl<P, G> FlightSearchService<P, G>
where
    P: CompletionProvider,
    G: IdGenerator,
{
    pub fn with_parser(
        provider: P,
        parser: ResponseParser<G>,
        config: SearchConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            provider,
            parser,
            config,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub async fn search(&self, params: &SearchParams) -> Result<SearchOutcome, SearchError> {
        if params.origin.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "An origin is required to search for flights".to_string(),
            ));
        }

        let completion = self.fetch_with_retry(params).await?;
        let parsed = self.parser.parse(&completion.text);

        if parsed.dropped.total() > 0 {
            warn!(
                flights = parsed.dropped.flights,
                rankings = parsed.dropped.rankings,
                chart = parsed.dropped.chart,
                "Dropped malformed tagged lines"
            );
        }

        let flights = enrich_flights(parsed.flights, params, &self.config.fallback_destination);
        debug!(origin = %params.origin, count = flights.len(), "Enriched flights");

        info!(
            origin = %params.origin,
            model = %completion.model,
            flights = flights.len(),
            rankings = parsed.rankings.len(),
            chart_points = parsed.chart_data.len(),
            "Flight search completed"
        );

        Ok(SearchOutcome {
            flights,
            rankings: parsed.rankings,
            chart_data: parsed.chart_data,
            summary: extract_summary(&completion.text).to_string(),
            raw_text: completion.text,
            model: completion.model,
            received_at: completion.received_at,
            dropped: parsed.dropped,
        })
    }

    async fn fetch_with_retry(&self, params: &SearchParams) -> Result<Completion, SearchError> {
        let max_retries = self.config.retry.max_retries;
        let mut attempt = 0;

        loop {
            match self.fetch_once(params).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let backoff = calculate_backoff(attempt, &self.config.retry);
                    warn!(
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Completion failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() && attempt > 0 => {
                    return Err(SearchError::RetriesExhausted {
                        attempts: attempt + 1,
                        last: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, params: &SearchParams) -> Result<Completion, SearchError> {
        let timeout_ms = self.config.timeout_ms;
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.provider.complete(params),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(SearchError::Timeout(timeout_ms)),
        }
    }
}
