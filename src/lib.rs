// Flight search response parser library

pub mod id;
pub mod models;
pub mod parser;
pub mod search;
pub mod summary;

// Re-export key types for convenience
pub use id::{IdGenerator, RandomIdGenerator, SequenceIdGenerator};
pub use models::{
    ChartPoint, DropStats, FlightOffer, ParsedResponse, RankingItem, RankingKind, SearchParams,
};
pub use parser::{
    classify_line, extract_chart, extract_flight, extract_ranking, parse_flight_response,
    parse_price, LineKind, LineRejection, ResponseParser,
};
pub use search::{
    Completion, CompletionProvider, ConfigError, FlightSearchService, ProviderError, RetryConfig,
    SearchConfig, SearchError, SearchOutcome,
};
pub use summary::extract_summary;
