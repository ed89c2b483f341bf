// Best-effort parser for tagged lines in a language-model reply
use crate::id::{IdGenerator, RandomIdGenerator};
use crate::models::{
    ChartPoint, DropStats, FlightOffer, ParsedResponse, RankingItem, RankingKind, DEFAULT_AIRLINE,
    DEFAULT_CURRENCY, DEFAULT_DATE, DEFAULT_LINK, NOT_APPLICABLE,
};
use thiserror::Error;

pub const FLIGHT_TAG: &str = "FLIGHT_DATA:";
pub const RANKING_TAG: &str = "RANKING_DATA:";
pub const CHART_TAG: &str = "CHART_DATA:";

// Checked in this order; a line is dispatched on the first tag it contains
pub const TAGS: [&str; 3] = [FLIGHT_TAG, RANKING_TAG, CHART_TAG];

pub const FLIGHT_MIN_FIELDS: usize = 8;
pub const RANKING_MIN_FIELDS: usize = 3;
pub const CHART_MIN_FIELDS: usize = 2;

const FIELD_DELIMITER: char = '|';

/// Reason a tagged line was not turned into a record.
///
/// These never escape [`ResponseParser::parse`]; they only feed the
/// per-tag drop counters and the extraction unit tests.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineRejection {
    #[error("nothing follows the tag")]
    MissingContent,

    #[error("expected at least {required} fields, found {found}")]
    TooFewFields { required: usize, found: usize },

    #[error("destination is empty")]
    EmptyDestination,

    #[error("value is not a positive number: {0:?}")]
    NonPositiveAmount(String),

    #[error("unknown ranking kind: {0}")]
    UnknownRankingKind(String),
}

/// Record type of a single line, with the text following its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Flight(&'a str),
    Ranking(&'a str),
    Chart(&'a str),
    Unrecognized,
}

/// Classify a line by tag containment. Bullets or prose before the tag are
/// tolerated; only the text after the first occurrence of the tag is kept.
pub fn classify_line(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();

    if let Some((_, rest)) = trimmed.split_once(FLIGHT_TAG) {
        LineKind::Flight(rest)
    } else if let Some((_, rest)) = trimmed.split_once(RANKING_TAG) {
        LineKind::Ranking(rest)
    } else if let Some((_, rest)) = trimmed.split_once(CHART_TAG) {
        LineKind::Chart(rest)
    } else {
        LineKind::Unrecognized
    }
}

/// Lenient numeric parse for prices and chart values.
///
/// Everything except ASCII digits and `.` is stripped before parsing, so
/// `"$1,234.50"` and `"USD 450"` both resolve. A `-` before the first digit
/// marks the value as negative. Empty or unparseable input yields `0.0`.
pub fn parse_price(raw: &str) -> f64 {
    let negative = raw
        .find(|c: char| c.is_ascii_digit())
        .map_or(false, |first_digit| raw[..first_digit].contains('-'));

    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    // Only the leading `digits[.digits]` run is numeric; a second dot ends it
    let numeric = match cleaned.match_indices('.').nth(1) {
        Some((second_dot, _)) => &cleaned[..second_dot],
        None => cleaned.as_str(),
    };

    let value = numeric.parse::<f64>().unwrap_or(0.0);
    if negative {
        -value
    } else {
        value
    }
}

fn split_fields(content: &str, required: usize) -> Result<Vec<&str>, LineRejection> {
    if content.trim().is_empty() {
        return Err(LineRejection::MissingContent);
    }

    let fields: Vec<&str> = content.split(FIELD_DELIMITER).map(str::trim).collect();
    if fields.len() < required {
        return Err(LineRejection::TooFewFields {
            required,
            found: fields.len(),
        });
    }

    Ok(fields)
}

fn positive_amount(raw: &str) -> Result<f64, LineRejection> {
    let value = parse_price(raw);
    if value > 0.0 {
        Ok(value)
    } else {
        Err(LineRejection::NonPositiveAmount(raw.to_string()))
    }
}

fn or_placeholder(field: &str, placeholder: &str) -> String {
    if field.is_empty() {
        placeholder.to_string()
    } else {
        field.to_string()
    }
}

/// Build a flight from the text after `FLIGHT_DATA:`.
///
/// Layout: `destination | airline | price | currency | date | return date |
/// duration | stops [| link]`. The currency field is ignored and the id is
/// only drawn from `ids` once the line has validated.
pub fn extract_flight<G>(content: &str, ids: &G) -> Result<FlightOffer, LineRejection>
where
    G: IdGenerator + ?Sized,
{
    let fields = split_fields(content, FLIGHT_MIN_FIELDS)?;

    let destination = fields[0];
    if destination.is_empty() {
        return Err(LineRejection::EmptyDestination);
    }
    let price = positive_amount(fields[2])?;

    let return_date = match fields[5] {
        "" | NOT_APPLICABLE => None,
        date => Some(date.to_string()),
    };
    let link = fields.get(8).copied().unwrap_or_default();

    Ok(FlightOffer {
        id: ids.next_id(),
        airline: or_placeholder(fields[1], DEFAULT_AIRLINE),
        price,
        currency: DEFAULT_CURRENCY.to_string(),
        origin: String::new(),
        destination: destination.to_string(),
        date: or_placeholder(fields[4], DEFAULT_DATE),
        return_date,
        duration: or_placeholder(fields[6], NOT_APPLICABLE),
        stops: or_placeholder(fields[7], NOT_APPLICABLE),
        link: or_placeholder(link, DEFAULT_LINK),
    })
}

/// Build a ranking entry from the text after `RANKING_DATA:`.
pub fn extract_ranking(content: &str) -> Result<RankingItem, LineRejection> {
    let fields = split_fields(content, RANKING_MIN_FIELDS)?;

    let kind = RankingKind::from_label(fields[0])
        .ok_or_else(|| LineRejection::UnknownRankingKind(fields[0].to_string()))?;
    let price = positive_amount(fields[2])?;

    Ok(RankingItem {
        kind,
        label: fields[1].to_string(),
        price,
        currency: DEFAULT_CURRENCY.to_string(),
    })
}

/// Build a chart point from the text after `CHART_DATA:`.
pub fn extract_chart(content: &str) -> Result<ChartPoint, LineRejection> {
    let fields = split_fields(content, CHART_MIN_FIELDS)?;
    let value = positive_amount(fields[1])?;

    Ok(ChartPoint {
        label: fields[0].to_string(),
        value,
    })
}

/// Turns a model reply into flights, rankings and chart points.
///
/// Holds no state between calls other than the id generator. Malformed
/// lines are dropped one at a time and counted in [`DropStats`].
pub struct ResponseParser<G = RandomIdGenerator> {
    ids: G,
}

impl ResponseParser<RandomIdGenerator> {
    pub fn new() -> Self {
        Self {
            ids: RandomIdGenerator,
        }
    }
}

impl Default for ResponseParser<RandomIdGenerator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: IdGenerator> ResponseParser<G> {
    pub fn with_id_generator(ids: G) -> Self {
        Self { ids }
    }

    pub fn id_generator(&self) -> &G {
        &self.ids
    }

    pub fn parse(&self, text: &str) -> ParsedResponse {
        let mut flights = Vec::new();
        let mut rankings = Vec::new();
        let mut chart_data = Vec::new();
        let mut dropped = DropStats::default();

        for line in text.split('\n') {
            match classify_line(line) {
                LineKind::Flight(content) => match extract_flight(content, &self.ids) {
                    Ok(flight) => flights.push(flight),
                    Err(_) => dropped.flights += 1,
                },
                LineKind::Ranking(content) => match extract_ranking(content) {
                    Ok(item) => rankings.push(item),
                    Err(_) => dropped.rankings += 1,
                },
                LineKind::Chart(content) => match extract_chart(content) {
                    Ok(point) => chart_data.push(point),
                    Err(_) => dropped.chart += 1,
                },
                LineKind::Unrecognized => {}
            }
        }

        ParsedResponse {
            flights,
            rankings,
            chart_data,
            dropped,
        }
    }
}

/// Parse with random ids.
pub fn parse_flight_response(text: &str) -> ParsedResponse {
    ResponseParser::new().parse(text)
}
