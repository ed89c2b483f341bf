use serde::{Deserialize, Serialize};

// Every parsed price is normalized to this code; upstream is asked to pre-convert
pub const DEFAULT_CURRENCY: &str = "USD";

pub const UNKNOWN_DESTINATION: &str = "Desconocido";
pub const DEFAULT_AIRLINE: &str = "Aerolínea";
pub const DEFAULT_DATE: &str = "Fecha por confirmar";
pub const NOT_APPLICABLE: &str = "N/A";
pub const DEFAULT_LINK: &str = "#";

// Single flight option extracted from a FLIGHT_DATA line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightOffer {
    pub id: String,
    pub airline: String,
    pub price: f64,
    pub currency: String,
    pub origin: String,
    pub destination: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    pub duration: String,
    pub stops: String,
    pub link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankingKind {
    #[serde(rename = "DATE")]
    ByDate,
    #[serde(rename = "AIRLINE")]
    ByAirline,
}

impl RankingKind {
    /// Case-insensitive lookup of the wire label. Anything outside the
    /// closed set yields `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "DATE" => Some(RankingKind::ByDate),
            "AIRLINE" => Some(RankingKind::ByAirline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RankingKind::ByDate => "DATE",
            RankingKind::ByAirline => "AIRLINE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingItem {
    #[serde(rename = "type")]
    pub kind: RankingKind,
    pub label: String,
    pub price: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

// Lines that carried a tag but failed validation, per tag
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropStats {
    pub flights: usize,
    pub rankings: usize,
    pub chart: usize,
}

impl DropStats {
    pub fn total(&self) -> usize {
        self.flights + self.rankings + self.chart
    }
}

// Output of a single parse call
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResponse {
    pub flights: Vec<FlightOffer>,
    pub rankings: Vec<RankingItem>,
    pub chart_data: Vec<ChartPoint>,
    pub dropped: DropStats,
}

impl ParsedResponse {
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty() && self.rankings.is_empty() && self.chart_data.is_empty()
    }
}

// Query the caller sent upstream, used to enrich parsed flights
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub origin: String,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub return_date: Option<String>,
    #[serde(default)]
    pub max_price: Option<f64>,
}

impl SearchParams {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Default::default()
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("DATE", Some(RankingKind::ByDate); "upper date")]
    #[test_case("date", Some(RankingKind::ByDate); "lower date")]
    #[test_case(" Airline ", Some(RankingKind::ByAirline); "mixed airline")]
    #[test_case("PRICE", None; "outside closed set")]
    #[test_case("", None; "empty")]
    fn test_ranking_kind_from_label(label: &str, expected: Option<RankingKind>) {
        assert_eq!(RankingKind::from_label(label), expected);
    }

    #[test]
    fn test_flight_serializes_camel_case_and_skips_missing_return() {
        let flight = FlightOffer {
            id: "f1".to_string(),
            airline: "Iberia".to_string(),
            price: 890.0,
            currency: DEFAULT_CURRENCY.to_string(),
            origin: "Buenos Aires".to_string(),
            destination: "Madrid".to_string(),
            date: "2024-12-05".to_string(),
            return_date: None,
            duration: "12h".to_string(),
            stops: "1 Escala".to_string(),
            link: DEFAULT_LINK.to_string(),
        };

        let json = serde_json::to_value(&flight).unwrap();
        assert_eq!(json["destination"], "Madrid");
        assert!(json.get("returnDate").is_none());

        let with_return = FlightOffer {
            return_date: Some("2024-12-20".to_string()),
            ..flight
        };
        let json = serde_json::to_value(&with_return).unwrap();
        assert_eq!(json["returnDate"], "2024-12-20");
    }

    #[test]
    fn test_ranking_serializes_wire_labels() {
        let item = RankingItem {
            kind: RankingKind::ByAirline,
            label: "Latam".to_string(),
            price: 400.0,
            currency: DEFAULT_CURRENCY.to_string(),
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"type\":\"AIRLINE\""));

        let back: RankingItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_drop_stats_total() {
        let stats = DropStats {
            flights: 2,
            rankings: 1,
            chart: 3,
        };
        assert_eq!(stats.total(), 6);
        assert_eq!(DropStats::default().total(), 0);
    }
}
