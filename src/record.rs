use crate::proxy::Route;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Placeholder written for any field that could not be recovered.
pub const NOT_AVAILABLE: &str = "N/A";

/// A normalized movie row, identical in shape whichever strategy produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRecord {
    pub id: Option<i64>,
    pub title: String,
    pub release_date: String,
    pub rating: Rating,
    pub overview: String,
    pub genres: String,
    pub poster_url: String,
    pub source_url: String,
    pub method: String,
}

impl MovieRecord {
    pub const COLUMNS: [&'static str; 9] = [
        "id",
        "title",
        "releaseDate",
        "rating",
        "overview",
        "genres",
        "posterUrl",
        "sourceUrl",
        "method",
    ];

    /// Column values in table order, rendered as text.
    pub fn to_row(&self) -> [String; 9] {
        [
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.title.clone(),
            self.release_date.clone(),
            self.rating.to_string(),
            self.overview.clone(),
            self.genres.clone(),
            self.poster_url.clone(),
            self.source_url.clone(),
            self.method.clone(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rating {
    Score(f64),
    Missing,
}

impl Rating {
    pub fn score(&self) -> Option<f64> {
        match self {
            Rating::Score(v) => Some(*v),
            Rating::Missing => None,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rating::Score(v) => write!(f, "{:.1}", v),
            Rating::Missing => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rating::Score(v) => serializer.serialize_f64(*v),
            Rating::Missing => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        // read-back goes through the same rules as scraped values
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Number(v) => crate::normalize::rating_from_value(v),
            Repr::Text(s) => crate::normalize::normalize_rating(&s),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Api,
    Html,
    Browser,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [StrategyKind::Api, StrategyKind::Html, StrategyKind::Browser];

    pub fn base_tag(&self) -> &'static str {
        match self {
            StrategyKind::Api => "API",
            StrategyKind::Html => "BS4",
            StrategyKind::Browser => "Selenium",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunScenario {
    #[default]
    Baseline,
    Multithread,
    ProxyDirect,
    ProxyTor,
}

impl fmt::Display for RunScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunScenario::Baseline => "baseline",
            RunScenario::Multithread => "multithread",
            RunScenario::ProxyDirect => "proxy_direct",
            RunScenario::ProxyTor => "proxy_tor",
        };
        f.write_str(label)
    }
}

/// Tag stamped on every record of a run. Derived from the route actually
/// used, so a Tor request that fell back to direct never carries `_TOR`.
pub fn method_tag(kind: StrategyKind, route: &Route, scenario: RunScenario) -> String {
    let base = kind.base_tag();
    if route.is_tor() {
        format!("{base}_TOR")
    } else if scenario == RunScenario::Multithread {
        format!("{base}_MT")
    } else {
        base.to_string()
    }
}
