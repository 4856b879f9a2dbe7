//! Pure field normalization shared by every strategy.
//!
//! Whatever a strategy scraped (API JSON, static HTML, rendered DOM) goes
//! through [`canonicalize`], so the same raw value always produces the same
//! output bytes.

use crate::record::{MovieRecord, NOT_AVAILABLE, Rating};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const MOVIE_PATH_MARKER: &str = "/movie/";

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Field values as they came off the source, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawMovie {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub release_date: Option<String>,
    pub rating: Option<String>,
    pub overview: Option<String>,
    pub genres: Vec<String>,
    pub poster_url: Option<String>,
    pub source_url: Option<String>,
}

pub fn canonicalize(raw: RawMovie, method: &str) -> MovieRecord {
    let title = non_empty(raw.title.as_deref())
        .map(str::to_string)
        .or_else(|| raw.id.map(|id| format!("Movie {id}")))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    MovieRecord {
        id: raw.id,
        title,
        release_date: normalize_date(raw.release_date.as_deref()),
        rating: raw
            .rating
            .as_deref()
            .map(normalize_rating)
            .unwrap_or(Rating::Missing),
        overview: normalize_text(raw.overview.as_deref()),
        genres: normalize_genres(raw.genres.iter().map(String::as_str)),
        poster_url: normalize_text(raw.poster_url.as_deref()),
        source_url: normalize_text(raw.source_url.as_deref()),
        method: method.to_string(),
    }
}

/// ISO `YYYY-MM-DD`, or the sentinel when nothing parses.
pub fn normalize_date(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return NOT_AVAILABLE.to_string();
    };
    // "07/19/2024 (US)" carries a release-country suffix
    let cleaned = raw.split('(').next().unwrap_or_default().trim();
    if cleaned.is_empty() {
        return NOT_AVAILABLE.to_string();
    }

    parse_date(cleaned)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

pub fn normalize_rating(raw: &str) -> Rating {
    raw.trim()
        .parse::<f64>()
        .map(rating_from_value)
        .unwrap_or(Rating::Missing)
}

/// Values above 10 are read as a 0-100 percentage. Anything above 100 or
/// below 0 is not a rating on either scale and is dropped.
pub fn rating_from_value(value: f64) -> Rating {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Rating::Missing;
    }
    let scaled = if value > 10.0 { value / 10.0 } else { value };
    let clamped = scaled.clamp(0.0, 10.0);
    // adding 0.0 turns -0.0 into 0.0
    Rating::Score((clamped * 10.0).round() / 10.0 + 0.0)
}

/// First integer segment after `/movie/`, e.g. `/movie/1022789-inside-out-2`.
pub fn parse_id_from_path(path: &str) -> Option<i64> {
    path.match_indices(MOVIE_PATH_MARKER).find_map(|(idx, marker)| {
        let rest = &path[idx + marker.len()..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        rest[..end].parse().ok()
    })
}

pub fn normalize_genres<'a>(tokens: impl IntoIterator<Item = &'a str>) -> String {
    let joined = tokens
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    if joined.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        joined
    }
}

pub fn normalize_text(raw: Option<&str>) -> String {
    non_empty(raw)
        .map(str::to_string)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
