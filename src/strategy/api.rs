use super::{Candidate, FetchStrategy};
use crate::config::schema::EndpointConfig;
use crate::error::{Error, Result};
use crate::normalize::{RawMovie, canonicalize};
use crate::record::{MovieRecord, StrategyKind};
use crate::transport::Transport;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::OnceCell;
use url::Url;

#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(default)]
    results: Vec<ApiMovie>,
}

#[derive(Debug, Deserialize)]
struct GenreList {
    #[serde(default)]
    genres: Vec<ApiGenre>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiGenre {
    id: i64,
    name: String,
}

/// A movie as the JSON API describes it, in either listing or detail shape.
#[derive(Debug, Deserialize)]
struct ApiMovie {
    id: i64,
    title: Option<String>,
    original_title: Option<String>,
    release_date: Option<String>,
    vote_average: Option<f64>,
    overview: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    genre_ids: Vec<i64>,
    #[serde(default)]
    genres: Vec<ApiGenre>,
}

pub struct ApiStrategy {
    transport: Transport,
    endpoints: EndpointConfig,
    api_key: String,
    method: String,
    genres: OnceCell<HashMap<i64, String>>,
}

impl ApiStrategy {
    pub fn new(
        transport: Transport,
        endpoints: EndpointConfig,
        api_key: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            api_key: api_key.into(),
            method: method.into(),
            genres: OnceCell::new(),
        }
    }

    fn endpoint(&self, path: &str, extra: &[(&str, String)]) -> Result<String> {
        let base = format!("{}/{}", self.endpoints.api_base.trim_end_matches('/'), path);
        let mut params = vec![
            ("api_key", self.api_key.clone()),
            ("language", self.endpoints.language.clone()),
        ];
        params.extend(extra.iter().map(|(k, v)| (*k, v.clone())));
        Url::parse_with_params(&base, &params)
            .map(String::from)
            .map_err(|e| Error::Config(format!("bad API endpoint {}: {}", base, e)))
    }

    async fn genre_map(&self) -> &HashMap<i64, String> {
        self.genres
            .get_or_init(|| async {
                let url = match self.endpoint("genre/movie/list", &[]) {
                    Ok(url) => url,
                    Err(e) => {
                        log::warn!("Genre list unavailable: {}", e);
                        return HashMap::new();
                    }
                };
                match self.transport.fetch_json::<GenreList>(&url).await {
                    Ok(list) => {
                        log::debug!("Loaded {} genres", list.genres.len());
                        list.genres.into_iter().map(|g| (g.id, g.name)).collect()
                    }
                    Err(e) => {
                        log::warn!("Genre list unavailable, genres will show as ids: {}", e);
                        HashMap::new()
                    }
                }
            })
            .await
    }

    fn to_record(&self, movie: ApiMovie, genre_names: &HashMap<i64, String>) -> MovieRecord {
        let genres = if movie.genres.is_empty() {
            movie
                .genre_ids
                .iter()
                .map(|id| genre_names.get(id).cloned().unwrap_or_else(|| id.to_string()))
                .collect()
        } else {
            movie.genres.into_iter().map(|g| g.name).collect()
        };

        let title = movie
            .title
            .filter(|t| !t.trim().is_empty())
            .or(movie.original_title);

        let raw = RawMovie {
            id: Some(movie.id),
            title,
            release_date: movie.release_date,
            rating: movie.vote_average.map(|v| v.to_string()),
            overview: movie.overview,
            genres,
            poster_url: movie
                .poster_path
                .filter(|p| !p.is_empty())
                .map(|p| format!("{}{}", self.endpoints.image_base, p)),
            source_url: Some(format!(
                "{}/movie/{}",
                self.endpoints.site_base.trim_end_matches('/'),
                movie.id
            )),
        };
        canonicalize(raw, &self.method)
    }
}

#[async_trait]
impl FetchStrategy for ApiStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Api
    }

    async fn prepare(&self) -> Result<()> {
        self.genre_map().await;
        Ok(())
    }

    async fn list_candidates(&self, page: u32) -> Result<Vec<Candidate>> {
        let url = self.endpoint("movie/popular", &[("page", page.to_string())])?;
        let listing: ListingPage = self.transport.fetch_json(&url).await?;
        let genre_names = self.genre_map().await;

        Ok(listing
            .results
            .into_iter()
            .map(|movie| {
                let record = self.to_record(movie, genre_names);
                Candidate {
                    id: record.id,
                    url: record.source_url.clone(),
                    seed: Some(record),
                }
            })
            .collect())
    }

    async fn fetch_detail(&self, candidate: Candidate) -> Result<MovieRecord> {
        if self.endpoints.api_details {
            if let Some(id) = candidate.id {
                let url = self.endpoint(&format!("movie/{id}"), &[])?;
                let movie: ApiMovie = self.transport.fetch_json(&url).await?;
                return Ok(self.to_record(movie, self.genre_map().await));
            }
        }
        candidate
            .seed
            .ok_or_else(|| Error::Extraction(format!("no listing data for {}", candidate.url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Rating;

    fn strategy() -> ApiStrategy {
        let config = crate::config::schema::TransportConfig::default();
        let transport = Transport::new(&config, &crate::proxy::Route::Direct, 1).unwrap();
        ApiStrategy::new(transport, EndpointConfig::default(), "k3y", "API")
    }

    #[test]
    fn listing_item_maps_to_record() {
        let movie: ApiMovie = serde_json::from_str(
            r#"{"id": 550, "title": "", "original_title": "Fight Club",
                "release_date": "1999-10-15", "vote_average": 8.433,
                "overview": " Insomnia. ", "poster_path": "/p.jpg",
                "genre_ids": [18, 99]}"#,
        )
        .unwrap();
        let names = HashMap::from([(18, "Drama".to_string())]);
        let record = strategy().to_record(movie, &names);

        assert_eq!(record.id, Some(550));
        assert_eq!(record.title, "Fight Club");
        assert_eq!(record.release_date, "1999-10-15");
        assert_eq!(record.rating, Rating::Score(8.4));
        assert_eq!(record.overview, "Insomnia.");
        assert_eq!(record.genres, "Drama | 99");
        assert_eq!(record.poster_url, "https://image.tmdb.org/t/p/w500/p.jpg");
        assert_eq!(record.source_url, "https://www.themoviedb.org/movie/550");
        assert_eq!(record.method, "API");
    }

    #[test]
    fn detail_genres_take_precedence() {
        let movie: ApiMovie = serde_json::from_str(
            r#"{"id": 1, "title": "T", "genre_ids": [1],
                "genres": [{"id": 28, "name": "Action"}, {"id": 12, "name": "Adventure"}]}"#,
        )
        .unwrap();
        let record = strategy().to_record(movie, &HashMap::new());
        assert_eq!(record.genres, "Action | Adventure");
        assert_eq!(record.rating, Rating::Missing);
        assert_eq!(record.poster_url, "N/A");
    }

    #[test]
    fn endpoint_carries_key_and_language() {
        let url = strategy()
            .endpoint("movie/popular", &[("page", "3".to_string())])
            .unwrap();
        assert_eq!(
            url,
            "https://api.themoviedb.org/3/movie/popular?api_key=k3y&language=en-US&page=3"
        );
    }
}
