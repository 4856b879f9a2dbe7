use super::{Candidate, FetchStrategy};
use crate::error::{Error, Result};
use crate::normalize::{canonicalize, parse_id_from_path};
use crate::record::{MovieRecord, StrategyKind};
use crate::selector::SelectorSet;
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Listing URL for page `page` of the public site.
pub fn listing_url(site: &Url, page: u32) -> Result<String> {
    let mut url = site
        .join("movie")
        .map_err(|e| Error::Config(format!("bad site base {}: {}", site, e)))?;
    url.query_pairs_mut().append_pair("page", &page.to_string());
    Ok(url.into())
}

/// Turns listing hrefs into absolute detail URLs, dropping the unparseable.
pub fn resolve_links(site: &Url, hrefs: Vec<String>) -> Vec<Candidate> {
    hrefs
        .into_iter()
        .filter_map(|href| match site.join(&href) {
            Ok(url) => Some(Candidate::from_url(parse_id_from_path(url.path()), url.into())),
            Err(e) => {
                log::debug!("Ignoring listing link {}: {}", href, e);
                None
            }
        })
        .collect()
}

pub(crate) fn parse_site(site_base: &str) -> Result<Url> {
    // a base without a trailing slash would make join() replace its last segment
    let normalized = format!("{}/", site_base.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|e| Error::Config(format!("bad site base {}: {}", site_base, e)))
}

/// Static pages fetched over HTTP and run through the shared selectors.
pub struct HtmlStrategy {
    transport: Transport,
    site: Url,
    selectors: Arc<SelectorSet>,
    method: String,
}

impl HtmlStrategy {
    pub fn new(
        transport: Transport,
        site_base: &str,
        selectors: Arc<SelectorSet>,
        method: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            transport,
            site: parse_site(site_base)?,
            selectors,
            method: method.into(),
        })
    }
}

#[async_trait]
impl FetchStrategy for HtmlStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Html
    }

    async fn list_candidates(&self, page: u32) -> Result<Vec<Candidate>> {
        let url = listing_url(&self.site, page)?;
        let fetched = self.transport.fetch(&url).await?;
        let hrefs = self.selectors.extract_listing(&fetched.body);
        Ok(resolve_links(&self.site, hrefs))
    }

    async fn fetch_detail(&self, candidate: Candidate) -> Result<MovieRecord> {
        let fetched = self.transport.fetch(&candidate.url).await?;
        let raw = self
            .selectors
            .extract_detail(&fetched.body, candidate.id, &candidate.url);
        Ok(canonicalize(raw, &self.method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_url_keeps_base_path() {
        let site = parse_site("http://127.0.0.1:8080/mirror").unwrap();
        assert_eq!(
            listing_url(&site, 2).unwrap(),
            "http://127.0.0.1:8080/mirror/movie?page=2"
        );
    }

    #[test]
    fn links_resolve_with_ids() {
        let site = parse_site("https://www.themoviedb.org").unwrap();
        let candidates = resolve_links(
            &site,
            vec!["/movie/1022789-inside-out-2".into(), "movie/55".into()],
        );
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, Some(1022789));
        assert_eq!(
            candidates[0].url,
            "https://www.themoviedb.org/movie/1022789-inside-out-2"
        );
        assert_eq!(candidates[1].id, Some(55));
    }
}
