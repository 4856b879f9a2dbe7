use crate::normalize::{RawMovie, parse_id_from_path};
use select::document::Document;
use select::node::Node;
use select::predicate::Predicate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A recursive, serializable definition of a CSS selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum CssSelector {
    /// Matches an HTML tag name (e.g., "div", "a")
    Tag(String),

    /// Matches a CSS class (e.g., "card")
    Class(String),

    /// Matches an HTML ID (e.g., "overview")
    Id(String),

    /// Matches an attribute existence or specific value
    Attribute { key: String, value: Option<String> },

    /// `[key^='value']`
    AttributePrefix { key: String, value: String },

    /// `[key*='value']`
    AttributeContains { key: String, value: String },

    /// AND Logic: Matches if ALL sub-selectors match
    And(Vec<CssSelector>),

    /// OR Logic: Matches if ANY sub-selector matches
    Or(Vec<CssSelector>),

    /// Descendant Logic: .ancestor .descendant
    Descendant {
        ancestor: Box<CssSelector>,
        descendant: Box<CssSelector>,
    },

    /// Child Logic: .parent > .child
    Child {
        parent: Box<CssSelector>,
        child: Box<CssSelector>,
    },
}

impl CssSelector {
    pub fn tag(tag: &str) -> Self {
        CssSelector::Tag(tag.to_string())
    }

    pub fn class(cls: &str) -> Self {
        CssSelector::Class(cls.to_string())
    }

    pub fn tag_class(tag: &str, cls: &str) -> Self {
        CssSelector::And(vec![Self::tag(tag), Self::class(cls)])
    }

    pub fn within(self, ancestor: CssSelector) -> Self {
        CssSelector::Descendant {
            ancestor: Box::new(ancestor),
            descendant: Box::new(self),
        }
    }

    /// Converts the structured selector into a standard CSS selector string.
    pub fn to_css_string(&self) -> String {
        match self {
            CssSelector::Tag(tag) => tag.clone(),
            CssSelector::Class(cls) => format!(".{}", cls),
            CssSelector::Id(id) => format!("#{}", id),
            CssSelector::Attribute { key, value } => match value {
                Some(v) => format!("[{}='{}']", key, v),
                None => format!("[{}]", key),
            },
            CssSelector::AttributePrefix { key, value } => format!("[{}^='{}']", key, value),
            CssSelector::AttributeContains { key, value } => format!("[{}*='{}']", key, value),
            CssSelector::And(selectors) => selectors
                .iter()
                .map(|s| s.to_compound_string())
                .collect::<Vec<_>>()
                .join(""),
            CssSelector::Or(selectors) => selectors
                .iter()
                .map(|s| s.to_css_string())
                .collect::<Vec<_>>()
                .join(", "),
            CssSelector::Descendant {
                ancestor,
                descendant,
            } => {
                format!(
                    "{} {}",
                    ancestor.to_compound_string(),
                    descendant.to_compound_string()
                )
            }
            CssSelector::Child { parent, child } => {
                format!(
                    "{} > {}",
                    parent.to_compound_string(),
                    child.to_compound_string()
                )
            }
        }
    }

    /// A group nested inside a compound or combinator becomes `:is(...)`,
    /// otherwise its commas would split the whole selector.
    fn to_compound_string(&self) -> String {
        match self {
            CssSelector::Or(_) => format!(":is({})", self.to_css_string()),
            _ => self.to_css_string(),
        }
    }
}

impl fmt::Display for CssSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css_string())
    }
}

impl Predicate for CssSelector {
    fn matches(&self, node: &Node) -> bool {
        match self {
            CssSelector::Tag(tag) => node.name() == Some(tag.as_str()),
            CssSelector::Class(cls) => node
                .attr("class")
                .map(|classes| classes.split_whitespace().any(|c| c == cls))
                .unwrap_or(false),
            CssSelector::Id(id) => node.attr("id") == Some(id.as_str()),
            CssSelector::Attribute { key, value } => match value {
                Some(v) => node.attr(key.as_str()) == Some(v.as_str()),
                None => node.attr(key.as_str()).is_some(),
            },
            CssSelector::AttributePrefix { key, value } => node
                .attr(key.as_str())
                .map(|v| v.starts_with(value.as_str()))
                .unwrap_or(false),
            CssSelector::AttributeContains { key, value } => node
                .attr(key.as_str())
                .map(|v| v.contains(value.as_str()))
                .unwrap_or(false),
            CssSelector::And(selectors) => selectors.iter().all(|s| s.matches(node)),
            CssSelector::Or(selectors) => selectors.iter().any(|s| s.matches(node)),
            CssSelector::Descendant {
                ancestor,
                descendant,
            } => {
                if !descendant.matches(node) {
                    return false;
                }
                let mut current = node.parent();
                while let Some(parent) = current {
                    if ancestor.matches(&parent) {
                        return true;
                    }
                    current = parent.parent();
                }
                false
            }
            CssSelector::Child { parent, child } => {
                child.matches(node) && node.parent().map(|p| parent.matches(&p)).unwrap_or(false)
            }
        }
    }
}

impl<'a> Predicate for &'a CssSelector {
    fn matches(&self, node: &Node) -> bool {
        (*self).matches(node)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionType {
    Text,
    Attribute(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRule {
    pub selector: CssSelector,
    pub extract: ExtractionType,
}

impl ExtractionRule {
    pub fn text(selector: CssSelector) -> Self {
        Self {
            selector,
            extract: ExtractionType::Text,
        }
    }

    pub fn attr(selector: CssSelector, name: &str) -> Self {
        Self {
            selector,
            extract: ExtractionType::Attribute(name.to_string()),
        }
    }

    fn value_of(&self, node: &Node) -> Option<String> {
        let raw = match &self.extract {
            ExtractionType::Text => node.text(),
            ExtractionType::Attribute(name) => node.attr(name.as_str())?.to_string(),
        };
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Value of the first node the selector matches.
    pub fn first(&self, doc: &Document) -> Option<String> {
        doc.find(&self.selector)
            .next()
            .and_then(|node| self.value_of(&node))
    }

    pub fn all(&self, doc: &Document) -> Vec<String> {
        doc.find(&self.selector)
            .filter_map(|node| self.value_of(&node))
            .collect()
    }
}

/// Ordered fallbacks: the first rule that yields a value wins.
pub fn first_match(rules: &[ExtractionRule], doc: &Document) -> Option<String> {
    rules.iter().find_map(|rule| rule.first(doc))
}

pub fn first_non_empty(rules: &[ExtractionRule], doc: &Document) -> Vec<String> {
    rules
        .iter()
        .map(|rule| rule.all(doc))
        .find(|values| !values.is_empty())
        .unwrap_or_default()
}

/// The selector contract shared by the static-HTML and browser strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    pub listing_link: ExtractionRule,
    pub title: Vec<ExtractionRule>,
    pub release_date: Vec<ExtractionRule>,
    pub overview: Vec<ExtractionRule>,
    pub genres: Vec<ExtractionRule>,
    pub rating: Vec<ExtractionRule>,
    pub poster: Vec<ExtractionRule>,
}

impl Default for SelectorSet {
    fn default() -> Self {
        let card = CssSelector::And(vec![
            CssSelector::tag("div"),
            CssSelector::class("card"),
            CssSelector::Or(vec![
                CssSelector::class("style_1"),
                CssSelector::class("style_2"),
                CssSelector::class("style_3"),
            ]),
        ]);
        let movie_link = CssSelector::And(vec![
            CssSelector::tag("a"),
            CssSelector::AttributePrefix {
                key: "href".into(),
                value: "/movie/".into(),
            },
        ])
        .within(CssSelector::tag("h2"))
        .within(card);

        let poster = CssSelector::tag_class("img", "poster");

        Self {
            listing_link: ExtractionRule::attr(movie_link, "href"),
            title: vec![
                ExtractionRule::text(CssSelector::tag_class("h2", "title")),
                ExtractionRule::text(CssSelector::tag("a").within(CssSelector::tag("h2"))),
                ExtractionRule::text(CssSelector::tag("h2")),
            ],
            release_date: vec![
                ExtractionRule::text(CssSelector::tag_class("span", "release")),
                ExtractionRule::text(CssSelector::And(vec![
                    CssSelector::tag("span"),
                    CssSelector::Attribute {
                        key: "itemprop".into(),
                        value: Some("datePublished".into()),
                    },
                ])),
            ],
            overview: vec![
                ExtractionRule::text(
                    CssSelector::tag("p").within(CssSelector::tag_class("div", "overview")),
                ),
                ExtractionRule::text(
                    CssSelector::tag("p").within(CssSelector::Id("overview".into())),
                ),
                ExtractionRule::text(
                    CssSelector::tag("p").within(CssSelector::tag_class("div", "facts")),
                ),
            ],
            genres: vec![
                ExtractionRule::text(
                    CssSelector::tag("a").within(CssSelector::tag_class("span", "genres")),
                ),
                ExtractionRule::text(CssSelector::And(vec![
                    CssSelector::tag("a"),
                    CssSelector::AttributeContains {
                        key: "href".into(),
                        value: "/genre/".into(),
                    },
                ])),
            ],
            rating: vec![ExtractionRule::attr(
                CssSelector::tag_class("div", "user_score_chart"),
                "data-percent",
            )],
            poster: vec![
                ExtractionRule::attr(poster.clone(), "data-src"),
                ExtractionRule::attr(poster, "src"),
            ],
        }
    }
}

impl SelectorSet {
    /// Detail-page hrefs found on a listing page, in document order.
    pub fn extract_listing(&self, html: &str) -> Vec<String> {
        let doc = Document::from(html);
        self.listing_link.all(&doc)
    }

    pub fn extract_detail(&self, html: &str, id: Option<i64>, source_url: &str) -> RawMovie {
        let doc = Document::from(html);
        RawMovie {
            id: id.or_else(|| parse_id_from_path(source_url)),
            title: first_match(&self.title, &doc),
            release_date: first_match(&self.release_date, &doc),
            rating: first_match(&self.rating, &doc),
            overview: first_match(&self.overview, &doc),
            genres: first_non_empty(&self.genres, &doc),
            poster_url: first_match(&self.poster, &doc),
            source_url: Some(source_url.to_string()),
        }
    }
}
