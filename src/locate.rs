use crate::config::LocateConfig;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub enum ContainerQuery {
    Css { source: String, selector: Selector },
    ClassKeyword {
        tags: Vec<String>,
        keywords: Vec<String>,
    },
}

impl ContainerQuery {
    pub fn css(source: &str) -> Option<Self> {
        match Selector::parse(source) {
            Ok(selector) => Some(ContainerQuery::Css {
                source: source.to_string(),
                selector,
            }),
            Err(err) => {
                warn!(selector = source, error = ?err, "invalid container selector; skipping");
                None
            }
        }
    }

    pub fn class_keyword(tags: &[String], keywords: &[String]) -> Self {
        ContainerQuery::ClassKeyword {
            tags: tags.iter().map(|t| t.trim().to_ascii_lowercase()).collect(),
            keywords: keywords.iter().map(|k| k.trim().to_lowercase()).collect(),
        }
    }

    pub fn select<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        match self {
            ContainerQuery::Css { selector, .. } => doc.select(selector).collect(),
            ContainerQuery::ClassKeyword { tags, keywords } => {
                if tags.is_empty() || keywords.is_empty() {
                    return Vec::new();
                }
                let Ok(candidates) = Selector::parse("[class]") else {
                    return Vec::new();
                };
                doc.select(&candidates)
                    .filter(|el| tags.iter().any(|t| t == el.value().name()))
                    .filter(|el| {
                        let class = el.value().attr("class").unwrap_or_default().to_lowercase();
                        keywords.iter().any(|k| class.contains(k.as_str()))
                    })
                    .collect()
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ContainerQuery::Css { source, .. } => source.clone(),
            ContainerQuery::ClassKeyword { tags, keywords } => {
                format!("{}[class~{}]", tags.join("|"), keywords.join("|"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateStrategy {
    Selector(usize),
    Fallback,
    Nothing,
}

#[derive(Debug)]
pub struct Located<'a> {
    pub containers: Vec<ElementRef<'a>>,
    pub strategy: LocateStrategy,
}

#[derive(Debug, Clone)]
pub struct Locator {
    queries: Vec<(usize, ContainerQuery)>,
    fallback: ContainerQuery,
    limit: Option<usize>,
}

impl Locator {
    pub fn from_config(config: &LocateConfig) -> Self {
        let queries = config
            .selectors
            .iter()
            .enumerate()
            .filter_map(|(index, s)| ContainerQuery::css(s).map(|q| (index, q)))
            .collect();

        Self {
            queries,
            fallback: ContainerQuery::class_keyword(
                &config.fallback_tags,
                &config.fallback_keywords,
            ),
            limit: config.limit,
        }
    }

    /// Returns the matches of the first query that finds anything. Later queries are
    /// never evaluated once one has matched.
    pub fn locate<'a>(&self, doc: &'a Html) -> Located<'a> {
        let mut found = None;
        for (index, query) in &self.queries {
            let matches = query.select(doc);
            if !matches.is_empty() {
                debug!(selector = %query.describe(), count = matches.len(), "container selector matched");
                found = Some((matches, LocateStrategy::Selector(*index)));
                break;
            }
        }

        let (mut containers, strategy) = found.unwrap_or_else(|| {
            let matches = self.fallback.select(doc);
            debug!(pattern = %self.fallback.describe(), count = matches.len(), "fallback container pattern");
            if matches.is_empty() {
                (matches, LocateStrategy::Nothing)
            } else {
                (matches, LocateStrategy::Fallback)
            }
        });

        if let Some(limit) = self.limit {
            containers.truncate(limit);
        }

        Located {
            containers,
            strategy,
        }
    }
}

pub fn locate_containers<'a>(doc: &'a Html, config: &LocateConfig) -> Located<'a> {
    Locator::from_config(config).locate(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(selectors: &[&str]) -> LocateConfig {
        LocateConfig {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            ..LocateConfig::default()
        }
    }

    #[test]
    fn third_selector_wins_over_fallback() {
        let doc = Html::parse_document(
            r#"<body>
                <div class="event-card">noise</div>
                <li class="show">One</li>
                <li class="show">Two</li>
            </body>"#,
        );
        let located = locate_containers(&doc, &config(&["article.event", "div.mix", "li.show"]));
        assert_eq!(located.strategy, LocateStrategy::Selector(2));
        assert_eq!(located.containers.len(), 2);
        assert!(located.containers.iter().all(|el| el.value().name() == "li"));
    }

    #[test]
    fn earlier_selector_short_circuits_later_ones() {
        let doc = Html::parse_document(
            r#"<body><article>broad</article><article class="event">precise</article></body>"#,
        );
        let located = locate_containers(&doc, &config(&["article", "article.event"]));
        assert_eq!(located.strategy, LocateStrategy::Selector(0));
        assert_eq!(located.containers.len(), 2);
    }

    #[test]
    fn falls_back_to_class_keyword_pattern() {
        let doc = Html::parse_document(
            r#"<body>
                <div class="Upcoming-EVENT">a</div>
                <article class="listing-row">b</article>
                <span class="event">ignored tag</span>
                <div class="sidebar">ignored class</div>
            </body>"#,
        );
        let located = locate_containers(&doc, &config(&["article.event"]));
        assert_eq!(located.strategy, LocateStrategy::Fallback);
        assert_eq!(located.containers.len(), 2);
    }

    #[test]
    fn invalid_selector_is_skipped() {
        let doc = Html::parse_document(r#"<body><section class="x">a</section></body>"#);
        let located = locate_containers(&doc, &config(&["div[[", "section.x"]));
        assert_eq!(located.strategy, LocateStrategy::Selector(1));
    }

    #[test]
    fn limit_caps_containers_and_empty_document_reports_nothing() {
        let doc = Html::parse_document(
            r#"<body><div class="card">1</div><div class="card">2</div><div class="card">3</div></body>"#,
        );
        let mut cfg = config(&[]);
        cfg.limit = Some(2);
        assert_eq!(locate_containers(&doc, &cfg).containers.len(), 2);

        let empty = Html::parse_document("<body><p>nothing</p></body>");
        let located = locate_containers(&empty, &cfg);
        assert_eq!(located.strategy, LocateStrategy::Nothing);
        assert!(located.containers.is_empty());
    }
}
