use crate::model::Category;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordTable {
    #[serde(default = "default_work")]
    pub work: Vec<String>,
    #[serde(default = "default_social")]
    pub social: Vec<String>,
    #[serde(default = "default_sports")]
    pub sports: Vec<String>,
    #[serde(default = "default_arts")]
    pub arts: Vec<String>,
    #[serde(default = "default_leisure")]
    pub leisure: Vec<String>,
}

impl KeywordTable {
    pub fn keywords(&self, category: Category) -> &[String] {
        match category {
            Category::Work => &self.work,
            Category::Social => &self.social,
            Category::Sports => &self.sports,
            Category::Arts => &self.arts,
            Category::Leisure => &self.leisure,
        }
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            work: default_work(),
            social: default_social(),
            sports: default_sports(),
            arts: default_arts(),
            leisure: default_leisure(),
        }
    }
}

/// Scores free text against per-category keyword sets.
///
/// Each keyword found as a substring of the lowercased `title description` text adds one
/// point to its category. The highest score wins; ties go to the category that comes
/// first in [`Category::ALL`] (work, social, sports, arts, leisure). Text without any
/// match is `leisure`.
#[derive(Debug, Clone)]
pub struct Categorizer {
    table: Vec<(Category, Vec<String>)>,
}

impl Categorizer {
    pub fn new(table: &KeywordTable) -> Self {
        let table = Category::ALL
            .into_iter()
            .map(|category| {
                let keywords = table
                    .keywords(category)
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (category, keywords)
            })
            .collect();
        Self { table }
    }

    pub fn score(&self, title: &str, description: &str) -> Vec<(Category, usize)> {
        let text = format!("{title} {description}").to_lowercase();
        self.table
            .iter()
            .map(|(category, keywords)| {
                let hits = keywords.iter().filter(|k| text.contains(k.as_str())).count();
                (*category, hits)
            })
            .collect()
    }

    pub fn categorize(&self, title: &str, description: &str) -> Category {
        let mut best: Option<(Category, usize)> = None;
        for (category, hits) in self.score(title, description) {
            if hits == 0 {
                continue;
            }
            if best.is_none_or(|(_, top)| hits > top) {
                best = Some((category, hits));
            }
        }
        best.map(|(category, _)| category).unwrap_or_default()
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(&KeywordTable::default())
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn default_work() -> Vec<String> {
    words(&[
        "career",
        "internship",
        "job",
        "recruitment",
        "hiring",
        "interview",
        "resume",
        "networking",
        "professional",
        "workshop",
        "info session",
        "infosession",
        "tech talk",
        "employer",
        "company",
        "startup",
        "fair",
    ])
}

fn default_social() -> Vec<String> {
    words(&[
        "social",
        "mixer",
        "meet and greet",
        "happy hour",
        "party",
        "celebration",
        "gathering",
        "bbq",
        "dinner",
        "lunch",
        "breakfast",
        "food",
        "free food",
        "potluck",
        "banquet",
        "reception",
    ])
}

fn default_sports() -> Vec<String> {
    words(&[
        "sport",
        "game",
        "tournament",
        "fitness",
        "yoga",
        "run",
        "marathon",
        "basketball",
        "soccer",
        "volleyball",
        "tennis",
        "recreation",
        "athletic",
        "intramural",
        "competition",
        "cal bears",
    ])
}

fn default_arts() -> Vec<String> {
    words(&[
        "art",
        "music",
        "concert",
        "performance",
        "theater",
        "theatre",
        "dance",
        "exhibition",
        "gallery",
        "film",
        "movie",
        "poetry",
        "cultural",
        "show",
        "screening",
        "anime",
        "cosplay",
        "bampfa",
    ])
}

fn default_leisure() -> Vec<String> {
    words(&[
        "club meeting",
        "general meeting",
        "study",
        "discussion",
        "seminar",
        "lecture",
        "talk",
        "presentation",
        "fundraiser",
        "volunteer",
        "community",
        "activism",
        "awareness",
        "scavenger hunt",
    ])
}
