use std::collections::BTreeSet;

/// Display category for a record. Presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Market,
    Music,
    General,
}

impl Category {
    pub fn glyph(&self) -> &'static str {
        match self {
            Category::Market => "👨‍🌾",
            Category::Music => "🎵",
            Category::General => "🎫",
        }
    }
}

const MARKET_TITLE_WORDS: &[&str] = &["market", "farmers"];
const MARKET_TAG_WORDS: &[&str] = &["market", "farmer"];
const MUSIC_TITLE_WORDS: &[&str] = &["music", "gig", "concert", "trad", "session", "folk", "band"];
const MUSIC_TAG_WORDS: &[&str] = &["music"];

/// Keyword classifier: market beats music beats the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier;

impl Classifier {
    pub fn classify(&self, title: &str, tags: &BTreeSet<String>) -> Category {
        let title = title.to_lowercase();
        let tags = tags
            .iter()
            .map(|t| t.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        let hit = |haystack: &str, words: &[&str]| words.iter().any(|w| haystack.contains(w));

        if hit(&title, MARKET_TITLE_WORDS) || hit(&tags, MARKET_TAG_WORDS) {
            Category::Market
        } else if hit(&title, MUSIC_TITLE_WORDS) || hit(&tags, MUSIC_TAG_WORDS) {
            Category::Music
        } else {
            Category::General
        }
    }
}
