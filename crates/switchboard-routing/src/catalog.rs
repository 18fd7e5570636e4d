//! Task catalog and quality matrix
//!
//! Static lookup of task categories, each with a minimum quality floor and a
//! cost-ordered list of preferred models, plus a (task, model) quality table.
//! Unrated pairs score 0 and are only eligible when the floor is 0.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::RoutingError;

/// Floor used for a category the catalog does not list
pub const DEFAULT_MIN_PERFORMANCE: f64 = 0.7;

/// Coarse classification of requested work
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TaskCategory {
    /// Social posts, captions, short replies
    ShortForm,
    /// Articles and other long drafts
    LongForm,
    /// Output that must parse as JSON
    StructuredJson,
    /// Condensing existing content
    Summarization,
    /// Search-oriented copy and keywords
    Seo,
    /// Research and multi-step reasoning
    Analysis,
    /// Press and PR pitches
    PrPitch,
}

impl TaskCategory {
    /// Parse a category name, ignoring case and surrounding whitespace
    pub fn from_name(name: &str) -> Result<Self, RoutingError> {
        name.trim()
            .to_lowercase()
            .parse()
            .map_err(|_| RoutingError::UnknownTaskCategory(name.to_owned()))
    }
}

/// Catalog entry for one task category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCatalogEntry {
    /// Category this entry describes
    pub category: TaskCategory,
    /// Minimum quality a model needs for this category
    pub min_perf: f64,
    /// Preferred models, cheapest first
    pub preferred_models: Vec<String>,
}

impl TaskCatalogEntry {
    /// Create an entry
    pub fn new(category: TaskCategory, min_perf: f64, preferred_models: &[&str]) -> Self {
        Self {
            category,
            min_perf,
            preferred_models: preferred_models.iter().map(|m| (*m).to_owned()).collect(),
        }
    }
}

const BUILTIN_QUALITY: &[(TaskCategory, &[(&str, f64)])] = &[
    (
        TaskCategory::ShortForm,
        &[
            ("gpt-4o-mini", 0.80),
            ("claude-3-haiku", 0.78),
            ("gpt-3.5-turbo", 0.70),
            ("claude-3-sonnet", 0.88),
            ("gpt-4o", 0.90),
            ("claude-3-opus", 0.92),
        ],
    ),
    (
        TaskCategory::LongForm,
        &[
            ("gpt-4o-mini", 0.72),
            ("claude-3-haiku", 0.68),
            ("gpt-3.5-turbo", 0.60),
            ("claude-3-sonnet", 0.90),
            ("gpt-4o", 0.90),
            ("claude-3-opus", 0.95),
        ],
    ),
    (
        TaskCategory::StructuredJson,
        &[
            ("gpt-4o-mini", 0.85),
            ("claude-3-haiku", 0.75),
            ("gpt-3.5-turbo", 0.70),
            ("claude-3-sonnet", 0.88),
            ("gpt-4o", 0.95),
            ("claude-3-opus", 0.90),
        ],
    ),
    (
        TaskCategory::Summarization,
        &[
            ("gpt-4o-mini", 0.80),
            ("claude-3-haiku", 0.82),
            ("gpt-3.5-turbo", 0.72),
            ("claude-3-sonnet", 0.90),
            ("gpt-4o", 0.90),
            ("claude-3-opus", 0.93),
        ],
    ),
    (
        TaskCategory::Seo,
        &[
            ("gpt-4o-mini", 0.78),
            ("claude-3-haiku", 0.75),
            ("gpt-3.5-turbo", 0.65),
            ("claude-3-sonnet", 0.86),
            ("gpt-4o", 0.88),
            ("claude-3-opus", 0.90),
        ],
    ),
    (
        TaskCategory::Analysis,
        &[
            ("gpt-4o-mini", 0.70),
            ("claude-3-haiku", 0.65),
            ("gpt-3.5-turbo", 0.55),
            ("claude-3-sonnet", 0.88),
            ("gpt-4o", 0.90),
            ("claude-3-opus", 0.96),
        ],
    ),
    (
        TaskCategory::PrPitch,
        &[
            ("gpt-4o-mini", 0.75),
            ("claude-3-haiku", 0.70),
            ("gpt-3.5-turbo", 0.60),
            ("claude-3-sonnet", 0.92),
            ("gpt-4o", 0.88),
            ("claude-3-opus", 0.95),
        ],
    ),
];

/// Task catalog with its quality matrix
#[derive(Debug, Clone)]
pub struct TaskCatalog {
    entries: Vec<TaskCatalogEntry>,
    quality: HashMap<(TaskCategory, String), f64>,
}

impl TaskCatalog {
    /// Catalog with the given entries and an empty quality matrix
    pub fn new(entries: Vec<TaskCatalogEntry>) -> Self {
        Self {
            entries,
            quality: HashMap::new(),
        }
    }

    /// Built-in catalog
    pub fn builtin() -> Self {
        let entries = vec![
            TaskCatalogEntry::new(
                TaskCategory::ShortForm,
                0.60,
                &["gpt-4o-mini", "claude-3-haiku", "gpt-3.5-turbo", "claude-3-sonnet", "gpt-4o"],
            ),
            TaskCatalogEntry::new(TaskCategory::LongForm, 0.75, &["claude-3-sonnet", "gpt-4o", "claude-3-opus"]),
            TaskCatalogEntry::new(
                TaskCategory::StructuredJson,
                0.80,
                &["gpt-4o-mini", "claude-3-sonnet", "gpt-4o", "claude-3-opus"],
            ),
            TaskCatalogEntry::new(
                TaskCategory::Summarization,
                0.70,
                &["claude-3-haiku", "gpt-4o-mini", "gpt-3.5-turbo", "claude-3-sonnet", "gpt-4o"],
            ),
            TaskCatalogEntry::new(
                TaskCategory::Seo,
                0.70,
                &["gpt-4o-mini", "claude-3-haiku", "claude-3-sonnet", "gpt-4o"],
            ),
            TaskCatalogEntry::new(TaskCategory::Analysis, 0.85, &["claude-3-sonnet", "gpt-4o", "claude-3-opus"]),
            TaskCatalogEntry::new(TaskCategory::PrPitch, 0.80, &["claude-3-sonnet", "gpt-4o", "claude-3-opus"]),
        ];

        BUILTIN_QUALITY
            .iter()
            .flat_map(|(category, ratings)| ratings.iter().map(move |(model, q)| (*category, *model, *q)))
            .fold(Self::new(entries), |catalog, (category, model, q)| catalog.rate(category, model, q))
    }

    /// Set the quality of a model for a category
    #[must_use]
    pub fn rate(mut self, category: TaskCategory, model: &str, quality: f64) -> Self {
        self.quality.insert((category, model.to_owned()), quality.clamp(0.0, 1.0));
        self
    }

    /// All entries
    pub fn entries(&self) -> &[TaskCatalogEntry] {
        &self.entries
    }

    /// Entry for a category
    pub fn entry(&self, category: TaskCategory) -> Option<&TaskCatalogEntry> {
        self.entries.iter().find(|e| e.category == category)
    }

    /// Catalog floor for a category
    pub fn min_performance(&self, category: TaskCategory) -> f64 {
        self.entry(category).map_or(DEFAULT_MIN_PERFORMANCE, |e| e.min_perf)
    }

    /// Quality of a model for a category, 0 if unrated
    pub fn quality_for(&self, category: TaskCategory, model: &str) -> f64 {
        self.quality
            .get(&(category, model.to_owned()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Whether a model meets the given floor for a category
    pub fn meets_performance(&self, category: TaskCategory, model: &str, min_perf: f64) -> bool {
        self.quality_for(category, model) >= min_perf
    }

    /// Rated models at or above the floor, best first
    pub fn qualified_models(&self, category: TaskCategory, min_perf: f64) -> Vec<(&str, f64)> {
        let mut qualified: Vec<(&str, f64)> = self
            .quality
            .iter()
            .filter(|((c, _), q)| *c == category && **q >= min_perf)
            .map(|((_, model), q)| (model.as_str(), *q))
            .collect();

        qualified.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        qualified
    }

    /// Catalog's cost-ordered preferences, filtered by a floor (catalog default when `None`)
    pub fn preferred_models(&self, category: TaskCategory, min_perf: Option<f64>) -> Vec<&str> {
        let Some(entry) = self.entry(category) else {
            return Vec::new();
        };
        let floor = min_perf.unwrap_or(entry.min_perf);

        entry
            .preferred_models
            .iter()
            .map(String::as_str)
            .filter(|model| self.meets_performance(category, model, floor))
            .collect()
    }
}

impl Default for TaskCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Keyword rules in precedence order; first match wins
static CATEGORY_RULES: LazyLock<Vec<(Regex, TaskCategory)>> = LazyLock::new(|| {
    [
        (r"(?i)pitch|\bpr\b|\bpr_", TaskCategory::PrPitch),
        (r"(?i)summar|digest|tl;?dr", TaskCategory::Summarization),
        (r"(?i)\bseo|keyword", TaskCategory::Seo),
        (r"(?i)analy|reason|research", TaskCategory::Analysis),
        (r"(?i)json|structured|extract", TaskCategory::StructuredJson),
        (r"(?i)long|article|blog|draft", TaskCategory::LongForm),
    ]
    .into_iter()
    .map(|(pattern, category)| (Regex::new(pattern).expect("must be valid regex"), category))
    .collect()
});

/// Infer a task category from a free-text agent type
///
/// The rule order is a deliberate tie-break: "pr-summary-writer" is a pitch,
/// not a summary.
pub fn infer_task_category(agent_type: &str) -> TaskCategory {
    CATEGORY_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(agent_type))
        .map_or(TaskCategory::ShortForm, |(_, category)| *category)
}

/// Every known category in declaration order
pub fn categories() -> impl Iterator<Item = TaskCategory> {
    TaskCategory::iter()
}
