//! Domain types shared by the store, the classifiers and the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub type DocumentId = String;

/// Document subset tag. The wire form is the store payload value
/// (`metadata.source`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Feedbacks,
    Bugs,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Feedbacks, Category::Bugs];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Feedbacks => "feedbacks",
            Category::Bugs => "bugs",
        }
    }

    /// Natural-language description used when telling the model what is in scope.
    pub fn description(self) -> &'static str {
        match self {
            Category::Feedbacks => "customer feedback and experiences",
            Category::Bugs => "bug reports and proposed fixes",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feedbacks" | "feedback" => Ok(Category::Feedbacks),
            "bugs" | "bug" | "bug-report" => Ok(Category::Bugs),
            other => Err(Error::InvalidDocument(format!("unknown category '{other}'"))),
        }
    }
}

/// Lexical vector: strictly increasing term indices with non-negative weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SparseVector {
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseVector {
    /// Build from unordered `(index, weight)` pairs. Duplicate indices are
    /// summed, zero weights dropped.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, f32)>,
    {
        let mut merged = std::collections::BTreeMap::<u32, f32>::new();
        for (index, weight) in pairs {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidDocument(format!(
                    "sparse weight for term {index} must be finite and non-negative, got {weight}"
                )));
            }
            *merged.entry(index).or_insert(0.0) += weight;
        }
        let (indices, values) = merged.into_iter().filter(|(_, w)| *w > 0.0).unzip();
        Ok(Self { indices, values })
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Sparse dot product; both sides are sorted so this is a linear merge.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j, mut acc) = (0usize, 0usize, 0f32);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }
}

/// A stored document. Built once at ingestion and never mutated; the store
/// owns it and hands out [`RetrievedDocument`] views.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    id: DocumentId,
    content: String,
    category: Category,
    dense: Vec<f32>,
    sparse: SparseVector,
}

impl Document {
    /// Validates that both signals are present before the document exists.
    pub fn new(
        id: impl Into<DocumentId>,
        content: impl Into<String>,
        category: Category,
        dense: Vec<f32>,
        sparse: SparseVector,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidDocument("document id must not be empty".into()));
        }
        if dense.is_empty() {
            return Err(Error::InvalidDocument(format!("document {id} has no dense vector")));
        }
        if dense.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidDocument(format!(
                "document {id} has a non-finite dense component"
            )));
        }
        Ok(Self { id, content: content.into(), category, dense, sparse })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn dense(&self) -> &[f32] {
        &self.dense
    }

    pub fn sparse(&self) -> &SparseVector {
        &self.sparse
    }

    pub fn to_retrieved(&self, score: f32) -> RetrievedDocument {
        RetrievedDocument {
            id: self.id.clone(),
            content: self.content.clone(),
            category: self.category,
            score,
        }
    }
}

/// What a search hands back: identity, text and tag plus the fused score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: DocumentId,
    pub content: String,
    pub category: Category,
    pub score: f32,
}

/// Effective set of categories a search may return. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchScope(BTreeSet<Category>);

impl SearchScope {
    pub fn all() -> Self {
        Self(Category::ALL.into_iter().collect())
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains(&category)
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.iter().copied()
    }

    pub fn is_unconstrained(&self) -> bool {
        Category::ALL.iter().all(|c| self.0.contains(c))
    }
}

/// Per-query topic flags plus the classifier's rationale.
///
/// The raw flags are kept as the classifier produced them; [`TopicFilter::scope`]
/// is what a search actually uses. All-false widens to every category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicFilter {
    pub feedbacks: bool,
    pub bugs: bool,
    pub reason: String,
    /// Set when the classifier response was unusable and this is the fallback.
    #[serde(default)]
    pub degraded: bool,
}

impl TopicFilter {
    pub const DEGRADED_REASON: &'static str = "Error in parsing response";

    pub fn new(feedbacks: bool, bugs: bool, reason: impl Into<String>) -> Self {
        Self { feedbacks, bugs, reason: reason.into(), degraded: false }
    }

    /// Fallback used when topic classification cannot be parsed.
    pub fn degraded() -> Self {
        Self {
            feedbacks: true,
            bugs: true,
            reason: Self::DEGRADED_REASON.to_string(),
            degraded: true,
        }
    }

    pub fn flag(&self, category: Category) -> bool {
        match category {
            Category::Feedbacks => self.feedbacks,
            Category::Bugs => self.bugs,
        }
    }

    pub fn scope(&self) -> SearchScope {
        let selected: BTreeSet<Category> =
            Category::ALL.into_iter().filter(|c| self.flag(*c)).collect();
        if selected.is_empty() {
            SearchScope::all()
        } else {
            SearchScope(selected)
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.scope().is_unconstrained()
    }

    /// Rationale string recorded with every retrieval.
    pub fn rationale(&self) -> String {
        format!("Bugs: {}, Feedbacks: {}\nReasoning: {}", self.bugs, self.feedbacks, self.reason)
    }
}

/// How the dense and sparse rankings are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fusion {
    /// Distribution-based score normalisation, then sum (DBSF).
    #[default]
    #[serde(rename = "dbsf", alias = "rank-sum")]
    RankSum,
    /// Reciprocal-rank fusion over ordinal positions (RRF).
    #[serde(rename = "rrf", alias = "reciprocal-rank")]
    ReciprocalRank,
}

impl fmt::Display for Fusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fusion::RankSum => f.write_str("dbsf"),
            Fusion::ReciprocalRank => f.write_str("rrf"),
        }
    }
}

/// Which signals a store consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    #[default]
    Hybrid,
    Dense,
}

/// Output of the hybrid retriever for one query.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub documents: Vec<RetrievedDocument>,
    pub filter: TopicFilter,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    #[serde(rename = "qa")]
    QuestionAnswering,
    #[serde(rename = "summary")]
    Summarization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    #[serde(rename = "tool")]
    pub route: Route,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "minor" => Ok(Severity::Low),
            "medium" | "moderate" => Ok(Severity::Medium),
            "high" | "major" => Ok(Severity::High),
            "critical" | "blocker" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub reported_issues: String,
    pub affected_components: String,
    pub severity: Severity,
}

/// What `handle` returns: `{"answer": ..}` or the three summary fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TriageResponse {
    Answer { answer: String },
    Summary(IssueSummary),
}
