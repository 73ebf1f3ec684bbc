//! Cognitive sectors, derived tiers, and emotional sentiment labels.

use serde::{Deserialize, Serialize};

// ============================================================================
// SECTORS
// ============================================================================

/// The five cognitive sectors
///
/// A memory's sector is immutable after creation; it is both the memory's
/// type and its decay class. Reclassification means a new memory plus a
/// waypoint to the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    /// Durable facts and project state
    #[default]
    Semantic,
    /// Actions and events as they happened
    Episodic,
    /// Patterns, techniques, how-to knowledge
    Procedural,
    /// Decisions, rationale, lessons, warnings
    Reflective,
    /// Agent-reported feelings about the work
    Emotional,
}

impl Sector {
    /// All sectors, useful for unfiltered queries
    pub const ALL: [Sector; 5] = [
        Sector::Semantic,
        Sector::Episodic,
        Sector::Procedural,
        Sector::Reflective,
        Sector::Emotional,
    ];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Semantic => "semantic",
            Sector::Episodic => "episodic",
            Sector::Procedural => "procedural",
            Sector::Reflective => "reflective",
            Sector::Emotional => "emotional",
        }
    }

    /// Parse from string name; unknown names are rejected since a bad
    /// sector silently mapped to a default would change decay behaviour
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "semantic" => Some(Sector::Semantic),
            "episodic" => Some(Sector::Episodic),
            "procedural" => Some(Sector::Procedural),
            "reflective" => Some(Sector::Reflective),
            "emotional" => Some(Sector::Emotional),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TIERS
// ============================================================================

/// Derived freshness/importance band; never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Warm => "warm",
            Tier::Cold => "cold",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// SENTIMENT
// ============================================================================

/// Closed vocabulary for emotional memories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
    Frustrated,
    Confident,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Frustrated => "frustrated",
            Sentiment::Confident => "confident",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            "frustrated" => Some(Sentiment::Frustrated),
            "confident" => Some(Sentiment::Confident),
            _ => None,
        }
    }

    /// Numeric score used by the sentiment trend aggregation
    pub fn score(&self) -> f64 {
        match self {
            Sentiment::Positive | Sentiment::Confident => 1.0,
            Sentiment::Neutral => 0.0,
            Sentiment::Frustrated => -0.5,
            Sentiment::Negative => -1.0,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================
