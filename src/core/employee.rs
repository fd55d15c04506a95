//! Employee domain type and skill profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One named skill with optional experience and tenure, in months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillProfile {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_months: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenure_months: Option<u32>,
}

impl SkillProfile {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            experience_months: None,
            tenure_months: None,
        }
    }

    #[must_use]
    pub fn with_months(name: impl Into<String>, experience: u32, tenure: u32) -> Self {
        Self {
            name: name.into(),
            experience_months: Some(experience),
            tenure_months: Some(tenure),
        }
    }
}

/// Canonical form used for skill-name matching and cache hashing.
#[must_use]
pub fn normalize_skill(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A person that tasks can be assigned to; one bandit arm per employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,

    /// Ordered skill list; the embedding cache is ordered the same way.
    pub skills: Vec<SkillProfile>,

    /// Cached per-skill unit embeddings, one vector per skill.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_embeddings: Option<Vec<Vec<f32>>>,

    /// Hash of (normalized skill names, backend, dims) guarding the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills_hash: Option<String>,

    /// Float in [0, 1].
    pub productivity_score: f64,

    /// Count of currently open assignments.
    pub workload: u32,

    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        skills: Vec<SkillProfile>,
        productivity_score: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            skills,
            skill_embeddings: None,
            skills_hash: None,
            productivity_score: productivity_score.clamp(0.0, 1.0),
            workload: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn skill_names(&self) -> Vec<String> {
        self.skills.iter().map(|s| s.name.clone()).collect()
    }

    /// Case-insensitive lookup of a skill by required-skill name.
    #[must_use]
    pub fn find_skill(&self, required: &str) -> Option<&SkillProfile> {
        let wanted = normalize_skill(required);
        self.skills
            .iter()
            .find(|s| normalize_skill(&s.name) == wanted)
    }

    /// Cached embeddings if present and consistent with the skill count.
    #[must_use]
    pub fn cached_embeddings(&self) -> Option<&[Vec<f32>]> {
        match &self.skill_embeddings {
            Some(embs) if embs.len() == self.skills.len() => Some(embs),
            _ => None,
        }
    }
}
