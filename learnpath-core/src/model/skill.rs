use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::SkillId;

/// Difficulty level shared by skills, resources and learners.
///
/// Serialized as its numeric hint (0 basic, 1 intermediate, 2 advanced).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    #[default]
    Basic,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_u8(self) -> u8 {
        match self {
            Level::Basic => 0,
            Level::Intermediate => 1,
            Level::Advanced => 2,
        }
    }

    /// Distance between two levels, used to rank resources for a learner.
    pub fn distance(self, other: Level) -> u8 {
        self.as_u8().abs_diff(other.as_u8())
    }

    pub fn parse_name(name: &str) -> Option<Level> {
        match name.trim().to_ascii_lowercase().as_str() {
            "0" | "basic" | "beginner" => Some(Level::Basic),
            "1" | "intermediate" => Some(Level::Intermediate),
            "2" | "advanced" | "expert" => Some(Level::Advanced),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Level::Basic),
            1 => Ok(Level::Intermediate),
            2 => Ok(Level::Advanced),
            other => Err(format!("level must be 0, 1 or 2, got {other}")),
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.as_u8()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Basic => "basic",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        };
        f.write_str(name)
    }
}

/// A node in the prerequisite graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub level: Level,
}

impl Skill {
    pub fn new(id: impl Into<SkillId>, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            slug: slug.into(),
            level: Level::Basic,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Whether a learner-supplied label refers to this skill.
    pub fn matches_label(&self, label: &str) -> bool {
        let label = label.trim();
        label == self.id.as_str()
            || label.eq_ignore_ascii_case(&self.slug)
            || label.eq_ignore_ascii_case(&self.name)
    }
}

/// Directed edge `from -> to`: `from` must be learned before `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrerequisiteEdge {
    pub from: SkillId,
    pub to: SkillId,
}

impl PrerequisiteEdge {
    pub fn new(from: impl Into<SkillId>, to: impl Into<SkillId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Level::Intermediate).unwrap(), "1");
        let level: Level = serde_json::from_str("2").unwrap();
        assert_eq!(level, Level::Advanced);
        assert!(serde_json::from_str::<Level>("3").is_err());
    }

    #[test]
    fn level_distance_is_symmetric() {
        assert_eq!(Level::Basic.distance(Level::Advanced), 2);
        assert_eq!(Level::Advanced.distance(Level::Basic), 2);
        assert_eq!(Level::Intermediate.distance(Level::Intermediate), 0);
    }

    #[test]
    fn skill_matches_id_slug_or_name() {
        let skill = Skill::new("s1", "Python Variables", "python-variables");
        assert!(skill.matches_label("s1"));
        assert!(skill.matches_label("PYTHON-VARIABLES"));
        assert!(skill.matches_label("python variables"));
        assert!(!skill.matches_label("loops"));
    }
}
