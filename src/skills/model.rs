use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Skill record in the `skills` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Skill {
    pub skill_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub created_at: OffsetDateTime,
}

/// Input for a new skill; id and timestamp are assigned on insert.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSkill {
    pub name: String,
    pub description: String,
    pub category: String,
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// Listing order: by name, ties broken by id.
impl Ord for Skill {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.skill_id.cmp(&other.skill_id))
    }
}

impl PartialOrd for Skill {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str) -> Skill {
        Skill {
            skill_id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            category: "misc".into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn sorts_alphabetically_by_name() {
        let mut skills = vec![skill("Welding"), skill("Baking"), skill("Guitar")];
        skills.sort();
        let names: Vec<_> = skills.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Baking", "Guitar", "Welding"]);
    }

    #[test]
    fn displays_as_name() {
        assert_eq!(skill("Pottery").to_string(), "Pottery");
    }
}
