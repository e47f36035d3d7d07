pub mod model;
mod repo;

pub use model::{NewSkill, Skill};
