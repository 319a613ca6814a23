//! `learnpath seed` loads skills, prerequisite edges and resources from a TOML file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use learnpath_core::SkillGraph;
use learnpath_core::model::{PrerequisiteEdge, Resource, Skill};
use learnpath_core::store::{ResourceCatalog, SkillStore};
use serde::Deserialize;
use tracing::info;

use super::open_store;
use crate::config::Config;

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// TOML file with [[skills]], [[prerequisites]] and [[resources]] tables
    pub file: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub skills: Vec<Skill>,
    pub prerequisites: Vec<PrerequisiteEdge>,
    pub resources: Vec<Resource>,
}

impl SeedFile {
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse seed file: {}", path.display()))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub skills: usize,
    pub prerequisites: usize,
    pub resources: usize,
}

pub async fn run(args: SeedArgs, config: &Config) -> Result<()> {
    let seed = SeedFile::read(&args.file)?;
    let store = open_store(&config.store).await?;
    let summary = apply(&seed, store.as_ref(), store.as_ref()).await?;
    println!(
        "Seeded {} skills, {} prerequisites, {} resources into {}",
        summary.skills, summary.prerequisites, summary.resources, config.store.database
    );
    Ok(())
}

/// Write the seed into the stores. Every edge is checked against the graph as it stands
/// (stored plus seeded) and the whole seed is refused before any edge lands if one would
/// close a cycle.
pub async fn apply(seed: &SeedFile, skills: &dyn SkillStore, catalog: &dyn ResourceCatalog) -> Result<SeedSummary> {
    let mut graph = SkillGraph::load(
        skills.list_skills().await?.into_iter().chain(seed.skills.iter().cloned()),
        skills.list_prerequisites().await?,
    );
    for edge in &seed.prerequisites {
        if let Err(e) = graph.add_prerequisite(&edge.from, &edge.to) {
            bail!("prerequisite {} -> {} rejected: {e}", edge.from, edge.to);
        }
    }

    for skill in &seed.skills {
        skills.upsert_skill(skill).await?;
    }
    for edge in &seed.prerequisites {
        skills.insert_prerequisite(edge).await?;
    }
    for resource in &seed.resources {
        catalog.upsert_resource(resource).await?;
    }

    info!(
        skills = seed.skills.len(),
        prerequisites = seed.prerequisites.len(),
        resources = seed.resources.len(),
        "seed applied"
    );
    Ok(SeedSummary {
        skills: seed.skills.len(),
        prerequisites: seed.prerequisites.len(),
        resources: seed.resources.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnpath_store::TursoStore;

    const SEED: &str = r#"
[[skills]]
id = "py-syntax"
name = "Python syntax"
slug = "python-syntax"

[[skills]]
id = "py-control"
name = "Control flow"
slug = "control-flow"
level = 1

[[prerequisites]]
from = "py-syntax"
to = "py-control"

[[resources]]
id = "res-1"
title = "Python in an hour"
url = "https://example.com/python"
duration_min = 60
skills = ["py-syntax"]
"#;

    #[tokio::test]
    async fn seed_file_lands_in_the_store() {
        let seed: SeedFile = toml::from_str(SEED).unwrap();
        let store = TursoStore::new_memory().await.unwrap();

        let summary = apply(&seed, &store, &store).await.unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                skills: 2,
                prerequisites: 1,
                resources: 1
            }
        );
        assert_eq!(store.list_skills().await.unwrap().len(), 2);
        assert_eq!(store.list_prerequisites().await.unwrap().len(), 1);
        assert_eq!(store.list_resources().await.unwrap()[0].duration_min, 60);
    }

    #[tokio::test]
    async fn cyclic_seed_is_refused_before_writing_edges() {
        let mut seed: SeedFile = toml::from_str(SEED).unwrap();
        seed.prerequisites.push(PrerequisiteEdge::new("py-control", "py-syntax"));
        let store = TursoStore::new_memory().await.unwrap();

        let err = apply(&seed, &store, &store).await.unwrap_err();
        assert!(err.to_string().contains("py-control -> py-syntax"));
        assert!(store.list_prerequisites().await.unwrap().is_empty());
    }

    #[test]
    fn empty_seed_file_parses() {
        let seed: SeedFile = toml::from_str("").unwrap();
        assert!(seed.skills.is_empty() && seed.resources.is_empty());
    }
}
