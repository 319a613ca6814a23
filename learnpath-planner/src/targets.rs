//! Which skills a goal asks for.

use std::collections::HashSet;

use learnpath_core::SkillGraph;
use learnpath_core::ids::SkillId;
use learnpath_core::model::Goal;
use learnpath_retrieval::ResourceCard;

/// How many top search hits contribute skills when nothing else matched.
const FALLBACK_CARDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetSource {
    Preferences,
    GoalText,
    SearchResults,
}

impl TargetSource {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            TargetSource::Preferences => "the target_skills preference",
            TargetSource::GoalText => "skills named in the goal",
            TargetSource::SearchResults => "skills taught by the top search results",
        }
    }
}

fn normalise(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve targets in priority order: explicit preference, goal text, search results.
pub(crate) fn resolve(
    goal: &Goal,
    graph: &SkillGraph,
    goal_hits: &[ResourceCard],
) -> Option<(Vec<SkillId>, TargetSource)> {
    let preferred: Vec<SkillId> = goal
        .preference_list("target_skills")
        .iter()
        .filter_map(|label| graph.find(label).map(|s| s.id.clone()))
        .collect();
    if !preferred.is_empty() {
        return Some((dedup(preferred), TargetSource::Preferences));
    }

    let text = format!(" {} ", normalise(&goal.objective));
    let mut named: Vec<SkillId> = graph
        .skills()
        .filter(|skill| {
            [&skill.name, &skill.slug]
                .iter()
                .map(|label| normalise(label))
                .any(|label| !label.is_empty() && text.contains(&format!(" {label} ")))
        })
        .map(|s| s.id.clone())
        .collect();
    if !named.is_empty() {
        named.sort();
        return Some((named, TargetSource::GoalText));
    }

    let from_hits: Vec<SkillId> = goal_hits
        .iter()
        .take(FALLBACK_CARDS)
        .flat_map(|card| card.resource.skills.iter().cloned())
        .collect();
    if !from_hits.is_empty() {
        return Some((dedup(from_hits), TargetSource::SearchResults));
    }
    None
}

/// Skills the learner already has, plus everything those depend on.
pub(crate) fn known(goal: &Goal, graph: &SkillGraph) -> HashSet<SkillId> {
    let direct: Vec<SkillId> = goal
        .current_skills
        .iter()
        .filter_map(|label| graph.find(label).map(|s| s.id.clone()))
        .collect();
    graph.with_prerequisites(direct.iter())
}

fn dedup(ids: Vec<SkillId>) -> Vec<SkillId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
