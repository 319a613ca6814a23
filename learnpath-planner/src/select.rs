//! Resource choice for a single lesson.

use std::collections::HashSet;

use learnpath_core::ids::{LessonId, ResourceId};
use learnpath_core::model::{Lesson, LessonResource, Level, Resource, Skill};
use learnpath_retrieval::ResourceCard;

/// Duration assumed for resources that carry no estimate.
pub const DEFAULT_RESOURCE_MINUTES: u32 = 30;

pub(crate) fn minutes_of(resource: &Resource) -> u32 {
    match resource.duration_min {
        0 => DEFAULT_RESOURCE_MINUTES,
        m => m,
    }
}

/// Unknown resource levels sit in the middle of the scale.
fn level_distance(resource: &Resource, learner: Level) -> u8 {
    resource.level.map_or(1, |level| level.distance(learner))
}

/// Candidates in preference order: fitting `cap` first, then closest level, then the
/// order retrieval returned them in. Resources already used elsewhere are skipped.
pub(crate) fn ranked<'a>(
    cards: &'a [ResourceCard],
    learner: Level,
    cap: u32,
    used: &HashSet<ResourceId>,
) -> Vec<&'a ResourceCard> {
    let mut ranked: Vec<(usize, &ResourceCard)> = cards
        .iter()
        .enumerate()
        .filter(|(_, c)| !used.contains(&c.resource.id))
        .collect();
    ranked.sort_by_key(|(rank, c)| {
        (
            minutes_of(&c.resource) > cap,
            level_distance(&c.resource, learner),
            *rank,
        )
    });
    ranked.into_iter().map(|(_, c)| c).collect()
}

/// Pick one resource that fits `cap`, plus a second when the pair still fits `pair_cap`.
/// `None` when nothing fits.
pub(crate) fn choose<'a>(
    cards: &'a [ResourceCard],
    learner: Level,
    cap: u32,
    pair_cap: u32,
    max_resources: usize,
    used: &HashSet<ResourceId>,
) -> Option<Vec<&'a ResourceCard>> {
    let ranked = ranked(cards, learner, cap, used);
    let first = *ranked.first()?;
    let mut total = minutes_of(&first.resource);
    if total > cap {
        return None;
    }

    let mut picks = vec![first];
    let pair_cap = pair_cap.min(cap);
    for &card in ranked.iter().skip(1) {
        if picks.len() >= max_resources {
            break;
        }
        let minutes = minutes_of(&card.resource);
        if total + minutes <= pair_cap {
            total += minutes;
            picks.push(card);
        }
    }
    Some(picks)
}

/// Shortest candidate that fits `cap`, for replanning substitutions.
pub(crate) fn shortest_fitting<'a>(
    cards: &'a [ResourceCard],
    cap: u32,
    used: &HashSet<ResourceId>,
) -> Option<&'a ResourceCard> {
    cards
        .iter()
        .filter(|c| !used.contains(&c.resource.id))
        .filter(|c| minutes_of(&c.resource) <= cap)
        .min_by_key(|c| (minutes_of(&c.resource), c.resource.id.clone()))
}

pub(crate) fn lesson_resource(card: &ResourceCard) -> LessonResource {
    let resource = &card.resource;
    LessonResource {
        resource_id: resource.id.clone(),
        title: resource.title.clone(),
        url: resource.url.clone(),
        duration_min: minutes_of(resource),
        level: resource.level,
        skills: resource.skills.clone(),
        why_included: card.why_relevant.clone(),
    }
}

/// A lesson for `skill`, not yet placed in a week.
pub(crate) fn lesson(skill: &Skill, resources: Vec<LessonResource>, note: Option<String>) -> Lesson {
    let duration_min = resources.iter().map(|r| r.duration_min).sum();
    Lesson {
        id: LessonId::new(),
        week: 0,
        seq: 0,
        title: skill.name.clone(),
        skill_id: skill.id.clone(),
        skill_name: skill.name.clone(),
        resources,
        duration_min,
        note,
    }
}
