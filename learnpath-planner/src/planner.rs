//! Plan construction and replanning.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use learnpath_core::context::RequestContext;
use learnpath_core::ids::{LessonId, PlanId, ResourceId, SkillId, UserId};
use learnpath_core::model::{
    Goal, Lesson, LessonResource, Plan, PlanSummary, PrerequisiteEdge, Progress, ProgressStatus,
    Skill, hours_to_minutes, minutes_to_hours,
};
use learnpath_core::store::{PlanStore, SkillStore};
use learnpath_core::{GraphError, IdempotencyCache, SkillGraph};
use learnpath_retrieval::{Facets, ResourceCard, RetrievalError, SearchRequest};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::finder::ResourceFinder;
use crate::request::{PlanRequest, ReplanRequest};
use crate::schedule::WeekPacker;
use crate::select::{self, minutes_of};
use crate::targets;
use crate::{PlanError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Hits requested for the goal-level search.
    pub goal_top_k: u32,
    /// Hits requested per skill.
    pub skill_top_k: u32,
    pub max_resources_per_lesson: usize,
    pub idempotency_ttl_secs: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            goal_top_k: 20,
            skill_top_k: 10,
            max_resources_per_lesson: 2,
            idempotency_ttl_secs: 600,
        }
    }
}

pub struct Planner {
    skills: Arc<dyn SkillStore>,
    plans: Arc<dyn PlanStore>,
    finder: Arc<dyn ResourceFinder>,
    config: PlannerConfig,
    replays: IdempotencyCache<Plan>,
}

type SkillHits = std::result::Result<Vec<ResourceCard>, RetrievalError>;

impl Planner {
    pub fn new(
        skills: Arc<dyn SkillStore>,
        plans: Arc<dyn PlanStore>,
        finder: Arc<dyn ResourceFinder>,
        config: PlannerConfig,
    ) -> Self {
        let replays = IdempotencyCache::new(Duration::from_secs(config.idempotency_ttl_secs));
        Self {
            skills,
            plans,
            finder,
            config,
            replays,
        }
    }

    async fn load_graph(&self) -> Result<SkillGraph> {
        let skills = self.skills.list_skills().await?;
        let edges = self.skills.list_prerequisites().await?;
        Ok(SkillGraph::load(skills, edges))
    }

    fn search_for(&self, goal: &Goal, skill: Option<(&SkillId, &str)>, top_k: u32) -> SearchRequest {
        let mut facets = Facets {
            media_types: goal.preference_list("media_types"),
            providers: goal.preference_list("providers"),
            ..Facets::default()
        };
        let query = match skill {
            Some((id, name)) => {
                facets.skills.push(id.clone());
                format!("{} {}", goal.objective, name)
            }
            None => goal.objective.clone(),
        };
        SearchRequest::new(query).with_filters(facets).with_top_k(top_k)
    }

    async fn search_per_skill(&self, ctx: &RequestContext, goal: &Goal, skills: &[Skill]) -> Vec<SkillHits> {
        let requests: Vec<SearchRequest> = skills
            .iter()
            .map(|s| self.search_for(goal, Some((&s.id, &s.name)), self.config.skill_top_k))
            .collect();
        join_all(requests.iter().map(|r| self.finder.find(ctx, r)))
            .await
            .into_iter()
            .map(|r| r.map(|outcome| outcome.cards))
            .collect()
    }

    #[instrument(skip(self, ctx, request), fields(request_id = %ctx.request_id, tenant_id = %ctx.tenant))]
    pub async fn create_plan(&self, ctx: &RequestContext, request: &PlanRequest) -> Result<Plan> {
        request.validate()?;
        if let Some(plan) = self.replays.lookup("create_plan", ctx) {
            info!(plan_id = %plan.id, "returning plan for repeated idempotency key");
            return Ok(plan);
        }

        let goal = request.to_goal();
        let graph = self.load_graph().await?;

        let goal_hits = match self
            .finder
            .find(ctx, &self.search_for(&goal, None, self.config.goal_top_k))
            .await
        {
            Ok(outcome) => outcome.cards,
            Err(e) => {
                warn!(error = %e, "goal search failed, matching targets from the catalog only");
                Vec::new()
            }
        };

        let (targets, source) = targets::resolve(&goal, &graph, &goal_hits)
            .ok_or_else(|| PlanError::NoMatchingSkills(goal.objective.clone()))?;
        let known = targets::known(&goal, &graph);
        let wanted = graph.with_prerequisites(targets.iter());

        let needed: HashSet<SkillId> = wanted.difference(&known).cloned().collect();
        let mut prerequisites_met: Vec<SkillId> = wanted.intersection(&known).cloned().collect();
        prerequisites_met.sort();

        let mut ordered = graph.order(&needed)?;
        let mut uncatalogued: Vec<&SkillId> = targets
            .iter()
            .filter(|id| graph.skill(id).is_none())
            .collect();
        uncatalogued.sort();
        ordered.extend(
            uncatalogued
                .into_iter()
                .map(|id| Skill::new(id.clone(), id.as_str(), id.as_str())),
        );

        let mut reasoning = vec![format!(
            "Targeted {} from {}.",
            join_names(&graph, &targets),
            source.describe()
        )];
        if !prerequisites_met.is_empty() {
            reasoning.push(format!(
                "Skipped already known: {}.",
                join_names(&graph, &prerequisites_met)
            ));
        }
        if !ordered.is_empty() {
            let names: Vec<&str> = ordered.iter().map(|s| s.name.as_str()).collect();
            reasoning.push(format!("Prerequisite order: {}.", names.join(" -> ")));
        }

        let hits = self.search_per_skill(ctx, &goal, &ordered).await;
        let (lessons, weeks, notes) = self.build_lessons(&goal, &graph, &ordered, hits);
        let scheduled: u32 = lessons.iter().map(|l| l.duration_min).sum();
        reasoning.push(format!(
            "Scheduled {} lesson(s) over {} week(s) at up to {} h/week, using {} of {} h.",
            lessons.len(),
            weeks,
            goal.hours_per_week,
            minutes_to_hours(scheduled),
            goal.time_budget_hours
        ));
        reasoning.extend(notes);

        let owner = ctx
            .user_id
            .clone()
            .or_else(|| request.user_id.clone())
            .unwrap_or_else(|| ctx.owner());
        let now = Utc::now();
        let plan = Plan {
            id: PlanId::new(),
            tenant: ctx.tenant.clone(),
            user_id: owner,
            goal,
            lessons,
            total_weeks: weeks,
            reasoning,
            prerequisites_met,
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        self.plans.insert_plan(&plan).await?;
        self.replays.remember("create_plan", ctx, plan.clone());

        info!(plan_id = %plan.id, weeks, lessons = plan.lessons.len(), "plan created");
        Ok(plan)
    }

    /// Choose resources per skill in order and pack them into weeks.
    fn build_lessons(
        &self,
        goal: &Goal,
        graph: &SkillGraph,
        ordered: &[Skill],
        hits: Vec<SkillHits>,
    ) -> (Vec<Lesson>, u32, Vec<String>) {
        let weekly = goal.weekly_minutes();
        let mut budget_left = goal.budget_minutes();
        let mut packer = WeekPacker::new(weekly);
        let mut used: HashSet<ResourceId> = HashSet::new();
        let mut deferred: Vec<SkillId> = Vec::new();
        let mut lessons = Vec::new();
        let mut notes = Vec::new();

        // Budget held back so later skills can still get their shortest resource.
        let minimums: Vec<u32> = hits
            .iter()
            .map(|r| match r {
                Ok(cards) => cards
                    .iter()
                    .map(|c| minutes_of(&c.resource))
                    .filter(|&m| packer.admits(m))
                    .min()
                    .unwrap_or(0),
                Err(_) => 0,
            })
            .collect();

        for (i, (skill, result)) in ordered.iter().zip(hits).enumerate() {
            if let Some(blocker) = deferred
                .iter()
                .find(|d| graph.depends_on(&skill.id, d))
                .map(|d| display_name(graph, d))
            {
                notes.push(format!(
                    "Deferred {}: its prerequisite {blocker} was deferred.",
                    skill.name
                ));
                deferred.push(skill.id.clone());
                continue;
            }

            let cards = match result {
                Ok(cards) if !cards.is_empty() => cards,
                Ok(_) => {
                    let mut lesson = select::lesson(
                        skill,
                        Vec::new(),
                        Some("No matching resources were found for this skill yet.".into()),
                    );
                    packer.place(&mut lesson);
                    notes.push(format!("No resources found for {}.", skill.name));
                    lessons.push(lesson);
                    continue;
                }
                Err(e) => {
                    warn!(skill_id = %skill.id, error = %e, "resource search failed for skill");
                    let mut lesson = select::lesson(
                        skill,
                        Vec::new(),
                        Some("Resource search failed for this skill; replan later to fill it.".into()),
                    );
                    packer.place(&mut lesson);
                    notes.push(format!("Resource search failed for {}.", skill.name));
                    lessons.push(lesson);
                    continue;
                }
            };

            if cards.iter().all(|c| used.contains(&c.resource.id)) {
                notes.push(format!(
                    "{} is covered by resources scheduled for earlier lessons.",
                    skill.name
                ));
                continue;
            }

            let cap = weekly.min(budget_left);
            let reserve: u32 = minimums[i + 1..].iter().sum();
            let pair_cap = budget_left.saturating_sub(reserve);
            match select::choose(
                &cards,
                goal.level,
                cap,
                pair_cap,
                self.config.max_resources_per_lesson,
                &used,
            ) {
                Some(picks) => {
                    used.extend(picks.iter().map(|c| c.resource.id.clone()));
                    let resources = picks.into_iter().map(select::lesson_resource).collect();
                    let mut lesson = select::lesson(skill, resources, None);
                    budget_left = budget_left.saturating_sub(lesson.duration_min);
                    packer.place(&mut lesson);
                    lessons.push(lesson);
                }
                None => {
                    let shortest = cards
                        .iter()
                        .map(|c| minutes_of(&c.resource))
                        .min()
                        .unwrap_or(0);
                    notes.push(format!(
                        "Deferred {}: its shortest resource takes {shortest} min but only {cap} min fit.",
                        skill.name
                    ));
                    deferred.push(skill.id.clone());
                }
            }
        }

        (lessons, packer.weeks(), notes)
    }

    /// Load a plan visible to the caller's tenant.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id, tenant_id = %ctx.tenant))]
    pub async fn get_plan(&self, ctx: &RequestContext, plan_id: PlanId) -> Result<Plan> {
        self.plans
            .get_plan(plan_id)
            .await?
            .filter(|plan| plan.tenant == ctx.tenant)
            .ok_or_else(|| PlanError::NotFound(format!("plan {plan_id}")))
    }

    pub async fn list_user_plans(&self, ctx: &RequestContext, user: &UserId) -> Result<Vec<PlanSummary>> {
        Ok(self.plans.list_plans(&ctx.tenant, user).await?)
    }

    /// Progress rows the caller has recorded against a plan.
    pub async fn progress(&self, ctx: &RequestContext, plan_id: PlanId) -> Result<Vec<Progress>> {
        let plan = self.get_plan(ctx, plan_id).await?;
        let learner = ctx.user_id.clone().unwrap_or(plan.user_id);
        Ok(self.plans.list_progress(plan_id, &learner).await?)
    }

    /// Persist a prerequisite edge after checking it keeps the graph acyclic.
    ///
    /// The graph is read again after the write: a concurrent insert of the reverse edge can
    /// pass the first check too, and whichever writer then sees the cycle removes its edge.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn add_prerequisite(&self, ctx: &RequestContext, edge: &PrerequisiteEdge) -> Result<()> {
        let graph = self.load_graph().await?;
        graph.check_prerequisite(&edge.from, &edge.to)?;
        self.skills.insert_prerequisite(edge).await?;

        let after = self.load_graph().await?;
        if after.depends_on(&edge.from, &edge.to) {
            warn!(from = %edge.from, to = %edge.to, "concurrent insert closed a cycle; rolling back");
            self.skills.remove_prerequisite(edge).await?;
            return Err(GraphError::Cycle {
                from: edge.from.clone(),
                to: edge.to.clone(),
            }
            .into());
        }
        info!(from = %edge.from, to = %edge.to, "prerequisite added");
        Ok(())
    }

    #[instrument(skip(self, ctx, request), fields(request_id = %ctx.request_id, plan_id = %plan_id))]
    pub async fn replan(&self, ctx: &RequestContext, plan_id: PlanId, request: &ReplanRequest) -> Result<Plan> {
        request.validate()?;
        let operation = format!("replan:{plan_id}");
        if let Some(plan) = self.replays.lookup(&operation, ctx) {
            info!("returning replan for repeated idempotency key");
            return Ok(plan);
        }

        let mut plan = self.get_plan(ctx, plan_id).await?;
        let graph = self.load_graph().await?;
        let completed: HashSet<&ResourceId> = request.completed_resources.iter().collect();

        let mut finished: Vec<Lesson> = Vec::new();
        let mut remaining: Vec<Lesson> = Vec::new();
        let mut credited: Vec<(LessonId, ProgressStatus, u32)> = Vec::new();
        for mut lesson in std::mem::take(&mut plan.lessons) {
            let done: Vec<&LessonResource> = lesson
                .resources
                .iter()
                .filter(|r| completed.contains(&r.resource_id))
                .collect();
            let done_minutes: u32 = done.iter().map(|r| r.duration_min).sum();

            if !lesson.resources.is_empty() && done.len() == lesson.resources.len() {
                credited.push((lesson.id, ProgressStatus::Done, done_minutes));
                finished.push(lesson);
            } else if !done.is_empty() {
                credited.push((lesson.id, ProgressStatus::InProgress, done_minutes));
                lesson.resources.retain(|r| !completed.contains(&r.resource_id));
                lesson.duration_min = lesson.resource_minutes();
                remaining.push(lesson);
            } else {
                remaining.push(lesson);
            }
        }

        let learner = ctx.user_id.clone().unwrap_or_else(|| plan.user_id.clone());
        let now = Utc::now();
        let weights: Vec<u32> = credited.iter().map(|(_, _, m)| *m).collect();
        let progress: Vec<Progress> = credited
            .iter()
            .zip(spread_minutes(hours_to_minutes(request.time_spent_hours), &weights))
            .map(|((lesson_id, status, _), minutes)| Progress {
                lesson_id: *lesson_id,
                plan_id,
                user_id: learner.clone(),
                status: *status,
                minutes_spent: minutes,
                quiz_score: None,
                updated_at: now,
            })
            .collect();

        let (mut budget_left, budget_source) = match request.remaining_time_hours {
            Some(hours) => (hours_to_minutes(hours), "as given"),
            None => (
                hours_to_minutes((plan.goal.time_budget_hours - request.time_spent_hours).max(0.0)),
                "budget minus time spent",
            ),
        };
        let starting_budget = budget_left;

        let weekly = plan.goal.weekly_minutes();
        let mut packer = WeekPacker::new(weekly);
        let mut used: HashSet<ResourceId> = remaining
            .iter()
            .flat_map(|l| l.resources.iter().map(|r| r.resource_id.clone()))
            .chain(request.completed_resources.iter().cloned())
            .collect();
        let mut deferred: Vec<SkillId> = Vec::new();
        let mut notes = Vec::new();
        let mut lessons = Vec::new();

        for mut lesson in remaining {
            if let Some(blocker) = deferred
                .iter()
                .find(|d| graph.depends_on(&lesson.skill_id, d))
                .map(|d| display_name(&graph, d))
            {
                notes.push(format!(
                    "Deferred {}: its prerequisite {blocker} was deferred.",
                    lesson.skill_name
                ));
                deferred.push(lesson.skill_id.clone());
                continue;
            }

            let cap = weekly.min(budget_left);
            if lesson.resources.is_empty() {
                self.fill_empty(ctx, &plan.goal, &mut lesson, cap, &mut used, &mut notes)
                    .await;
            } else if lesson.duration_min > cap {
                match self.substitute(ctx, &plan.goal, &lesson, cap, &used).await {
                    Some(resource) => {
                        notes.push(format!(
                            "Swapped {} to a {} min resource to fit the remaining time.",
                            lesson.skill_name, resource.duration_min
                        ));
                        used.insert(resource.resource_id.clone());
                        lesson.resources = vec![resource];
                        lesson.duration_min = lesson.resource_minutes();
                        lesson.note = Some("Shortened during replanning.".into());
                    }
                    None => {
                        notes.push(format!(
                            "Deferred {}: needs {} min but only {cap} min fit and no shorter resource exists.",
                            lesson.skill_name, lesson.duration_min
                        ));
                        deferred.push(lesson.skill_id.clone());
                        continue;
                    }
                }
            }

            budget_left = budget_left.saturating_sub(lesson.duration_min);
            packer.place(&mut lesson);
            lessons.push(lesson);
        }

        for lesson in &finished {
            if !plan.prerequisites_met.contains(&lesson.skill_id) {
                plan.prerequisites_met.push(lesson.skill_id.clone());
            }
        }

        plan.revision += 1;
        let mut reasoning = vec![
            format!(
                "Revision {}: {} lesson(s) completed, {} rescheduled over {} week(s).",
                plan.revision,
                finished.len(),
                lessons.len(),
                packer.weeks()
            ),
            format!(
                "Remaining budget {} h ({budget_source}).",
                minutes_to_hours(starting_budget)
            ),
        ];
        reasoning.extend(notes);
        if let Some(feedback) = request.feedback.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
            reasoning.push(format!("Learner feedback: {feedback}"));
        }

        plan.lessons = lessons;
        plan.total_weeks = packer.weeks();
        plan.reasoning = reasoning;
        plan.updated_at = now;

        if !progress.is_empty() {
            self.plans.record_progress(&progress).await?;
        }
        self.plans.update_plan(&plan).await?;
        self.replays.remember(&operation, ctx, plan.clone());

        info!(revision = plan.revision, weeks = plan.total_weeks, "plan replanned");
        Ok(plan)
    }

    /// Shortest replacement for a lesson that no longer fits: first among its own
    /// resources, then from a fresh search bounded by `cap`.
    async fn substitute(
        &self,
        ctx: &RequestContext,
        goal: &Goal,
        lesson: &Lesson,
        cap: u32,
        used: &HashSet<ResourceId>,
    ) -> Option<LessonResource> {
        if let Some(own) = lesson
            .resources
            .iter()
            .filter(|r| r.duration_min <= cap)
            .min_by_key(|r| r.duration_min)
        {
            return Some(own.clone());
        }
        if cap == 0 {
            return None;
        }

        let mut request = self.search_for(
            goal,
            Some((&lesson.skill_id, &lesson.skill_name)),
            self.config.skill_top_k,
        );
        request.filters.max_duration = Some(cap);
        match self.finder.find(ctx, &request).await {
            Ok(outcome) => {
                select::shortest_fitting(&outcome.cards, cap, used).map(select::lesson_resource)
            }
            Err(e) => {
                warn!(skill_id = %lesson.skill_id, error = %e, "substitute search failed");
                None
            }
        }
    }

    /// Retry the search for a lesson that was created without resources.
    async fn fill_empty(
        &self,
        ctx: &RequestContext,
        goal: &Goal,
        lesson: &mut Lesson,
        cap: u32,
        used: &mut HashSet<ResourceId>,
        notes: &mut Vec<String>,
    ) {
        let request = self.search_for(
            goal,
            Some((&lesson.skill_id, &lesson.skill_name)),
            self.config.skill_top_k,
        );
        let cards = match self.finder.find(ctx, &request).await {
            Ok(outcome) => outcome.cards,
            Err(e) => {
                warn!(skill_id = %lesson.skill_id, error = %e, "resource search failed again");
                return;
            }
        };
        if let Some(picks) = select::choose(
            &cards,
            goal.level,
            cap,
            cap,
            self.config.max_resources_per_lesson,
            used,
        ) {
            used.extend(picks.iter().map(|c| c.resource.id.clone()));
            lesson.resources = picks.into_iter().map(select::lesson_resource).collect();
            lesson.duration_min = lesson.resource_minutes();
            lesson.note = None;
            notes.push(format!("Found resources for {}.", lesson.skill_name));
        }
    }
}

/// Split `spent` minutes in proportion to `weights`; the last share absorbs rounding.
/// Zero weights split evenly.
fn spread_minutes(spent: u32, weights: &[u32]) -> Vec<u32> {
    if weights.is_empty() {
        return Vec::new();
    }
    let total: u64 = weights.iter().map(|&w| u64::from(w)).sum();
    let mut shares: Vec<u32> = if total == 0 {
        vec![spent / weights.len() as u32; weights.len()]
    } else {
        weights
            .iter()
            .map(|&w| (u64::from(spent) * u64::from(w) / total) as u32)
            .collect()
    };
    let assigned: u32 = shares.iter().sum();
    if let Some(last) = shares.last_mut() {
        *last += spent - assigned;
    }
    shares
}

fn display_name(graph: &SkillGraph, id: &SkillId) -> String {
    graph
        .skill(id)
        .map_or_else(|| id.to_string(), |s| s.name.clone())
}

fn join_names(graph: &SkillGraph, ids: &[SkillId]) -> String {
    ids.iter()
        .map(|id| display_name(graph, id))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use learnpath_core::context::{RequestId, TenantId};
    use learnpath_core::model::{Level, Resource};
    use learnpath_retrieval::SearchOutcome;
    use learnpath_store::TursoStore;
    use std::collections::HashMap;

    /// Serves fixed cards per skill and honours the facet filter.
    #[derive(Default)]
    struct StubFinder {
        by_skill: HashMap<String, Vec<Resource>>,
        failing: HashSet<String>,
    }

    impl StubFinder {
        fn with(mut self, skill: &str, resources: Vec<Resource>) -> Self {
            self.by_skill.insert(skill.to_string(), resources);
            self
        }

        fn failing(mut self, skill: &str) -> Self {
            self.failing.insert(skill.to_string());
            self
        }
    }

    #[async_trait]
    impl ResourceFinder for StubFinder {
        async fn find(
            &self,
            _ctx: &RequestContext,
            request: &SearchRequest,
        ) -> std::result::Result<SearchOutcome, RetrievalError> {
            let Some(skill) = request.filters.skills.first() else {
                return Ok(SearchOutcome { cards: vec![], reranked: false });
            };
            if self.failing.contains(skill.as_str()) {
                return Err(RetrievalError::EmbeddingUnavailable("connection refused".into()));
            }
            let cards = self
                .by_skill
                .get(skill.as_str())
                .into_iter()
                .flatten()
                .filter(|r| request.filters.matches(r))
                .map(|r| ResourceCard {
                    resource: r.clone(),
                    score: 0.8,
                    why_relevant: format!("teaches {skill}"),
                })
                .collect();
            Ok(SearchOutcome { cards, reranked: false })
        }
    }

    fn resource(id: &str, skill: &str, minutes: u32) -> Resource {
        Resource::new(id, format!("{id} course"), format!("https://learn.example/{id}"))
            .with_skills([skill])
            .with_duration(minutes)
            .with_level(Level::Basic)
    }

    fn python_finder() -> StubFinder {
        StubFinder::default()
            .with("syntax", vec![resource("syntax-1", "syntax", 180), resource("syntax-2", "syntax", 60)])
            .with("vars", vec![resource("vars-1", "vars", 120)])
            .with("control", vec![resource("control-1", "control", 150)])
            .with("basics", vec![resource("basics-1", "basics", 120)])
    }

    async fn python_store() -> Arc<TursoStore> {
        let store = Arc::new(TursoStore::new_memory().await.unwrap());
        for skill in [
            Skill::new("syntax", "Python Syntax", "python-syntax"),
            Skill::new("vars", "Variables", "variables"),
            Skill::new("control", "Control Flow", "control-flow"),
            Skill::new("basics", "Python Basics", "python-basics"),
        ] {
            store.upsert_skill(&skill).await.unwrap();
        }
        for (from, to) in [("syntax", "vars"), ("vars", "control"), ("control", "basics")] {
            store
                .insert_prerequisite(&PrerequisiteEdge::new(from, to))
                .await
                .unwrap();
        }
        store
    }

    fn planner(store: Arc<TursoStore>, finder: StubFinder, config: PlannerConfig) -> Planner {
        Planner::new(store.clone(), store, Arc::new(finder), config)
    }

    fn ctx(tenant: &str) -> RequestContext {
        RequestContext::new(RequestId::generate(), TenantId::new(tenant)).with_user("learner-1")
    }

    fn position(plan: &Plan, skill: &str) -> (u32, u32) {
        let lesson = plan
            .lessons
            .iter()
            .find(|l| l.skill_id.as_str() == skill)
            .unwrap();
        (lesson.week, lesson.seq)
    }

    #[tokio::test]
    async fn python_basics_fits_two_weeks_of_five_hours() {
        let store = python_store().await;
        let planner = planner(store, python_finder(), PlannerConfig::default());

        let plan = planner
            .create_plan(&ctx("acme"), &PlanRequest::new("Learn Python basics", 10.0, 5.0))
            .await
            .unwrap();

        assert_eq!(plan.total_weeks, 2);
        for week in 1..=plan.total_weeks {
            assert!(plan.week_minutes(week) <= 300, "week {week} over budget");
        }
        assert!(plan.total_minutes() <= 600);
        assert_eq!(plan.lessons.len(), 4);

        assert!(position(&plan, "syntax") < position(&plan, "vars"));
        assert!(position(&plan, "vars") < position(&plan, "control"));
        assert!(position(&plan, "control") < position(&plan, "basics"));

        let syntax = plan.lessons.iter().find(|l| l.skill_id.as_str() == "syntax").unwrap();
        assert_eq!(syntax.resources.len(), 1, "second resource would starve later skills");
        assert_eq!(plan.user_id.as_str(), "learner-1");
    }

    #[tokio::test]
    async fn known_skills_are_skipped() {
        let store = python_store().await;
        let planner = planner(store, python_finder(), PlannerConfig::default());
        let request = PlanRequest::new("Learn Python basics", 10.0, 5.0).with_current_skills(["Variables"]);

        let plan = planner.create_plan(&ctx("acme"), &request).await.unwrap();
        let skills: Vec<_> = plan.lessons.iter().map(|l| l.skill_id.as_str()).collect();
        assert_eq!(skills, vec!["control", "basics"]);
        assert_eq!(plan.prerequisites_met, vec![SkillId::new("syntax"), SkillId::new("vars")]);
    }

    #[tokio::test]
    async fn retrieval_failure_yields_an_empty_lesson() {
        let store = python_store().await;
        let planner = planner(store, python_finder().failing("control"), PlannerConfig::default());

        let plan = planner
            .create_plan(&ctx("acme"), &PlanRequest::new("Learn Python basics", 10.0, 5.0))
            .await
            .unwrap();
        let control = plan.lessons.iter().find(|l| l.skill_id.as_str() == "control").unwrap();
        assert!(control.resources.is_empty());
        assert!(control.note.is_some());
        assert!(plan.reasoning.iter().any(|r| r.contains("Control Flow")));
    }

    #[tokio::test]
    async fn over_budget_skills_and_their_dependents_are_deferred() {
        let store = python_store().await;
        let planner = planner(store, python_finder(), PlannerConfig::default());

        let plan = planner
            .create_plan(&ctx("acme"), &PlanRequest::new("Learn Python basics", 5.0, 5.0))
            .await
            .unwrap();
        let skills: Vec<_> = plan.lessons.iter().map(|l| l.skill_id.as_str()).collect();
        assert_eq!(skills, vec!["syntax", "vars"]);
        assert!(plan.reasoning.iter().any(|r| r.starts_with("Deferred Control Flow")));
        assert!(plan.reasoning.iter().any(|r| r.starts_with("Deferred Python Basics")));
    }

    #[tokio::test]
    async fn unmatched_goal_is_rejected() {
        let store = python_store().await;
        let planner = planner(store, python_finder(), PlannerConfig::default());
        let err = planner
            .create_plan(&ctx("acme"), &PlanRequest::new("Learn Haskell", 10.0, 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NoMatchingSkills(_)));
    }

    #[tokio::test]
    async fn idempotency_key_replays_the_first_plan() {
        let store = python_store().await;
        let planner = planner(store.clone(), python_finder(), PlannerConfig::default());
        let ctx = ctx("acme").with_idempotency_key(Some("k-1".into()));
        let request = PlanRequest::new("Learn Python basics", 10.0, 5.0);

        let first = planner.create_plan(&ctx, &request).await.unwrap();
        let second = planner.create_plan(&ctx, &request).await.unwrap();
        assert_eq!(first.id, second.id);

        let plans = store
            .list_plans(&TenantId::new("acme"), &UserId::new("learner-1"))
            .await
            .unwrap();
        assert_eq!(plans.len(), 1);
    }

    #[tokio::test]
    async fn plans_are_invisible_to_other_tenants() {
        let store = python_store().await;
        let planner = planner(store, python_finder(), PlannerConfig::default());
        let plan = planner
            .create_plan(&ctx("acme"), &PlanRequest::new("Learn Python basics", 10.0, 5.0))
            .await
            .unwrap();

        assert!(planner.get_plan(&ctx("acme"), plan.id).await.is_ok());
        let err = planner.get_plan(&ctx("other-tenant"), plan.id).await.unwrap_err();
        assert!(matches!(err, PlanError::NotFound(_)));
    }

    #[tokio::test]
    async fn replan_keeps_identity_and_records_progress() {
        let store = python_store().await;
        let planner = planner(store, python_finder(), PlannerConfig::default());
        let ctx = ctx("acme");
        let plan = planner
            .create_plan(&ctx, &PlanRequest::new("Learn Python basics", 10.0, 5.0))
            .await
            .unwrap();

        let request = ReplanRequest {
            completed_resources: vec![ResourceId::new("syntax-1")],
            time_spent_hours: 3.5,
            remaining_time_hours: None,
            feedback: Some("Going well".into()),
        };
        let revised = planner.replan(&ctx, plan.id, &request).await.unwrap();

        assert_eq!(revised.id, plan.id);
        assert_eq!(revised.revision, 1);
        assert_eq!(revised.lessons.len(), 3);
        assert_eq!(revised.lessons[0].skill_id.as_str(), "vars");
        assert_eq!((revised.lessons[0].week, revised.lessons[0].seq), (1, 1));
        assert!(revised.prerequisites_met.contains(&SkillId::new("syntax")));
        assert!(revised.reasoning.iter().any(|r| r.contains("Going well")));

        let progress = planner.progress(&ctx, plan.id).await.unwrap();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].status, ProgressStatus::Done);
        assert_eq!(progress[0].minutes_spent, 210);

        let stored = planner.get_plan(&ctx, plan.id).await.unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.lessons, revised.lessons);
    }

    #[tokio::test]
    async fn replan_shortfall_defers_and_reports() {
        let store = python_store().await;
        let planner = planner(store, python_finder(), PlannerConfig::default());
        let ctx = ctx("acme");
        let plan = planner
            .create_plan(&ctx, &PlanRequest::new("Learn Python basics", 10.0, 5.0))
            .await
            .unwrap();

        let request = ReplanRequest {
            completed_resources: vec![ResourceId::new("syntax-1")],
            time_spent_hours: 3.0,
            remaining_time_hours: Some(0.5),
            feedback: None,
        };
        let revised = planner.replan(&ctx, plan.id, &request).await.unwrap();

        assert!(revised.lessons.is_empty());
        assert!(revised.reasoning.iter().any(|r| r.starts_with("Deferred Variables")));
        assert!(revised.reasoning.iter().any(|r| r.starts_with("Deferred Control Flow")));
        assert!(revised.reasoning.iter().any(|r| r.starts_with("Deferred Python Basics")));
    }

    #[tokio::test]
    async fn replan_substitutes_a_shorter_resource() {
        let store = python_store().await;
        let finder = python_finder().with(
            "vars",
            vec![resource("vars-1", "vars", 120), resource("vars-short", "vars", 25)],
        );
        let config = PlannerConfig {
            max_resources_per_lesson: 1,
            ..PlannerConfig::default()
        };
        let planner = planner(store, finder, config);
        let ctx = ctx("acme");
        let plan = planner
            .create_plan(&ctx, &PlanRequest::new("Learn Python basics", 10.0, 5.0))
            .await
            .unwrap();

        let request = ReplanRequest {
            completed_resources: vec![ResourceId::new("syntax-1")],
            time_spent_hours: 3.0,
            remaining_time_hours: Some(0.5),
            feedback: None,
        };
        let revised = planner.replan(&ctx, plan.id, &request).await.unwrap();
        let vars = &revised.lessons[0];
        assert_eq!(vars.skill_id.as_str(), "vars");
        assert_eq!(vars.resources[0].resource_id.as_str(), "vars-short");
        assert!(revised.lessons.iter().all(|l| l.skill_id.as_str() == "vars"));
    }

    #[tokio::test]
    async fn replan_of_unknown_plan_is_not_found() {
        let store = python_store().await;
        let planner = planner(store, python_finder(), PlannerConfig::default());
        let err = planner
            .replan(&ctx("acme"), PlanId::new(), &ReplanRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NotFound(_)));
    }

    #[tokio::test]
    async fn cyclic_prerequisite_is_a_conflict() {
        let store = python_store().await;
        let planner = planner(store.clone(), python_finder(), PlannerConfig::default());
        let err = planner
            .add_prerequisite(&ctx("acme"), &PrerequisiteEdge::new("basics", "syntax"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Conflict(_)));
        assert_eq!(store.list_prerequisites().await.unwrap().len(), 3);

        planner
            .add_prerequisite(&ctx("acme"), &PrerequisiteEdge::new("syntax", "control"))
            .await
            .unwrap();
        assert_eq!(store.list_prerequisites().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn bad_stored_edges_elsewhere_do_not_block_planning() {
        let store = python_store().await;
        for skill in [
            Skill::new("topics", "Kafka Topics", "kafka-topics"),
            Skill::new("brokers", "Kafka Brokers", "kafka-brokers"),
        ] {
            store.upsert_skill(&skill).await.unwrap();
        }
        for (from, to) in [("ghost", "topics"), ("topics", "brokers"), ("brokers", "topics")] {
            store
                .insert_prerequisite(&PrerequisiteEdge::new(from, to))
                .await
                .unwrap();
        }
        let planner = planner(store, python_finder(), PlannerConfig::default());

        let plan = planner
            .create_plan(&ctx("acme"), &PlanRequest::new("Learn Python basics", 10.0, 5.0))
            .await
            .unwrap();
        assert_eq!(plan.lessons.len(), 4);
        assert!(plan.lessons.iter().all(|l| !["topics", "brokers"].contains(&l.skill_id.as_str())));

        planner
            .add_prerequisite(&ctx("acme"), &PrerequisiteEdge::new("syntax", "control"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stored_cycle_among_needed_skills_is_a_conflict() {
        let store = python_store().await;
        store
            .insert_prerequisite(&PrerequisiteEdge::new("basics", "syntax"))
            .await
            .unwrap();
        let planner = planner(store, python_finder(), PlannerConfig::default());

        let err = planner
            .create_plan(&ctx("acme"), &PlanRequest::new("Learn Python basics", 10.0, 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Conflict(_)));
    }

    /// Writes the reverse edge alongside every insert, as a concurrent writer would.
    struct RacingSkills {
        inner: Arc<TursoStore>,
    }

    #[async_trait]
    impl SkillStore for RacingSkills {
        async fn list_skills(&self) -> learnpath_core::store::Result<Vec<Skill>> {
            self.inner.list_skills().await
        }

        async fn list_prerequisites(&self) -> learnpath_core::store::Result<Vec<PrerequisiteEdge>> {
            self.inner.list_prerequisites().await
        }

        async fn upsert_skill(&self, skill: &Skill) -> learnpath_core::store::Result<()> {
            self.inner.upsert_skill(skill).await
        }

        async fn insert_prerequisite(&self, edge: &PrerequisiteEdge) -> learnpath_core::store::Result<()> {
            self.inner
                .insert_prerequisite(&PrerequisiteEdge::new(edge.to.clone(), edge.from.clone()))
                .await?;
            self.inner.insert_prerequisite(edge).await
        }

        async fn remove_prerequisite(&self, edge: &PrerequisiteEdge) -> learnpath_core::store::Result<()> {
            self.inner.remove_prerequisite(edge).await
        }
    }

    #[tokio::test]
    async fn edge_that_races_into_a_cycle_is_rolled_back() {
        let store = Arc::new(TursoStore::new_memory().await.unwrap());
        for skill in [Skill::new("a", "A", "a"), Skill::new("b", "B", "b")] {
            store.upsert_skill(&skill).await.unwrap();
        }
        let planner = Planner::new(
            Arc::new(RacingSkills { inner: store.clone() }),
            store.clone(),
            Arc::new(StubFinder::default()),
            PlannerConfig::default(),
        );

        let err = planner
            .add_prerequisite(&ctx("acme"), &PrerequisiteEdge::new("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Conflict(_)));
        assert_eq!(
            store.list_prerequisites().await.unwrap(),
            vec![PrerequisiteEdge::new("b", "a")]
        );
    }

    #[test]
    fn spent_time_is_spread_by_estimate() {
        assert_eq!(spread_minutes(300, &[100, 200]), vec![100, 200]);
        assert_eq!(spread_minutes(100, &[1, 1, 1]), vec![33, 33, 34]);
        assert_eq!(spread_minutes(10, &[0, 0]), vec![5, 5]);
        assert!(spread_minutes(10, &[]).is_empty());
    }
}
