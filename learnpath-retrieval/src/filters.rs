//! Search request shape and filters.
//!
//! [`Facets`] is what callers may narrow by. [`SearchFilters`] pairs facets with the
//! caller's tenant, which is a required constructor argument: a filter without a tenant
//! cannot be built.

use learnpath_core::context::TenantId;
use learnpath_core::ids::SkillId;
use learnpath_core::model::{Level, Resource};
use serde::{Deserialize, Serialize};

use crate::{Result, RetrievalError};

pub const DEFAULT_TOP_K: u32 = 20;
pub const MAX_TOP_K: u32 = 50;
pub const DEFAULT_RERANK_TOP_N: u32 = 5;
pub const MAX_RERANK_TOP_N: u32 = 20;

/// Optional narrowing criteria. Empty lists mean "any".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Facets {
    pub skills: Vec<SkillId>,
    pub levels: Vec<Level>,
    pub media_types: Vec<String>,
    pub providers: Vec<String>,
    pub min_duration: Option<u32>,
    pub max_duration: Option<u32>,
}

impl Facets {
    pub fn with_skill(mut self, skill: impl Into<SkillId>) -> Self {
        self.skills.push(skill.into());
        self
    }

    pub fn with_max_duration(mut self, minutes: u32) -> Self {
        self.max_duration = Some(minutes);
        self
    }

    fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_duration, self.max_duration) {
            if min > max {
                return Err(RetrievalError::InvalidRequest(format!(
                    "min_duration {min} exceeds max_duration {max}"
                )));
            }
        }
        Ok(())
    }

    /// Whether a resource satisfies every set facet.
    pub fn matches(&self, resource: &Resource) -> bool {
        if !self.skills.is_empty() && !self.skills.iter().any(|s| resource.teaches(s)) {
            return false;
        }
        if !self.levels.is_empty()
            && !resource.level.is_some_and(|level| self.levels.contains(&level))
        {
            return false;
        }
        if !any_eq(&self.media_types, resource.media_type.as_deref()) {
            return false;
        }
        if !any_eq(&self.providers, resource.provider.as_deref()) {
            return false;
        }
        if self.min_duration.is_some_and(|min| resource.duration_min < min) {
            return false;
        }
        if self.max_duration.is_some_and(|max| resource.duration_min > max) {
            return false;
        }
        true
    }
}

fn any_eq(allowed: &[String], value: Option<&str>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    value.is_some_and(|v| allowed.iter().any(|a| a.eq_ignore_ascii_case(v)))
}

/// Facets bound to the tenant whose data may be returned.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilters {
    tenant: TenantId,
    facets: Facets,
}

impl SearchFilters {
    pub fn new(tenant: TenantId, facets: Facets) -> Self {
        Self { tenant, facets }
    }

    pub fn for_tenant(tenant: TenantId) -> Self {
        Self::new(tenant, Facets::default())
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        self.tenant.can_see(&resource.tenant) && self.facets.matches(resource)
    }
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

fn default_rerank() -> bool {
    true
}

fn default_rerank_top_n() -> u32 {
    DEFAULT_RERANK_TOP_N
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: Facets,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_rerank")]
    pub rerank: bool,
    #[serde(default = "default_rerank_top_n")]
    pub rerank_top_n: u32,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: Facets::default(),
            top_k: DEFAULT_TOP_K,
            rerank: true,
            rerank_top_n: DEFAULT_RERANK_TOP_N,
        }
    }

    pub fn with_filters(mut self, filters: Facets) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn without_rerank(mut self) -> Self {
        self.rerank = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(RetrievalError::InvalidRequest("query must not be empty".into()));
        }
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(RetrievalError::InvalidRequest(format!(
                "top_k must be between 1 and {MAX_TOP_K}"
            )));
        }
        if !(1..=MAX_RERANK_TOP_N).contains(&self.rerank_top_n) {
            return Err(RetrievalError::InvalidRequest(format!(
                "rerank_top_n must be between 1 and {MAX_RERANK_TOP_N}"
            )));
        }
        self.filters.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource() -> Resource {
        Resource::new("r1", "Kafka partitions", "https://k")
            .with_skills(["kafka"])
            .with_level(Level::Intermediate)
            .with_media_type("video")
            .with_provider("YouTube")
            .with_duration(45)
            .with_tenant(TenantId::new("acme"))
    }

    #[test]
    fn defaults_apply_when_fields_are_missing() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "kafka"}"#).unwrap();
        assert_eq!(request.top_k, 20);
        assert!(request.rerank);
        assert_eq!(request.rerank_top_n, 5);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(SearchRequest::new("  ").validate().is_err());
        assert!(SearchRequest::new("q").with_top_k(0).validate().is_err());
        assert!(SearchRequest::new("q").with_top_k(51).validate().is_err());

        let mut request = SearchRequest::new("q");
        request.rerank_top_n = 21;
        assert!(request.validate().is_err());

        let facets = Facets {
            min_duration: Some(30),
            max_duration: Some(10),
            ..Facets::default()
        };
        assert!(SearchRequest::new("q").with_filters(facets).validate().is_err());
    }

    #[test]
    fn facets_match_each_dimension() {
        let r = resource();
        assert!(Facets::default().matches(&r));
        assert!(Facets::default().with_skill("kafka").matches(&r));
        assert!(!Facets::default().with_skill("python").matches(&r));
        assert!(Facets::default().with_max_duration(45).matches(&r));
        assert!(!Facets::default().with_max_duration(44).matches(&r));

        let media = Facets {
            media_types: vec!["VIDEO".into()],
            providers: vec!["youtube".into()],
            levels: vec![Level::Intermediate],
            ..Facets::default()
        };
        assert!(media.matches(&r));

        let wrong_level = Facets {
            levels: vec![Level::Basic],
            ..Facets::default()
        };
        assert!(!wrong_level.matches(&r));
    }

    #[test]
    fn tenant_scope_is_always_applied() {
        let r = resource();
        assert!(SearchFilters::for_tenant(TenantId::new("acme")).matches(&r));
        assert!(!SearchFilters::for_tenant(TenantId::new("other-tenant")).matches(&r));
        assert!(!SearchFilters::for_tenant(TenantId::global()).matches(&r));

        let global = Resource::new("g", "Global", "u");
        assert!(SearchFilters::for_tenant(TenantId::new("other-tenant")).matches(&global));
    }
}
