use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Level;
use crate::context::TenantId;
use crate::ids::{ResourceId, SkillId};

/// A learning resource produced by the external ingestion process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    /// Estimated time to complete, in minutes.
    #[serde(default)]
    pub duration_min: u32,
    #[serde(default)]
    pub level: Option<Level>,
    #[serde(default)]
    pub skills: Vec<SkillId>,
    #[serde(default)]
    pub media_type: Option<String>,
    /// Key of the cached content in the snippet store.
    #[serde(default, alias = "snippet_s3_key")]
    pub content_pointer: Option<String>,
    #[serde(default, rename = "tenant_id")]
    pub tenant: TenantId,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource {
    pub fn new(id: impl Into<ResourceId>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            description: None,
            provider: None,
            license: None,
            duration_min: 0,
            level: None,
            skills: Vec::new(),
            media_type: None,
            content_pointer: None,
            tenant: TenantId::global(),
            updated_at: None,
        }
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_min = minutes;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SkillId>,
    {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tenant(mut self, tenant: TenantId) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_content_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.content_pointer = Some(pointer.into());
        self
    }

    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    pub fn teaches(&self, skill: &SkillId) -> bool {
        self.skills.contains(skill)
    }

    /// Text handed to rerankers and embedders for the document side.
    pub fn document_text(&self) -> String {
        match &self.description {
            Some(desc) if !desc.is_empty() => format!("{}\n{}", self.title, desc),
            _ => self.title.clone(),
        }
    }
}
