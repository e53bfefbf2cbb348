use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::database::models::forum::excerpt;
use crate::database::models::{
    CreateReplyRequest, CreateThreadRequest, ForumCategory, ForumReply, ForumThread, ThreadDetail, ThreadSummary,
    Usuario,
};
use crate::database::{from_row, to_row, Row, RowFilter, TableStore};
use crate::services::ServiceError;
use crate::tenant::TenantContext;

const CATEGORIES: &str = "forum_categories";
const THREADS: &str = "forum_threads";
const REPLIES: &str = "forum_replies";

/// Query string of the thread listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

/// Forum author: the JWT subject owns the post, the user row names it
#[derive(Debug, Clone)]
pub struct Author<'a> {
    pub subject: &'a str,
    pub user: &'a Usuario,
}

impl Author<'_> {
    fn name(&self) -> String {
        let name = self.user.display_name();
        if name.is_empty() {
            self.user.email.clone()
        } else {
            name
        }
    }
}

#[derive(Clone)]
pub struct ForumService {
    store: Arc<dyn TableStore>,
}

impl ForumService {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn list_categories(&self, tenant: &TenantContext) -> Result<Vec<ForumCategory>, ServiceError> {
        let rows = self
            .store
            .select(&tenant.table(CATEGORIES), &RowFilter::new().order_asc("id"))
            .await?;
        rows.into_iter().map(|r| from_row(r).map_err(ServiceError::from)).collect()
    }

    async fn category_names(&self, tenant: &TenantContext) -> Result<HashMap<i64, String>, ServiceError> {
        Ok(self
            .list_categories(tenant)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect())
    }

    async fn find_thread(&self, tenant: &TenantContext, filter: RowFilter) -> Result<Option<ForumThread>, ServiceError> {
        match self.store.select_one(&tenant.table(THREADS), &filter).await? {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Pinned threads first, then most recent activity
    pub async fn list_threads(&self, tenant: &TenantContext, query: &ThreadQuery) -> Result<Vec<ThreadSummary>, ServiceError> {
        let names = self.category_names(tenant).await?;

        let mut filter = RowFilter::new();
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty() && *c != "all") {
            match names.iter().find(|(_, name)| name.as_str() == category) {
                Some((id, _)) => filter = filter.eq("category_id", *id),
                None => return Ok(Vec::new()),
            }
        }

        let rows = self.store.select(&tenant.table(THREADS), &filter).await?;
        let mut threads = rows
            .into_iter()
            .map(from_row::<ForumThread>)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            threads.retain(|t| t.matches_search(search.trim()));
        }
        threads.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then_with(|| b.last_activity.cmp(&a.last_activity))
        });

        Ok(threads
            .into_iter()
            .map(|t| {
                let category = names.get(&t.category_id).cloned();
                ThreadSummary::new(t, category)
            })
            .collect())
    }

    /// Thread with its replies; counts as a view
    pub async fn get_thread(&self, tenant: &TenantContext, id: Uuid) -> Result<ThreadDetail, ServiceError> {
        let mut thread = self
            .find_thread(tenant, RowFilter::new().eq("id", id.to_string()))
            .await?
            .ok_or_else(|| ServiceError::NotFound("Thread not found".to_string()))?;

        thread.views += 1;
        let mut patch = Row::new();
        patch.insert("views".to_string(), Value::from(thread.views));
        self.store
            .update(&tenant.table(THREADS), &RowFilter::new().eq("id", id.to_string()), patch)
            .await?;

        let replies = self
            .store
            .select(
                &tenant.table(REPLIES),
                &RowFilter::new().eq("thread_id", id.to_string()).order_asc("created_at"),
            )
            .await?
            .into_iter()
            .map(from_row::<ForumReply>)
            .collect::<Result<Vec<_>, _>>()?;

        let category = self.category_names(tenant).await?.remove(&thread.category_id);
        Ok(ThreadDetail {
            thread: ThreadSummary::new(thread, category),
            replies,
        })
    }

    pub async fn create_thread(
        &self,
        tenant: &TenantContext,
        author: &Author<'_>,
        request: CreateThreadRequest,
    ) -> Result<ThreadSummary, ServiceError> {
        if request.title.trim().is_empty() || request.content.trim().is_empty() {
            return Err(ServiceError::Validation("title and content are required".to_string()));
        }
        let names = self.category_names(tenant).await?;
        let category = names
            .get(&request.category_id)
            .cloned()
            .ok_or_else(|| ServiceError::Validation(format!("Unknown category {}", request.category_id)))?;

        let now = Utc::now();
        let thread = ForumThread {
            id: Uuid::new_v4(),
            title: request.title.trim().to_string(),
            excerpt: Some(excerpt(&request.content)),
            content: request.content,
            category_id: request.category_id,
            user_id: author.subject.to_string(),
            author_name: author.name(),
            author_role: author.user.rol.to_string(),
            tags: request.tags,
            is_pinned: false,
            views: 0,
            reply_count: 0,
            last_activity: now,
            created_at: now,
            updated_at: now,
        };
        let row = self.store.insert(&tenant.table(THREADS), to_row(&thread)?).await?;
        let stored: ForumThread = from_row(row)?;
        info!("User {} opened thread {} in tenant {}", author.user.id, stored.id, tenant.key);
        Ok(ThreadSummary::new(stored, Some(category)))
    }

    pub async fn create_reply(
        &self,
        tenant: &TenantContext,
        author: &Author<'_>,
        request: CreateReplyRequest,
    ) -> Result<ForumReply, ServiceError> {
        if request.content.trim().is_empty() {
            return Err(ServiceError::Validation("content is required".to_string()));
        }
        let thread = self
            .find_thread(tenant, RowFilter::new().eq("id", request.thread_id.to_string()))
            .await?
            .ok_or_else(|| ServiceError::NotFound("Thread not found".to_string()))?;

        let now = Utc::now();
        let reply = ForumReply {
            id: Uuid::new_v4(),
            thread_id: thread.id,
            content: request.content,
            user_id: author.subject.to_string(),
            author_name: author.name(),
            author_role: author.user.rol.to_string(),
            created_at: now,
            updated_at: now,
        };
        let row = self.store.insert(&tenant.table(REPLIES), to_row(&reply)?).await?;

        let mut patch = Row::new();
        patch.insert("reply_count".to_string(), Value::from(thread.reply_count + 1));
        patch.insert("last_activity".to_string(), Value::from(now.to_rfc3339()));
        self.store
            .update(&tenant.table(THREADS), &RowFilter::new().eq("id", thread.id.to_string()), patch)
            .await?;

        Ok(from_row(row)?)
    }

    /// Deletes the caller's own thread and its replies; other users' threads read as missing
    pub async fn delete_thread(&self, tenant: &TenantContext, subject: &str, id: Uuid) -> Result<(), ServiceError> {
        let owned = RowFilter::new().eq("id", id.to_string()).eq("user_id", subject);
        if self.find_thread(tenant, owned.clone()).await?.is_none() {
            return Err(ServiceError::NotFound("Thread not found".to_string()));
        }

        self.store
            .delete(&tenant.table(REPLIES), &RowFilter::new().eq("thread_id", id.to_string()))
            .await?;
        self.store.delete(&tenant.table(THREADS), &owned).await?;
        info!("Deleted thread {} in tenant {}", id, tenant.key);
        Ok(())
    }

    pub async fn delete_reply(&self, tenant: &TenantContext, subject: &str, id: Uuid) -> Result<(), ServiceError> {
        let owned = RowFilter::new().eq("id", id.to_string()).eq("user_id", subject);
        let reply: ForumReply = match self.store.select_one(&tenant.table(REPLIES), &owned).await? {
            Some(row) => from_row(row)?,
            None => return Err(ServiceError::NotFound("Reply not found".to_string())),
        };

        self.store.delete(&tenant.table(REPLIES), &owned).await?;

        let thread_filter = RowFilter::new().eq("id", reply.thread_id.to_string());
        if let Some(thread) = self.find_thread(tenant, thread_filter.clone()).await? {
            let mut patch = Row::new();
            patch.insert("reply_count".to_string(), Value::from((thread.reply_count - 1).max(0)));
            self.store.update(&tenant.table(THREADS), &thread_filter, patch).await?;
        }
        Ok(())
    }
}
