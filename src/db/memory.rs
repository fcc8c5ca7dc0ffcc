//! In-memory store backends. Used by the integration tests and for
//! running the service without a database in local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{ArticleQuery, ArticleStore, CandidateOrder, InteractionStore, UserStore};
use crate::error::Result;
use crate::models::{Article, Interaction, InteractionType, User, EMBEDDING_DIM};
use crate::services::recommendation::scoring::cosine_similarity;

#[derive(Default)]
pub struct MemoryArticleStore {
    articles: RwLock<Vec<Article>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, article: Article) {
        let mut articles = self.articles.write().await;
        if let Some(existing) = articles.iter_mut().find(|a| a.id == article.id) {
            *existing = article;
        } else {
            articles.push(article);
        }
    }

    pub async fn insert_all(&self, batch: Vec<Article>) {
        for article in batch {
            self.insert(article).await;
        }
    }
}

fn matches(article: &Article, query: &ArticleQuery) -> bool {
    if let Some(categories) = &query.categories {
        match &article.category {
            Some(cat) => {
                if !categories.iter().any(|c| c.eq_ignore_ascii_case(cat)) {
                    return false;
                }
            }
            None => return false,
        }
    }
    if query.uncategorized_only && article.category.is_some() {
        return false;
    }
    if let Some(source) = &query.source_name {
        if &article.source_name != source {
            return false;
        }
    }
    if let Some(language) = &query.language {
        if article.language.as_deref() != Some(language.as_str()) {
            return false;
        }
    }
    if query.has_embedding && article.valid_embedding().is_none() {
        return false;
    }
    if let Some(after) = query.published_after {
        match article.published_at {
            Some(published) if published >= after => {}
            _ => return false,
        }
    }
    if query.exclude_ids.contains(&article.id) {
        return false;
    }
    if let Some(id_after) = query.id_after {
        if article.id <= id_after {
            return false;
        }
    }
    true
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn query(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let articles = self.articles.read().await;
        let mut rng = rand::thread_rng();

        let mut hits: Vec<(Article, f64)> = articles
            .iter()
            .filter(|a| matches(a, query))
            .map(|a| (a.clone(), rng.gen::<f64>()))
            .collect();

        match query.order {
            CandidateOrder::RecencyWeighted => {
                hits.sort_by(|(a, ra), (b, rb)| {
                    b.published_at
                        .cmp(&a.published_at)
                        .then(b.engagement_proxy().cmp(&a.engagement_proxy()))
                        .then(ra.partial_cmp(rb).unwrap_or(std::cmp::Ordering::Equal))
                });
            }
            CandidateOrder::Popularity => {
                hits.sort_by(|(a, ra), (b, rb)| {
                    b.engagement_proxy()
                        .cmp(&a.engagement_proxy())
                        .then(ra.partial_cmp(rb).unwrap_or(std::cmp::Ordering::Equal))
                });
            }
        }

        hits.truncate(query.limit.max(0) as usize);
        Ok(hits.into_iter().map(|(a, _)| a).collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        let articles = self.articles.read().await;
        Ok(articles.iter().find(|a| a.id == id).cloned())
    }

    async fn similarity_search(
        &self,
        embedding: &[f32],
        exclude_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Article>> {
        let articles = self.articles.read().await;
        let mut scored: Vec<(Article, f64)> = articles
            .iter()
            .filter(|a| Some(a.id) != exclude_id)
            .filter_map(|a| {
                let sim = a.valid_embedding().map(|v| cosine_similarity(embedding, v))?;
                Some((a.clone(), sim))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit.max(0) as usize);
        Ok(scored.into_iter().map(|(a, _)| a).collect())
    }

    async fn avg_engagement_by_category(
        &self,
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, f64>> {
        let articles = self.articles.read().await;
        let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
        for article in articles.iter() {
            let recent = article.published_at.map(|p| p >= since).unwrap_or(false);
            if !recent {
                continue;
            }
            if let Some(category) = &article.category {
                let entry = sums.entry(category.clone()).or_insert((0.0, 0));
                entry.0 += article.engagement_proxy() as f64;
                entry.1 += 1;
            }
        }
        Ok(sums
            .into_iter()
            .map(|(category, (sum, count))| (category, sum / count as f64))
            .collect())
    }

    async fn distinct_categories(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let articles = self.articles.read().await;
        let mut categories: Vec<String> = articles
            .iter()
            .filter(|a| a.published_at.map(|p| p >= since).unwrap_or(false))
            .filter_map(|a| a.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }
}

#[derive(Default)]
pub struct MemoryInteractionStore {
    interactions: RwLock<Vec<Interaction>>,
}

impl MemoryInteractionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InteractionStore for MemoryInteractionStore {
    async fn insert(&self, interaction: &Interaction) -> Result<()> {
        self.interactions.write().await.push(interaction.clone());
        Ok(())
    }

    async fn article_ids_by_user(
        &self,
        user_id: Uuid,
        types: &[InteractionType],
        since: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        let interactions = self.interactions.read().await;
        let mut ids: Vec<Uuid> = interactions
            .iter()
            .filter(|i| {
                i.user_id == user_id
                    && types.contains(&i.interaction_type)
                    && i.created_at >= since
            })
            .map(|i| i.article_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn count_by_user(&self, user_id: Uuid, types: &[InteractionType]) -> Result<i64> {
        let interactions = self.interactions.read().await;
        Ok(interactions
            .iter()
            .filter(|i| i.user_id == user_id && types.contains(&i.interaction_type))
            .count() as i64)
    }

    async fn count_site_wide_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let interactions = self.interactions.read().await;
        Ok(interactions
            .iter()
            .filter(|i| i.interaction_type == InteractionType::Like && i.created_at >= since)
            .count() as i64)
    }

    async fn likers_for_articles(
        &self,
        article_ids: &[Uuid],
        per_article_limit: usize,
    ) -> Result<HashMap<Uuid, Vec<Uuid>>> {
        let interactions = self.interactions.read().await;
        let mut likers: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for interaction in interactions.iter().rev() {
            if interaction.interaction_type != InteractionType::Like {
                continue;
            }
            if !article_ids.contains(&interaction.article_id) {
                continue;
            }
            let entry = likers.entry(interaction.article_id).or_default();
            if entry.len() < per_article_limit && !entry.contains(&interaction.user_id) {
                entry.push(interaction.user_id);
            }
        }
        Ok(likers)
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn embeddings_for(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<f32>>> {
        let users = self.users.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| {
                let embedding = users.get(id)?.embedding.clone()?;
                (embedding.len() == EMBEDDING_DIM).then_some((*id, embedding))
            })
            .collect())
    }
}
