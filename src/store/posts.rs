//! Post persistence, publishing and full-text search

use super::{Store, SEARCH_INDEX_SQL};
use crate::error::Result;
use crate::posts::{
    formatted_date, fts_match_expression, snippet_matches_source, FieldSnippet, Post, SearchHit,
    SEARCH_FIELDS,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row};
use tracing::{debug, info};

impl Store {
    /// Store a new revision, returning its id
    pub async fn insert_post(&self, post: &Post) -> Result<i64> {
        self.retrying("insert post", || async move {
            let result = sqlx::query(
                r#"
                INSERT INTO posts
                    (immutable_title, title, updated_at, keywords, is_draft, preview, posted_at,
                     content_html, scripts_html, content_md, searchable_text, formatted_date)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&post.immutable_title)
            .bind(&post.title)
            .bind(post.updated_at)
            .bind(&post.keywords)
            .bind(post.is_draft)
            .bind(&post.preview)
            .bind(post.posted_at)
            .bind(&post.content_html)
            .bind(&post.scripts_html)
            .bind(&post.content_md)
            .bind(&post.searchable_text)
            .bind(&post.formatted_date)
            .execute(&self.pool)
            .await?;
            Ok(result.last_insert_rowid())
        })
        .await
    }

    /// Demote every revision of `immutable_title` to draft, then publish
    /// the most recently updated one. Returns the published revision, or
    /// `None` if the title has no rows.
    pub async fn publish_post(
        &self,
        immutable_title: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<Option<Post>> {
        self.retrying("publish post", || async move {
            let mut tx = self.pool.begin().await?;

            sqlx::query("UPDATE posts SET is_draft = 1 WHERE immutable_title = ?")
                .bind(immutable_title)
                .execute(&mut *tx)
                .await?;

            let latest: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM posts WHERE immutable_title = ? ORDER BY updated_at DESC, id DESC LIMIT 1",
            )
            .bind(immutable_title)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(id) = latest else {
                tx.rollback().await?;
                return Ok(None);
            };

            sqlx::query("UPDATE posts SET is_draft = 0, posted_at = ?, formatted_date = ? WHERE id = ?")
                .bind(posted_at)
                .bind(formatted_date(posted_at))
                .bind(id)
                .execute(&mut *tx)
                .await?;

            let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

            tx.commit().await?;
            info!("Published '{}' (revision {})", immutable_title, id);
            Ok(Some(post))
        })
        .await
    }

    /// Published posts, newest first
    pub async fn published_posts(&self) -> Result<Vec<Post>> {
        self.retrying("list published posts", || async move {
            let posts = sqlx::query_as::<_, Post>(
                "SELECT * FROM posts WHERE is_draft = 0 ORDER BY posted_at DESC",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(posts)
        })
        .await
    }

    /// The published revision of a post
    pub async fn get_published_post(&self, immutable_title: &str) -> Result<Option<Post>> {
        self.retrying("get post", || async move {
            let post = sqlx::query_as::<_, Post>(
                r#"
                SELECT * FROM posts
                WHERE immutable_title = ? AND is_draft = 0
                ORDER BY updated_at DESC
                LIMIT 1
                "#,
            )
            .bind(immutable_title)
            .fetch_optional(&self.pool)
            .await?;
            Ok(post)
        })
        .await
    }

    /// Every revision, grouped by title, newest revision first
    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        self.retrying("list posts", || async move {
            let posts = sqlx::query_as::<_, Post>(
                "SELECT * FROM posts ORDER BY immutable_title, updated_at DESC, id DESC",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(posts)
        })
        .await
    }

    /// Drop and reload the search table from published posts
    pub async fn rebuild_search_index(&self) -> Result<()> {
        self.retrying("rebuild search index", || async move {
            let mut tx = self.pool.begin().await?;
            sqlx::query(SEARCH_INDEX_SQL).execute(&mut *tx).await?;
            tx.commit().await?;
            Ok(())
        })
        .await?;
        debug!("Rebuilt post search index");
        Ok(())
    }

    /// Full-text search over published posts, best match first.
    ///
    /// Each term of `query` is matched literally. A blank query, or one that
    /// matches nothing, returns an empty list.
    pub async fn search_posts(&self, query: &str) -> Result<Vec<SearchHit>> {
        let Some(expression) = fts_match_expression(query) else {
            return Ok(Vec::new());
        };

        let snippet_columns = SEARCH_FIELDS
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                format!("snippet(post_search, {idx}, '<b>', '</b>', '...', 8) AS {field}_snippet")
            })
            .collect::<Vec<_>>()
            .join(", ");
        let snippet_names = SEARCH_FIELDS
            .iter()
            .map(|field| format!("h.{field}_snippet"))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            r#"
            WITH hits AS (
                SELECT immutable_title, {snippet_columns}, rank
                FROM post_search
                WHERE post_search MATCH ?
            )
            SELECT p.*, {snippet_names}
            FROM hits h
            JOIN posts p ON p.immutable_title = h.immutable_title AND p.is_draft = 0
            ORDER BY h.rank
            "#
        );

        let rows = self
            .retrying("search posts", || {
                let sql = sql.as_str();
                let expression = expression.as_str();
                async move {
                    let rows = sqlx::query(sql)
                        .bind(expression)
                        .fetch_all(&self.pool)
                        .await?;
                    Ok(rows)
                }
            })
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let post = Post::from_row(&row)?;
            let mut snippets = Vec::with_capacity(SEARCH_FIELDS.len());
            for field in SEARCH_FIELDS {
                let snippet: String = row.try_get(format!("{field}_snippet").as_str())?;
                snippets.push(FieldSnippet {
                    field: field.to_string(),
                    matches_source: snippet_matches_source(post.search_field(field), &snippet),
                    snippet,
                });
            }
            hits.push(SearchHit { post, snippets });
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use crate::posts::{parse_post_text, PostDraft};
    use crate::store::tests::setup_test_store;
    use chrono::{Duration, TimeZone, Utc};

    fn revision(title: &str, body: &str) -> PostDraft {
        PostDraft {
            immutable_title: "my-post".to_string(),
            title: title.to_string(),
            keywords: vec!["space".to_string()],
            markdown: Some(body.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_publish_promotes_latest_revision() {
        let (store, _tmp) = setup_test_store().await;
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let mut first = revision("Draft one", "Old text about comets.");
        first.publish_now = true;
        let first = parse_post_text(first, t0).unwrap();
        let second = parse_post_text(revision("Draft two", "New text about comets."), t0 + Duration::days(1)).unwrap();
        store.insert_post(&first).await.unwrap();
        let second_id = store.insert_post(&second).await.unwrap();

        let posted_at = Utc.with_ymd_and_hms(2024, 5, 5, 9, 0, 0).unwrap();
        let published = store.publish_post("my-post", posted_at).await.unwrap().unwrap();
        assert_eq!(published.id, Some(second_id));

        let all = store.list_posts().await.unwrap();
        let live: Vec<_> = all.iter().filter(|p| !p.is_draft).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].title, "Draft two");
        assert_eq!(live[0].posted_at, Some(posted_at));
        assert_eq!(live[0].formatted_date.as_deref(), Some("May 5th, 2024"));

        let fetched = store.get_published_post("my-post").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Draft two");
        assert_eq!(store.published_posts().await.unwrap().len(), 1);

        assert!(store.publish_post("missing", posted_at).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_finds_published_posts_only() {
        let (store, _tmp) = setup_test_store().await;

        let mut live = revision("Orbits", "Notes on the orbit of Mars.");
        live.publish_now = true;
        store.insert_post(&parse_post_text(live, Utc::now()).unwrap()).await.unwrap();

        let mut hidden = revision("Secret", "Unpublished orbit musings.");
        hidden.immutable_title = "hidden".to_string();
        store.insert_post(&parse_post_text(hidden, Utc::now()).unwrap()).await.unwrap();

        store.rebuild_search_index().await.unwrap();

        let hits = store.search_posts("orbit").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].post.immutable_title, "my-post");

        let body = hits[0]
            .snippets
            .iter()
            .find(|s| s.field == "searchable_text")
            .unwrap();
        assert!(body.snippet.contains("<b>orbit</b>"));
        assert!(body.matches_source);
    }

    #[tokio::test]
    async fn test_search_absent_term_and_syntax_are_empty() {
        let (store, _tmp) = setup_test_store().await;

        let mut live = revision("Orbits", "Notes on the orbit of Mars.");
        live.publish_now = true;
        store.insert_post(&parse_post_text(live, Utc::now()).unwrap()).await.unwrap();
        store.rebuild_search_index().await.unwrap();

        assert!(store.search_posts("quasar").await.unwrap().is_empty());
        assert!(store.search_posts("").await.unwrap().is_empty());
        assert!(store.search_posts("orbit AND (").await.unwrap().is_empty());
    }
}
