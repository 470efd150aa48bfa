//! Post authoring and search commands

use crate::error::{Error, Result};
use crate::posts::{parse_post_text, Post, PostDraft, PostOverrides, SearchHit};
use crate::store::Store;
use chrono::Utc;
use std::path::PathBuf;
use tracing::info;

/// Options for `post add`
#[derive(Debug, Clone, Default)]
pub struct PostAddOptions {
    pub immutable_title: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub markdown: Option<PathBuf>,
    pub html: Option<PathBuf>,
    pub preview: Option<String>,
    pub publish: bool,
}

fn read_source(path: Option<&PathBuf>) -> Result<Option<String>> {
    path.map(std::fs::read_to_string).transpose().map_err(Error::from)
}

/// Store a new revision. With `publish`, it becomes the only published
/// revision of its title and the search index is rebuilt.
pub async fn cmd_post_add(store: &Store, options: PostAddOptions) -> Result<Post> {
    let now = Utc::now();
    let draft = PostDraft {
        immutable_title: options.immutable_title,
        title: options.title,
        keywords: options.keywords,
        publish_now: options.publish,
        markdown: read_source(options.markdown.as_ref())?,
        html: read_source(options.html.as_ref())?,
        overrides: PostOverrides {
            preview: options.preview,
            posted_at: None,
        },
    };

    let mut post = parse_post_text(draft, now)?;
    let id = store.insert_post(&post).await?;
    post.id = Some(id);
    info!("Stored revision {} of '{}'", id, post.immutable_title);

    if options.publish {
        return cmd_post_publish(store, &post.immutable_title).await;
    }
    Ok(post)
}

/// Publish the latest revision of a title and rebuild the search index
pub async fn cmd_post_publish(store: &Store, immutable_title: &str) -> Result<Post> {
    let post = store
        .publish_post(immutable_title, Utc::now())
        .await?
        .ok_or_else(|| Error::NotFound(format!("post {}", immutable_title)))?;
    store.rebuild_search_index().await?;
    Ok(post)
}

pub async fn cmd_post_list(store: &Store) -> Result<Vec<Post>> {
    store.list_posts().await
}

pub async fn cmd_search(store: &Store, query: &str) -> Result<Vec<SearchHit>> {
    store.search_posts(query).await
}

pub fn print_post(post: &Post) {
    let state = if post.is_draft { "draft" } else { "published" };
    println!(
        "• {} [{}] revision {}",
        post.immutable_title,
        state,
        post.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
    );
    println!("  Title: {}", post.title);
    let keywords = post.keyword_list();
    if !keywords.is_empty() {
        println!("  Keywords: {}", keywords.join(", "));
    }
    println!("  Updated: {}", post.updated_at.to_rfc3339());
    if let Some(date) = &post.formatted_date {
        println!("  Posted: {}", date);
    }
}

pub fn print_posts(posts: &[Post]) {
    println!("\n📝 Posts\n");

    if posts.is_empty() {
        println!("No posts yet. Use 'orrery post add' to write one.");
        return;
    }

    for post in posts {
        print_post(post);
        println!();
    }
}

pub fn print_search_hits(query: &str, hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No published posts match '{}'", query);
        return;
    }

    println!("\n🔎 {} result(s) for '{}'\n", hits.len(), query);
    for (idx, hit) in hits.iter().enumerate() {
        println!("{}. {} ({})", idx + 1, hit.post.title, hit.post.immutable_title);
        for snippet in hit.snippets.iter().filter(|s| s.snippet.contains("<b>")) {
            println!("   {}: {}", snippet.field, snippet.snippet);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::setup_test_store;

    fn options(tmp: &tempfile::TempDir, body: &str, publish: bool) -> PostAddOptions {
        let path = tmp.path().join("post.md");
        std::fs::write(&path, body).unwrap();
        PostAddOptions {
            immutable_title: "moon-notes".to_string(),
            title: "Moon notes".to_string(),
            keywords: vec!["moon".to_string()],
            markdown: Some(path),
            publish,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_and_publish_keeps_one_live_revision() {
        let (store, tmp) = setup_test_store().await;

        let first = cmd_post_add(&store, options(&tmp, "The first crater survey.", true))
            .await
            .unwrap();
        assert!(!first.is_draft);

        let second = cmd_post_add(&store, options(&tmp, "A second crater survey.", false))
            .await
            .unwrap();
        assert!(second.is_draft);

        let published = cmd_post_publish(&store, "moon-notes").await.unwrap();
        assert_eq!(published.id, second.id);

        let posts = cmd_post_list(&store).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts.iter().filter(|p| !p.is_draft).count(), 1);

        let hits = cmd_search(&store, "second").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(cmd_search(&store, "first").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_requires_a_body() {
        let (store, _tmp) = setup_test_store().await;
        let options = PostAddOptions {
            immutable_title: "empty".to_string(),
            title: "Empty".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            cmd_post_add(&store, options).await,
            Err(Error::InvalidPost(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_unknown_title_is_not_found() {
        let (store, _tmp) = setup_test_store().await;
        assert!(matches!(
            cmd_post_publish(&store, "ghost").await,
            Err(Error::NotFound(_))
        ));
    }
}
