//! Repository behaviour against a real Postgres database.
//!
//! Needs `DATABASE_URL`; run with `cargo test -- --ignored`.

use std::collections::HashSet;

use sqlx::PgPool;
use yatube::application::pagination::Paginator;
use yatube::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateUserParams,
    FollowsRepo, GroupsWriteRepo, PostScope, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams, UsersRepo,
};
use yatube::domain::entities::{FollowRecord, UserRecord};
use yatube::infra::db::PostgresRepositories;

async fn user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserParams {
            username: username.to_string(),
            password_hash: "!unusable".to_string(),
        })
        .await
        .expect("create user")
}

async fn post(repos: &PostgresRepositories, author: &UserRecord, text: &str, group_id: Option<i64>) -> i64 {
    repos
        .create_post(CreatePostParams {
            author_id: author.id,
            text: text.to_string(),
            group_id,
            image: None,
        })
        .await
        .expect("create post")
        .id
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn listing_indexes_exist(pool: PgPool) {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT indexname FROM pg_indexes WHERE schemaname = 'public' AND tablename = 'posts'",
    )
    .fetch_all(&pool)
    .await
    .expect("fetch post indexes");

    let indexes: HashSet<String> = rows.into_iter().collect();
    assert!(indexes.contains("posts_pub_date_id_idx"));
    assert!(indexes.contains("posts_group_pub_date_idx"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_usernames_are_reported(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    user(&repos, "leo").await;

    let err = repos
        .create_user(CreateUserParams {
            username: "leo".to_string(),
            password_hash: "!unusable".to_string(),
        })
        .await
        .expect_err("duplicate username");
    assert!(matches!(err, RepoError::Duplicate { .. }));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn posts_list_newest_first_within_scope(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = user(&repos, "leo").await;
    let group = repos
        .create_group(CreateGroupParams {
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
        })
        .await
        .expect("create group");

    let mut ids = Vec::new();
    for n in 0..5 {
        ids.push(post(&repos, &author, &format!("cat {n}"), Some(group.id)).await);
    }
    post(&repos, &author, "no group", None).await;

    assert_eq!(repos.count_posts(PostScope::Group(group.id)).await.unwrap(), 5);
    assert_eq!(repos.count_posts(PostScope::All).await.unwrap(), 6);

    let paginator = Paginator::new(std::num::NonZeroU32::new(2).unwrap());
    let window = paginator.window(Some("1"), 5);
    let first_page = repos
        .list_posts(PostScope::Group(group.id), window)
        .await
        .unwrap();
    let listed: Vec<i64> = first_page.iter().map(|post| post.id).collect();
    assert_eq!(listed, vec![ids[4], ids[3]]);
    assert_eq!(first_page[0].group.as_ref().map(|g| g.slug.as_str()), Some("cats"));
    assert_eq!(first_page[0].body.author_username, "leo");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn deleting_a_group_keeps_posts_ungrouped(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = user(&repos, "leo").await;
    let group = repos
        .create_group(CreateGroupParams {
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
        })
        .await
        .unwrap();
    let id = post(&repos, &author, "survivor", Some(group.id)).await;

    repos.delete_group("cats").await.unwrap();

    let stored = repos.find_post(id).await.unwrap().expect("post kept");
    assert!(stored.group.is_none());
    assert!(matches!(
        repos.delete_group("cats").await,
        Err(RepoError::NotFound)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn update_keeps_image_when_none_supplied(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = user(&repos, "leo").await;
    let created = repos
        .create_post(CreatePostParams {
            author_id: author.id,
            text: "with picture".to_string(),
            group_id: None,
            image: Some("posts/2024/01/01/a.gif".to_string()),
        })
        .await
        .unwrap();

    let updated = repos
        .update_post(UpdatePostParams {
            id: created.id,
            text: "edited".to_string(),
            group_id: None,
            image: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.body.text, "edited");
    assert_eq!(updated.image.as_deref(), Some("posts/2024/01/01/a.gif"));
    assert_eq!(updated.body.pub_date, created.body.pub_date);

    assert!(matches!(
        repos
            .update_post(UpdatePostParams {
                id: created.id + 1000,
                text: "ghost".to_string(),
                group_id: None,
                image: None,
            })
            .await,
        Err(RepoError::NotFound)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn follows_are_unique_and_feed_scoped(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let reader = user(&repos, "mia").await;
    let author = user(&repos, "leo").await;
    let stranger = user(&repos, "carl").await;
    let edge = FollowRecord {
        user_id: reader.id,
        author_id: author.id,
    };

    assert!(repos.create_follow(edge).await.unwrap());
    assert!(!repos.create_follow(edge).await.unwrap());
    assert!(repos.is_following(edge).await.unwrap());

    post(&repos, &author, "followed", None).await;
    post(&repos, &stranger, "not followed", None).await;
    assert_eq!(
        repos
            .count_posts(PostScope::FollowedBy(reader.id))
            .await
            .unwrap(),
        1
    );

    let self_follow = repos
        .create_follow(FollowRecord {
            user_id: reader.id,
            author_id: reader.id,
        })
        .await;
    assert!(self_follow.is_err());

    repos.delete_follow(edge).await.unwrap();
    assert!(matches!(
        repos.delete_follow(edge).await,
        Err(RepoError::NotFound)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn comments_list_newest_first_and_cascade(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = user(&repos, "leo").await;
    let id = post(&repos, &author, "discuss", None).await;

    for text in ["one", "two"] {
        repos
            .create_comment(CreateCommentParams {
                post_id: id,
                author_id: author.id,
                text: text.to_string(),
            })
            .await
            .unwrap();
    }

    let comments = repos.list_comments(id).await.unwrap();
    let texts: Vec<&str> = comments.iter().map(|c| c.body.text.as_str()).collect();
    assert_eq!(texts, vec!["two", "one"]);

    repos.delete_post(id).await.unwrap();
    assert!(repos.list_comments(id).await.unwrap().is_empty());
}
