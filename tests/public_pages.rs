mod support;

use axum::http::StatusCode;

use support::{TestApp, body_text, card_count};

#[tokio::test]
async fn index_paginates_thirteen_posts_as_ten_and_three() {
    let app = TestApp::new();
    let author = app.repos.seed_user("leo").await;
    for n in 0..13 {
        app.repos
            .seed_post(&author, &format!("Post number {n}"), None)
            .await;
    }

    let first = app.get("/", None).await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_text(first).await;
    assert_eq!(card_count(&first), 10);
    assert!(first.contains("Post number 12"), "newest post comes first");
    assert!(first.contains("?page=2"));

    let second = body_text(app.get("/?page=2", None).await).await;
    assert_eq!(card_count(&second), 3);
    assert!(second.contains("Post number 0"));
}

#[tokio::test]
async fn out_of_range_and_garbage_pages_fall_back() {
    let app = TestApp::new();
    let author = app.repos.seed_user("leo").await;
    for n in 0..13 {
        app.repos.seed_post(&author, &format!("p{n}"), None).await;
    }

    let group = app.repos.seed_group("Cats", "cats").await;
    for n in 0..13 {
        app.repos
            .seed_post(&author, &format!("cat{n}"), Some(group.id))
            .await;
    }

    let past_end = body_text(app.get("/group/cats/?page=99", None).await).await;
    assert_eq!(card_count(&past_end), 3, "past the end shows the last page");

    let garbage = body_text(app.get("/group/cats/?page=abc", None).await).await;
    assert_eq!(card_count(&garbage), 10, "non-numeric shows the first page");

    let negative = body_text(app.get("/group/cats/?page=-1", None).await).await;
    assert_eq!(card_count(&negative), 3);
}

#[tokio::test]
async fn group_listing_only_shows_its_own_posts() {
    let app = TestApp::new();
    let author = app.repos.seed_user("leo").await;
    let group = app.repos.seed_group("Group one", "g1").await;
    app.repos.seed_group("Group two", "g2").await;
    app.repos.seed_post(&author, "T", Some(group.id)).await;

    let g1 = app.get("/group/g1/", None).await;
    assert_eq!(g1.status(), StatusCode::OK);
    let g1 = body_text(g1).await;
    assert_eq!(card_count(&g1), 1);
    assert!(g1.contains("<p class=\"text\">T</p>"));
    assert!(g1.contains("Group one"));

    let g2 = body_text(app.get("/group/g2/", None).await).await;
    assert_eq!(card_count(&g2), 0);
}

#[tokio::test]
async fn unknown_resources_render_the_not_found_page() {
    let app = TestApp::new();

    for uri in [
        "/group/missing/",
        "/profile/nobody/",
        "/posts/404/",
        "/posts/abc/",
        "/posts/+1/",
        "/posts/99999999999999999999/",
        "/no/such/route/",
    ] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        let html = body_text(response).await;
        assert!(html.contains("Page not found"), "{uri}");
    }
}

#[tokio::test]
async fn profile_shows_follow_control_only_to_other_signed_in_users() {
    let app = TestApp::new();
    let author = app.repos.seed_user("leo").await;
    let reader = app.repos.seed_user("mia").await;
    app.repos.seed_post(&author, "hello", None).await;

    let anonymous = body_text(app.get("/profile/leo/", None).await).await;
    assert!(anonymous.contains("Posts: 1"));
    assert!(!anonymous.contains("/profile/leo/follow/"));

    let own = body_text(app.get("/profile/leo/", Some(&author)).await).await;
    assert!(!own.contains("/profile/leo/follow/"));
    assert!(!own.contains("/profile/leo/unfollow/"));

    let other = body_text(app.get("/profile/leo/", Some(&reader)).await).await;
    assert!(other.contains("/profile/leo/follow/"));
}

#[tokio::test]
async fn post_detail_lists_comments_newest_first() {
    let app = TestApp::new();
    let author = app.repos.seed_user("leo").await;
    let reader = app.repos.seed_user("mia").await;
    let post = app.repos.seed_post(&author, "a post worth discussing", None).await;

    let uri = format!("/posts/{}/comment/", post.id);
    app.post_form(&uri, Some(&reader), &[("text", "first comment")])
        .await;
    app.post_form(&uri, Some(&reader), &[("text", "second comment")])
        .await;

    let html = body_text(app.get(&format!("/posts/{}/", post.id), None).await).await;
    let first = html.find("first comment").expect("first comment shown");
    let second = html.find("second comment").expect("second comment shown");
    assert!(second < first, "newest comment renders first");
    assert!(html.contains("(1 posts)"));
    assert!(!html.contains("/comment/\""), "anonymous readers get no comment form");
}

#[tokio::test]
async fn media_is_served_with_guessed_content_type() {
    let app = TestApp::new();
    let dir = app.media.path().join("posts");
    std::fs::create_dir_all(&dir).expect("media subdir");
    std::fs::write(dir.join("pixel.gif"), support::GIF_1X1).expect("write media");

    let response = app.get("/media/posts/pixel.gif", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("image/gif")
    );

    let missing = app.get("/media/posts/none.gif", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_post_ids_are_not_found_for_signed_in_users() {
    let app = TestApp::new();
    let user = app.repos.seed_user("leo").await;

    let edit = app.get("/posts/abc/edit/", Some(&user)).await;
    assert_eq!(edit.status(), StatusCode::NOT_FOUND);
    let html = body_text(edit).await;
    assert!(html.contains("Page not found"));
    assert!(html.contains("leo"));

    let comment = app
        .post_form("/posts/abc/comment/", Some(&user), &[("text", "hello")])
        .await;
    assert_eq!(comment.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.repos.comment_count().await, 0);
}
