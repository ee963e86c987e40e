mod common;

use axum::http::StatusCode;
use common::*;
use quillpost::db::UserRole;
use serde_json::json as body;

struct Fixture {
    t: TestApp,
    admin_id: i64,
    admin_cookies: String,
    user_cookies: String,
    category: i64,
}

async fn fixture() -> Fixture {
    let t = test_app().await;
    let admin_id = create_user(&t.db, "editor", UserRole::Admin).await;
    let user_id = create_user(&t.db, "reader", UserRole::User).await;
    let category = create_category(&t.db, "News").await;
    Fixture {
        admin_cookies: session_cookies(&t.jwt, admin_id),
        user_cookies: session_cookies(&t.jwt, user_id),
        admin_id,
        category,
        t,
    }
}

#[tokio::test]
async fn test_categories() {
    let f = fixture().await;

    let response = send(
        &f.t.app,
        json_request("POST", "/api/posts/category/", Some(&f.admin_cookies), body!({ "name": "Tech", "description": "Gadgets" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["name"], "Tech");

    let response = send(
        &f.t.app,
        json_request("POST", "/api/posts/category/", Some(&f.admin_cookies), body!({ "name": "Tech" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"]["name"][0],
        "category with this name already exists."
    );

    let response = send(
        &f.t.app,
        json_request("POST", "/api/posts/category/", Some(&f.admin_cookies), body!({ "name": "  " })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &f.t.app,
        json_request("POST", "/api/posts/category/", Some(&f.user_cookies), body!({ "name": "Sports" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&f.t.app, get("/api/posts/category/", Some(&f.user_cookies))).await;
    let json = body_json(response).await;
    let names: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["News", "Tech"]);
}

#[tokio::test]
async fn test_create_post_validation() {
    let f = fixture().await;

    let response = send(
        &f.t.app,
        json_request("POST", "/api/posts/post/", Some(&f.admin_cookies), body!({ "title": "", "category": 999 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["title"][0], "This field may not be blank.");
    assert_eq!(json["error"]["content"][0], "This field may not be blank.");
    assert_eq!(json["error"]["category"][0], "Invalid category.");

    let response = send(
        &f.t.app,
        json_request(
            "POST",
            "/api/posts/post/",
            Some(&f.user_cookies),
            body!({ "title": "Mine", "content": "<p>x</p>", "category": f.category }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_post_lifecycle() {
    let f = fixture().await;

    let response = send(
        &f.t.app,
        json_request(
            "POST",
            "/api/posts/post/",
            Some(&f.admin_cookies),
            body!({ "title": "Launch", "content": "<p>Hello <b>world</b></p>", "category": f.category, "is_draft": true }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let id = json["data"]["id"].as_i64().unwrap();
    assert_eq!(json["data"]["author"], f.admin_id);
    assert_eq!(json["data"]["is_draft"], true);

    let uri = format!("/api/posts/post/{}/", id);
    let response = send(
        &f.t.app,
        json_request(
            "PUT",
            &uri,
            Some(&f.admin_cookies),
            body!({ "title": "Launch day", "content": "<p>Updated</p>", "category": f.category, "is_draft": true }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["title"], "Launch day");

    let response = send(&f.t.app, empty("POST", &format!("{}publish/", uri), Some(&f.admin_cookies))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Post published");
    assert!(!f.t.db.posts().get(id).await.unwrap().unwrap().is_draft);

    let response = send(&f.t.app, empty("POST", &format!("{}unpublish/", uri), Some(&f.admin_cookies))).await;
    assert_eq!(body_json(response).await["message"], "Post unpublished");
    assert!(f.t.db.posts().get(id).await.unwrap().unwrap().is_draft);

    let response = send(&f.t.app, empty("DELETE", &uri, Some(&f.user_cookies))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&f.t.app, empty("DELETE", &uri, Some(&f.admin_cookies))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(f.t.db.posts().get(id).await.unwrap().is_none());

    let response = send(&f.t.app, empty("DELETE", &uri, Some(&f.admin_cookies))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_drafts_hidden_from_standard_users() {
    let f = fixture().await;
    let published = create_post(&f.t.db, f.admin_id, f.category, "Public", false).await;
    let draft = create_post(&f.t.db, f.admin_id, f.category, "Secret", true).await;

    let response = send(&f.t.app, get("/api/posts/post/", Some(&f.user_cookies))).await;
    let json = body_json(response).await;
    let posts = json["data"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], published);

    let response = send(&f.t.app, get("/api/posts/post/", Some(&f.admin_cookies))).await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 2);

    let draft_uri = format!("/api/posts/post/{}/", draft);
    for request in [
        get(&draft_uri, Some(&f.user_cookies)),
        empty("POST", &format!("{}like/", draft_uri), Some(&f.user_cookies)),
        get(&format!("{}comments/", draft_uri), Some(&f.user_cookies)),
    ] {
        let response = send(&f.t.app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    let response = send(&f.t.app, get(&draft_uri, Some(&f.admin_cookies))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_shows_plain_text_excerpt() {
    let f = fixture().await;
    f.t.db
        .posts()
        .create(&quillpost::db::NewPost {
            author_id: f.admin_id,
            category_id: f.category,
            title: "Long",
            content: &format!("<p>{}</p>", "word ".repeat(60)),
            is_draft: false,
        })
        .await
        .unwrap();

    let response = send(&f.t.app, get("/api/posts/post/", Some(&f.user_cookies))).await;
    let json = body_json(response).await;
    let excerpt = json["data"][0]["excerpt"].as_str().unwrap();
    assert!(!excerpt.contains('<'));
    assert!(excerpt.ends_with("..."));
    assert_eq!(excerpt.chars().count(), 153);
    assert_eq!(json["data"][0]["author"], "editor");
    assert_eq!(json["data"][0]["category_name"], "News");
}

#[tokio::test]
async fn test_view_count_increments_per_detail_request() {
    let f = fixture().await;
    let id = create_post(&f.t.db, f.admin_id, f.category, "Counted", false).await;
    let uri = format!("/api/posts/post/{}/", id);

    let response = send(&f.t.app, get(&uri, Some(&f.user_cookies))).await;
    assert_eq!(body_json(response).await["data"]["view_count"], 1);
    let response = send(&f.t.app, get(&uri, Some(&f.admin_cookies))).await;
    assert_eq!(body_json(response).await["data"]["view_count"], 2);

    let (views,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM post_views WHERE post_id = ? AND ip_address = '127.0.0.1'")
        .bind(id)
        .fetch_one(f.t.db.pool())
        .await
        .unwrap();
    assert_eq!(views, 2);
}

#[tokio::test]
async fn test_like_toggles() {
    let f = fixture().await;
    let id = create_post(&f.t.db, f.admin_id, f.category, "Likeable", false).await;
    let uri = format!("/api/posts/post/{}/like/", id);

    let response = send(&f.t.app, empty("POST", &uri, Some(&f.user_cookies))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["liked"], true);
    assert_eq!(json["data"]["like_count"], 1);

    let response = send(&f.t.app, empty("POST", &uri, Some(&f.admin_cookies))).await;
    assert_eq!(body_json(response).await["data"]["like_count"], 2);

    let response = send(&f.t.app, get(&format!("/api/posts/post/{}/", id), Some(&f.user_cookies))).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["liked"], true);
    assert_eq!(json["data"]["like_count"], 2);

    let response = send(&f.t.app, empty("POST", &uri, Some(&f.user_cookies))).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["liked"], false);
    assert_eq!(json["data"]["like_count"], 1);
}

#[tokio::test]
async fn test_comments_wait_for_approval() {
    let f = fixture().await;
    let id = create_post(&f.t.db, f.admin_id, f.category, "Discuss", false).await;
    let uri = format!("/api/posts/post/{}/comments/", id);

    let response = send(&f.t.app, json_request("POST", &uri, Some(&f.user_cookies), body!({ "content": "  " }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&f.t.app, json_request("POST", &uri, Some(&f.user_cookies), body!({ "content": "Great read" }))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Comment submitted and awaiting approval");
    assert_eq!(json["data"]["is_approved"], false);
    let comment_id = json["data"]["id"].as_i64().unwrap();

    let response = send(&f.t.app, get(&uri, Some(&f.user_cookies))).await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());

    send(
        &f.t.app,
        empty("PATCH", &format!("/api/admin/comments/{}/approve/", comment_id), Some(&f.admin_cookies)),
    )
    .await;

    let response = send(&f.t.app, get(&uri, Some(&f.user_cookies))).await;
    let json = body_json(response).await;
    let comments = json["data"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["username"], "reader");
    assert_eq!(comments[0]["content"], "Great read");
}

#[tokio::test]
async fn test_invalid_post_ids() {
    let f = fixture().await;

    for uri in ["/api/posts/post/0/", "/api/posts/post/-3/", "/api/posts/post/nope/", "/api/posts/post/77/"] {
        let response = send(&f.t.app, get(uri, Some(&f.admin_cookies))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_view_ip_comes_from_trusted_header() {
    let t = test_app_with(|config| {
        config.ip_extractor = Some(quillpost::cli::IpExtractor::from(
            quillpost::cli::ClientIpHeader::XForwardedFor,
        ))
    })
    .await;
    let admin = create_user(&t.db, "editor", UserRole::Admin).await;
    let category = create_category(&t.db, "News").await;
    let id = create_post(&t.db, admin, category, "Proxied", false).await;
    let uri = format!("/api/posts/post/{}/", id);
    let cookies = session_cookies(&t.jwt, admin);

    let mut request = get(&uri, Some(&cookies));
    request
        .headers_mut()
        .insert("x-forwarded-for", "198.51.100.7, 10.0.0.1".parse().unwrap());
    assert_eq!(send(&t.app, request).await.status(), StatusCode::OK);

    // No header behind a proxy: the view still counts, without an address.
    assert_eq!(send(&t.app, get(&uri, Some(&cookies))).await.status(), StatusCode::OK);

    let addresses: Vec<(Option<String>,)> =
        sqlx::query_as("SELECT ip_address FROM post_views WHERE post_id = ? ORDER BY id")
            .bind(id)
            .fetch_all(t.db.pool())
            .await
            .unwrap();
    assert_eq!(addresses, vec![(Some("198.51.100.7".to_string()),), (None,)]);
}
