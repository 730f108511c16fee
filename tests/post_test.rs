mod common;

use serde_json::Value;

fn ids(body: &Value) -> Vec<i64> {
    body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn create_and_get_post() {
    let app = common::spawn_app().await;
    let (author_id, token) = common::create_test_user(&app, "author").await;

    let post_id = common::create_post(&app, &token, None, "Hello campus").await;

    let body = common::get_json(&app, &format!("/posts/{post_id}")).await;
    assert_eq!(body["data"]["title"], "Hello campus");
    assert_eq!(body["data"]["author_id"], author_id);
    assert_eq!(body["data"]["upvotes_count"], 0);
    assert_eq!(body["data"]["comments_count"], 0);
    assert_eq!(body["data"]["is_pinned"], false);
}

#[tokio::test]
async fn get_missing_post_is_not_found() {
    let app = common::spawn_app().await;
    let resp = app.client.get(app.url("/posts/424242")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn create_with_unknown_category_is_rejected() {
    let app = common::spawn_app().await;
    let (_, token) = common::create_test_user(&app, "author").await;

    let resp = app
        .client
        .post(app.url("/posts"))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "category_id": 98765,
            "title": "Lost",
            "content": "Nowhere"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn list_filters_by_category_and_author() {
    let app = common::spawn_app().await;
    let (admin_id, admin) = common::create_test_user(&app, "admin").await;
    common::make_admin(&app.db, admin_id).await;
    let (other_id, other) = common::create_test_user(&app, "other").await;
    let (category_id, slug) = common::create_category(&app, &admin).await;

    let in_category = common::create_post(&app, &admin, Some(category_id), "Filed").await;
    let by_other = common::create_post(&app, &other, None, "Loose").await;

    let body = common::get_json(&app, &format!("/posts?category_slug={slug}")).await;
    assert_eq!(ids(&body), vec![in_category as i64]);

    let body = common::get_json(&app, &format!("/posts?author_id={other_id}")).await;
    assert_eq!(ids(&body), vec![by_other as i64]);

    let body = common::get_json(&app, "/posts?category_slug=does-not-exist").await;
    assert!(ids(&body).is_empty());
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn unknown_ordering_is_rejected() {
    let app = common::spawn_app().await;
    let resp = app
        .client
        .get(app.url("/posts?ordering=password_hash"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn pinned_posts_lead_default_listing() {
    let app = common::spawn_app().await;
    let (admin_id, admin) = common::create_test_user(&app, "mod").await;
    common::set_role(&app.db, admin_id, "moderator").await;

    let older = common::create_post(&app, &admin, None, "Older").await;
    let newer = common::create_post(&app, &admin, None, "Newer").await;

    let body = common::get_json(&app, "/posts").await;
    assert_eq!(ids(&body), vec![newer as i64, older as i64]);

    let resp = app
        .client
        .put(app.url(&format!("/posts/{older}/pin")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body = common::get_json(&app, "/posts").await;
    assert_eq!(ids(&body), vec![older as i64, newer as i64]);

    let body = common::get_json(&app, "/posts?ordering=oldest").await;
    assert_eq!(ids(&body), vec![older as i64, newer as i64]);
}

#[tokio::test]
async fn trending_ranks_votes_then_comments() {
    let app = common::spawn_app().await;
    let (_, token) = common::create_test_user(&app, "trend").await;

    let quiet = common::create_post(&app, &token, None, "Quiet").await;
    let discussed = common::create_post(&app, &token, None, "Discussed").await;
    let liked = common::create_post(&app, &token, None, "Liked").await;

    common::create_comment(&app, &token, discussed, None).await;
    app.client
        .post(app.url(&format!("/posts/{liked}/vote")))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "value": 1 }))
        .send()
        .await
        .unwrap();

    let body = common::get_json(&app, "/posts/trending").await;
    let order: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(order, vec![liked as i64, discussed as i64, quiet as i64]);
}

#[tokio::test]
async fn only_author_or_staff_may_edit() {
    let app = common::spawn_app().await;
    let (_, author) = common::create_test_user(&app, "author").await;
    let (_, stranger) = common::create_test_user(&app, "stranger").await;
    let (mod_id, moderator) = common::create_test_user(&app, "moderator").await;
    common::set_role(&app.db, mod_id, "moderator").await;

    let post_id = common::create_post(&app, &author, None, "Mine").await;
    let edit = serde_json::json!({ "title": "Edited", "content": "New body" });

    let resp = app
        .client
        .put(app.url(&format!("/posts/{post_id}")))
        .bearer_auth(&stranger)
        .json(&edit)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .put(app.url(&format!("/posts/{post_id}")))
        .bearer_auth(&author)
        .json(&edit)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .client
        .delete(app.url(&format!("/posts/{post_id}")))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .delete(app.url(&format!("/posts/{post_id}")))
        .bearer_auth(&moderator)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .client
        .get(app.url(&format!("/posts/{post_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn pin_and_lock_are_staff_only() {
    let app = common::spawn_app().await;
    let (_, author) = common::create_test_user(&app, "author").await;
    let post_id = common::create_post(&app, &author, None, "Post").await;

    for action in ["pin", "lock"] {
        let resp = app
            .client
            .put(app.url(&format!("/posts/{post_id}/{action}")))
            .bearer_auth(&author)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403);
    }
}

#[tokio::test]
async fn concurrent_pin_toggles_both_apply() {
    let app = common::spawn_app().await;
    let (a_id, mod_a) = common::create_test_user(&app, "mod_a").await;
    let (b_id, mod_b) = common::create_test_user(&app, "mod_b").await;
    common::set_role(&app.db, a_id, "moderator").await;
    common::set_role(&app.db, b_id, "moderator").await;
    let post_id = common::create_post(&app, &mod_a, None, "Contested").await;

    let toggle = |token: String, action: &'static str| {
        let request = app
            .client
            .put(app.url(&format!("/posts/{post_id}/{action}")))
            .bearer_auth(token);
        async move {
            let resp = request.send().await.unwrap();
            assert_eq!(resp.status(), 200);
            resp.json::<Value>().await.unwrap()
        }
    };

    for (action, flag) in [("pin", "is_pinned"), ("lock", "is_locked")] {
        let (ra, rb) = tokio::join!(toggle(mod_a.clone(), action), toggle(mod_b.clone(), action));
        let mut seen = [
            ra["data"][flag].as_bool().unwrap(),
            rb["data"][flag].as_bool().unwrap(),
        ];
        seen.sort();
        assert_eq!(seen, [false, true], "each toggle sees the other's write");

        let body = common::get_json(&app, &format!("/posts/{post_id}")).await;
        assert_eq!(body["data"][flag], false);
    }
}

#[tokio::test]
async fn pin_on_missing_post_is_not_found() {
    let app = common::spawn_app().await;
    let (mod_id, moderator) = common::create_test_user(&app, "mod").await;
    common::set_role(&app.db, mod_id, "moderator").await;

    let resp = app
        .client
        .put(app.url("/posts/424242/pin"))
        .bearer_auth(&moderator)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn categories_report_post_counts() {
    let app = common::spawn_app().await;
    let (admin_id, admin) = common::create_test_user(&app, "admin").await;
    common::make_admin(&app.db, admin_id).await;
    let (busy_id, busy_slug) = common::create_category(&app, &admin).await;
    let (_, empty_slug) = common::create_category(&app, &admin).await;

    common::create_post(&app, &admin, Some(busy_id), "One").await;
    common::create_post(&app, &admin, Some(busy_id), "Two").await;
    common::create_post(&app, &admin, None, "Loose").await;

    let body = common::get_json(&app, &format!("/categories/{busy_slug}")).await;
    assert_eq!(body["data"]["posts_count"], 2);
    let body = common::get_json(&app, &format!("/categories/{empty_slug}")).await;
    assert_eq!(body["data"]["posts_count"], 0);

    let body = common::get_json(&app, "/categories").await;
    let counts: Vec<(String, i64)> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            (
                c["slug"].as_str().unwrap().to_string(),
                c["posts_count"].as_i64().unwrap(),
            )
        })
        .collect();
    assert!(counts.contains(&(busy_slug, 2)));
    assert!(counts.contains(&(empty_slug, 0)));
}

#[tokio::test]
async fn categories_are_staff_managed() {
    let app = common::spawn_app().await;
    let (_, user) = common::create_test_user(&app, "user").await;
    let (admin_id, admin) = common::create_test_user(&app, "admin").await;
    common::make_admin(&app.db, admin_id).await;

    let payload = serde_json::json!({ "name": "Exams", "slug": "exams" });

    let resp = app
        .client
        .post(app.url("/categories"))
        .bearer_auth(&user)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .post(app.url("/categories"))
        .bearer_auth(&admin)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = app
        .client
        .post(app.url("/categories"))
        .bearer_auth(&admin)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = app
        .client
        .post(app.url("/categories"))
        .bearer_auth(&admin)
        .json(&serde_json::json!({ "name": "Bad", "slug": "Bad Slug" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body = common::get_json(&app, "/categories").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let body = common::get_json(&app, "/categories/exams").await;
    assert_eq!(body["data"]["name"], "Exams");
}
