mod common;

use campus_talk::models::vote;
use serde_json::Value;

async fn vote(app: &common::TestApp, token: &str, post_id: i32, value: Value) -> reqwest::Response {
    app.client
        .post(app.url(&format!("/posts/{post_id}/vote")))
        .bearer_auth(token)
        .json(&serde_json::json!({ "value": value }))
        .send()
        .await
        .unwrap()
}

async fn upvotes_count(app: &common::TestApp, post_id: i32) -> i64 {
    let body = common::get_json(app, &format!("/posts/{post_id}")).await;
    body["data"]["upvotes_count"].as_i64().unwrap()
}

async fn setup(app: &common::TestApp) -> (String, i32) {
    let (_, token) = common::create_test_user(app, "voteuser").await;
    let post_id = common::create_post(app, &token, None, "Vote Test").await;
    (token, post_id)
}

#[tokio::test]
async fn toggle_scenario_on_post() {
    let app = common::spawn_app().await;
    let (token, post_id) = setup(&app).await;
    assert_eq!(upvotes_count(&app, post_id).await, 0);

    let resp = vote(&app, &token, post_id, 1.into()).await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Vote recorded");
    assert_eq!(body["data"]["target_type"], "post");
    assert_eq!(body["data"]["value"], 1);
    assert_eq!(body["data"]["upvotes_count"], 1);

    let resp = vote(&app, &token, post_id, 1.into()).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Vote removed");
    assert_eq!(body["data"]["value"], 0);
    assert_eq!(body["data"]["upvotes_count"], 0);

    let resp = vote(&app, &token, post_id, (-1).into()).await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["upvotes_count"], -1);

    let resp = vote(&app, &token, post_id, 1.into()).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Vote updated");
    assert_eq!(body["data"]["value"], 1);
    assert_eq!(body["data"]["upvotes_count"], 1);

    assert_eq!(upvotes_count(&app, post_id).await, 1);
}

#[tokio::test]
async fn flip_moves_counter_by_two() {
    let app = common::spawn_app().await;
    let (token, post_id) = setup(&app).await;
    let (_, other) = common::create_test_user(&app, "other").await;

    vote(&app, &other, post_id, 1.into()).await;
    vote(&app, &token, post_id, 1.into()).await;
    assert_eq!(upvotes_count(&app, post_id).await, 2);

    let resp = vote(&app, &token, post_id, (-1).into()).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(upvotes_count(&app, post_id).await, 0);
}

#[tokio::test]
async fn invalid_value_changes_nothing() {
    let app = common::spawn_app().await;
    let (token, post_id) = setup(&app).await;
    vote(&app, &token, post_id, 1.into()).await;

    for bad in [Value::from(2), Value::from(0), Value::from("up")] {
        let resp = vote(&app, &token, post_id, bad).await;
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Invalid vote value");
    }

    assert_eq!(upvotes_count(&app, post_id).await, 1);
}

#[tokio::test]
async fn missing_post_is_not_found() {
    let app = common::spawn_app().await;
    let (token, _) = setup(&app).await;

    let resp = vote(&app, &token, 999_999, 1.into()).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn missing_post_is_reported_before_bad_value() {
    let app = common::spawn_app().await;
    let (token, post_id) = setup(&app).await;
    vote(&app, &token, post_id, 1.into()).await;
    let before = common::total_votes(&app.db).await;

    let resp = vote(&app, &token, 999_999, 2.into()).await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    let resp = vote(&app, &token, 999_999, 1.into()).await;
    assert_eq!(resp.status(), 404);

    assert_eq!(common::total_votes(&app.db).await, before);
    assert_eq!(upvotes_count(&app, post_id).await, 1);
}

#[tokio::test]
async fn counter_matches_sum_of_stored_votes() {
    let app = common::spawn_app().await;
    let (_, author) = common::create_test_user(&app, "author").await;
    let first = common::create_post(&app, &author, None, "First").await;
    let second = common::create_post(&app, &author, None, "Second").await;

    let mut voters = Vec::new();
    for i in 0..4 {
        let (_, token) = common::create_test_user(&app, &format!("mixed{i}")).await;
        voters.push(token);
    }

    // (voter, post, value)
    let sequence = [
        (0, first, 1),
        (1, first, -1),
        (2, first, 1),
        (0, first, -1),
        (3, second, 1),
        (1, first, -1),
        (2, second, -1),
        (0, second, 1),
        (3, first, 1),
        (2, first, -1),
        (3, second, 1),
        (1, second, -1),
        (0, first, 1),
        (2, second, -1),
    ];
    for (voter, post_id, value) in sequence {
        let resp = vote(&app, &voters[voter], post_id, value.into()).await;
        assert!(resp.status().is_success());
    }

    for post_id in [first, second] {
        let sum = common::vote_sum(&app.db, "post_id", post_id).await;
        assert_eq!(upvotes_count(&app, post_id).await, sum);

        let rows = common::stored_votes(&app.db, vote::Column::PostId, post_id).await;
        let mut voters_seen: Vec<i32> = rows.iter().map(|(user_id, _)| *user_id).collect();
        voters_seen.dedup();
        assert_eq!(voters_seen.len(), rows.len(), "one vote per voter");
    }
}

#[tokio::test]
async fn toggling_keeps_at_most_one_row() {
    let app = common::spawn_app().await;
    let (user_id, token) = common::create_test_user(&app, "toggler").await;
    let flipped = common::create_post(&app, &token, None, "Flipped").await;
    let retracted = common::create_post(&app, &token, None, "Retracted").await;

    vote(&app, &token, flipped, 1.into()).await;
    vote(&app, &token, flipped, (-1).into()).await;
    assert_eq!(
        common::stored_votes(&app.db, vote::Column::PostId, flipped).await,
        vec![(user_id, -1)]
    );
    assert_eq!(upvotes_count(&app, flipped).await, -1);

    vote(&app, &token, retracted, 1.into()).await;
    vote(&app, &token, retracted, 1.into()).await;
    assert!(common::stored_votes(&app.db, vote::Column::PostId, retracted)
        .await
        .is_empty());
    assert_eq!(upvotes_count(&app, retracted).await, 0);
}

#[tokio::test]
async fn whole_float_value_is_accepted() {
    let app = common::spawn_app().await;
    let (token, post_id) = setup(&app).await;

    let resp = vote(&app, &token, post_id, Value::from(1.0)).await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["value"], 1);

    let resp = vote(&app, &token, post_id, Value::from(1.5)).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(upvotes_count(&app, post_id).await, 1);
}

#[tokio::test]
async fn body_must_be_a_json_object() {
    let app = common::spawn_app().await;
    let (token, post_id) = setup(&app).await;
    let url = app.url(&format!("/posts/{post_id}/vote"));

    let resp = app
        .client
        .post(&url)
        .bearer_auth(&token)
        .json(&serde_json::json!([1]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    // Malformed JSON
    let resp = app
        .client
        .post(&url)
        .bearer_auth(&token)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{\"value\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    // No content type
    let resp = app
        .client
        .post(&url)
        .bearer_auth(&token)
        .body("{\"value\": 1}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    assert_eq!(upvotes_count(&app, post_id).await, 0);
    assert_eq!(common::total_votes(&app.db).await, 0);
}

#[tokio::test]
async fn user_vote_follows_toggle_state() {
    let app = common::spawn_app().await;
    let (token, post_id) = setup(&app).await;
    let (_, other) = common::create_test_user(&app, "other").await;
    let path = format!("/posts/{post_id}");

    let body = common::get_json_as(&app, &token, &path).await;
    assert!(body["data"]["user_vote"].is_null());

    vote(&app, &token, post_id, 1.into()).await;
    let body = common::get_json_as(&app, &token, &path).await;
    assert_eq!(body["data"]["user_vote"], 1);

    vote(&app, &token, post_id, (-1).into()).await;
    let body = common::get_json_as(&app, &token, &path).await;
    assert_eq!(body["data"]["user_vote"], -1);

    let body = common::get_json_as(&app, &token, "/posts").await;
    assert_eq!(body["data"]["items"][0]["user_vote"], -1);
    let body = common::get_json_as(&app, &token, "/posts/trending").await;
    assert_eq!(body["data"][0]["user_vote"], -1);

    // Other viewers and anonymous readers see no vote of their own.
    let body = common::get_json_as(&app, &other, &path).await;
    assert!(body["data"]["user_vote"].is_null());
    let body = common::get_json(&app, &path).await;
    assert!(body["data"]["user_vote"].is_null());

    vote(&app, &token, post_id, (-1).into()).await;
    let body = common::get_json_as(&app, &token, &path).await;
    assert!(body["data"]["user_vote"].is_null());
}

#[tokio::test]
async fn invalid_token_on_public_read_is_rejected() {
    let app = common::spawn_app().await;
    let (_, post_id) = setup(&app).await;

    let resp = app
        .client
        .get(app.url(&format!("/posts/{post_id}")))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn unauthenticated_vote_is_rejected() {
    let app = common::spawn_app().await;
    let (_, post_id) = setup(&app).await;

    let resp = app
        .client
        .post(app.url(&format!("/posts/{post_id}/vote")))
        .json(&serde_json::json!({ "value": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert_eq!(upvotes_count(&app, post_id).await, 0);
}

#[tokio::test]
async fn concurrent_voters_both_count() {
    let app = common::spawn_app().await;
    let (_, post_id) = setup(&app).await;
    let (_, b) = common::create_test_user(&app, "voter_b").await;
    let (_, c) = common::create_test_user(&app, "voter_c").await;

    let (rb, rc) = tokio::join!(
        vote(&app, &b, post_id, 1.into()),
        vote(&app, &c, post_id, 1.into())
    );
    assert_eq!(rb.status(), 201);
    assert_eq!(rc.status(), 201);
    assert_eq!(upvotes_count(&app, post_id).await, 2);
}

#[tokio::test]
async fn popular_ordering_follows_votes() {
    let app = common::spawn_app().await;
    let (token, first) = setup(&app).await;
    let second = common::create_post(&app, &token, None, "Second").await;

    vote(&app, &token, second, 1.into()).await;
    vote(&app, &token, first, (-1).into()).await;

    let body = common::get_json(&app, "/posts?ordering=popular").await;
    let ids: Vec<i64> = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second as i64, first as i64]);
}
