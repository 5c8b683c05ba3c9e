//! Concurrent writers against a file database served by a multi-connection pool.

mod common;

use admin_portal::{
    models::{
        CreateFeatureRequest, CreateQuestionRequest, CreateRoleRequest, Difficulty,
        QuestionStatus, QuestionType, User,
    },
    repository::{
        FeatureRequestRepository, QuestionRepository, RepositoryState, RoleDeletion,
        RoleRepository,
    },
};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::{TestApp, create_user_with_roles, file_repo, read_json};
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tower::util::ServiceExt;

fn json_request(method: &str, uri: &str, user_id: i64, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user_id.to_string())
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Sends one request per `(user, body)` pair at the same time and collects the statuses.
async fn send_concurrently(
    router: &Router,
    method: &'static str,
    uri: String,
    calls: Vec<(i64, Value)>,
) -> Vec<StatusCode> {
    let mut tasks = JoinSet::new();
    for (user_id, body) in calls {
        let router = router.clone();
        let request = json_request(method, &uri, user_id, body);
        tasks.spawn(async move { router.oneshot(request).await.unwrap().status() });
    }
    let mut statuses = Vec::new();
    while let Some(status) = tasks.join_next().await {
        statuses.push(status.unwrap());
    }
    statuses
}

async fn create_voters(repo: &RepositoryState, count: usize) -> Vec<User> {
    let mut voters = Vec::new();
    for i in 0..count {
        voters.push(create_user_with_roles(repo, &format!("voter{i}"), &["author"]).await);
    }
    voters
}

async fn pending_question(repo: &RepositoryState, author: i64) -> i64 {
    let question = repo
        .create_question(
            &CreateQuestionRequest {
                question_text: "Largest planet?".to_string(),
                question_type: QuestionType::ShortAnswer,
                options: vec![],
                correct_answer: "Jupiter".to_string(),
                subject: "science".to_string(),
                difficulty: Difficulty::Easy,
            },
            author,
        )
        .await
        .unwrap();
    repo.apply_transition(
        question.id,
        QuestionStatus::Draft,
        QuestionStatus::PendingReview,
        author,
        None,
    )
    .await
    .unwrap()
    .expect("draft question should be submitted");
    question.id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_all_succeed() {
    let (_dir, repo) = file_repo().await;
    let app = TestApp::with_repo(repo.clone());
    let voters = create_voters(&repo, 20).await;
    let fr = repo
        .create_feature_request(
            &CreateFeatureRequest {
                title: "Bulk export".to_string(),
                description: "Export everything as CSV".to_string(),
            },
            voters[0].id,
        )
        .await
        .unwrap();
    let uri = format!("/api/feature_requests/{}/vote", fr.id);

    // Everyone votes up.
    let calls = voters
        .iter()
        .map(|v| (v.id, json!({ "vote_type": "up" })))
        .collect();
    let statuses = send_concurrently(&app.router, "POST", uri.clone(), calls).await;
    assert!(statuses.iter().all(|s| *s == StatusCode::OK), "{statuses:?}");

    // Even voters switch to down, odd voters toggle their up vote off.
    let calls = voters
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let vote = if i % 2 == 0 { "down" } else { "up" };
            (v.id, json!({ "vote_type": vote }))
        })
        .collect();
    let statuses = send_concurrently(&app.router, "POST", uri, calls).await;
    assert!(statuses.iter().all(|s| *s == StatusCode::OK), "{statuses:?}");

    let (status, body) = app
        .call(
            "GET",
            &format!("/api/feature_requests/{}", fr.id),
            Some(voters[0].id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["upvotes"], 0);
    assert_eq!(body["downvotes"], 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_reviews_have_a_single_winner() {
    let (_dir, repo) = file_repo().await;
    let app = TestApp::with_repo(repo.clone());
    let author = create_user_with_roles(&repo, "alice", &["author"]).await;
    let first = create_user_with_roles(&repo, "rob", &["reviewer"]).await;
    let second = create_user_with_roles(&repo, "rita", &["reviewer"]).await;
    let question_id = pending_question(&repo, author.id).await;

    let statuses = send_concurrently(
        &app.router,
        "PATCH",
        format!("/api/question_bank/questions/{question_id}/status"),
        vec![
            (first.id, json!({ "status": "approved" })),
            (second.id, json!({ "status": "rejected" })),
        ],
    )
    .await;

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    // The loser either lost the compare-and-set (409) or read the winner's status,
    // from which its transition does not exist (403).
    let loser = statuses.iter().find(|s| **s != StatusCode::OK).unwrap();
    assert!(
        *loser == StatusCode::CONFLICT || *loser == StatusCode::FORBIDDEN,
        "{statuses:?}"
    );

    let response = app
        .send(
            Request::get(format!("/api/question_bank/questions/{question_id}/history"))
                .header("x-user-id", author.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    let history = read_json(response).await;
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transitions_from_the_same_status() {
    let (_dir, repo) = file_repo().await;
    let author = create_user_with_roles(&repo, "alice", &["author"]).await;
    let reviewer = create_user_with_roles(&repo, "rob", &["reviewer"]).await;
    let question_id = pending_question(&repo, author.id).await;
    let reviewer_id = reviewer.id;

    let mut tasks = JoinSet::new();
    for i in 0..8 {
        let repo = repo.clone();
        let to = if i % 2 == 0 {
            QuestionStatus::Approved
        } else {
            QuestionStatus::Rejected
        };
        tasks.spawn(async move {
            repo.apply_transition(
                question_id,
                QuestionStatus::PendingReview,
                to,
                reviewer_id,
                None,
            )
            .await
        });
    }

    let mut winners = 0;
    let mut stale = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap().expect("transition should not fail") {
            Some(_) => winners += 1,
            None => stale += 1,
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(stale, 7);
    assert_eq!(repo.status_history(question_id).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_role_changes() {
    let (_dir, repo) = file_repo().await;
    let role_id = repo
        .create_role(&CreateRoleRequest {
            name: "auditor".to_string(),
            description: None,
            permission_ids: vec![],
        })
        .await
        .unwrap()
        .id;
    let permissions = repo.list_permissions().await.unwrap();

    let mut tasks = JoinSet::new();
    for permission in permissions.iter().take(6) {
        let repo = repo.clone();
        let ids = vec![permission.id];
        tasks.spawn(async move { repo.set_role_permissions(role_id, &ids).await });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().expect("permission replacement should not fail");
    }
    // Each replacement is atomic, so exactly one set survives.
    assert_eq!(repo.role_permissions(role_id).await.unwrap().len(), 1);

    let mut tasks = JoinSet::new();
    for _ in 0..6 {
        let repo = repo.clone();
        tasks.spawn(async move { repo.delete_role(role_id).await });
    }
    let mut outcomes = Vec::new();
    while let Some(result) = tasks.join_next().await {
        outcomes.push(result.unwrap().expect("role delete should not fail"));
    }
    let deleted = outcomes
        .iter()
        .filter(|o| matches!(o, RoleDeletion::Deleted))
        .count();
    let missing = outcomes
        .iter()
        .filter(|o| matches!(o, RoleDeletion::NotFound))
        .count();
    assert_eq!((deleted, missing), (1, 5));
}
