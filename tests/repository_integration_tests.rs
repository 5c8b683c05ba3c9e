mod common;

use admin_portal::{
    models::{
        ActivityFilter, CreateFeatureRequest, CreateQuestionRequest, CreateRoleRequest,
        Difficulty, NewActivity, QuestionStatus, QuestionType, VoteType,
    },
    repository::{
        ActivityRepository, FeatureRequestRepository, QuestionFilter, QuestionRepository,
        RoleDeletion, RoleRepository, UserRepository,
    },
};
use chrono::{Duration, Utc};
use common::{create_user_with_roles, role_id, test_repo};

fn sample_question(text: &str) -> CreateQuestionRequest {
    CreateQuestionRequest {
        question_text: text.to_string(),
        question_type: QuestionType::MultipleChoice,
        options: vec!["3".to_string(), "4".to_string(), "5".to_string()],
        correct_answer: "4".to_string(),
        subject: "math".to_string(),
        difficulty: Difficulty::Easy,
    }
}

// --- Users & roles ---

#[tokio::test]
async fn test_permissions_follow_active_role_links() {
    let repo = test_repo().await;
    let user = create_user_with_roles(&repo, "vera", &["viewer"]).await;

    let permissions = repo.user_permissions(user.id).await.unwrap();
    assert!(permissions.contains(&"questions:read".to_string()));
    assert!(!permissions.contains(&"questions:write".to_string()));

    let author = role_id(&repo, "author").await;
    repo.set_user_roles(user.id, &[author]).await.unwrap();

    let roles = repo.user_roles(user.id).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, "author");

    let permissions = repo.user_permissions(user.id).await.unwrap();
    assert!(permissions.contains(&"questions:write".to_string()));
    assert!(!permissions.contains(&"employees:read".to_string()));
}

#[tokio::test]
async fn test_find_credentials_accepts_username_or_email() {
    let repo = test_repo().await;
    let user = create_user_with_roles(&repo, "carla", &[]).await;

    let by_name = repo.find_credentials("carla").await.unwrap().unwrap();
    let by_email = repo
        .find_credentials("carla@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_name.id, user.id);
    assert_eq!(by_email.id, user.id);
    assert!(repo.find_credentials("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_role_delete_blocked_while_assigned() {
    let repo = test_repo().await;
    let role = repo
        .create_role(&CreateRoleRequest {
            name: "auditor".to_string(),
            description: None,
            permission_ids: vec![],
        })
        .await
        .unwrap();
    let user = create_user_with_roles(&repo, "ada", &[]).await;
    repo.set_user_roles(user.id, &[role.id]).await.unwrap();

    assert_eq!(repo.role_user_count(role.id).await.unwrap(), 1);
    assert_eq!(
        repo.delete_role(role.id).await.unwrap(),
        RoleDeletion::InUse(1)
    );

    // Unassigning leaves an inactive link, which does not block deletion.
    repo.set_user_roles(user.id, &[]).await.unwrap();
    assert_eq!(repo.delete_role(role.id).await.unwrap(), RoleDeletion::Deleted);
    assert_eq!(
        repo.delete_role(role.id).await.unwrap(),
        RoleDeletion::NotFound
    );
}

#[tokio::test]
async fn test_refresh_token_can_only_be_revoked_once() {
    let repo = test_repo().await;
    let user = create_user_with_roles(&repo, "rita", &[]).await;

    repo.store_refresh_token(user.id, "hash-1", Utc::now() + Duration::days(1))
        .await
        .unwrap();
    let record = repo.find_refresh_token("hash-1").await.unwrap().unwrap();
    assert_eq!(record.user_id, user.id);
    assert!(!record.revoked);

    assert!(repo.revoke_refresh_token(record.id).await.unwrap());
    assert!(!repo.revoke_refresh_token(record.id).await.unwrap());

    let record = repo.find_refresh_token("hash-1").await.unwrap().unwrap();
    assert!(record.revoked);
}

#[tokio::test]
async fn test_deactivate_user_revokes_tokens() {
    let repo = test_repo().await;
    let user = create_user_with_roles(&repo, "dora", &[]).await;
    repo.store_refresh_token(user.id, "hash-dora", Utc::now() + Duration::days(1))
        .await
        .unwrap();

    assert!(repo.deactivate_user(user.id).await.unwrap());

    let stored = repo.get_user(user.id).await.unwrap().unwrap();
    assert!(!stored.is_active);
    let token = repo.find_refresh_token("hash-dora").await.unwrap().unwrap();
    assert!(token.revoked);
    assert!(!repo.list_users(false).await.unwrap().iter().any(|u| u.id == user.id));
    assert!(repo.list_users(true).await.unwrap().iter().any(|u| u.id == user.id));
}

// --- Question workflow ---

#[tokio::test]
async fn test_transition_table_is_checked_per_role() {
    let repo = test_repo().await;
    let author = role_id(&repo, "author").await;
    let reviewer = role_id(&repo, "reviewer").await;

    assert!(
        repo.transition_allowed(QuestionStatus::Draft, QuestionStatus::PendingReview, &[author])
            .await
            .unwrap()
    );
    assert!(
        !repo
            .transition_allowed(
                QuestionStatus::PendingReview,
                QuestionStatus::Approved,
                &[author]
            )
            .await
            .unwrap()
    );
    assert!(
        repo.transition_allowed(
            QuestionStatus::PendingReview,
            QuestionStatus::Approved,
            &[author, reviewer]
        )
        .await
        .unwrap()
    );
    assert!(
        !repo
            .transition_allowed(QuestionStatus::Draft, QuestionStatus::PendingReview, &[])
            .await
            .unwrap()
    );

    let mut targets = repo
        .allowed_targets(QuestionStatus::PendingReview, &[reviewer])
        .await
        .unwrap();
    targets.sort_by_key(|s| s.as_str());
    assert_eq!(
        targets,
        vec![
            QuestionStatus::Approved,
            QuestionStatus::NeedsRevision,
            QuestionStatus::Rejected
        ]
    );
}

#[tokio::test]
async fn test_apply_transition_records_history_and_reviewer() {
    let repo = test_repo().await;
    let author = create_user_with_roles(&repo, "alice", &["author"]).await;
    let reviewer = create_user_with_roles(&repo, "rob", &["reviewer"]).await;

    let question = repo
        .create_question(&sample_question("2 + 2 = ?"), author.id)
        .await
        .unwrap();
    assert_eq!(question.status, QuestionStatus::Draft);
    assert_eq!(question.options.0.len(), 3);

    let submitted = repo
        .apply_transition(
            question.id,
            QuestionStatus::Draft,
            QuestionStatus::PendingReview,
            author.id,
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(submitted.status, QuestionStatus::PendingReview);
    assert!(submitted.reviewed_by.is_none());

    let approved = repo
        .apply_transition(
            question.id,
            QuestionStatus::PendingReview,
            QuestionStatus::Approved,
            reviewer.id,
            Some("Looks good"),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approved.status, QuestionStatus::Approved);
    assert_eq!(approved.reviewed_by, Some(reviewer.id));
    assert!(approved.reviewed_at.is_some());

    // A stale `from` status is refused.
    let stale = repo
        .apply_transition(
            question.id,
            QuestionStatus::PendingReview,
            QuestionStatus::Rejected,
            reviewer.id,
            None,
        )
        .await
        .unwrap();
    assert!(stale.is_none());

    let history = repo.status_history(question.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].from_status, QuestionStatus::Draft);
    assert_eq!(history[1].to_status, QuestionStatus::Approved);
    assert_eq!(history[1].changed_by, reviewer.id);

    let comments = repo.list_comments(question.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].comment, "Looks good");
    assert_eq!(comments[0].author_username.as_deref(), Some("rob"));
}

#[tokio::test]
async fn test_list_questions_filters() {
    let repo = test_repo().await;
    let author = create_user_with_roles(&repo, "alice", &["author"]).await;

    repo.create_question(&sample_question("What is 2 + 2?"), author.id)
        .await
        .unwrap();
    let mut history = sample_question("Year of the Magna Carta?");
    history.question_type = QuestionType::ShortAnswer;
    history.options = vec![];
    history.correct_answer = "1215".to_string();
    history.subject = "history".to_string();
    history.difficulty = Difficulty::Hard;
    repo.create_question(&history, author.id).await.unwrap();

    let all = repo.list_questions(&QuestionFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let by_subject = repo
        .list_questions(&QuestionFilter {
            subject: Some("history".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_subject.len(), 1);
    assert_eq!(by_subject[0].correct_answer, "1215");

    let by_search = repo
        .list_questions(&QuestionFilter {
            search: Some("magna".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_search.len(), 1);

    let pending = repo
        .list_questions(&QuestionFilter {
            status: Some(QuestionStatus::PendingReview),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_question_search_matches_wildcards_literally() {
    let repo = test_repo().await;
    let author = create_user_with_roles(&repo, "alice", &["author"]).await;

    for text in [
        "Is 100% of 4 equal to 4?",
        "Is 1000 of 4 equal to 4?",
        "Define snake_case",
        "Define snakeXcase",
    ] {
        repo.create_question(&sample_question(text), author.id)
            .await
            .unwrap();
    }

    let search = |term: &str| QuestionFilter {
        search: Some(term.to_string()),
        ..Default::default()
    };

    let percent = repo.list_questions(&search("100%")).await.unwrap();
    assert_eq!(percent.len(), 1);
    assert_eq!(percent[0].question_text, "Is 100% of 4 equal to 4?");

    let underscore = repo.list_questions(&search("snake_case")).await.unwrap();
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].question_text, "Define snake_case");

    assert!(repo.list_questions(&search(r"\")).await.unwrap().is_empty());
}

// --- Feature requests ---

#[tokio::test]
async fn test_vote_toggle_keeps_counters_consistent() {
    let repo = test_repo().await;
    let alice = create_user_with_roles(&repo, "alice", &["author"]).await;
    let bob = create_user_with_roles(&repo, "bob", &["author"]).await;

    let fr = repo
        .create_feature_request(
            &CreateFeatureRequest {
                title: "Dark mode".to_string(),
                description: "Please".to_string(),
            },
            alice.id,
        )
        .await
        .unwrap();

    let first = repo.toggle_vote(fr.id, bob.id, VoteType::Up).await.unwrap().unwrap();
    assert_eq!((first.upvotes, first.downvotes), (1, 0));
    assert_eq!(first.user_vote, Some(VoteType::Up));

    let switched = repo.toggle_vote(fr.id, bob.id, VoteType::Down).await.unwrap().unwrap();
    assert_eq!((switched.upvotes, switched.downvotes), (0, 1));
    assert_eq!(switched.user_vote, Some(VoteType::Down));

    let removed = repo.toggle_vote(fr.id, bob.id, VoteType::Down).await.unwrap().unwrap();
    assert_eq!((removed.upvotes, removed.downvotes), (0, 0));
    assert_eq!(removed.user_vote, None);

    repo.toggle_vote(fr.id, alice.id, VoteType::Up).await.unwrap();
    let stored = repo.get_feature_request(fr.id).await.unwrap().unwrap();
    assert_eq!((stored.upvotes, stored.downvotes), (1, 0));

    assert!(repo.toggle_vote(9_999, bob.id, VoteType::Up).await.unwrap().is_none());
}

#[tokio::test]
async fn test_feature_requests_ordered_by_net_votes() {
    let repo = test_repo().await;
    let alice = create_user_with_roles(&repo, "alice", &["author"]).await;
    let bob = create_user_with_roles(&repo, "bob", &["author"]).await;

    let mut ids = Vec::new();
    for title in ["first", "second", "third"] {
        let fr = repo
            .create_feature_request(
                &CreateFeatureRequest {
                    title: title.to_string(),
                    description: "desc".to_string(),
                },
                alice.id,
            )
            .await
            .unwrap();
        ids.push(fr.id);
    }

    repo.toggle_vote(ids[0], alice.id, VoteType::Down).await.unwrap();
    repo.toggle_vote(ids[1], alice.id, VoteType::Up).await.unwrap();
    repo.toggle_vote(ids[1], bob.id, VoteType::Up).await.unwrap();

    let listed: Vec<i64> = repo
        .list_feature_requests(None)
        .await
        .unwrap()
        .into_iter()
        .map(|fr| fr.id)
        .collect();
    assert_eq!(listed, vec![ids[1], ids[2], ids[0]]);
}

// --- Activity ---

#[tokio::test]
async fn test_activity_log_filters_and_joins_username() {
    let repo = test_repo().await;
    let user = create_user_with_roles(&repo, "lena", &[]).await;

    repo.log_activity(&NewActivity::new(user.id, "create", "question", Some(1)))
        .await
        .unwrap();
    repo.log_activity(&NewActivity::new(user.id, "delete", "employee", Some(2)).details("soft"))
        .await
        .unwrap();
    repo.log_activity(&NewActivity {
        action: "login_failed".to_string(),
        entity_type: "user".to_string(),
        ..Default::default()
    })
    .await
    .unwrap();

    let all = repo.list_activity(&ActivityFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].action, "login_failed");
    assert!(all[0].username.is_none());

    let deletes = repo
        .list_activity(&ActivityFilter {
            action: Some("delete".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].details.as_deref(), Some("soft"));
    assert_eq!(deletes[0].username.as_deref(), Some("lena"));

    let limited = repo
        .list_activity(&ActivityFilter {
            user_id: Some(user.id),
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}
