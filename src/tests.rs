//! Integration tests for the CFP review backend.

use std::sync::Arc;

use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, LogFormat};
use crate::db::{init_database, Repository};
use crate::search::SearchIndex;
use crate::{create_router, AppState};

const TEST_PSK: &str = "test-api-key";

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
});

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    /// The bootstrap admin, created before any test step runs
    admin: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_options(Some(TEST_PSK.to_string()), true).await
    }

    async fn with_options(psk: Option<String>, allow_resubmission: bool) -> Self {
        Lazy::force(&TRACING);

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let index_path = temp_dir.path().join("index");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let search = Arc::new(SearchIndex::open(&index_path).expect("Failed to init search"));

        let config = Config {
            api_psk: psk.clone(),
            db_path,
            index_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Text,
            allow_resubmission,
        };

        let state = AppState {
            repo,
            search,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        let mut fixture = TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            admin: String::new(),
            _temp_dir: temp_dir,
        };

        let (status, body) = fixture
            .post("/api/members", None, json!({ "displayName": "Ada Admin" }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["role"], "admin");
        fixture.admin = body["data"]["id"].as_str().unwrap().to_string();

        fixture
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, member: Option<&str>) -> (StatusCode, Value) {
        let mut request = self.client.get(self.url(path));
        if let Some(member) = member {
            request = request.header("x-member-id", member);
        }
        let resp = request.send().await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        member: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut request = self.client.request(method, self.url(path)).json(&body);
        if let Some(member) = member {
            request = request.header("x-member-id", member);
        }
        let resp = request.send().await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, member: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, member, body).await
    }

    async fn put(&self, path: &str, member: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, path, member, body).await
    }

    async fn delete(&self, path: &str, member: Option<&str>) -> (StatusCode, Value) {
        self.send(reqwest::Method::DELETE, path, member, Value::Null).await
    }

    /// Create a member as the admin and return its id.
    async fn member(&self, name: &str, role: &str) -> String {
        let (status, body) = self
            .post(
                "/api/members",
                Some(&self.admin),
                json!({ "displayName": name, "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Submit a proposal as `submitter` and return its id.
    async fn proposal(&self, submitter: &str, title: &str) -> String {
        let (status, body) = self
            .post(
                "/api/proposals",
                Some(submitter),
                json!({
                    "title": title,
                    "description": "A deep dive with live demos",
                    "track": "backend",
                    "sessionType": "talk",
                    "durationMinutes": 45
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Designate `member_id` as evaluator and return the evaluator id.
    async fn evaluator(&self, organizer: &str, member_id: &str) -> String {
        let (status, body) = self
            .post(
                "/api/evaluators",
                Some(organizer),
                json!({ "memberId": member_id, "expertise": "distributed systems" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Assign an evaluator and return the evaluation id.
    async fn assign(&self, organizer: &str, proposal_id: &str, evaluator_id: &str) -> String {
        let (status, body) = self
            .post(
                &format!("/api/proposals/{}/evaluations", proposal_id),
                Some(organizer),
                json!({ "evaluatorId": evaluator_id }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn submit(&self, reviewer: &str, evaluation_id: &str, scores: [i64; 5]) -> (StatusCode, Value) {
        self.post(
            &format!("/api/evaluations/{}/submit", evaluation_id),
            Some(reviewer),
            json!({
                "scores": {
                    "relevance": scores[0],
                    "quality": scores[1],
                    "innovation": scores[2],
                    "impact": scores[3],
                    "feasibility": scores[4]
                },
                "comments": "Well structured and relevant to the audience",
                "recommendation": "accept"
            }),
        )
        .await
    }
}

/// An organizer, a speaker and two evaluators assigned to one proposal.
struct ReviewSetup {
    organizer: String,
    speaker: String,
    reviewers: [String; 2],
    proposal_id: String,
    evaluations: [String; 2],
}

async fn review_setup(fixture: &TestFixture) -> ReviewSetup {
    let organizer = fixture.member("Olga Organizer", "organizer").await;
    let speaker = fixture.member("Sam Speaker", "member").await;
    let first = fixture.member("Rita Reviewer", "member").await;
    let second = fixture.member("Rob Reviewer", "member").await;

    let proposal_id = fixture.proposal(&speaker, "Async Rust in Production").await;
    let first_evaluator = fixture.evaluator(&organizer, &first).await;
    let second_evaluator = fixture.evaluator(&organizer, &second).await;

    let first_evaluation = fixture.assign(&organizer, &proposal_id, &first_evaluator).await;
    let second_evaluation = fixture.assign(&organizer, &proposal_id, &second_evaluator).await;

    ReviewSetup {
        organizer,
        speaker,
        reviewers: [first, second],
        proposal_id,
        evaluations: [first_evaluation, second_evaluation],
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_and_invalid_psk() {
    let fixture = TestFixture::new().await;
    let client = Client::new();

    let resp = client
        .get(fixture.url("/api/proposals"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = client
        .get(fixture.url("/api/proposals"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(fixture.url("/api/proposals"))
        .bearer_auth(TEST_PSK)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_open_access_without_psk() {
    let fixture = TestFixture::with_options(None, true).await;

    let (status, body) = fixture.get("/api/datastore/revision", None).await;
    assert_eq!(status, StatusCode::OK);
    // Only the bootstrap admin has been written
    assert_eq!(body["data"]["revisionId"], 1);
}

#[tokio::test]
async fn test_principal_required_for_actions() {
    let fixture = TestFixture::new().await;

    let body = json!({
        "title": "Anonymous talk",
        "track": "backend",
        "sessionType": "talk",
        "durationMinutes": 30
    });

    let (status, resp) = fixture.post("/api/proposals", None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["error"]["code"], "UNAUTHORIZED");

    let (status, resp) = fixture
        .post("/api/proposals", Some("no-such-member"), body.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(resp["error"]["code"], "FORBIDDEN");

    // Deactivated members can no longer act
    let member = fixture.member("Former Member", "member").await;
    let (status, _) = fixture
        .put(
            &format!("/api/members/{}", member),
            Some(&fixture.admin),
            json!({ "active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = fixture.post("/api/proposals", Some(&member), body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_revision_increments_on_write() {
    let fixture = TestFixture::new().await;

    let (_, before) = fixture.get("/api/datastore/revision", None).await;
    let before = before["data"]["revisionId"].as_i64().unwrap();

    let (_, created) = fixture
        .post("/api/members", Some(&fixture.admin), json!({ "displayName": "Ada" }))
        .await;
    assert_eq!(created["revisionId"].as_i64().unwrap(), before + 1);

    let (_, after) = fixture.get("/api/datastore/revision", None).await;
    assert_eq!(after["data"]["revisionId"].as_i64().unwrap(), before + 1);
    assert!(after["data"]["generatedAt"].is_string());
}

#[tokio::test]
async fn test_member_crud() {
    let fixture = TestFixture::new().await;

    let (status, created) = fixture
        .post(
            "/api/members",
            Some(&fixture.admin),
            json!({ "displayName": "Grace", "email": "grace@example.org", "role": "organizer" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["data"]["role"], "organizer");
    assert_eq!(created["data"]["active"], true);
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, updated) = fixture
        .put(
            &format!("/api/members/{}", id),
            Some(&id),
            json!({ "displayName": "Grace H.", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["displayName"], "Grace H.");
    assert_eq!(updated["data"]["version"], 2);

    // Stale version
    let (status, conflict) = fixture
        .put(
            &format!("/api/members/{}", id),
            Some(&fixture.admin),
            json!({ "displayName": "Stale", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(conflict["error"]["code"], "VERSION_MISMATCH");
    assert_eq!(conflict["error"]["details"]["currentVersion"], 2);

    let (status, listed) = fixture.get("/api/members", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"].as_array().unwrap().len(), 2);

    let (status, invalid) = fixture
        .post("/api/members", Some(&fixture.admin), json!({ "displayName": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_proposal_submission_and_editing() {
    let fixture = TestFixture::new().await;
    let speaker = fixture.member("Sam Speaker", "member").await;
    let other = fixture.member("Other Member", "member").await;

    let id = fixture.proposal(&speaker, "Zero-copy Parsing").await;

    let (status, body) = fixture.get(&format!("/api/proposals/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "submitted");
    assert_eq!(body["data"]["submitterId"], speaker.as_str());
    assert_eq!(body["data"]["sessionType"], "talk");

    let (status, body) = fixture
        .put(
            &format!("/api/proposals/{}", id),
            Some(&other),
            json!({ "title": "Hijacked" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = fixture
        .put(
            &format!("/api/proposals/{}", id),
            Some(&speaker),
            json!({ "title": "Zero-copy Parsing in Rust", "durationMinutes": 30, "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Zero-copy Parsing in Rust");
    assert_eq!(body["data"]["durationMinutes"], 30);
    assert_eq!(body["data"]["version"], 2);

    let (status, body) = fixture
        .post(
            "/api/proposals",
            Some(&speaker),
            json!({ "title": "Too long", "track": "backend", "sessionType": "workshop", "durationMinutes": 900 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_proposal_filters() {
    let fixture = TestFixture::new().await;
    let organizer = fixture.member("Olga", "organizer").await;
    let speaker = fixture.member("Sam", "member").await;
    let reviewer = fixture.member("Rita", "member").await;

    let reviewed = fixture.proposal(&speaker, "Reviewed Talk").await;
    fixture.proposal(&organizer, "Untouched Talk").await;

    let evaluator = fixture.evaluator(&organizer, &reviewer).await;
    fixture.assign(&organizer, &reviewed, &evaluator).await;

    let (_, body) = fixture.get("/api/proposals?status=under-review", None).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], reviewed.as_str());

    let (_, body) = fixture
        .get(&format!("/api/proposals?submitterId={}", organizer), None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = fixture.get("/api/proposals?track=backend", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = fixture.get("/api/proposals?status=maybe", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_evaluator_management() {
    let fixture = TestFixture::new().await;
    let organizer = fixture.member("Olga", "organizer").await;
    let member = fixture.member("Rita", "member").await;

    let (status, body) = fixture
        .post("/api/evaluators", Some(&member), json!({ "memberId": member }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let evaluator = fixture.evaluator(&organizer, &member).await;

    let (status, body) = fixture
        .get(&format!("/api/evaluators/{}", evaluator), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["memberId"], member.as_str());
    assert_eq!(body["data"]["displayName"], "Rita");
    assert_eq!(body["data"]["active"], true);

    let (status, body) = fixture
        .post("/api/evaluators", Some(&organizer), json!({ "memberId": member }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = fixture
        .post("/api/evaluators", Some(&organizer), json!({ "memberId": "ghost" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_assignment_rules() {
    let fixture = TestFixture::new().await;
    let setup = review_setup(&fixture).await;

    let (_, body) = fixture
        .get(&format!("/api/proposals/{}", setup.proposal_id), None)
        .await;
    assert_eq!(body["data"]["status"], "under-review");

    // Same evaluator twice
    let (_, evaluation) = fixture
        .get(
            &format!("/api/evaluations/{}", setup.evaluations[0]),
            Some(&setup.organizer),
        )
        .await;
    let evaluator_id = evaluation["data"]["evaluatorId"].as_str().unwrap().to_string();
    assert_eq!(evaluation["data"]["status"], "pending");

    let (status, body) = fixture
        .post(
            &format!("/api/proposals/{}/evaluations", setup.proposal_id),
            Some(&setup.organizer),
            json!({ "evaluatorId": evaluator_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    // Only organizers assign
    let (status, _) = fixture
        .post(
            &format!("/api/proposals/{}/evaluations", setup.proposal_id),
            Some(&setup.speaker),
            json!({ "evaluatorId": evaluator_id }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = fixture
        .post(
            "/api/proposals/missing/evaluations",
            Some(&setup.organizer),
            json!({ "evaluatorId": evaluator_id }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = fixture
        .get(
            &format!("/api/proposals/{}/evaluations", setup.proposal_id),
            Some(&setup.organizer),
        )
        .await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_evaluation_access_is_limited_to_assignee() {
    let fixture = TestFixture::new().await;
    let setup = review_setup(&fixture).await;
    let evaluation = &setup.evaluations[0];

    // The other reviewer may not touch it
    let (status, _) = fixture
        .submit(&setup.reviewers[1], evaluation, [4, 4, 4, 4, 4])
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Organizers can read but not submit
    let (status, _) = fixture
        .get(&format!("/api/evaluations/{}", evaluation), Some(&setup.organizer))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = fixture
        .submit(&setup.organizer, evaluation, [4, 4, 4, 4, 4])
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = fixture
        .post(
            &format!("/api/evaluations/{}/open", evaluation),
            Some(&setup.reviewers[0]),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in-progress");
    assert!(body["data"]["startedAt"].is_string());

    // The queue is visible to the evaluator
    let evaluator_id = body["data"]["evaluatorId"].as_str().unwrap().to_string();
    let (status, queue) = fixture
        .get(
            &format!("/api/evaluators/{}/evaluations", evaluator_id),
            Some(&setup.reviewers[0]),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue["data"].as_array().unwrap().len(), 1);

    let (status, _) = fixture
        .get(
            &format!("/api/evaluators/{}/evaluations", evaluator_id),
            Some(&setup.speaker),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_submission_validation() {
    let fixture = TestFixture::new().await;
    let setup = review_setup(&fixture).await;

    let (status, body) = fixture
        .post(
            &format!("/api/evaluations/{}/submit", setup.evaluations[0]),
            Some(&setup.reviewers[0]),
            json!({
                "scores": { "relevance": 6, "quality": 3, "innovation": 3, "impact": 3 },
                "comments": "short",
                "recommendation": "maybe"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("relevance"));
    assert!(message.contains("feasibility"));
    assert!(message.contains("comments"));
    assert!(message.contains("recommendation"));

    // Nothing was stored
    let (_, evaluation) = fixture
        .get(
            &format!("/api/evaluations/{}", setup.evaluations[0]),
            Some(&setup.reviewers[0]),
        )
        .await;
    assert_eq!(evaluation["data"]["status"], "pending");
    assert!(evaluation["data"].get("overallScore").is_none());
}

#[tokio::test]
async fn test_stored_overall_score_is_recomputed_from_scores() {
    let fixture = TestFixture::new().await;
    let setup = review_setup(&fixture).await;

    let cases = [([3, 3, 4, 4, 4], 4), ([1, 1, 1, 1, 2], 1)];
    for ((scores, expected), (reviewer, evaluation)) in cases
        .into_iter()
        .zip(setup.reviewers.iter().zip(setup.evaluations.iter()))
    {
        let (status, body) = fixture.submit(reviewer, evaluation, scores).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], "completed");
        assert_eq!(body["data"]["overallScore"], expected);
        assert_eq!(body["data"]["scores"]["relevance"], scores[0]);
        assert_eq!(body["data"]["scores"]["feasibility"], scores[4]);
        assert!(body["data"]["completedAt"].is_string());
    }
}

#[tokio::test]
async fn test_full_review_and_acceptance() {
    let fixture = TestFixture::new().await;
    let setup = review_setup(&fixture).await;
    let review_path = format!("/api/proposals/{}/review", setup.proposal_id);
    let decision_path = format!("/api/proposals/{}/decision", setup.proposal_id);

    let (status, review) = fixture.get(&review_path, Some(&setup.organizer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["data"]["status"], "pending");
    assert_eq!(review["data"]["completedCount"], 0);
    assert_eq!(review["data"]["totalCount"], 2);
    assert_eq!(review["data"]["averageScore"], Value::Null);
    assert_eq!(review["data"]["canDecide"], false);

    let (status, _) = fixture
        .submit(&setup.reviewers[0], &setup.evaluations[0], [4, 4, 4, 4, 4])
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, review) = fixture.get(&review_path, Some(&setup.organizer)).await;
    assert_eq!(review["data"]["status"], "in-progress");
    assert_eq!(review["data"]["completedCount"], 1);
    assert_eq!(review["data"]["averageScore"], 4.0);
    assert_eq!(review["data"]["canDecide"], false);
    assert!(review["data"]["blockedReason"].is_string());

    // Gate refuses while one evaluation is outstanding
    let (status, body) = fixture
        .post(&decision_path, Some(&setup.organizer), json!({ "status": "accepted" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DECISION_NOT_PERMITTED");

    let (status, _) = fixture
        .submit(&setup.reviewers[1], &setup.evaluations[1], [5, 5, 5, 5, 5])
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, review) = fixture.get(&review_path, Some(&setup.organizer)).await;
    assert_eq!(review["data"]["status"], "completed");
    assert_eq!(review["data"]["averageScore"], 4.5);
    assert_eq!(review["data"]["canDecide"], true);
    assert_eq!(review["data"]["evaluations"].as_array().unwrap().len(), 2);

    // Only organizers decide
    let (status, _) = fixture
        .post(&decision_path, Some(&setup.speaker), json!({ "status": "accepted" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = fixture
        .post(&decision_path, Some(&setup.organizer), json!({ "status": "accepted" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["proposal"]["status"], "accepted");
    assert_eq!(body["data"]["proposal"]["decidedBy"], setup.organizer.as_str());
    let session = &body["data"]["session"];
    assert_eq!(session["proposalId"], setup.proposal_id.as_str());
    assert_eq!(session["speakerId"], setup.speaker.as_str());
    assert_eq!(session["title"], "Async Rust in Production");

    // A finalized proposal cannot be decided again
    let (status, body) = fixture
        .post(&decision_path, Some(&setup.organizer), json!({ "status": "rejected" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DECISION_NOT_PERMITTED");

    let (_, review) = fixture.get(&review_path, Some(&setup.organizer)).await;
    assert_eq!(review["data"]["proposalStatus"], "accepted");
    assert_eq!(review["data"]["canDecide"], false);

    let (_, sessions) = fixture.get("/api/sessions", None).await;
    let sessions = sessions["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);

    let session_id = sessions[0]["id"].as_str().unwrap();
    let (status, _) = fixture
        .get(&format!("/api/sessions/{}", session_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // Evaluations are frozen once decided
    let (status, body) = fixture
        .submit(&setup.reviewers[0], &setup.evaluations[0], [1, 1, 1, 1, 1])
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");

    // And no evaluator can be added
    let newcomer = fixture.member("Late Reviewer", "member").await;
    let evaluator = fixture.evaluator(&setup.organizer, &newcomer).await;
    let (status, body) = fixture
        .post(
            &format!("/api/proposals/{}/evaluations", setup.proposal_id),
            Some(&setup.organizer),
            json!({ "evaluatorId": evaluator }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_rejection_creates_no_session() {
    let fixture = TestFixture::new().await;
    let setup = review_setup(&fixture).await;

    for (reviewer, evaluation) in setup.reviewers.iter().zip(setup.evaluations.iter()) {
        let (status, _) = fixture.submit(reviewer, evaluation, [2, 2, 1, 2, 2]).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = fixture
        .post(
            &format!("/api/proposals/{}/decision", setup.proposal_id),
            Some(&setup.organizer),
            json!({ "status": "rejected" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["proposal"]["status"], "rejected");
    assert!(body["data"].get("session").is_none());

    let (_, sessions) = fixture.get("/api/sessions", None).await;
    assert!(sessions["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unassigned_proposal_cannot_be_decided() {
    let fixture = TestFixture::new().await;
    let organizer = fixture.member("Olga", "organizer").await;
    let proposal = fixture.proposal(&organizer, "Lonely Talk").await;

    let (_, review) = fixture
        .get(&format!("/api/proposals/{}/review", proposal), Some(&organizer))
        .await;
    assert_eq!(review["data"]["status"], "not-assigned");
    assert_eq!(review["data"]["canDecide"], false);

    let (status, body) = fixture
        .post(
            &format!("/api/proposals/{}/decision", proposal),
            Some(&organizer),
            json!({ "status": "accepted" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DECISION_NOT_PERMITTED");

    let (status, body) = fixture
        .post(
            &format!("/api/proposals/{}/decision", proposal),
            Some(&organizer),
            json!({ "status": "approved" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_resubmission_policy() {
    let fixture = TestFixture::new().await;
    let setup = review_setup(&fixture).await;

    fixture
        .submit(&setup.reviewers[0], &setup.evaluations[0], [2, 2, 2, 2, 2])
        .await;
    let (status, body) = fixture
        .submit(&setup.reviewers[0], &setup.evaluations[0], [5, 5, 5, 5, 4])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overallScore"], 5);

    let strict = TestFixture::with_options(Some(TEST_PSK.to_string()), false).await;
    let setup = review_setup(&strict).await;

    strict
        .submit(&setup.reviewers[0], &setup.evaluations[0], [2, 2, 2, 2, 2])
        .await;
    let (status, body) = strict
        .submit(&setup.reviewers[0], &setup.evaluations[0], [5, 5, 5, 5, 5])
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");

    let (status, body) = strict
        .post(
            &format!("/api/evaluations/{}/open", setup.evaluations[0]),
            Some(&setup.reviewers[0]),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_search_proposals() {
    let fixture = TestFixture::new().await;
    let speaker = fixture.member("Sam", "member").await;
    let id = fixture.proposal(&speaker, "Observability with Tracing").await;
    fixture.proposal(&speaker, "Design Tokens at Scale").await;

    let (status, body) = fixture.get("/api/search?q=observability", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["results"][0]["proposal"]["id"], id.as_str());

    let (_, body) = fixture.get("/api/search?q=", None).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_dashboard_counts() {
    let fixture = TestFixture::new().await;
    let setup = review_setup(&fixture).await;
    fixture.proposal(&setup.speaker, "Second Talk").await;

    for (reviewer, evaluation) in setup.reviewers.iter().zip(setup.evaluations.iter()) {
        fixture.submit(reviewer, evaluation, [4, 4, 4, 4, 4]).await;
    }

    let (status, body) = fixture.get("/api/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["proposalsByStatus"]["submitted"], 1);
    assert_eq!(data["proposalsByStatus"]["under-review"], 1);
    assert_eq!(data["proposalsByStatus"]["accepted"], 0);
    assert_eq!(data["evaluationsByStatus"]["completed"], 2);
    assert_eq!(data["evaluationsByStatus"]["pending"], 0);
    assert_eq!(data["readyForDecision"], 1);
    assert_eq!(data["activeEvaluators"], 2);
    assert_eq!(data["sessions"], 0);
}

#[tokio::test]
async fn test_not_found_responses() {
    let fixture = TestFixture::new().await;
    let organizer = fixture.member("Olga", "organizer").await;

    for path in [
        "/api/members/missing",
        "/api/proposals/missing",
        "/api/evaluators/missing",
        "/api/sessions/missing",
    ] {
        let (status, body) = fixture.get(path, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert!(body["revisionId"].is_number());
    }

    let (status, _) = fixture
        .get("/api/evaluations/missing", Some(&organizer))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = fixture
        .get("/api/proposals/missing/review", Some(&organizer))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_first_member_bootstraps_admin_only_once() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post("/api/members", None, json!({ "displayName": "Mallory", "role": "admin" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let organizer = fixture.member("Olga", "organizer").await;
    let (status, body) = fixture
        .post(
            "/api/members",
            Some(&organizer),
            json!({ "displayName": "Second Admin", "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let speaker = fixture.member("Sam", "member").await;
    let (status, _) = fixture
        .post("/api/members", Some(&speaker), json!({ "displayName": "Sock Puppet" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = fixture
        .post("/api/members", Some(&organizer), json!({ "displayName": "Rita" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "member");

    let (_, listed) = fixture.get("/api/members", None).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_member_cannot_escalate_own_role() {
    let fixture = TestFixture::new().await;
    let setup = review_setup(&fixture).await;
    let speaker_path = format!("/api/members/{}", setup.speaker);

    for body in [
        json!({ "role": "admin" }),
        json!({ "role": "organizer" }),
        json!({ "active": false }),
    ] {
        let (status, resp) = fixture.put(&speaker_path, Some(&setup.speaker), body).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(resp["error"]["code"], "FORBIDDEN");
    }

    // Editing someone else is refused too
    let (status, _) = fixture
        .put(
            &format!("/api/members/{}", setup.reviewers[0]),
            Some(&setup.speaker),
            json!({ "displayName": "Renamed" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, member) = fixture.get(&speaker_path, None).await;
    assert_eq!(member["data"]["role"], "member");

    // Own profile stays editable
    let (status, body) = fixture
        .put(&speaker_path, Some(&setup.speaker), json!({ "displayName": "Samira Speaker" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["displayName"], "Samira Speaker");

    for (reviewer, evaluation) in setup.reviewers.iter().zip(setup.evaluations.iter()) {
        fixture.submit(reviewer, evaluation, [5, 5, 5, 5, 5]).await;
    }
    let (status, _) = fixture
        .post(
            &format!("/api/proposals/{}/decision", setup.proposal_id),
            Some(&setup.speaker),
            json!({ "status": "accepted" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Organizers may promote, but not to admin
    let (status, _) = fixture
        .put(&speaker_path, Some(&setup.organizer), json!({ "role": "admin" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = fixture
        .put(&speaker_path, Some(&setup.organizer), json!({ "role": "organizer" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "organizer");
}

#[tokio::test]
async fn test_submitter_cannot_review_own_proposal() {
    let fixture = TestFixture::new().await;
    let organizer = fixture.member("Olga", "organizer").await;
    let proposal = fixture.proposal(&organizer, "My Own Talk").await;
    let evaluator = fixture.evaluator(&organizer, &organizer).await;

    let (status, body) = fixture
        .post(
            &format!("/api/proposals/{}/evaluations", proposal),
            Some(&organizer),
            json!({ "evaluatorId": evaluator }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, body) = fixture.get(&format!("/api/proposals/{}", proposal), None).await;
    assert_eq!(body["data"]["status"], "submitted");
}

#[tokio::test]
async fn test_unassign_evaluation() {
    let fixture = TestFixture::new().await;
    let setup = review_setup(&fixture).await;
    let completed = format!("/api/evaluations/{}", setup.evaluations[0]);
    let outstanding = format!("/api/evaluations/{}", setup.evaluations[1]);

    let (status, _) = fixture
        .submit(&setup.reviewers[0], &setup.evaluations[0], [4, 4, 4, 4, 4])
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = fixture.delete(&outstanding, Some(&setup.reviewers[1])).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = fixture.delete(&completed, Some(&setup.organizer)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");

    // A reviewer who left no longer blocks the decision
    let (status, _) = fixture
        .put(
            &format!("/api/members/{}", setup.reviewers[1]),
            Some(&setup.organizer),
            json!({ "active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = fixture.delete(&outstanding, Some(&setup.organizer)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["id"], setup.evaluations[1].as_str());

    let (status, _) = fixture.get(&outstanding, Some(&setup.organizer)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, review) = fixture
        .get(
            &format!("/api/proposals/{}/review", setup.proposal_id),
            Some(&setup.organizer),
        )
        .await;
    assert_eq!(review["data"]["status"], "completed");
    assert_eq!(review["data"]["totalCount"], 1);
    assert_eq!(review["data"]["canDecide"], true);

    let (status, body) = fixture
        .post(
            &format!("/api/proposals/{}/decision", setup.proposal_id),
            Some(&setup.organizer),
            json!({ "status": "accepted" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}
