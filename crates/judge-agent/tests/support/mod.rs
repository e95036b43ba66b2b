#![allow(dead_code)]

use async_trait::async_trait;
use judge_agent::{
    CoordinatorProfile, GitRepository, RepositoryConfig, Specialist, SpecialistKind,
    build_review_registry,
};
use judge_llm::{
    Client, ContentPart, FinishReason, Message, ProviderAdapter, Request, Response, Role,
    SDKError, StreamEventStream, ToolCall, Usage, replay_response,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const JUDGE_PROVIDER: &str = "judge";
pub const REVIEWER_PROVIDER: &str = "reviewers";

/// Replays queued coordinator responses in order.
#[derive(Clone)]
pub struct SequenceAdapter {
    pub responses: Arc<Mutex<VecDeque<Response>>>,
    pub requests: Arc<Mutex<Vec<Request>>>,
}

impl SequenceAdapter {
    fn next(&self, request: Request) -> Result<Response, SDKError> {
        self.requests.lock().expect("requests mutex").push(request);
        self.responses
            .lock()
            .expect("responses mutex")
            .pop_front()
            .ok_or_else(|| SDKError::configuration("no response queued"))
    }
}

#[async_trait]
impl ProviderAdapter for SequenceAdapter {
    fn name(&self) -> &str {
        JUDGE_PROVIDER
    }

    async fn complete(&self, request: Request) -> Result<Response, SDKError> {
        self.next(request)
    }

    async fn stream(&self, request: Request) -> Result<StreamEventStream, SDKError> {
        self.next(request).map(replay_response)
    }
}

/// Answers specialist calls with a report naming the reviewer and echoing
/// the context it was given.
#[derive(Clone, Default)]
pub struct ReviewerAdapter {
    pub requests: Arc<Mutex<Vec<Request>>>,
}

#[async_trait]
impl ProviderAdapter for ReviewerAdapter {
    fn name(&self) -> &str {
        REVIEWER_PROVIDER
    }

    async fn complete(&self, request: Request) -> Result<Response, SDKError> {
        let instructions = request.messages[0].text();
        let context = request.messages[1].text();
        let reviewer = if instructions.contains("security and performance") {
            "SECURITY"
        } else {
            "QUALITY"
        };
        self.requests.lock().expect("requests mutex").push(request);
        Ok(text_response(&format!(
            "{reviewer} REPORT ({} bytes reviewed)",
            context.len()
        )))
    }

    async fn stream(&self, request: Request) -> Result<StreamEventStream, SDKError> {
        self.complete(request).await.map(replay_response)
    }
}

pub struct Harness {
    pub repo: TempDir,
    pub client: Arc<Client>,
    pub judge: SequenceAdapter,
    pub reviewers: ReviewerAdapter,
}

impl Harness {
    pub fn new(repo: TempDir, responses: Vec<Response>) -> Self {
        let judge = SequenceAdapter {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let reviewers = ReviewerAdapter::default();
        let mut client = Client::default();
        client
            .register_provider(Arc::new(judge.clone()))
            .expect("register judge");
        client
            .register_provider(Arc::new(reviewers.clone()))
            .expect("register reviewers");
        Self {
            repo,
            client: Arc::new(client),
            judge,
            reviewers,
        }
    }

    pub fn profile(&self) -> CoordinatorProfile {
        let repository = GitRepository::open(RepositoryConfig::new(self.repo.path()))
            .expect("repository should open");
        let quality = Specialist::new(SpecialistKind::Quality, self.client.clone(), "reviewer")
            .with_provider(REVIEWER_PROVIDER);
        let security = Specialist::new(SpecialistKind::Security, self.client.clone(), "reviewer")
            .with_provider(REVIEWER_PROVIDER);
        let registry = build_review_registry(
            Arc::new(repository),
            Arc::new(quality),
            Arc::new(security),
        )
        .expect("registry should build");
        CoordinatorProfile::new("judge-model", Arc::new(registry)).with_provider(JUDGE_PROVIDER)
    }
}

pub fn text_response(text: &str) -> Response {
    Response {
        id: "resp-text".to_string(),
        model: "test-model".to_string(),
        provider: "test".to_string(),
        message: Message::assistant(text),
        finish_reason: FinishReason::new("stop"),
        usage: Usage::new(20, 10),
    }
}

pub fn action_response(calls: Vec<(&str, &str, Value)>) -> Response {
    Response {
        id: "resp-actions".to_string(),
        model: "test-model".to_string(),
        provider: "test".to_string(),
        message: Message {
            role: Role::Assistant,
            content: calls
                .into_iter()
                .map(|(id, name, arguments)| {
                    ContentPart::tool_call(ToolCall::new(id, name, arguments))
                })
                .collect(),
            tool_call_id: None,
        },
        finish_reason: FinishReason::new("tool_calls"),
        usage: Usage::new(20, 10),
    }
}

pub fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("git should run");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// A repository with `main` and `feature/x`, where `feature/x` adds a
/// three-line `Foo.swift`.
pub fn feature_repo() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    git(root, &["init", "--quiet"]);
    git(root, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(root, &["config", "user.email", "reviewer@example.com"]);
    git(root, &["config", "user.name", "Reviewer"]);
    git(root, &["config", "commit.gpgsign", "false"]);

    std::fs::write(root.join("README.md"), "# Demo\n").expect("write readme");
    git(root, &["add", "README.md"]);
    git(root, &["commit", "--quiet", "-m", "initial"]);

    git(root, &["checkout", "--quiet", "-b", "feature/x"]);
    std::fs::write(
        root.join("Foo.swift"),
        "struct Foo {\n    let value = 1\n}\n",
    )
    .expect("write Foo.swift");
    git(root, &["add", "Foo.swift"]);
    git(root, &["commit", "--quiet", "-m", "add Foo"]);
    git(root, &["checkout", "--quiet", "main"]);
    dir
}
