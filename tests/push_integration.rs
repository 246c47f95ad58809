//! End-to-end tests: a real `git push` against the HTTP router.
//!
//! Each test skips itself when no `git` binary is available.

use std::path::Path;
use std::process::Command;

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use tempfile::TempDir;
use tokio::net::TcpListener;

use pushgate::core::ops::{DeploymentLock, OperationLock};
use pushgate::core::paths::SitePaths;
use pushgate::deploy::DeploymentRecord;
use pushgate::gateway::{RECEIVE_PACK_ADVERTISEMENT, RECEIVE_PACK_RESULT};
use pushgate::git::GitRepository;
use pushgate::http::{self, AppState};
use pushgate::repository::{RemoteRepository, Repository};

const SITE: &str = "storefront";

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A served site plus a client working copy.
struct TestSite {
    _root: TempDir,
    paths: SitePaths,
    client: TempDir,
    base: String,
}

impl TestSite {
    async fn start() -> Self {
        let root = TempDir::new().unwrap();
        let paths = SitePaths::new(root.path());
        GitRepository::new(paths.repository_dir()).init().unwrap();

        let state = AppState::for_site(SITE, &paths, "git", None);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, http::router(state)).await.unwrap();
        });

        let client = TempDir::new().unwrap();
        run_git(client.path(), &["init"]);
        run_git(client.path(), &["config", "user.email", "test@example.com"]);
        run_git(client.path(), &["config", "user.name", "Test User"]);

        Self {
            _root: root,
            paths,
            client,
            base: format!("http://{}", addr),
        }
    }

    fn remote_url(&self) -> String {
        format!("{}/{}", self.base, SITE)
    }

    fn repository(&self) -> RemoteRepository {
        RemoteRepository::new(&format!("{}/{}/scm/", self.base, SITE)).unwrap()
    }

    /// Branch the served repository's HEAD points at.
    fn server_head_ref(&self) -> String {
        let repo = git2::Repository::open(self.paths.repository_dir()).unwrap();
        let head = repo.find_reference("HEAD").unwrap();
        head.symbolic_target().unwrap().to_string()
    }

    fn commit_file(&self, name: &str, content: &str, message: &str) -> String {
        std::fs::write(self.client.path().join(name), content).unwrap();
        run_git(self.client.path(), &["add", name]);
        run_git(self.client.path(), &["commit", "-m", message]);
        run_git(self.client.path(), &["rev-parse", "HEAD"])
    }

    async fn push(&self) -> std::process::Output {
        let dir = self.client.path().to_path_buf();
        let url = self.remote_url();
        let refspec = format!("HEAD:{}", self.server_head_ref());
        tokio::task::spawn_blocking(move || {
            Command::new("git")
                .args(["push", &url, &refspec])
                .current_dir(dir)
                .env("GIT_TERMINAL_PROMPT", "0")
                .output()
                .expect("failed to run git push")
        })
        .await
        .unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn push_to_empty_repository_is_retrievable() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let site = TestSite::start().await;
    let repo = site.repository();

    // Empty repository
    assert_eq!(repo.current_id().await.unwrap(), None);
    assert!(repo.changes_page(0, 5).await.unwrap().is_empty());
    assert!(repo.changes_page(0, 5).await.unwrap().is_empty());

    let pushed = site.commit_file("index.html", "<h1>hello</h1>\n", "Add index");
    let output = site.push().await;
    assert!(
        output.status.success(),
        "push failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert_eq!(repo.current_id().await.unwrap().as_deref(), Some(pushed.as_str()));

    let detail = repo.details(&pushed).await.unwrap();
    let change = detail.change_set.as_ref().unwrap();
    assert_eq!(change.id, pushed);
    assert_eq!(change.summary(), "Add index");
    assert_eq!(change.author_name, "Test User");
    assert!(detail.files.contains_key("index.html"));
    assert_eq!(detail.insertions, 1);

    let page = repo.changes_page(0, 1).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, pushed);

    // The temporary deployment is gone once the push is over
    let records: Vec<DeploymentRecord> = reqwest::get(format!("{}/{}/deployments", site.base, SITE))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn second_push_adds_history() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let site = TestSite::start().await;
    let repo = site.repository();

    let first = site.commit_file("a.txt", "a\n", "First");
    assert!(site.push().await.status.success());
    let second = site.commit_file("b.txt", "b\n", "Second");
    assert!(site.push().await.status.success());

    let log = repo.changes().await.unwrap();
    let ids: Vec<_> = log.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn commit_through_api_creates_new_revision() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let site = TestSite::start().await;
    let repo = site.repository();

    site.commit_file("index.html", "v1\n", "Initial");
    assert!(site.push().await.status.success());
    let before = repo.current_id().await.unwrap();

    std::fs::write(site.paths.repository_dir().join("notes.txt"), "pending\n").unwrap();
    let committed = repo.commit("Operator", "Add notes").await.unwrap().unwrap();

    assert_ne!(Some(committed.id.clone()), before);
    assert_eq!(repo.current_id().await.unwrap(), Some(committed.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn advertisement_served_for_receive_pack_only() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let site = TestSite::start().await;

    let response = reqwest::get(format!(
        "{}/info/refs?service=git-receive-pack",
        site.remote_url()
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()[CONTENT_TYPE.as_str()],
        RECEIVE_PACK_ADVERTISEMENT
    );
    assert!(response.headers().contains_key(CACHE_CONTROL.as_str()));
    let body = response.text().await.unwrap();
    assert!(body.starts_with("001f# service=git-receive-pack\n0000"));

    let upload = reqwest::get(format!(
        "{}/info/refs?service=git-upload-pack",
        site.remote_url()
    ))
    .await
    .unwrap();
    assert_eq!(upload.status(), 403);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn push_while_locked_conflicts_without_side_effects() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let site = TestSite::start().await;

    // A second handle on the same lock file, like another process
    let holder = DeploymentLock::new(site.paths.deployment_lock_path());
    holder.acquire(std::time::Duration::ZERO).unwrap();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/git-receive-pack", site.remote_url()))
        .body("0000")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    assert!(response.headers().contains_key(CACHE_CONTROL.as_str()));
    assert!(response.bytes().await.unwrap().is_empty());

    let mutate = client
        .post(format!("{}/scm/init", site.remote_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(mutate.status(), 409);

    // No temporary deployment was ever written
    assert!(!site.paths.deployments_dir().exists()
        || std::fs::read_dir(site.paths.deployments_dir()).unwrap().next().is_none());

    holder.release().unwrap();

    site.commit_file("index.html", "ok\n", "After unlock");
    let output = site.push().await;
    assert!(
        output.status.success(),
        "push failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_site_is_not_found() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let site = TestSite::start().await;

    let response = reqwest::Client::new()
        .post(format!("{}/other/git-receive-pack", site.base))
        .body("0000")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn receive_pack_result_content_type() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let site = TestSite::start().await;

    // An empty command list is a valid, no-op push
    let response = reqwest::Client::new()
        .post(format!("{}/git-receive-pack", site.remote_url()))
        .body("0000")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[CONTENT_TYPE.as_str()], RECEIVE_PACK_RESULT);
    assert!(response.headers().contains_key(CACHE_CONTROL.as_str()));
}
