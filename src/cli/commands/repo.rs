//! repo command - Drive a remote site repository over HTTP

use anyhow::{anyhow, Context as _, Result};

use crate::cli::args::RepoAction;
use crate::cli::Context;
use crate::core::types::{ChangeSet, ChangeSetDetail, ChangeType, LineDiff};
use crate::repository::{RemoteRepository, Repository};

/// Run one repository API action.
///
/// The base URL comes from `--url`, falling back to `[remote] url`.
pub fn repo(ctx: &Context, url: Option<String>, action: RepoAction) -> Result<()> {
    let remote = ctx.config.remote();
    let url = url
        .or_else(|| remote.and_then(|r| r.url.clone()))
        .ok_or_else(|| anyhow!("No repository URL. Pass --url or set [remote] url."))?;

    let mut client = RemoteRepository::new(&url)
        .with_context(|| format!("Invalid repository URL '{}'", url))?;
    if let Some(username) = remote.and_then(|r| r.username.clone()) {
        client = client.with_credentials(username, remote.and_then(|r| r.password.clone()));
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_action(&client, action))
}

async fn run_action(repo: &dyn Repository, action: RepoAction) -> Result<()> {
    match action {
        RepoAction::Id => match repo.current_id().await? {
            Some(id) => println!("{}", id),
            None => println!("(no commits)"),
        },
        RepoAction::Init => {
            repo.initialize().await?;
            println!("Repository initialized");
        }
        RepoAction::Branches => {
            for branch in repo.branches().await? {
                println!("{}  {}", short_id(&branch.id), branch.name);
            }
        }
        RepoAction::Status => {
            let statuses = repo.status().await?;
            if statuses.is_empty() {
                println!("Nothing to commit, working tree clean");
            }
            for file in statuses {
                println!("{:>10}  {}", file.status, file.path);
            }
        }
        RepoAction::Log { index, limit } => {
            let changes = match limit {
                Some(limit) => repo.changes_page(index, limit).await?,
                None if index == 0 => repo.changes().await?,
                None => repo.changes_page(index, usize::MAX).await?,
            };
            for change in &changes {
                print_change(change);
            }
        }
        RepoAction::Details { id } => {
            let detail = repo
                .details(&id)
                .await
                .with_context(|| format!("Failed to load revision '{}'", id))?;
            print_detail(&detail);
        }
        RepoAction::Working => match repo.working_changes().await? {
            Some(detail) => print_detail(&detail),
            None => println!("No uncommitted changes"),
        },
        RepoAction::Add { path } => {
            repo.add_file(&path).await?;
            println!("Staged {}", path);
        }
        RepoAction::Revert { path } => {
            repo.revert_file(&path).await?;
            println!("Reverted {}", path);
        }
        RepoAction::Commit { message, author } => match repo.commit(&author, &message).await? {
            Some(change) => print_change(&change),
            None => println!("Nothing to commit"),
        },
        RepoAction::Push => {
            repo.push().await?;
            println!("Pushed to origin");
        }
        RepoAction::Update { id } => {
            repo.update(&id).await?;
            println!("Checked out {}", id);
        }
    }
    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}

fn print_change(change: &ChangeSet) {
    println!(
        "{}  {}  {}  {}",
        short_id(&change.id),
        change.timestamp.format("%Y-%m-%d %H:%M"),
        change.author_name,
        change.summary()
    );
}

fn print_detail(detail: &ChangeSetDetail) {
    if let Some(change) = &detail.change_set {
        println!("commit {}", change.id);
        println!("Author: {} <{}>", change.author_name, change.author_email);
        println!("Date:   {}", change.timestamp.to_rfc2822());
        println!();
        for line in change.message.lines() {
            println!("    {}", line);
        }
        println!();
    }

    for (path, file) in &detail.files {
        println!("{} {}{}", file.status, path, if file.binary { " (binary)" } else { "" });
        for line in &file.diff {
            println!("{}", diff_line(line));
        }
    }

    println!(
        "{} file(s) changed, {} insertion(s)(+), {} deletion(s)(-)",
        detail.files_changed, detail.insertions, detail.deletions
    );
}

fn diff_line(line: &LineDiff) -> String {
    let marker = match line.kind {
        ChangeType::Added => '+',
        ChangeType::Deleted => '-',
        _ => ' ',
    };
    format!("{}{}", marker, line.text.trim_end_matches('\n'))
}
