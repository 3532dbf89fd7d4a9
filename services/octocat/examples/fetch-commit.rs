//! Fetch the most recent commits of a repository using the Github API.
//!
//! Set `GITHUB_TOKEN` to raise the rate limit.

use chrono::Utc;
use octocat::FeedConfig;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let mut config = FeedConfig::new("apple", "swift");
    config.token = std::env::var("GITHUB_TOKEN").ok().map(Into::into);
    config.max_pages = 1;

    let feed = config.build();
    let since = Utc::now() - chrono::Duration::days(1);
    let commits = feed.try_fetch_since(Some(since)).await?;

    for commit in commits {
        let committer = commit.committer();
        println!(
            "{} {} <{}> {}",
            commit.sha.get(..8).unwrap_or(&commit.sha),
            committer.name,
            committer.email,
            commit.commit.message.lines().next().unwrap_or_default()
        );
    }

    Ok(())
}
