use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{Config, Tweet, TweetAuthor};
use super::{ApiRateLimiter, TweetSearch};

const MAX_RESULTS_PER_PAGE: &str = "500";
const TWEET_FIELDS: &str = "created_at,geo,public_metrics,text";
const USER_FIELDS: &str = "username,public_metrics,description,location";
const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 15 * 60;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ApiTweet>,
    includes: Option<Includes>,
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    text: String,
    author_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    public_metrics: Option<TweetMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct TweetMetrics {
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    quote_count: u64,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
    description: Option<String>,
    location: Option<String>,
    public_metrics: Option<UserMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetrics {
    #[serde(default)]
    followers_count: u64,
    #[serde(default)]
    tweet_count: u64,
}

impl From<ApiUser> for TweetAuthor {
    fn from(user: ApiUser) -> Self {
        let metrics = user.public_metrics.unwrap_or_default();
        TweetAuthor {
            id: user.id,
            username: user.username,
            followers: metrics.followers_count,
            tweets: metrics.tweet_count,
            description: user.description,
            location: user.location,
        }
    }
}

/// Twitter v2 full-archive search client (bearer token auth)
pub struct TwitterClient {
    client: Client,
    base_url: String,
    bearer_token: String,
    page_limiter: ApiRateLimiter,
}

impl TwitterClient {
    pub fn new(client: Client, config: &Config) -> Result<Self> {
        let bearer_token = config
            .twitter_bearer_token
            .clone()
            .ok_or_else(|| anyhow!("TWITTER_BEARER_TOKEN environment variable required for sentiment analysis"))?;

        Ok(Self {
            client,
            base_url: config.twitter_api_base_url.trim_end_matches('/').to_string(),
            bearer_token,
            page_limiter: ApiRateLimiter::from_millis(config.twitter_page_delay_ms),
        })
    }

    fn search_url(
        &self,
        query: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        next_token: Option<&str>,
    ) -> Result<Url> {
        let start = start_time.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = end_time.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut params = vec![
            ("query", query),
            ("start_time", start.as_str()),
            ("end_time", end.as_str()),
            ("max_results", MAX_RESULTS_PER_PAGE),
            ("expansions", "author_id"),
            ("tweet.fields", TWEET_FIELDS),
            ("user.fields", USER_FIELDS),
        ];
        if let Some(token) = next_token {
            params.push(("next_token", token));
        }

        Ok(Url::parse_with_params(
            &format!("{}/2/tweets/search/all", self.base_url),
            &params,
        )?)
    }

    /// Fetch one page, sleeping through rate-limit responses
    async fn fetch_page(&self, url: &Url) -> Result<SearchResponse> {
        loop {
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&self.bearer_token)
                .send()
                .await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let wait = rate_limit_wait(
                    response
                        .headers()
                        .get("x-rate-limit-reset")
                        .and_then(|v| v.to_str().ok()),
                    Utc::now(),
                );
                warn!("⏳ Twitter rate limit reached, waiting {}s", wait.as_secs());
                tokio::time::sleep(wait).await;
                continue;
            }

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(anyhow!("Twitter search failed ({}): {}", status, error_text));
            }

            return Ok(response.json().await?);
        }
    }
}

/// Time to sleep until the `x-rate-limit-reset` epoch, at least one second
pub fn rate_limit_wait(reset_header: Option<&str>, now: DateTime<Utc>) -> Duration {
    match reset_header.and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(reset) => {
            let secs = (reset - now.timestamp()).clamp(1, DEFAULT_RATE_LIMIT_WAIT_SECS as i64);
            Duration::from_secs(secs as u64)
        }
        None => Duration::from_secs(DEFAULT_RATE_LIMIT_WAIT_SECS),
    }
}

fn join_authors(page: SearchResponse, users: &mut HashMap<String, TweetAuthor>) -> Vec<Tweet> {
    if let Some(includes) = page.includes {
        for user in includes.users {
            users.insert(user.id.clone(), user.into());
        }
    }

    page.data
        .into_iter()
        .map(|tweet| {
            let metrics = tweet.public_metrics.unwrap_or_default();
            let author_id = tweet.author_id.unwrap_or_default();
            Tweet {
                author: users.get(&author_id).cloned(),
                author_id,
                text: tweet.text,
                created_at: tweet.created_at,
                retweets: metrics.retweet_count,
                replies: metrics.reply_count,
                likes: metrics.like_count,
                quotes: metrics.quote_count,
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl TweetSearch for TwitterClient {
    async fn search_all(
        &self,
        query: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<Tweet>> {
        let mut tweets = Vec::new();
        let mut users: HashMap<String, TweetAuthor> = HashMap::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0;

        loop {
            let url = self.search_url(query, start_time, end_time, next_token.as_deref())?;
            let mut page = self.fetch_page(&url).await?;
            pages += 1;

            next_token = page.meta.as_mut().and_then(|m| m.next_token.take());
            let page_tweets = join_authors(page, &mut users);
            debug!("Page {} for '{}' returned {} tweets", pages, query, page_tweets.len());
            tweets.extend(page_tweets);

            self.page_limiter.wait().await;

            if next_token.is_none() {
                break;
            }
        }

        info!("🐦 '{}': {} tweets over {} page(s)", query, tweets.len(), pages);
        Ok(tweets)
    }
}
