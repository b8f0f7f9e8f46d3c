//! Full-archive tweet search with pagination against a mock server

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use reqwest::Client;
use serde_json::json;
use value_investing::analysis::sentiment::twitter_analysis;
use value_investing::api::{TweetSearch, TwitterClient};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use crate::common::test_data;

/// Matches first-page requests only
struct NoNextToken;

impl Match for NoNextToken {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(key, _)| key == "next_token")
    }
}

async fn mount_two_pages(server: &MockServer, query: &str) {
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/all"))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("query", query))
        .and(query_param("max_results", "500"))
        .and(query_param("expansions", "author_id"))
        .and(NoNextToken)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "1", "text": "Great quarter, very bullish https://t.co/x", "author_id": "u1",
                 "public_metrics": {"retweet_count": 3, "reply_count": 1, "like_count": 12, "quote_count": 0}},
                {"id": "2", "text": "Terrible guidance\nselling", "author_id": "u2"}
            ],
            "includes": {"users": [
                {"id": "u1", "username": "valuehunter", "public_metrics": {"followers_count": 1500, "tweet_count": 320}},
                {"id": "u2", "username": "bear", "location": "NYC"}
            ]},
            "meta": {"result_count": 2, "next_token": "page2"}
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/all"))
        .and(query_param("query", query))
        .and(query_param("next_token", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "3", "text": "Strong buy", "author_id": "u1"}],
            "meta": {"result_count": 1}
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[test_log::test(tokio::test)]
async fn test_search_all_follows_next_token() {
    let server = MockServer::start().await;
    mount_two_pages(&server, "$XOM -is:retweet lang:en").await;

    let config = test_data::mock_config(&server.uri(), "unused.db");
    let client = TwitterClient::new(Client::new(), &config).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

    let tweets = client
        .search_all("$XOM -is:retweet lang:en", end - Duration::weeks(1), end)
        .await
        .unwrap();

    assert_eq!(tweets.len(), 3);
    assert_eq!(tweets[0].likes, 12);
    assert_eq!(tweets[1].author.as_ref().unwrap().location.as_deref(), Some("NYC"));
    assert_eq!(tweets[2].author.as_ref().unwrap().username, "valuehunter");
}

#[test_log::test(tokio::test)]
async fn test_twitter_analysis_counts_sentiment() {
    let server = MockServer::start().await;
    mount_two_pages(&server, "$XOM -is:retweet lang:en").await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/all"))
        .and(query_param("query", "$F -is:retweet lang:en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meta": {"result_count": 0}})))
        .mount(&server)
        .await;

    let config = test_data::mock_config(&server.uri(), "unused.db");
    let client = TwitterClient::new(Client::new(), &config).unwrap();
    let end = Utc::now() - Duration::minutes(1);
    let tickers = vec!["XOM".to_string(), "F".to_string()];

    let counts = twitter_analysis(&client, &tickers, end - Duration::weeks(1), end)
        .await
        .unwrap();

    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].stock, "$XOM");
    assert_eq!((counts[0].positive, counts[0].negative), (2, 1));
    assert_eq!(counts[1].stock, "$F");
    assert_eq!((counts[1].positive, counts[1].neutral, counts[1].negative), (0, 0, 0));
}

#[test_log::test(tokio::test)]
async fn test_rate_limited_page_is_retried_after_reset() {
    let server = MockServer::start().await;
    let reset = (Utc::now().timestamp() + 1).to_string();
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/all"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-rate-limit-reset", reset.as_str())
                .set_body_string("Too Many Requests"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "9", "text": "Solid dividend", "author_id": "u9"}],
            "meta": {"result_count": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_data::mock_config(&server.uri(), "unused.db");
    let client = TwitterClient::new(Client::new(), &config).unwrap();
    let end = Utc::now() - Duration::minutes(1);

    let tweets = client
        .search_all("$PG -is:retweet lang:en", end - Duration::days(1), end)
        .await
        .unwrap();

    assert_eq!(tweets.len(), 1);
    assert_eq!(tweets[0].text, "Solid dividend");
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_unauthorized_search_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let config = test_data::mock_config(&server.uri(), "unused.db");
    let client = TwitterClient::new(Client::new(), &config).unwrap();
    let end = Utc::now();
    assert!(client.search_all("$KO", end - Duration::days(1), end).await.is_err());
}
