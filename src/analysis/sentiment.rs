//! Tweet cleaning and lexicon-based sentiment scoring.
//!
//! Polarity lies in [-1, 1] and subjectivity in [0, 1]. Each lexicon word
//! carries both scores; an intensifier directly before a word scales it and a
//! negator within the preceding three tokens flips its polarity at half
//! strength. The text score is the mean over matched words.

use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::api::TweetSearch;
use crate::models::{SentimentCounts, SentimentLabel, Tweet};

/// (word, polarity, subjectivity)
const LEXICON: &[(&str, f64, f64)] = &[
    // general
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("excellent", 1.0, 1.0),
    ("amazing", 0.6, 0.9),
    ("awesome", 1.0, 1.0),
    ("best", 1.0, 0.3),
    ("better", 0.5, 0.5),
    ("nice", 0.6, 1.0),
    ("love", 0.5, 0.6),
    ("like", 0.1, 0.3),
    ("happy", 0.8, 1.0),
    ("glad", 0.5, 1.0),
    ("strong", 0.43, 0.73),
    ("solid", 0.3, 0.5),
    ("impressive", 1.0, 1.0),
    ("positive", 0.23, 0.55),
    ("win", 0.8, 0.4),
    ("winner", 0.5, 0.5),
    ("winning", 0.5, 0.5),
    ("success", 0.3, 0.3),
    ("successful", 0.75, 0.95),
    ("beautiful", 0.85, 1.0),
    ("perfect", 1.0, 1.0),
    ("wonderful", 1.0, 1.0),
    ("fantastic", 0.4, 0.9),
    ("safe", 0.5, 0.5),
    ("cheap", 0.4, 0.7),
    ("undervalued", 0.4, 0.6),
    ("bad", -0.7, 0.67),
    ("worse", -0.4, 0.6),
    ("worst", -1.0, 1.0),
    ("terrible", -1.0, 1.0),
    ("awful", -1.0, 1.0),
    ("horrible", -1.0, 1.0),
    ("poor", -0.4, 0.6),
    ("weak", -0.38, 0.63),
    ("negative", -0.3, 0.4),
    ("hate", -0.8, 0.9),
    ("sad", -0.5, 1.0),
    ("angry", -0.5, 1.0),
    ("ugly", -0.7, 1.0),
    ("disappointing", -0.6, 0.7),
    ("disappointed", -0.75, 0.75),
    ("fail", -0.5, 0.3),
    ("failed", -0.5, 0.3),
    ("failure", -0.32, 0.3),
    ("loser", -0.5, 0.5),
    ("lose", -0.4, 0.3),
    ("losing", -0.4, 0.3),
    ("wrong", -0.5, 0.9),
    ("risky", -0.3, 0.6),
    ("dangerous", -0.6, 0.9),
    ("expensive", -0.5, 0.7),
    ("overvalued", -0.4, 0.6),
    ("stupid", -0.8, 1.0),
    ("boring", -1.0, 1.0),
    ("worried", -0.4, 0.7),
    ("scary", -0.5, 1.0),
    ("high", 0.16, 0.54),
    ("low", -0.2, 0.4),
    ("new", 0.14, 0.45),
    ("big", 0.0, 0.1),
    ("huge", 0.4, 0.9),
    ("massive", 0.0, 1.0),
    ("interesting", 0.5, 0.5),
    ("important", 0.4, 1.0),
    ("easy", 0.43, 0.83),
    ("hard", -0.29, 0.54),
    ("free", 0.4, 0.8),
    ("true", 0.35, 0.65),
    ("false", -0.4, 0.7),
    ("sure", 0.5, 0.89),
    ("crazy", -0.6, 0.9),
    ("insane", -1.0, 1.0),
    ("fun", 0.3, 0.2),
    ("funny", 0.25, 1.0),
    // markets
    ("bullish", 0.5, 0.6),
    ("bearish", -0.5, 0.6),
    ("bull", 0.3, 0.4),
    ("bear", -0.3, 0.4),
    ("rally", 0.4, 0.4),
    ("rallies", 0.4, 0.4),
    ("rallying", 0.4, 0.4),
    ("surge", 0.4, 0.4),
    ("surges", 0.4, 0.4),
    ("soar", 0.5, 0.5),
    ("soars", 0.5, 0.5),
    ("soaring", 0.5, 0.5),
    ("gain", 0.3, 0.3),
    ("gains", 0.3, 0.3),
    ("profit", 0.3, 0.3),
    ("profitable", 0.5, 0.5),
    ("beat", 0.3, 0.3),
    ("beats", 0.3, 0.3),
    ("upgrade", 0.3, 0.3),
    ("upgraded", 0.3, 0.3),
    ("outperform", 0.4, 0.4),
    ("breakout", 0.3, 0.4),
    ("buy", 0.2, 0.3),
    ("long", 0.05, 0.4),
    ("moon", 0.4, 0.7),
    ("growth", 0.2, 0.3),
    ("growing", 0.2, 0.3),
    ("record", 0.2, 0.2),
    ("dividend", 0.1, 0.1),
    ("crash", -0.5, 0.5),
    ("crashes", -0.5, 0.5),
    ("crashing", -0.5, 0.5),
    ("plunge", -0.5, 0.5),
    ("plunges", -0.5, 0.5),
    ("tank", -0.4, 0.5),
    ("tanking", -0.4, 0.5),
    ("dump", -0.4, 0.5),
    ("dumping", -0.4, 0.5),
    ("selloff", -0.4, 0.4),
    ("sell-off", -0.4, 0.4),
    ("sell", -0.2, 0.3),
    ("short", -0.05, 0.3),
    ("loss", -0.3, 0.3),
    ("losses", -0.3, 0.3),
    ("miss", -0.3, 0.3),
    ("misses", -0.3, 0.3),
    ("downgrade", -0.3, 0.3),
    ("downgraded", -0.3, 0.3),
    ("underperform", -0.4, 0.4),
    ("lawsuit", -0.4, 0.3),
    ("fraud", -0.5, 0.5),
    ("scam", -0.6, 0.7),
    ("bankrupt", -0.6, 0.5),
    ("bankruptcy", -0.6, 0.5),
    ("debt", -0.1, 0.2),
    ("recession", -0.4, 0.4),
    ("panic", -0.4, 0.7),
    ("fear", -0.3, 0.6),
    ("volatile", -0.2, 0.5),
];

/// (word, multiplier)
const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("really", 1.2),
    ("extremely", 1.5),
    ("incredibly", 1.5),
    ("super", 1.3),
    ("so", 1.2),
    ("highly", 1.3),
    ("totally", 1.3),
    ("absolutely", 1.4),
    ("quite", 1.1),
    ("pretty", 1.1),
    ("somewhat", 0.7),
    ("slightly", 0.5),
    ("barely", 0.4),
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "n't", "dont", "don't", "doesnt", "doesn't", "isnt", "isn't",
    "wasnt", "wasn't", "arent", "aren't", "wont", "won't", "cant", "can't", "cannot",
    "didnt", "didn't", "without", "nor", "neither",
];

/// Number of tokens a negator reaches forward
const NEGATION_WINDOW: usize = 3;
const NEGATION_FACTOR: f64 = -0.5;

fn link_regex() -> &'static Regex {
    static LINK: OnceLock<Regex> = OnceLock::new();
    LINK.get_or_init(|| Regex::new(r"https?://\S+").expect("valid link pattern"))
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"[a-z][a-z'\-]*").expect("valid token pattern"))
}

/// Strip newlines and hyperlinks from a tweet
pub fn clean_tweet(tweet: &str) -> String {
    let without_newlines = tweet.replace('\n', "");
    link_regex().replace_all(&without_newlines, "").into_owned()
}

fn lookup(word: &str) -> Option<(f64, f64)> {
    LEXICON
        .iter()
        .find(|(w, _, _)| *w == word)
        .map(|(_, polarity, subjectivity)| (*polarity, *subjectivity))
}

fn intensity(word: &str) -> Option<f64> {
    INTENSIFIERS.iter().find(|(w, _)| *w == word).map(|(_, m)| *m)
}

fn is_negator(word: &str) -> bool {
    NEGATORS.contains(&word) || word.ends_with("n't")
}

/// Polarity and subjectivity of a piece of text
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SentimentScore {
    pub polarity: f64,
    pub subjectivity: f64,
}

pub fn score_text(text: &str) -> SentimentScore {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = token_regex().find_iter(&lowered).map(|m| m.as_str()).collect();

    let mut polarities = Vec::new();
    let mut subjectivities = Vec::new();
    let mut tokens_since_negation: Option<usize> = None;
    let mut pending_intensity: Option<f64> = None;

    for token in tokens {
        if is_negator(token) {
            tokens_since_negation = Some(0);
            pending_intensity = None;
            continue;
        }

        if let Some(multiplier) = intensity(token) {
            pending_intensity = Some(multiplier);
            tokens_since_negation = tokens_since_negation.map(|n| n + 1);
            continue;
        }

        if let Some((polarity, subjectivity)) = lookup(token) {
            let multiplier = pending_intensity.take().unwrap_or(1.0);
            let mut polarity = (polarity * multiplier).clamp(-1.0, 1.0);
            let subjectivity = (subjectivity * multiplier).clamp(0.0, 1.0);

            if tokens_since_negation.take().map_or(false, |n| n < NEGATION_WINDOW) {
                polarity *= NEGATION_FACTOR;
            }

            polarities.push(polarity);
            subjectivities.push(subjectivity);
            continue;
        }

        pending_intensity = None;
        tokens_since_negation = tokens_since_negation
            .map(|n| n + 1)
            .filter(|n| *n < NEGATION_WINDOW);
    }

    if polarities.is_empty() {
        return SentimentScore::default();
    }

    let n = polarities.len() as f64;
    SentimentScore {
        polarity: (polarities.iter().sum::<f64>() / n).clamp(-1.0, 1.0),
        subjectivity: (subjectivities.iter().sum::<f64>() / n).clamp(0.0, 1.0),
    }
}

pub fn get_polarity(tweet: &str) -> f64 {
    score_text(tweet).polarity
}

pub fn get_subjectivity(tweet: &str) -> f64 {
    score_text(tweet).subjectivity
}

pub fn get_sentiment(score: f64) -> SentimentLabel {
    if score < 0.0 {
        SentimentLabel::Negative
    } else if score == 0.0 {
        SentimentLabel::Neutral
    } else {
        SentimentLabel::Positive
    }
}

/// A tweet after cleaning and scoring
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTweet {
    pub cleaned: String,
    pub polarity: f64,
    pub subjectivity: f64,
    pub sentiment: SentimentLabel,
}

pub fn score_tweet(tweet: &Tweet) -> ScoredTweet {
    let cleaned = clean_tweet(&tweet.text);
    let score = score_text(&cleaned);
    ScoredTweet {
        polarity: score.polarity,
        subjectivity: score.subjectivity,
        sentiment: get_sentiment(score.polarity),
        cleaned,
    }
}

/// Tally the sentiment labels of a ticker's tweets
pub fn count_sentiment(stock: &str, tweets: &[Tweet]) -> SentimentCounts {
    let mut counts = SentimentCounts::new(stock);
    for tweet in tweets {
        counts.record(score_tweet(tweet).sentiment);
    }
    counts
}

/// Search tweets for each ticker's cashtag and count their sentiment.
///
/// A failed search is logged and reported as zero tweets for that ticker.
pub async fn twitter_analysis(
    search: &(dyn TweetSearch + Send + Sync),
    tickers: &[String],
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<Vec<SentimentCounts>> {
    let mut results = Vec::with_capacity(tickers.len());

    for ticker in tickers {
        let search_term = format!("${}", ticker);
        let query = format!("{} -is:retweet lang:en", search_term);

        let counts = match search.search_all(&query, start_time, end_time).await {
            Ok(tweets) => count_sentiment(&search_term, &tweets),
            Err(e) => {
                warn!("❌ Tweet search failed for {}: {}", search_term, e);
                SentimentCounts::new(&search_term)
            }
        };

        info!(
            "💬 {}: {} positive, {} neutral, {} negative",
            counts.stock, counts.positive, counts.neutral, counts.negative
        );
        results.push(counts);
    }

    Ok(results)
}
