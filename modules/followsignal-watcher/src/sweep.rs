//! Keyword sweep: the secondary discovery channel.
//!
//! Searches recent posts for the operator's keywords and treats
//! low-activity authors as discovery candidates. Sweep candidates ride the
//! same scoring and sink path as follow discoveries, labelled with
//! [`SWEEP_SOURCE`] instead of a tracked handle.

use chrono::{DateTime, Duration, Utc};
use followsignal_common::{DiscoveryCandidate, KeywordWeight};
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, info, warn};
use twitter_client::{ApiUser, TwitterError};

use crate::fetcher::account_metrics;
use crate::traits::SocialGraph;

/// Source label carried by sweep candidates in place of a tracked handle.
pub const SWEEP_SOURCE: &str = "search";

/// Random facet appended to the query so consecutive sweeps do not keep
/// returning the same slice of the stream.
const QUERY_MODIFIERS: &[&str] = &["has:links", "has:mentions", "has:media", ""];

/// How far back one sweep looks.
const SWEEP_WINDOW_HOURS: i64 = 6;

/// Continuation pages fetched after the first, at most.
const MAX_CONTINUATIONS: u32 = 3;

/// Authors with more lifetime posts than this are established accounts,
/// not fresh launches.
const MAX_AUTHOR_POSTS: i64 = 5;

/// Quote every keyword, OR them together and append a random facet.
pub fn build_query<R: Rng + ?Sized>(keywords: &[KeywordWeight], rng: &mut R) -> String {
    let quoted: Vec<String> = keywords
        .iter()
        .map(|keyword| format!("\"{}\"", keyword.phrase))
        .collect();
    let modifier = QUERY_MODIFIERS.choose(rng).copied().unwrap_or_default();
    format!("({}) {}", quoted.join(" OR "), modifier)
}

/// Run one sweep over the recent-search window.
///
/// A rate limit ends the sweep quietly with whatever was collected; any
/// other failure ends it with a warning. Never fatal to the cycle.
pub async fn run_sweep(graph: &dyn SocialGraph, query: &str) -> Vec<DiscoveryCandidate> {
    let start_time = Utc::now() - Duration::hours(SWEEP_WINDOW_HOURS);
    let mut authors: Vec<ApiUser> = Vec::new();
    let mut next_token: Option<String> = None;
    let mut continuations: u32 = 0;

    loop {
        match graph
            .search_recent(query, start_time, next_token.as_deref())
            .await
        {
            Ok(page) => {
                authors.extend(page.users);
                match page.next_token {
                    Some(token) if continuations < MAX_CONTINUATIONS => {
                        next_token = Some(token);
                        continuations += 1;
                    }
                    _ => break,
                }
            }
            Err(TwitterError::RateLimited) => {
                info!("Sweep hit the search rate limit, keeping what was collected");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Sweep search failed");
                break;
            }
        }
    }

    let now = Utc::now();
    let mut seen = std::collections::HashSet::new();
    let mut candidates = Vec::new();
    for author in authors {
        let low_activity = author
            .public_metrics
            .map(|m| m.tweet_count <= MAX_AUTHOR_POSTS)
            .unwrap_or(false);
        if !low_activity {
            continue;
        }
        if !seen.insert(author.username.clone()) {
            continue;
        }
        candidates.push(candidate_from_author(&author, now));
    }

    debug!(count = candidates.len(), "Sweep produced candidates");
    candidates
}

/// Shape one search author like a followed account so the scorer treats
/// both discovery channels identically.
fn candidate_from_author(author: &ApiUser, now: DateTime<Utc>) -> DiscoveryCandidate {
    let metrics = account_metrics(author);
    DiscoveryCandidate {
        tracked_handle: SWEEP_SOURCE.to_string(),
        followed_handle: metrics.handle,
        discovered_at: now,
        created_at: metrics.created_at,
        follower_count: metrics.follower_count,
        description: metrics.description,
        urls: metrics.urls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{search_author, search_page, MockGraph};
    use followsignal_common::KeywordWeight;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn keywords(phrases: &[&str]) -> Vec<KeywordWeight> {
        phrases
            .iter()
            .map(|p| KeywordWeight {
                phrase: p.to_string(),
                points: 10,
            })
            .collect()
    }

    #[test]
    fn query_quotes_and_ors_every_keyword() {
        let mut rng = StdRng::seed_from_u64(3);
        let query = build_query(&keywords(&["airdrop", "token sale"]), &mut rng);

        let (head, modifier) = query.rsplit_once(") ").unwrap();
        assert_eq!(head, "(\"airdrop\" OR \"token sale\"");
        assert!(QUERY_MODIFIERS.contains(&modifier));
    }

    #[test]
    fn single_keyword_queries_keep_the_parens() {
        let mut rng = StdRng::seed_from_u64(3);
        let query = build_query(&keywords(&["mint"]), &mut rng);
        assert!(query.starts_with("(\"mint\") "));
    }

    #[tokio::test]
    async fn sweep_collects_authors_from_every_page() {
        let graph = MockGraph::new().on_search(vec![
            search_page(vec![search_author("first_find", 2)], Some("page-1")),
            search_page(vec![search_author("second_find", 3)], None),
        ]);

        let candidates = run_sweep(&graph, "(\"mint\") ").await;
        let handles: Vec<_> = candidates.iter().map(|c| c.followed_handle.as_str()).collect();
        assert_eq!(handles, vec!["first_find", "second_find"]);
        assert_eq!(graph.search_calls(), 2);
    }

    #[tokio::test]
    async fn sweep_stops_after_the_continuation_cap() {
        let pages: Vec<_> = (0..6)
            .map(|i| {
                search_page(
                    vec![search_author(&format!("author_{i}"), 1)],
                    Some(&format!("page-{}", i + 1)),
                )
            })
            .collect();
        let graph = MockGraph::new().on_search(pages);

        let candidates = run_sweep(&graph, "(\"mint\") ").await;
        // First fetch plus three continuations.
        assert_eq!(graph.search_calls(), 4);
        assert_eq!(candidates.len(), 4);
    }

    #[tokio::test]
    async fn rate_limited_sweep_keeps_partial_results() {
        let graph = MockGraph::new()
            .on_search(vec![search_page(
                vec![search_author("early_find", 2)],
                Some("page-1"),
            )])
            .fail_search_on(1, TwitterError::RateLimited);

        let candidates = run_sweep(&graph, "(\"mint\") ").await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].followed_handle, "early_find");
    }

    #[tokio::test]
    async fn prolific_authors_are_filtered_out() {
        let graph = MockGraph::new().on_search(vec![search_page(
            vec![search_author("quiet_launch", 4), search_author("big_account", 4000)],
            None,
        )]);

        let candidates = run_sweep(&graph, "(\"mint\") ").await;
        let handles: Vec<_> = candidates.iter().map(|c| c.followed_handle.as_str()).collect();
        assert_eq!(handles, vec!["quiet_launch"]);
    }

    #[tokio::test]
    async fn repeat_authors_appear_once() {
        let graph = MockGraph::new().on_search(vec![
            search_page(vec![search_author("busy_poster", 2)], Some("page-1")),
            search_page(vec![search_author("busy_poster", 2)], None),
        ]);

        let candidates = run_sweep(&graph, "(\"mint\") ").await;
        assert_eq!(candidates.len(), 1);
    }

    #[tokio::test]
    async fn sweep_candidates_carry_the_search_label() {
        let graph = MockGraph::new()
            .on_search(vec![search_page(vec![search_author("labelled", 1)], None)]);

        let candidates = run_sweep(&graph, "(\"mint\") ").await;
        assert_eq!(candidates[0].tracked_handle, SWEEP_SOURCE);
    }
}
