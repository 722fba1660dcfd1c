//! Heuristic scoring for discovered accounts.
//!
//! Five independent signals: weighted keywords in the bio, account age,
//! audience size, profile links, and which tracked account produced the
//! edge. The tier tables are operator lore, tuned against months of past
//! discoveries; change them only alongside the sheets that consume the
//! scores.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use followsignal_common::{AccountWeight, DiscoveryCandidate, KeywordWeight, ScoreBreakdown};
use regex::Regex;

/// Follower-count tiers, smallest audience first. First bound the count
/// fits under wins.
const FOLLOWER_TIERS: &[(i64, i64)] = &[
    (200, 100),
    (400, 90),
    (600, 80),
    (800, 70),
    (1000, 60),
    (1200, 50),
    (1600, 45),
    (2000, 40),
    (2600, 35),
    (3200, 30),
    (4000, 25),
    (5000, 20),
    (6000, 15),
    (7000, 10),
    (8000, 8),
    (10000, 6),
];

/// Score for audiences above the largest tier.
const FOLLOWER_FLOOR: i64 = 4;

/// Account-age tiers in weeks, youngest first. First tier the account is
/// younger than wins.
const AGE_TIERS: &[(i64, i64)] = &[
    (2, 100),
    (4, 90),
    (6, 80),
    (8, 70),
    (10, 60),
    (12, 50),
    (14, 45),
    (16, 40),
    (18, 35),
    (20, 30),
    (24, 25),
    (28, 20),
    (32, 10),
    (36, 10),
    (40, 8),
];

/// Score for accounts older than the last tier, and for accounts whose
/// creation date the API withheld.
const AGE_FLOOR: i64 = 6;

const DISCORD_INVITE_POINTS: i64 = 40;
const TELEGRAM_INVITE_POINTS: i64 = 10;
const GENERIC_LINK_POINTS: i64 = 20;

/// Hosts that never indicate a project of its own.
const URL_BLACKLIST: &[&str] = &[
    "fb.me",
    "facebook",
    "twitter",
    "instagram",
    "youtube",
    "wa.me",
    "whatsapp",
    "linkedin",
    "tiktok",
    "fb.com",
];

/// Points for audience size. Small accounts are the interesting ones.
pub fn follower_points(count: i64) -> i64 {
    for &(bound, points) in FOLLOWER_TIERS {
        if count <= bound {
            return points;
        }
    }
    FOLLOWER_FLOOR
}

/// Points for account age. A profile created weeks before tracked accounts
/// start following it is the strongest launch signal there is.
pub fn age_points(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    let Some(created_at) = created_at else {
        return AGE_FLOOR;
    };
    for &(weeks, points) in AGE_TIERS {
        if created_at > now - Duration::weeks(weeks) {
            return points;
        }
    }
    AGE_FLOOR
}

/// One candidate with its full breakdown and the links that survived url
/// filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: DiscoveryCandidate,
    pub breakdown: ScoreBreakdown,
    /// Forwardable links, each with an explicit scheme.
    pub accepted_urls: Vec<String>,
}

pub struct Scorer {
    /// Lowercased phrases bucketed by word count. First occurrence of a
    /// phrase wins when the keyword table holds duplicates.
    keywords: HashMap<usize, Vec<KeywordWeight>>,
    /// Source bonus by tracked handle, exact match only.
    accounts: HashMap<String, i64>,
    discord_invite: Regex,
    telegram_invite: Regex,
}

impl Scorer {
    pub fn new(keywords: &[KeywordWeight], accounts: &[AccountWeight]) -> Self {
        let mut seen = HashSet::new();
        let mut buckets: HashMap<usize, Vec<KeywordWeight>> = HashMap::new();
        for keyword in keywords {
            let phrase = keyword.phrase.to_lowercase();
            if !seen.insert(phrase.clone()) {
                continue;
            }
            let word_count = phrase.split(' ').count();
            buckets.entry(word_count).or_default().push(KeywordWeight {
                phrase,
                points: keyword.points,
            });
        }

        let mut bonus = HashMap::new();
        for account in accounts {
            bonus.entry(account.handle.clone()).or_insert(account.points);
        }

        Self {
            keywords: buckets,
            accounts: bonus,
            // `[/invite/]?` is one optional character from that class, not a
            // literal path segment. The pattern still accepts every real
            // invite form (discord.gg/x, discord.com/invite/x).
            discord_invite: Regex::new(
                r"discord(?:\.com|app\.com|\.gg)[/invite/]?(?:[a-zA-Z0-9-]{2,32})",
            )
            .expect("valid regex"),
            telegram_invite: Regex::new(r"(t(elegram)?\.me|telegram\.org)/([\S]{5,32})/?")
                .expect("valid regex"),
        }
    }

    /// Sum of matched phrase weights across every word window of the bio.
    /// Overlapping and repeated matches all count.
    pub fn keyword_points(&self, description: &str) -> i64 {
        let lowered = description.to_lowercase();
        let words: Vec<&str> = lowered.split(' ').collect();

        let mut points = 0;
        for (&word_count, weighted) in &self.keywords {
            for window in words.windows(word_count) {
                let phrase = window.join(" ");
                for keyword in weighted {
                    if keyword.phrase == phrase {
                        points += keyword.points;
                    }
                }
            }
        }
        points
    }

    /// Bonus for the tracked account that produced the edge. Exact handle
    /// match; the watch list and the API agree on casing.
    pub fn account_points(&self, tracked_handle: &str) -> i64 {
        self.accounts.get(tracked_handle).copied().unwrap_or(0)
    }

    /// Score profile links and keep the ones worth forwarding. Invite links
    /// rank highest, blacklisted social hosts are dropped outright, anything
    /// else counts as a generic external link.
    pub fn url_points(&self, urls: &[String]) -> (i64, Vec<String>) {
        let mut points = 0;
        let mut accepted = Vec::new();

        for url in urls {
            if self.discord_invite.is_match(url) {
                points += DISCORD_INVITE_POINTS;
            } else if self.telegram_invite.is_match(url) {
                points += TELEGRAM_INVITE_POINTS;
            } else if URL_BLACKLIST.iter().any(|host| url.contains(host)) {
                continue;
            } else {
                points += GENERIC_LINK_POINTS;
            }
            accepted.push(with_scheme(url));
        }

        (points, accepted)
    }

    /// Apply every heuristic to one candidate.
    pub fn score(&self, candidate: DiscoveryCandidate, now: DateTime<Utc>) -> ScoredCandidate {
        let (url, accepted_urls) = self.url_points(&candidate.urls);
        let breakdown = ScoreBreakdown {
            keyword: self.keyword_points(&candidate.description),
            account_age: age_points(candidate.created_at, now),
            follower: follower_points(candidate.follower_count),
            url,
            known_source: self.account_points(&candidate.tracked_handle),
        };
        ScoredCandidate {
            candidate,
            breakdown,
            accepted_urls,
        }
    }
}

/// Profile links often arrive as bare hosts; prefix those so the forwarded
/// link is clickable. Links already carrying a scheme pass through.
fn with_scheme(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}
