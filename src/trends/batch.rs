//! Batched, rate-limited Trends retrieval.
//!
//! Google Trends throttles aggressively (HTTP 429), so requests are strictly
//! serial: one keyword per request, a random 20-45 s pause before every attempt,
//! and at most three attempts per keyword. A keyword whose attempts all fail is
//! skipped and the batch carries on with the next one.

use super::frame::{RelatedQueriesSet, TimeSeriesTable};
use super::timeframe::Timeframe;
use super::TrendsSource;
use crate::error::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on keywords grouped into one batch
pub const MAX_KEYWORDS_PER_BATCH: usize = 5;

/// Retry and pacing settings for Trends requests
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per keyword, including the first
    pub max_attempts: u32,
    /// Lower bound of the pause before each attempt
    pub min_delay: Duration,
    /// Upper bound of the pause before each attempt
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(20),
            max_delay: Duration::from_secs(45),
        }
    }
}

impl RetryPolicy {
    /// Uniformly random pause in `[min_delay, max_delay]`.
    pub fn next_delay(&self) -> Duration {
        let low = self.min_delay.as_millis().min(self.max_delay.as_millis()) as u64;
        let high = self.min_delay.as_millis().max(self.max_delay.as_millis()) as u64;
        if low == high {
            return Duration::from_millis(low);
        }
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }
}

/// Split keywords into consecutive groups of at most `chunk_size`.
///
/// A `chunk_size` of zero is treated as one.
pub fn chunk_keywords(keywords: &[String], chunk_size: usize) -> Vec<Vec<String>> {
    keywords
        .chunks(chunk_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Run `op` for one keyword under `policy`. `None` once every attempt failed.
async fn with_retries<T, F, Fut>(keyword: &str, policy: &RetryPolicy, mut op: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let delay = policy.next_delay();
        if !delay.is_zero() {
            debug!(keyword, delay_ms = delay.as_millis() as u64, "Pausing before request");
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => {
                info!(keyword, attempt, "Successfully fetched data");
                return Some(value);
            }
            Err(e) => {
                warn!(
                    keyword,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Attempt {}/{} failed", attempt, max_attempts
                );
                if attempt < max_attempts {
                    info!(keyword, "Retrying");
                } else {
                    warn!(keyword, "All retries failed, skipping this keyword");
                }
            }
        }
    }

    None
}

/// Fetch interest over time for each keyword and outer-join the results.
///
/// Returns `None` when no keyword produced any data.
pub async fn fetch_interest_over_time<S: TrendsSource + ?Sized>(
    source: &S,
    keywords: &[String],
    timeframe: &Timeframe,
    policy: &RetryPolicy,
) -> Option<TimeSeriesTable> {
    let mut merged = TimeSeriesTable::new();

    for keyword in keywords {
        info!(keyword = %keyword, "Fetching IOT data");
        let fetched = with_retries(keyword, policy, || {
            source.interest_over_time(keyword, timeframe)
        })
        .await;

        match fetched {
            Some(table) if !table.is_empty() => merged.outer_join(table),
            Some(_) => debug!(keyword = %keyword, "No interest data returned"),
            None => {}
        }
    }

    (!merged.is_empty()).then_some(merged)
}

/// Fetch related queries for each keyword.
///
/// Keywords whose attempts all fail are absent from the set. Returns `None`
/// when no keyword succeeded.
pub async fn fetch_related_queries<S: TrendsSource + ?Sized>(
    source: &S,
    keywords: &[String],
    timeframe: &Timeframe,
    policy: &RetryPolicy,
) -> Option<RelatedQueriesSet> {
    let mut set = RelatedQueriesSet::new();

    for keyword in keywords {
        info!(keyword = %keyword, "Fetching RQ data");
        let fetched = with_retries(keyword, policy, || {
            source.related_queries(keyword, timeframe)
        })
        .await;

        if let Some(queries) = fetched {
            set.insert(keyword, queries);
        }
    }

    (!set.is_empty()).then_some(set)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::MonitorError;
    use crate::trends::frame::{RelatedQueries, RelatedQuery};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    pub(crate) fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, 0, 0, 0).single().expect("valid date")
    }

    pub(crate) fn no_delay(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Scripted responses per keyword; unscripted calls fail with a 429.
    #[derive(Default)]
    pub(crate) struct ScriptedSource {
        pub iot: Mutex<HashMap<String, VecDeque<Result<TimeSeriesTable>>>>,
        pub rq: Mutex<HashMap<String, VecDeque<Result<RelatedQueries>>>>,
        pub calls: Mutex<Vec<String>>,
        pub call_times: Mutex<Vec<tokio::time::Instant>>,
    }

    impl ScriptedSource {
        pub fn script_iot(&self, keyword: &str, responses: Vec<Result<TimeSeriesTable>>) {
            if let Ok(mut map) = self.iot.lock() {
                map.insert(keyword.to_string(), responses.into());
            }
        }

        pub fn script_rq(&self, keyword: &str, responses: Vec<Result<RelatedQueries>>) {
            if let Ok(mut map) = self.rq.lock() {
                map.insert(keyword.to_string(), responses.into());
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        pub fn call_times(&self) -> Vec<tokio::time::Instant> {
            self.call_times.lock().map(|t| t.clone()).unwrap_or_default()
        }

        fn record(&self, call: String) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
            if let Ok(mut times) = self.call_times.lock() {
                times.push(tokio::time::Instant::now());
            }
        }
    }

    #[async_trait]
    impl TrendsSource for ScriptedSource {
        async fn interest_over_time(
            &self,
            keyword: &str,
            _timeframe: &Timeframe,
        ) -> Result<TimeSeriesTable> {
            self.record(format!("iot:{keyword}"));
            self.iot
                .lock()
                .ok()
                .and_then(|mut m| m.get_mut(keyword).and_then(VecDeque::pop_front))
                .unwrap_or(Err(MonitorError::RateLimited(60)))
        }

        async fn related_queries(
            &self,
            keyword: &str,
            _timeframe: &Timeframe,
        ) -> Result<RelatedQueries> {
            self.record(format!("rq:{keyword}"));
            self.rq
                .lock()
                .ok()
                .and_then(|mut m| m.get_mut(keyword).and_then(VecDeque::pop_front))
                .unwrap_or(Err(MonitorError::RateLimited(60)))
        }
    }

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_chunk_keywords_bounds_size() {
        let kws = keywords(&["a", "b", "c", "d", "e", "f", "g"]);
        let chunks = chunk_keywords(&kws, MAX_KEYWORDS_PER_BATCH);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], keywords(&["a", "b", "c", "d", "e"]));
        assert_eq!(chunks[1], keywords(&["f", "g"]));
        assert!(chunks.iter().all(|c| c.len() <= MAX_KEYWORDS_PER_BATCH));
    }

    #[test]
    fn test_chunk_keywords_empty_and_zero() {
        assert!(chunk_keywords(&[], 5).is_empty());
        assert_eq!(chunk_keywords(&keywords(&["a", "b"]), 0).len(), 2);
    }

    #[test]
    fn test_next_delay_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.next_delay();
            assert!(d >= Duration::from_secs(20) && d <= Duration::from_secs(45));
        }
        assert_eq!(no_delay(3).next_delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_iot_retries_then_succeeds() {
        let source = ScriptedSource::default();
        source.script_iot(
            "boho dress",
            vec![
                Err(MonitorError::RateLimited(60)),
                Ok(TimeSeriesTable::from_points("boho dress", vec![(day(1), 40)])),
            ],
        );

        let table = fetch_interest_over_time(
            &source,
            &keywords(&["boho dress"]),
            &Timeframe::default(),
            &no_delay(3),
        )
        .await
        .expect("data after retry");

        assert_eq!(table.columns(), ["boho dress"]);
        assert_eq!(source.calls(), vec!["iot:boho dress", "iot:boho dress"]);
    }

    #[tokio::test]
    async fn test_iot_skips_keyword_after_three_failures() {
        let source = ScriptedSource::default();
        source.script_iot(
            "linen pants",
            vec![Ok(TimeSeriesTable::from_points("linen pants", vec![(day(2), 70)]))],
        );

        let table = fetch_interest_over_time(
            &source,
            &keywords(&["wool coat", "linen pants"]),
            &Timeframe::default(),
            &no_delay(3),
        )
        .await
        .expect("linen pants still fetched");

        assert_eq!(table.columns(), ["linen pants"]);
        let wool_calls = source.calls().iter().filter(|c| *c == "iot:wool coat").count();
        assert_eq!(wool_calls, 3);
    }

    #[tokio::test]
    async fn test_iot_empty_result_is_not_retried() {
        let source = ScriptedSource::default();
        source.script_iot("obscure", vec![Ok(TimeSeriesTable::new())]);

        let result = fetch_interest_over_time(
            &source,
            &keywords(&["obscure"]),
            &Timeframe::default(),
            &no_delay(3),
        )
        .await;

        assert!(result.is_none());
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_iot_outer_joins_keywords() {
        let source = ScriptedSource::default();
        let a = TimeSeriesTable::from_points("a", vec![(day(1), 1), (day(2), 2)]);
        let b = TimeSeriesTable::from_points("b", vec![(day(2), 5), (day(3), 6)]);
        source.script_iot("a", vec![Ok(a)]);
        source.script_iot("b", vec![Ok(b)]);

        let kws = keywords(&["a", "b"]);
        let table = fetch_interest_over_time(&source, &kws, &Timeframe::default(), &no_delay(1))
            .await
            .expect("merged");

        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.column("b").expect("column b"),
            vec![(day(1), None), (day(2), Some(5)), (day(3), Some(6))]
        );
    }

    #[tokio::test]
    async fn test_rq_keeps_successful_keywords_in_order() {
        let source = ScriptedSource::default();
        source.script_rq(
            "Free People",
            vec![Ok(RelatedQueries {
                top: Some(vec![RelatedQuery { query: "free people dress".into(), value: 100 }]),
                rising: None,
            })],
        );
        source.script_rq("Eileen Fisher", vec![Ok(RelatedQueries::default())]);

        let set = fetch_related_queries(
            &source,
            &keywords(&["Eileen Fisher", "Failing", "Free People"]),
            &Timeframe::default(),
            &no_delay(2),
        )
        .await
        .expect("some keywords succeeded");

        let order: Vec<_> = set.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(order, vec!["Eileen Fisher", "Free People"]);
        assert!(set.get("Failing").is_none());
    }

    #[tokio::test]
    async fn test_rq_all_failures_is_none() {
        let source = ScriptedSource::default();
        let kws = keywords(&["x"]);
        let set = fetch_related_queries(&source, &kws, &Timeframe::default(), &no_delay(3)).await;
        assert!(set.is_none());
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_precedes_every_attempt() {
        let pause = Duration::from_secs(20);
        let policy = RetryPolicy {
            max_attempts: 3,
            min_delay: pause,
            max_delay: pause,
        };
        let source = ScriptedSource::default();
        source.script_iot(
            "a",
            vec![
                Err(MonitorError::RateLimited(60)),
                Ok(TimeSeriesTable::from_points("a", vec![(day(1), 10)])),
            ],
        );

        let started = tokio::time::Instant::now();
        let kws = keywords(&["a", "b"]);
        let table = fetch_interest_over_time(&source, &kws, &Timeframe::default(), &policy).await;
        assert!(table.is_some());

        // "a": fail then succeed; "b": unscripted, all three attempts fail.
        let times = source.call_times();
        assert_eq!(times.len(), 5);
        assert!(times[0] - started >= pause);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= pause);
        }
        assert!(started.elapsed() >= pause * 5);
    }
}
