//! Rate-limited remote caller with a shared failure budget.
//!
//! Every remote call in a run goes through one [`RateLimitedCaller`]. It
//! paces requests (a random pause every N calls), retries failures in place,
//! and gives up only once the run-wide budget of consecutive timeouts and
//! errors is spent. Callers above this layer never retry on their own.

use std::future::Future;
use std::time::Duration;

use rand::Rng as _;
use thiserror::Error;

use crate::flickr::RemoteError;

/// Replacement for an HTML error page embedded in a remote message.
const ELIDED_HTML: &str = "<html> ... (elided) ...</html>";

/// Upper bound on a scrubbed message, in characters.
const MAX_MESSAGE_CHARS: usize = 512;

/// Terminal failure surfaced once the failure budget is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallFailure {
    #[error("timeout (failure budget exhausted)")]
    Timeout,
    #[error("{0}")]
    Remote(String),
}

/// Pacing and backoff knobs.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Take a random pause before every `pace_every`-th call. Zero disables pacing.
    pub pace_every: u64,
    /// Upper bound of the pacing pause.
    pub pace_max: Duration,
    /// Pause after an error or I/O failure before trying again.
    pub failure_backoff: Duration,
    /// Consecutive timeouts + errors at which retrying stops.
    pub failure_threshold: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            pace_every: 50,
            pace_max: Duration::from_secs(15),
            failure_backoff: Duration::from_secs(15),
            failure_threshold: 10,
        }
    }
}

impl CallPolicy {
    /// Random pacing pause in `[0, pace_max]`.
    fn pacing_delay(&self) -> Duration {
        let max_ms = u64::try_from(self.pace_max.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Run-wide call counters. Reset to zero failures on any success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallBudget {
    pub calls: u64,
    pub pauses: u64,
    pub timeouts: u32,
    pub errors: u32,
}

impl CallBudget {
    pub fn failures(&self) -> u32 {
        self.timeouts + self.errors
    }

    pub fn is_exhausted(&self, threshold: u32) -> bool {
        self.failures() >= threshold
    }

    fn record_success(&mut self) {
        self.timeouts = 0;
        self.errors = 0;
    }
}

/// Wraps remote calls with pacing, retry and failure-budget accounting.
#[derive(Debug)]
pub struct RateLimitedCaller {
    policy: CallPolicy,
    budget: CallBudget,
}

impl Default for RateLimitedCaller {
    fn default() -> Self {
        Self::new(CallPolicy::default())
    }
}

impl RateLimitedCaller {
    pub fn new(policy: CallPolicy) -> Self {
        Self {
            policy,
            budget: CallBudget::default(),
        }
    }

    pub fn budget(&self) -> &CallBudget {
        &self.budget
    }

    /// Run `operation` until it succeeds or the failure budget runs out.
    ///
    /// `what` names the call in log lines. At least one attempt is always
    /// made, so a run whose budget is already spent still recovers on the
    /// first success.
    pub async fn call<T, F, Fut>(&mut self, what: &str, mut operation: F) -> Result<T, CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        loop {
            self.pace().await;

            let err = match operation().await {
                Ok(value) => {
                    self.budget.record_success();
                    return Ok(value);
                }
                Err(e) => e,
            };

            let failure = match err {
                RemoteError::Timeout => {
                    self.budget.timeouts += 1;
                    tracing::warn!(
                        call = what,
                        timeouts = self.budget.timeouts,
                        errors = self.budget.errors,
                        "Remote call timed out"
                    );
                    CallFailure::Timeout
                }
                RemoteError::Api(message) => {
                    self.budget.errors += 1;
                    let message = scrub_markup(&message);
                    tracing::warn!(
                        call = what,
                        timeouts = self.budget.timeouts,
                        errors = self.budget.errors,
                        "Remote error: {}",
                        message
                    );
                    CallFailure::Remote(message)
                }
                RemoteError::Io(message) => {
                    self.budget.errors += 1;
                    let message = scrub_markup(&message);
                    tracing::warn!(
                        call = what,
                        timeouts = self.budget.timeouts,
                        errors = self.budget.errors,
                        "Transport failure: {}",
                        message
                    );
                    CallFailure::Remote(message)
                }
            };

            if self.budget.is_exhausted(self.policy.failure_threshold) {
                tracing::error!(
                    call = what,
                    failures = self.budget.failures(),
                    "Too many consecutive failures, giving up on this call"
                );
                return Err(failure);
            }

            if failure != CallFailure::Timeout && !self.policy.failure_backoff.is_zero() {
                tracing::info!(
                    "Pausing {}s after failure",
                    self.policy.failure_backoff.as_secs()
                );
                tokio::time::sleep(self.policy.failure_backoff).await;
            }
        }
    }

    async fn pace(&mut self) {
        self.budget.calls += 1;
        if self.policy.pace_every == 0 || !self.budget.calls.is_multiple_of(self.policy.pace_every) {
            return;
        }
        let delay = self.policy.pacing_delay();
        self.budget.pauses += 1;
        tracing::debug!(calls = self.budget.calls, "Pacing pause {:.2}s", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}

/// Replace embedded HTML documents with a short marker and bound the length.
///
/// Remote errors sometimes carry a complete error page; logging it verbatim
/// floods the terminal.
pub fn scrub_markup(message: &str) -> String {
    let mut out = String::with_capacity(message.len().min(MAX_MESSAGE_CHARS + 16));
    let mut rest = message;

    while let Some(start) = find_html_start(rest) {
        out.push_str(&rest[..start]);
        out.push_str(ELIDED_HTML);
        let tail = &rest[start..];
        match find_ascii_ci(tail, "</html>") {
            Some(end) => rest = &tail[end + "</html>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);

    if out.chars().count() > MAX_MESSAGE_CHARS {
        let cut = out
            .char_indices()
            .nth(MAX_MESSAGE_CHARS)
            .map(|(i, _)| i)
            .unwrap_or(out.len());
        out.truncate(cut);
        out.push_str("...");
    }
    out
}

fn find_html_start(s: &str) -> Option<usize> {
    match (find_ascii_ci(s, "<!doctype html"), find_ascii_ci(s, "<html")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Case-insensitive search for an ASCII needle; returns a byte offset.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy() -> CallPolicy {
        CallPolicy {
            pace_every: 50,
            pace_max: Duration::ZERO,
            failure_backoff: Duration::ZERO,
            failure_threshold: 10,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = CallPolicy::default();
        assert_eq!(policy.pace_every, 50);
        assert_eq!(policy.pace_max, Duration::from_secs(15));
        assert_eq!(policy.failure_backoff, Duration::from_secs(15));
        assert_eq!(policy.failure_threshold, 10);
    }

    #[test]
    fn test_pacing_delay_within_bounds() {
        let policy = CallPolicy {
            pace_max: Duration::from_secs(2),
            ..CallPolicy::default()
        };
        for _ in 0..100 {
            assert!(policy.pacing_delay() <= Duration::from_secs(2));
        }
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let mut caller = RateLimitedCaller::new(fast_policy());
        let result = caller.call("noop", || async { Ok::<_, RemoteError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(caller.budget().calls, 1);
        assert_eq!(caller.budget().failures(), 0);
    }

    #[tokio::test]
    async fn test_retries_until_success_and_resets() {
        let mut caller = RateLimitedCaller::new(fast_policy());
        let attempts = Cell::new(0u32);
        let result = caller
            .call("flaky", || {
                let n = attempts.get();
                attempts.set(n + 1);
                async move {
                    match n {
                        0 => Err(RemoteError::Timeout),
                        1 => Err(RemoteError::Api("Service unavailable".into())),
                        2 => Err(RemoteError::Io("reset".into())),
                        _ => Ok("done"),
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.get(), 4);
        assert_eq!(caller.budget().timeouts, 0);
        assert_eq!(caller.budget().errors, 0);
        assert_eq!(caller.budget().calls, 4);
    }

    #[tokio::test]
    async fn test_budget_exhausted_after_ten_failures() {
        let mut caller = RateLimitedCaller::new(fast_policy());
        let attempts = Cell::new(0u32);
        let result: Result<(), _> = caller
            .call("always_times_out", || {
                attempts.set(attempts.get() + 1);
                async { Err(RemoteError::Timeout) }
            })
            .await;
        assert_eq!(result.unwrap_err(), CallFailure::Timeout);
        assert_eq!(attempts.get(), 10);
        assert_eq!(caller.budget().timeouts, 10);
    }

    #[tokio::test]
    async fn test_exhausted_budget_next_call_tries_once() {
        let mut caller = RateLimitedCaller::new(fast_policy());
        let _ = caller
            .call("first", || async { Err::<(), _>(RemoteError::Api("boom".into())) })
            .await;
        assert!(caller.budget().is_exhausted(10));

        let attempts = Cell::new(0u32);
        let result: Result<(), _> = caller
            .call("second", || {
                attempts.set(attempts.get() + 1);
                async { Err(RemoteError::Api("still broken".into())) }
            })
            .await;
        assert_eq!(result.unwrap_err(), CallFailure::Remote("still broken".into()));
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_message_is_scrubbed() {
        let mut caller = RateLimitedCaller::new(CallPolicy {
            failure_threshold: 1,
            ..fast_policy()
        });
        let result: Result<(), _> = caller
            .call("proxy", || async {
                Err(RemoteError::Io("proxy said <html><body>gone</body></html>".into()))
            })
            .await;
        assert_eq!(
            result.unwrap_err(),
            CallFailure::Remote(format!("proxy said {ELIDED_HTML}"))
        );
    }

    #[tokio::test]
    async fn test_success_resets_exhausted_budget() {
        let mut caller = RateLimitedCaller::new(fast_policy());
        let _ = caller
            .call("first", || async { Err::<(), _>(RemoteError::Timeout) })
            .await;
        assert!(caller.budget().is_exhausted(10));

        caller.call("ok", || async { Ok::<_, RemoteError>(()) }).await.unwrap();
        assert_eq!(caller.budget().failures(), 0);

        let attempts = Cell::new(0u32);
        let _ = caller
            .call("again", || {
                attempts.set(attempts.get() + 1);
                async { Err::<(), _>(RemoteError::Timeout) }
            })
            .await;
        assert_eq!(attempts.get(), 10);
    }

    #[tokio::test]
    async fn test_mixed_failures_share_budget() {
        let mut caller = RateLimitedCaller::new(fast_policy());
        let attempts = Cell::new(0u32);
        let result: Result<(), _> = caller
            .call("mixed", || {
                let n = attempts.get();
                attempts.set(n + 1);
                async move {
                    if n % 2 == 0 {
                        Err(RemoteError::Timeout)
                    } else {
                        Err(RemoteError::Api("<html><body>502</body></html>".into()))
                    }
                }
            })
            .await;
        // Tenth attempt is an error, so the failure carries the scrubbed message.
        assert_eq!(
            result.unwrap_err(),
            CallFailure::Remote(ELIDED_HTML.to_string())
        );
        assert_eq!(caller.budget().timeouts, 5);
        assert_eq!(caller.budget().errors, 5);
    }

    #[tokio::test]
    async fn test_pause_every_fifty_calls() {
        let mut caller = RateLimitedCaller::new(fast_policy());
        for _ in 0..120 {
            caller.call("tick", || async { Ok::<_, RemoteError>(()) }).await.unwrap();
        }
        assert_eq!(caller.budget().calls, 120);
        assert_eq!(caller.budget().pauses, 2);
    }

    #[tokio::test]
    async fn test_pacing_disabled() {
        let mut caller = RateLimitedCaller::new(CallPolicy {
            pace_every: 0,
            ..fast_policy()
        });
        for _ in 0..60 {
            caller.call("tick", || async { Ok::<_, RemoteError>(()) }).await.unwrap();
        }
        assert_eq!(caller.budget().pauses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_follows_error() {
        let mut caller = RateLimitedCaller::new(CallPolicy {
            pace_every: 0,
            ..CallPolicy::default()
        });
        let attempts = Cell::new(0u32);
        let started = tokio::time::Instant::now();
        caller
            .call("once_broken", || {
                let n = attempts.get();
                attempts.set(n + 1);
                async move {
                    if n == 0 {
                        Err(RemoteError::Io("connection reset".into()))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_backoff_after_timeout() {
        let mut caller = RateLimitedCaller::new(CallPolicy {
            pace_every: 0,
            ..CallPolicy::default()
        });
        let attempts = Cell::new(0u32);
        let started = tokio::time::Instant::now();
        caller
            .call("once_slow", || {
                let n = attempts.get();
                attempts.set(n + 1);
                async move {
                    if n == 0 {
                        Err(RemoteError::Timeout)
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_scrub_plain_message_untouched() {
        assert_eq!(scrub_markup("Photo not found"), "Photo not found");
    }

    #[test]
    fn test_scrub_replaces_html_block() {
        let msg = "HTTP 502: <HTML lang=\"en\">\n<head><title>Bad Gateway</title></head>\n<body>...</body></html> trailing";
        assert_eq!(
            scrub_markup(msg),
            format!("HTTP 502: {ELIDED_HTML} trailing")
        );
    }

    #[test]
    fn test_scrub_doctype_and_multiple_blocks() {
        let msg = "a <!DOCTYPE html><html>x</html> b <html>y</html> c";
        assert_eq!(
            scrub_markup(msg),
            format!("a {ELIDED_HTML} b {ELIDED_HTML} c")
        );
    }

    #[test]
    fn test_scrub_unterminated_block() {
        assert_eq!(
            scrub_markup("oops <html><body>truncated"),
            format!("oops {ELIDED_HTML}")
        );
    }

    #[test]
    fn test_scrub_bounds_length() {
        let long = "é".repeat(2000);
        let scrubbed = scrub_markup(&long);
        assert_eq!(scrubbed.chars().count(), MAX_MESSAGE_CHARS + 3);
        assert!(scrubbed.ends_with("..."));
    }
}
