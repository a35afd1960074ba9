//! Bounded retries around browser actions.

use crate::error::{Result, ScrapeError};
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::pacing::PacingPolicy;
use tracing::warn;

/// Run `op` up to `max_attempts` times, refreshing the page between attempts.
///
/// Only transient failures (element not rendered, page still loading) are
/// retried; anything else is returned at once. `Ok(None)` means the budget
/// ran out.
pub fn with_refresh<S, T, F>(browser: &mut S, max_attempts: u32, mut op: F) -> Result<Option<T>>
where
    S: BrowserSession + ?Sized,
    F: FnMut(&mut S) -> Result<T>,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match op(browser) {
            Ok(value) => return Ok(Some(value)),
            Err(err) if err.is_transient() => {
                warn!(attempt, max_attempts, "Condition not met ({}), retrying...", err);
                if attempt < max_attempts {
                    browser.refresh()?;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Ok(None)
}

/// Navigate the active tab, reloading once if the site cannot be reached
pub fn navigate<S>(browser: &mut S, url: &str, debug: bool, pacing: &PacingPolicy) -> Result<()>
where
    S: BrowserSession + ?Sized,
{
    match browser.navigate(url) {
        Err(err) if err.is_connectivity() => recover_connectivity(browser, url, debug, pacing, err),
        other => other,
    }
}

/// Second and last attempt at loading `url` after a connectivity failure.
///
/// In debug mode `err` is returned without retrying.
pub fn recover_connectivity<S>(
    browser: &mut S,
    url: &str,
    debug: bool,
    pacing: &PacingPolicy,
    err: ScrapeError,
) -> Result<()>
where
    S: BrowserSession + ?Sized,
{
    if debug {
        return Err(err);
    }

    warn!(url, "Connection issue encountered ({}). Retrying once...", err);
    pacing.pause();
    browser.navigate(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::browser::TabHandle;
    use scraper::Html;
    use std::time::Duration;

    /// Session whose selectors appear after a given number of refreshes
    #[derive(Default)]
    struct FlakySession {
        refreshes: u32,
        ready_after: u32,
        navigations: Vec<String>,
        unreachable: u32,
    }

    impl BrowserSession for FlakySession {
        fn navigate(&mut self, url: &str) -> Result<()> {
            self.navigations.push(url.to_string());
            if self.unreachable > 0 {
                self.unreachable -= 1;
                return Err(ScrapeError::Connectivity {
                    url: url.to_string(),
                    reason: "net::ERR_CONNECTION_RESET".to_string(),
                });
            }
            Ok(())
        }

        fn refresh(&mut self) -> Result<()> {
            self.refreshes += 1;
            Ok(())
        }

        fn current_url(&self) -> Result<String> {
            Ok(self.navigations.last().cloned().unwrap_or_default())
        }

        fn active_tab(&self) -> Result<TabHandle> {
            Ok(TabHandle::new("main"))
        }

        fn open_tab(&mut self, _url: &str) -> Result<TabHandle> {
            Ok(TabHandle::new("offer"))
        }

        fn switch_to(&mut self, _tab: &TabHandle) -> Result<()> {
            Ok(())
        }

        fn close_tab(&mut self) -> Result<()> {
            Ok(())
        }

        fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<()> {
            if self.refreshes >= self.ready_after {
                Ok(())
            } else {
                Err(ScrapeError::ElementNotFound {
                    selector: selector.to_string(),
                })
            }
        }

        fn count(&mut self, _selector: &str) -> Result<usize> {
            Ok(0)
        }

        fn read_markup(&mut self) -> Result<Html> {
            Ok(Html::parse_document("<html></html>"))
        }

        fn click(&mut self, _selector: &str) -> Result<()> {
            Ok(())
        }

        fn click_nth(&mut self, _selector: &str, _index: usize) -> Result<()> {
            Ok(())
        }

        fn type_text(&mut self, _selector: &str, _text: &str) -> Result<()> {
            Ok(())
        }

        fn press_enter(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_wait_for_all_succeeds_after_refreshes() {
        let mut session = FlakySession {
            ready_after: 2,
            ..Default::default()
        };

        let ready = session
            .wait_for_all(&["h1", "main"], Duration::from_millis(10), 5)
            .unwrap();
        assert!(ready);
        assert_eq!(session.refreshes, 2);
    }

    #[test]
    fn test_wait_for_all_gives_up_after_budget() {
        let mut session = FlakySession {
            ready_after: 10,
            ..Default::default()
        };

        let ready = session
            .wait_for_all(&["h1"], Duration::from_millis(10), 3)
            .unwrap();
        assert!(!ready);
        // No refresh after the last failed attempt
        assert_eq!(session.refreshes, 2);
    }

    #[test]
    fn test_non_transient_errors_are_not_retried() {
        let mut session = FlakySession::default();
        let mut calls = 0;

        let result: Result<Option<()>> = with_refresh(&mut session, 5, |_| {
            calls += 1;
            Err(ScrapeError::UnrecognizedDomain {
                url: "https://example.com".to_string(),
            })
        });

        assert!(matches!(result, Err(ScrapeError::UnrecognizedDomain { .. })));
        assert_eq!(calls, 1);
        assert_eq!(session.refreshes, 0);
    }

    #[test]
    fn test_connectivity_failure_retried_once() {
        let mut session = FlakySession {
            unreachable: 1,
            ..Default::default()
        };

        navigate(&mut session, "https://www.otodom.pl", false, &PacingPolicy::disabled()).unwrap();
        assert_eq!(session.navigations.len(), 2);
    }

    #[test]
    fn test_connectivity_failure_gives_up_after_second_attempt() {
        let mut session = FlakySession {
            unreachable: 2,
            ..Default::default()
        };

        let pacing = PacingPolicy::disabled();
        let result = navigate(&mut session, "https://www.otodom.pl", false, &pacing);
        assert!(matches!(result, Err(ScrapeError::Connectivity { .. })));
        assert_eq!(session.navigations.len(), 2);
    }

    #[test]
    fn test_debug_mode_reraises_connectivity_failure() {
        let mut session = FlakySession {
            unreachable: 1,
            ..Default::default()
        };

        let pacing = PacingPolicy::disabled();
        let result = navigate(&mut session, "https://www.otodom.pl", true, &pacing);
        assert!(matches!(result, Err(ScrapeError::Connectivity { .. })));
        assert_eq!(session.navigations.len(), 1);
    }
}
