use crate::config::{BrowserConfig, UserAgent};
use crate::error::{Result, ScrapeError};
use crate::scrapers::retry;
use anyhow::Context;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use rand::seq::SliceRandom;
use scraper::Html;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Handle to one browser tab.
///
/// The active tab is always named explicitly: `open_tab` returns the new
/// handle and callers return to a previous tab with `switch_to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabHandle(String);

impl TabHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A controllable, stateful browser.
///
/// Every call acts on the active tab and blocks for at most the configured
/// timeout.
pub trait BrowserSession {
    /// Load a URL in the active tab
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Reload the active tab
    fn refresh(&mut self) -> Result<()>;

    fn current_url(&self) -> Result<String>;

    fn active_tab(&self) -> Result<TabHandle>;

    /// Open a tab, make it active and load `url` in it.
    ///
    /// The new tab stays active even when loading fails, so the caller can
    /// still close it.
    fn open_tab(&mut self, url: &str) -> Result<TabHandle>;

    fn switch_to(&mut self, tab: &TabHandle) -> Result<()>;

    /// Close the active tab. No tab is active afterwards until `switch_to`.
    fn close_tab(&mut self) -> Result<()>;

    /// Block until an element matching `selector` exists
    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    /// Number of elements currently matching `selector`
    fn count(&mut self, selector: &str) -> Result<usize>;

    /// Rendered page content of the active tab
    fn read_markup(&mut self) -> Result<Html>;

    /// Scroll the element into view and click it, falling back to a
    /// script click when the element cannot be interacted with directly
    fn click(&mut self, selector: &str) -> Result<()>;

    /// Like `click`, for the `index`-th match of `selector`
    fn click_nth(&mut self, selector: &str, index: usize) -> Result<()>;

    fn type_text(&mut self, selector: &str, text: &str) -> Result<()>;

    fn press_enter(&mut self) -> Result<()>;

    fn is_present(&mut self, selector: &str, timeout: Duration) -> Result<bool> {
        match self.wait_for(selector, timeout) {
            Ok(()) => Ok(true),
            Err(ScrapeError::ElementNotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Wait for every selector, refreshing the page between attempts.
    ///
    /// Returns `false` once `max_retries` attempts have failed.
    fn wait_for_all(
        &mut self,
        selectors: &[&str],
        timeout: Duration,
        max_retries: u32,
    ) -> Result<bool> {
        let outcome = retry::with_refresh(self, max_retries, |browser| {
            for selector in selectors {
                browser.wait_for(selector, timeout)?;
            }
            Ok(())
        })?;

        Ok(outcome.is_some())
    }
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 Edg/119.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

/// Browser session backed by headless Chrome over the DevTools protocol
pub struct ChromeSession {
    browser: Browser,
    tabs: HashMap<TabHandle, Arc<Tab>>,
    active: Option<TabHandle>,
    user_agent: Option<String>,
    page_timeout: Duration,
}

impl ChromeSession {
    /// Launch Chrome and open the first tab
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        info!("Launching Chrome (headless: {})...", config.headless);

        let (width, height) = config.window_size;
        let window_size = format!("--window-size={},{}", width, height);
        let mut args: Vec<&OsStr> = vec![OsStr::new(&window_size)];
        if config.maximize_window {
            args.push(OsStr::new("--start-maximized"));
        }

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(config.sandbox)
            .ignore_certificate_errors(config.ignore_certificate_errors)
            .window_size(Some(config.window_size))
            .idle_browser_timeout(Duration::from_secs(config.idle_timeout_secs))
            .path(config.browser_path())
            .args(args)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        let user_agent = match &config.user_agent {
            UserAgent::Random => USER_AGENTS
                .choose(&mut rand::thread_rng())
                .map(|agent| agent.to_string()),
            UserAgent::Fixed(agent) => Some(agent.clone()),
            UserAgent::Default => None,
        };

        let mut session = Self {
            browser,
            tabs: HashMap::new(),
            active: None,
            user_agent,
            page_timeout: Duration::from_secs_f64(config.page_timeout_secs),
        };

        let first = session.new_tab()?;
        session.active = Some(first);

        Ok(session)
    }

    fn new_tab(&mut self) -> Result<TabHandle> {
        let tab = self.browser.new_tab().context("Failed to open a new tab")?;
        tab.set_default_timeout(self.page_timeout);

        if let Some(agent) = &self.user_agent {
            tab.set_user_agent(agent, None, None)
                .context("Failed to set user agent")?;
        }

        let handle = TabHandle::new(tab.get_target_id().to_string());
        self.tabs.insert(handle.clone(), tab);
        debug!("Opened tab {}", handle);

        Ok(handle)
    }

    fn tab(&self) -> Result<&Arc<Tab>> {
        let handle = self.active.as_ref().ok_or(ScrapeError::NoActiveTab)?;
        self.tabs
            .get(handle)
            .ok_or_else(|| ScrapeError::UnknownTab(handle.to_string()))
    }

    fn load(tab: &Tab, url: &str) -> Result<()> {
        tab.navigate_to(url).map_err(|err| ScrapeError::Connectivity {
            url: url.to_string(),
            reason: err.to_string(),
        })?;

        tab.wait_until_navigated()
            .map_err(|err| ScrapeError::NavigationTimeout {
                url: url.to_string(),
                reason: err.to_string(),
            })?;

        Ok(())
    }

    fn click_element(element: &Element<'_>, selector: &str) -> Result<()> {
        let direct = element.scroll_into_view().and_then(|el| el.click());

        if let Err(err) = direct {
            debug!("Direct click on `{}` failed ({}), using script click", selector, err);
            element
                .call_js_fn("function() { this.click(); }", vec![], false)
                .with_context(|| format!("Script click on `{}` failed", selector))?;
        }

        Ok(())
    }

    /// Close every tab and shut Chrome down
    pub fn quit(self) {
        drop(self);
    }
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        Self::load(self.tab()?, url)
    }

    fn refresh(&mut self) -> Result<()> {
        let tab = self.tab()?;
        let url = tab.get_url();
        tab.reload(false, None).map_err(|err| ScrapeError::Connectivity {
            url: url.clone(),
            reason: err.to_string(),
        })?;
        tab.wait_until_navigated()
            .map_err(|err| ScrapeError::NavigationTimeout {
                url,
                reason: err.to_string(),
            })?;

        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        Ok(self.tab()?.get_url())
    }

    fn active_tab(&self) -> Result<TabHandle> {
        self.active.clone().ok_or(ScrapeError::NoActiveTab)
    }

    fn open_tab(&mut self, url: &str) -> Result<TabHandle> {
        let handle = self.new_tab()?;
        self.active = Some(handle.clone());

        Self::load(self.tab()?, url)?;

        Ok(handle)
    }

    fn switch_to(&mut self, tab: &TabHandle) -> Result<()> {
        let target = self
            .tabs
            .get(tab)
            .ok_or_else(|| ScrapeError::UnknownTab(tab.to_string()))?;
        target
            .activate()
            .with_context(|| format!("Failed to activate tab {}", tab))?;
        self.active = Some(tab.clone());

        Ok(())
    }

    fn close_tab(&mut self) -> Result<()> {
        let handle = self.active.take().ok_or(ScrapeError::NoActiveTab)?;
        let tab = self
            .tabs
            .remove(&handle)
            .ok_or_else(|| ScrapeError::UnknownTab(handle.to_string()))?;

        tab.close(true)
            .with_context(|| format!("Failed to close tab {}", handle))?;
        debug!("Closed tab {}", handle);

        Ok(())
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        self.tab()?
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|_| ScrapeError::ElementNotFound {
                selector: selector.to_string(),
            })
    }

    fn count(&mut self, selector: &str) -> Result<usize> {
        Ok(self
            .tab()?
            .find_elements(selector)
            .map(|elements| elements.len())
            .unwrap_or(0))
    }

    fn read_markup(&mut self) -> Result<Html> {
        let content = self
            .tab()?
            .get_content()
            .context("Could not get HTML from page")?;

        Ok(Html::parse_document(&content))
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        let tab = self.tab()?;
        let element = tab
            .find_element(selector)
            .map_err(|_| ScrapeError::ElementNotFound {
                selector: selector.to_string(),
            })?;

        Self::click_element(&element, selector)
    }

    fn click_nth(&mut self, selector: &str, index: usize) -> Result<()> {
        let tab = self.tab()?;
        let elements = tab.find_elements(selector).unwrap_or_default();
        let element = elements.get(index).ok_or_else(|| ScrapeError::ElementNotFound {
            selector: format!("{} (#{})", selector, index),
        })?;

        Self::click_element(element, selector)
    }

    fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let tab = self.tab()?;
        let element = tab
            .find_element(selector)
            .map_err(|_| ScrapeError::ElementNotFound {
                selector: selector.to_string(),
            })?;

        element
            .type_into(text)
            .with_context(|| format!("Failed to type into `{}`", selector))?;

        Ok(())
    }

    fn press_enter(&mut self) -> Result<()> {
        self.tab()?
            .press_key("Enter")
            .context("Failed to press Enter")?;

        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        for (handle, tab) in self.tabs.drain() {
            if let Err(err) = tab.close(false) {
                warn!("Failed to close tab {}: {}", handle, err);
            }
        }
        info!("Browser session released");
    }
}
