//! In-memory browser for driving the site adapters in unit tests.

use crate::error::{Result, ScrapeError};
use crate::scrapers::browser::{BrowserSession, TabHandle};
use scraper::Html;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Every selector is present and clickable unless listed in `missing`
#[derive(Default)]
pub struct ScriptedSession {
    pub missing: HashSet<String>,
    pub unclickable: HashSet<String>,
    pub counts: HashMap<String, usize>,
    /// Interactions in call order, e.g. `click #a` or `type #q Katowice`
    pub actions: Vec<String>,
}

impl ScriptedSession {
    pub fn without(mut self, selector: &str) -> Self {
        self.missing.insert(selector.to_string());
        self
    }

    pub fn with_count(mut self, selector: &str, count: usize) -> Self {
        self.counts.insert(selector.to_string(), count);
        self
    }

    pub fn clicked(&self, selector: &str) -> bool {
        self.actions.iter().any(|action| action == &format!("click {}", selector))
    }

    fn require(&self, selector: &str) -> Result<()> {
        if self.missing.contains(selector) {
            return Err(ScrapeError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        Ok(())
    }
}

impl BrowserSession for ScriptedSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.actions.push(format!("navigate {}", url));
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.actions.push("refresh".to_string());
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        Ok(String::new())
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
        self.require(selector)
    }

    fn count(&mut self, selector: &str) -> Result<usize> {
        if self.missing.contains(selector) {
            return Ok(0);
        }
        Ok(self.counts.get(selector).copied().unwrap_or(1))
    }

    fn read_markup(&mut self) -> Result<Html> {
        Ok(Html::parse_document("<html></html>"))
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        self.require(selector)?;
        if self.unclickable.contains(selector) {
            return Err(ScrapeError::Browser(anyhow::anyhow!(
                "Element {} is covered by another element",
                selector
            )));
        }
        self.actions.push(format!("click {}", selector));
        Ok(())
    }

    fn click_nth(&mut self, selector: &str, index: usize) -> Result<()> {
        self.require(selector)?;
        self.actions.push(format!("click {} #{}", selector, index));
        Ok(())
    }

    fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        self.require(selector)?;
        self.actions.push(format!("type {} {}", selector, text));
        Ok(())
    }

    fn press_enter(&mut self) -> Result<()> {
        self.actions.push("enter".to_string());
        Ok(())
    }
}
