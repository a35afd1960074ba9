//! CSV output, one file per site per run.

use crate::error::Result;
use crate::models::{OfferRecord, SiteDomains};
use crate::scrapers::traits::RecordSink;
use crate::session::SinkKey;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing::{debug, info};

/// Make a location query or domain safe to use as a path component.
///
/// The URL scheme and a leading `www.` are dropped; every character that is
/// not a letter, digit, `_` or `.` becomes `_`.
pub fn sanitize_for_filepath(value: &str) -> String {
    let value = value.trim();
    let value = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .unwrap_or(value);
    let value = value.strip_prefix("www.").unwrap_or(value);

    value
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Appends records to `{root}/{timestamp}_{query}/{domain}.csv`
pub struct CsvRecordSink {
    root: PathBuf,
    domains: SiteDomains,
    written: Vec<PathBuf>,
}

impl CsvRecordSink {
    pub fn new(root: impl Into<PathBuf>, domains: SiteDomains) -> Self {
        Self {
            root: root.into(),
            domains,
            written: Vec::new(),
        }
    }

    /// Run folder for `key`
    pub fn directory(&self, key: &SinkKey) -> PathBuf {
        self.root.join(format!(
            "{}_{}",
            key.timestamp,
            sanitize_for_filepath(&key.location_query)
        ))
    }

    /// File that records of `record`'s site go to
    pub fn file_for(&self, key: &SinkKey, record: &OfferRecord) -> PathBuf {
        let domain = self.domains.domain(record.site());
        self.directory(key)
            .join(format!("{}.csv", sanitize_for_filepath(domain)))
    }
}

impl RecordSink for CsvRecordSink {
    fn append(&mut self, key: &SinkKey, record: &OfferRecord) -> Result<()> {
        let path = self.file_for(key, record);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let is_new = fs::metadata(&path).map(|meta| meta.len() == 0).unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer.write_record(record.field_names())?;
            info!("Created {}", path.display());
        }
        writer.write_record(record.values().map(|value| value.unwrap_or("")))?;
        writer.flush()?;

        debug!("Saved {} to {}", record.link(), path.display());

        if !self.written.contains(&path) {
            self.written.push(path);
        }

        Ok(())
    }

    fn locations(&self) -> Vec<PathBuf> {
        self.written.clone()
    }
}

/// Terminal bar sized to the offer cap
pub fn offer_progress_bar(offer_cap: u32) -> ProgressBar {
    let bar = ProgressBar::new(u64::from(offer_cap));
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")
        .map(|style| style.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

/// Advances a progress bar for every record the wrapped sink accepts
pub struct ProgressSink<S> {
    inner: S,
    bar: ProgressBar,
}

impl<S: RecordSink> ProgressSink<S> {
    pub fn new(inner: S, bar: ProgressBar) -> Self {
        Self { inner, bar }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: RecordSink> RecordSink for ProgressSink<S> {
    fn append(&mut self, key: &SinkKey, record: &OfferRecord) -> Result<()> {
        self.inner.append(key, record)?;
        self.bar.inc(1);
        self.bar.set_message(record.link().to_string());
        Ok(())
    }

    fn locations(&self) -> Vec<PathBuf> {
        self.inner.locations()
    }
}
