//! Jobs handed out by the collection service.

use crate::store::StoreId;
use serde::{Deserialize, Serialize};

/// One unit of work: a store, an item and the product page to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// The capture run this job belongs to.
    #[serde(rename = "capture_run_id")]
    pub run_id: i64,
    /// The store the page belongs to.
    #[serde(rename = "store")]
    pub store_id: StoreId,
    /// The tracked item.
    pub item_id: i64,
    /// Display name of the item.
    #[serde(default)]
    pub item_name: Option<String>,
    /// The product page.
    pub url: String,
}

/// Result of asking a job source for work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextJob {
    /// A job to run.
    Job(Job),
    /// No further jobs for the requested store set.
    Exhausted,
}

impl NextJob {
    /// Is the queue exhausted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, NextJob::Exhausted)
    }

    /// The job, if any.
    pub fn into_job(self) -> Option<Job> {
        match self {
            NextJob::Job(job) => Some(job),
            NextJob::Exhausted => None,
        }
    }
}

impl From<Job> for NextJob {
    fn from(job: Job) -> Self {
        NextJob::Job(job)
    }
}

/// Raw reply body of the next job endpoints. Either `{"done": true}` or a job.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct JobEnvelope {
    #[serde(default)]
    done: bool,
    capture_run_id: Option<i64>,
    store: Option<StoreId>,
    item_id: Option<i64>,
    item_name: Option<String>,
    url: Option<String>,
}

impl JobEnvelope {
    /// Convert into a job. Returns the name of the first missing field when the body is neither form.
    pub(crate) fn into_next(self) -> Result<NextJob, &'static str> {
        if self.done {
            return Ok(NextJob::Exhausted);
        }

        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or("url")?;

        Ok(NextJob::Job(Job {
            run_id: self.capture_run_id.ok_or("capture_run_id")?,
            store_id: self.store.ok_or("store")?,
            item_id: self.item_id.ok_or("item_id")?,
            item_name: self.item_name,
            url,
        }))
    }
}

/// Parse a next job reply body.
pub(crate) fn parse_next_job(body: &str) -> Result<NextJob, String> {
    let envelope: JobEnvelope = serde_json::from_str(body).map_err(|e| e.to_string())?;
    envelope
        .into_next()
        .map_err(|field| format!("missing field: {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_done() {
        assert_eq!(parse_next_job(r#"{"done":true}"#).unwrap(), NextJob::Exhausted);
    }

    #[test]
    fn test_parse_job() {
        let body = r#"{"done":false,"capture_run_id":3,"store":"COLES","item_id":7,"item_name":"Milk","url":"https://www.coles.com.au/product/milk-1"}"#;
        let job = parse_next_job(body).unwrap().into_job().unwrap();

        assert_eq!(job.run_id, 3);
        assert_eq!(job.store_id, StoreId::Coles);
        assert_eq!(job.item_id, 7);
        assert_eq!(job.item_name.as_deref(), Some("Milk"));
    }

    #[test]
    fn test_parse_job_without_done_flag() {
        let body = r#"{"capture_run_id":1,"store":"ALDI","item_id":2,"url":"u"}"#;
        assert!(!parse_next_job(body).unwrap().is_exhausted());
    }

    #[test]
    fn test_parse_rejects_partial_job() {
        let err = parse_next_job(r#"{"done":false,"store":"COLES","item_id":7,"url":"u"}"#)
            .unwrap_err();
        assert!(err.contains("capture_run_id"));

        assert!(parse_next_job(r#"{"done":false,"capture_run_id":1,"store":"COLES","item_id":7,"url":" "}"#).is_err());
        assert!(parse_next_job("not json").is_err());
    }
}
