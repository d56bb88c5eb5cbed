//! Turns persisted base URLs into presentable URLs at read time.
//!
//! A stored URL that cannot be rewritten is left as it is and recorded as an
//! anomaly; it never fails the surrounding listing.

use crate::{
    errors::CredentialError,
    models::{credential::AccessPolicy, object::ObjectName, review::Review},
    services::credential_minter::CredentialMinter,
};
use percent_encoding::percent_decode_str;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use thiserror::Error;
use tracing::warn;
use url::Url;

/// A stored URL that could not be rewritten.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot rewrite `{url}`: {reason}")]
pub struct RewriteAnomaly {
    pub url: String,
    pub reason: String,
}

impl RewriteAnomaly {
    fn new(url: &str, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error(transparent)]
    Anomaly(#[from] RewriteAnomaly),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

#[derive(Debug, Clone)]
pub struct RecordAnomaly {
    pub review_id: i64,
    pub anomaly: RewriteAnomaly,
}

/// Outcome of rewriting a batch of reviews.
#[derive(Debug, Default, Clone)]
pub struct RewriteReport {
    pub rewritten: usize,
    pub anomalies: Vec<RecordAnomaly>,
}

#[derive(Clone)]
pub struct UrlRewriter {
    minter: CredentialMinter,
    /// `{public_base_url}/{container}/`; only URLs under it are rewritten.
    object_prefix: String,
    anomaly_count: Arc<AtomicU64>,
}

impl UrlRewriter {
    pub fn new(minter: CredentialMinter, public_base_url: &Url) -> Self {
        let object_prefix = format!(
            "{}/{}/",
            public_base_url.as_str().trim_end_matches('/'),
            minter.container()
        );
        Self {
            minter,
            object_prefix,
            anomaly_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append a fresh read-only credential to `base_url`.
    ///
    /// Each call mints a new credential, so two calls return two different
    /// URLs that are both valid until their own expiry.
    pub fn rewrite(&self, base_url: &str) -> Result<String, RewriteError> {
        let object = self.object_name_of(base_url)?;
        let credential = self.minter.mint_for(&object, AccessPolicy::Display)?;
        Ok(format!("{}?{}", base_url, credential))
    }

    /// Rewrite the photo URL of every review in place.
    ///
    /// Reviews without a photo are skipped. Anomalies are logged, counted and
    /// reported; only a credential failure aborts the batch.
    pub fn rewrite_reviews(&self, reviews: &mut [Review]) -> Result<RewriteReport, CredentialError> {
        let mut report = RewriteReport::default();
        for review in reviews.iter_mut() {
            let Some(base_url) = review.photo_base_url.as_deref() else {
                continue;
            };
            match self.rewrite(base_url) {
                Ok(url) => {
                    review.photo_base_url = Some(url);
                    report.rewritten += 1;
                }
                Err(RewriteError::Anomaly(anomaly)) => {
                    warn!(review_id = review.id, "{}", anomaly);
                    self.anomaly_count.fetch_add(1, Ordering::Relaxed);
                    report.anomalies.push(RecordAnomaly {
                        review_id: review.id,
                        anomaly,
                    });
                }
                Err(RewriteError::Credential(err)) => return Err(err),
            }
        }
        Ok(report)
    }

    /// Anomalies seen since startup.
    pub fn anomaly_count(&self) -> u64 {
        self.anomaly_count.load(Ordering::Relaxed)
    }

    /// The object `base_url` points at: the single percent-decoded segment
    /// after `{public_base_url}/{container}/`.
    fn object_name_of(&self, base_url: &str) -> Result<ObjectName, RewriteAnomaly> {
        if base_url.trim().is_empty() {
            return Err(RewriteAnomaly::new(base_url, "empty URL"));
        }
        let url = Url::parse(base_url)
            .map_err(|err| RewriteAnomaly::new(base_url, format!("unparsable URL: {}", err)))?;
        if url.query().is_some() || url.fragment().is_some() {
            return Err(RewriteAnomaly::new(
                base_url,
                "stored URL already carries a query or fragment",
            ));
        }
        let segment = url
            .as_str()
            .strip_prefix(&self.object_prefix)
            .ok_or_else(|| {
                RewriteAnomaly::new(base_url, format!("not under `{}`", self.object_prefix))
            })?;
        if segment.is_empty() || segment.contains('/') {
            return Err(RewriteAnomaly::new(base_url, "no object name in path"));
        }
        let decoded = percent_decode_str(segment).decode_utf8().map_err(|err| {
            RewriteAnomaly::new(base_url, format!("object name is not UTF-8: {}", err))
        })?;
        ObjectName::parse(&decoded).map_err(|err| RewriteAnomaly::new(base_url, err.to_string()))
    }
}
