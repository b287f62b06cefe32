//! Best-effort batch push and pull.
//!
//! Batches are not atomic. Each item gets its own outcome; a bad item is
//! recorded and the rest still run. Callers decide how to report the
//! collected [`BatchReport`].

use crate::crypto::{self, MasterKey};
use crate::error::HushError;

use super::{ClientError, SecretsRemote};

/// Result of one item in a batch.
#[derive(Debug)]
pub struct ItemOutcome<T> {
    /// The secret key, or the raw input when it could not be parsed.
    pub key: String,
    pub result: Result<T, HushError>,
}

impl<T> ItemOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Overall shape of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSummary {
    /// Every item succeeded (or there were none).
    Complete,
    /// Some succeeded, some failed.
    Partial,
    /// Nothing succeeded.
    Failed,
}

/// Per-item outcomes in input order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub items: Vec<ItemOutcome<T>>,
}

impl<T> BatchReport<T> {
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items
            .iter()
            .filter_map(|item| item.result.as_ref().ok().map(|v| (item.key.as_str(), v)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &HushError)> {
        self.items
            .iter()
            .filter_map(|item| item.result.as_ref().err().map(|e| (item.key.as_str(), e)))
    }

    pub fn success_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_ok()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.items.len() - self.success_count()
    }

    pub fn summary(&self) -> BatchSummary {
        match (self.success_count(), self.failure_count()) {
            (_, 0) => BatchSummary::Complete,
            (0, _) => BatchSummary::Failed,
            _ => BatchSummary::Partial,
        }
    }
}

/// Split `KEY=VALUE` at the first `=`. The value may be empty or contain `=`.
pub fn parse_pair(pair: &str) -> Result<(&str, &str), HushError> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(HushError::MalformedInput(format!(
            "invalid format: {} (use KEY=VALUE)",
            pair
        ))),
    }
}

/// Seal and push each pair in order.
pub async fn push_pairs<R, S>(
    remote: &R,
    key: &MasterKey,
    project: &str,
    environment: &str,
    pairs: &[S],
) -> BatchReport<()>
where
    R: SecretsRemote + ?Sized,
    S: AsRef<str>,
{
    let mut items = Vec::with_capacity(pairs.len());

    for pair in pairs {
        let pair = pair.as_ref();
        let outcome = match parse_pair(pair) {
            Ok((name, value)) => ItemOutcome {
                key: name.to_string(),
                result: push_one(remote, key, project, environment, name, value).await,
            },
            Err(e) => ItemOutcome {
                key: pair.to_string(),
                result: Err(e),
            },
        };

        match &outcome.result {
            Ok(()) => tracing::debug!(key = %outcome.key, "Pushed secret"),
            Err(e) => tracing::warn!(key = %outcome.key, "Skipping item: {}", e),
        }
        items.push(outcome);
    }

    BatchReport { items }
}

async fn push_one<R: SecretsRemote + ?Sized>(
    remote: &R,
    master_key: &MasterKey,
    project: &str,
    environment: &str,
    name: &str,
    value: &str,
) -> Result<(), HushError> {
    let envelope = crypto::seal(master_key, value)?;
    remote.set_secret(project, environment, name, &envelope).await?;
    Ok(())
}

/// Fetch every secret for the pair once, then open each envelope locally.
///
/// A failed fetch fails the whole pull; a failed open only fails its item.
pub async fn pull_secrets<R: SecretsRemote + ?Sized>(
    remote: &R,
    key: &MasterKey,
    project: &str,
    environment: &str,
) -> Result<BatchReport<String>, ClientError> {
    let entries = remote.get_secrets(project, environment).await?;

    let items = entries
        .into_iter()
        .map(|entry| {
            let result = crypto::open(key, &entry.value).map_err(HushError::from);
            if let Err(e) = &result {
                tracing::warn!(key = %entry.key, "Skipping item: {}", e);
            }
            ItemOutcome {
                key: entry.key,
                result,
            }
        })
        .collect();

    Ok(BatchReport { items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::SecretEntry;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory stand-in for the daemon.
    #[derive(Default)]
    struct FakeRemote {
        rows: Mutex<BTreeMap<(String, String, String), String>>,
        reject_keys: Vec<String>,
    }

    #[async_trait]
    impl SecretsRemote for FakeRemote {
        async fn set_secret(
            &self,
            project: &str,
            environment: &str,
            key: &str,
            envelope: &str,
        ) -> Result<(), ClientError> {
            if self.reject_keys.iter().any(|k| k == key) {
                return Err(ClientError::Status {
                    op: "push secret",
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "storage failure".to_string(),
                });
            }
            self.rows.lock().unwrap().insert(
                (project.to_string(), environment.to_string(), key.to_string()),
                envelope.to_string(),
            );
            Ok(())
        }

        async fn get_secrets(
            &self,
            project: &str,
            environment: &str,
        ) -> Result<Vec<SecretEntry>, ClientError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|((p, e, _), _)| p == project && e == environment)
                .map(|((p, e, k), v)| SecretEntry {
                    key: k.clone(),
                    value: v.clone(),
                    project: p.clone(),
                    environment: e.clone(),
                    updated_at: String::new(),
                })
                .collect())
        }
    }

    struct DownRemote;

    #[async_trait]
    impl SecretsRemote for DownRemote {
        async fn set_secret(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), ClientError> {
            Err(ClientError::Unauthorized { op: "push secret" })
        }

        async fn get_secrets(&self, _: &str, _: &str) -> Result<Vec<SecretEntry>, ClientError> {
            Err(ClientError::Unauthorized { op: "fetch secrets" })
        }
    }

    fn key() -> MasterKey {
        MasterKey::from_bytes([42u8; crate::crypto::KEY_LENGTH])
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("A=1").unwrap(), ("A", "1"));
        assert_eq!(parse_pair("URL=a=b").unwrap(), ("URL", "a=b"));
        assert_eq!(parse_pair("EMPTY=").unwrap(), ("EMPTY", ""));
        assert!(parse_pair("BAD").is_err());
        assert!(parse_pair("=value").is_err());
    }

    #[tokio::test]
    async fn test_push_skips_malformed_pairs() {
        let remote = FakeRemote::default();
        let report = push_pairs(&remote, &key(), "acme", "prod", &["A=1", "BAD", "B=2"]).await;

        assert_eq!(report.items.len(), 3);
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.summary(), BatchSummary::Partial);

        let failures: Vec<_> = report.failed().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "BAD");
        assert_eq!(failures[0].1.kind(), ErrorKind::MalformedInput);

        let pulled = pull_secrets(&remote, &key(), "acme", "prod").await.unwrap();
        let values: Vec<_> = pulled.succeeded().map(|(k, v)| (k, v.as_str())).collect();
        assert_eq!(values, vec![("A", "1"), ("B", "2")]);
    }

    #[tokio::test]
    async fn test_push_sends_only_envelopes() {
        let remote = FakeRemote::default();
        push_pairs(&remote, &key(), "acme", "prod", &["DB_URL=postgres://x"]).await;

        let rows = remote.rows.lock().unwrap();
        let stored = rows.values().next().unwrap();
        assert!(crypto::is_envelope(stored));
        assert!(!stored.contains("postgres://x"));
    }

    #[tokio::test]
    async fn test_push_continues_after_remote_failure() {
        let remote = FakeRemote {
            reject_keys: vec!["B".to_string()],
            ..Default::default()
        };
        let report = push_pairs(&remote, &key(), "acme", "prod", &["A=1", "B=2", "C=3"]).await;

        let ok: Vec<_> = report.succeeded().map(|(k, _)| k).collect();
        assert_eq!(ok, vec!["A", "C"]);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].1.kind(), ErrorKind::StorageFailure);
    }

    #[tokio::test]
    async fn test_pull_isolates_decryption_failures() {
        let remote = FakeRemote::default();
        push_pairs(&remote, &key(), "acme", "prod", &["GOOD=yes"]).await;

        let foreign = MasterKey::from_bytes([7u8; crate::crypto::KEY_LENGTH]);
        let sealed = crypto::seal(&foreign, "not yours").unwrap();
        remote
            .set_secret("acme", "prod", "FOREIGN", &sealed)
            .await
            .unwrap();

        let report = pull_secrets(&remote, &key(), "acme", "prod").await.unwrap();
        assert_eq!(report.summary(), BatchSummary::Partial);

        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "FOREIGN");
        assert_eq!(failed[0].1.kind(), ErrorKind::DecryptionFailed);

        let good: Vec<_> = report.succeeded().collect();
        assert_eq!(good, vec![("GOOD", &"yes".to_string())]);
    }

    #[tokio::test]
    async fn test_total_failure_and_empty_batches() {
        let report = push_pairs(&DownRemote, &key(), "acme", "prod", &["A=1", "B=2"]).await;
        assert_eq!(report.summary(), BatchSummary::Failed);
        for (_, err) in report.failed() {
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
        }

        let empty: BatchReport<()> =
            push_pairs(&DownRemote, &key(), "acme", "prod", &[] as &[&str]).await;
        assert_eq!(empty.summary(), BatchSummary::Complete);

        assert!(matches!(
            pull_secrets(&DownRemote, &key(), "acme", "prod").await,
            Err(ClientError::Unauthorized { .. })
        ));
    }
}
