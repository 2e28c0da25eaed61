use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mail_normalize::{
    BatchOptions, BatchStatus, BatchSupervisor, EmailEntity, EmailParser, EmailRepository,
    EntityBuilder, MemoryRepository, ParseError, RepoError, Result, parse_email,
};

fn raw_message(n: usize, subject: &str) -> String {
    format!(
        "From: sender{n}@example.com\r\n\
         To: inbox@example.com\r\n\
         Subject: {subject}\r\n\
         Message-ID: <item-{n}@example.com>\r\n\
         \r\n\
         Message number {n} is ready for review."
    )
}

fn batch(n: usize) -> Vec<String> {
    (0..n).map(|i| raw_message(i, "Status")).collect()
}

fn supervisor(repo: Arc<dyn EmailRepository>) -> BatchSupervisor {
    BatchSupervisor::new(Arc::new(EntityBuilder::default()), repo)
}

/// Fails every message whose body mentions "corrupted"
struct SelectiveParser;

impl EmailParser for SelectiveParser {
    fn parse(&self, raw: &[u8]) -> Result<EmailEntity> {
        if String::from_utf8_lossy(raw).contains("corrupted") {
            return Err(ParseError::Decode("unsupported payload".to_string()));
        }
        parse_email(raw)
    }
}

struct PanickingParser;

impl EmailParser for PanickingParser {
    fn parse(&self, _raw: &[u8]) -> Result<EmailEntity> {
        panic!("parser blew up");
    }
}

/// Stalls on messages with the subject "slow"
struct SlowRepository {
    inner: MemoryRepository,
    delay: Duration,
}

#[async_trait]
impl EmailRepository for SlowRepository {
    async fn save(&self, email: &EmailEntity) -> std::result::Result<(), RepoError> {
        if email.subject == "slow" {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.save(email).await
    }

    async fn get_by_id(&self, id: &str) -> std::result::Result<EmailEntity, RepoError> {
        self.inner.get_by_id(id).await
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
    ) -> std::result::Result<Vec<EmailEntity>, RepoError> {
        self.inner.list(limit, offset).await
    }
}

struct FullDisk;

#[async_trait]
impl EmailRepository for FullDisk {
    async fn save(&self, _email: &EmailEntity) -> std::result::Result<(), RepoError> {
        Err(RepoError::Storage("disk full".to_string()))
    }

    async fn get_by_id(&self, id: &str) -> std::result::Result<EmailEntity, RepoError> {
        Err(RepoError::NotFound(id.to_string()))
    }

    async fn list(
        &self,
        _limit: usize,
        _offset: usize,
    ) -> std::result::Result<Vec<EmailEntity>, RepoError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_two_items_two_workers() {
    let repo = Arc::new(MemoryRepository::new());
    let result = supervisor(repo.clone())
        .run(batch(2), BatchOptions::new(2, Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(result.processed, 2);
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 0);
    assert_eq!(result.results[0].index, 0);
    assert_eq!(result.results[1].index, 1);
    assert_eq!(repo.len().await, 2);
}

#[tokio::test]
async fn test_failing_item_does_not_affect_sibling() {
    let repo = Arc::new(MemoryRepository::new());
    let supervisor = BatchSupervisor::new(Arc::new(SelectiveParser), repo);
    let raws = vec![raw_message(0, "corrupted"), raw_message(1, "Status")];

    let result = supervisor
        .run(raws, BatchOptions::new(2, Duration::from_secs(5)))
        .await
        .unwrap();

    let failed = &result.results[0];
    assert_eq!(failed.status, BatchStatus::Error);
    assert!(failed.email_id.is_none());
    assert!(failed.error.as_deref().unwrap().contains("unsupported payload"));

    let ok = &result.results[1];
    assert_eq!(ok.status, BatchStatus::Ok);
    assert!(ok.email_id.is_some());
    assert!(ok.error.is_none());

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_results_follow_input_order() {
    for workers in [1, 3, 12, 500] {
        let repo = Arc::new(MemoryRepository::new());
        let result = supervisor(repo.clone())
            .run(batch(12), BatchOptions::new(workers, Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(result.processed, 12, "workers = {workers}");
        assert_eq!(result.succeeded + result.failed, result.processed);
        for (i, item) in result.results.iter().enumerate() {
            assert_eq!(item.index, i, "workers = {workers}");
            assert!(item.is_ok(), "workers = {workers}");
        }
        assert_eq!(repo.len().await, 12);
    }
}

#[tokio::test]
async fn test_slow_item_times_out_alone() {
    let repo = Arc::new(SlowRepository {
        inner: MemoryRepository::new(),
        delay: Duration::from_secs(2),
    });
    let raws = vec![
        raw_message(0, "Status"),
        raw_message(1, "slow"),
        raw_message(2, "Status"),
    ];

    let result = supervisor(repo.clone())
        .run(raws, BatchOptions::new(3, Duration::from_millis(100)))
        .await
        .unwrap();

    assert!(result.results[0].is_ok());
    assert!(result.results[2].is_ok());

    let slow = &result.results[1];
    assert_eq!(slow.status, BatchStatus::Error);
    assert!(slow.error.as_deref().unwrap().contains("Timed out"));
    assert!(slow.duration_ms < 2000);

    assert_eq!(repo.inner.len().await, 2);
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let repo = Arc::new(MemoryRepository::new());
    let err = supervisor(repo)
        .run(Vec::new(), BatchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ParseError::EmptyBatch));
}

#[tokio::test]
async fn test_persist_failure_is_recorded_per_item() {
    let result = supervisor(Arc::new(FullDisk))
        .run(batch(3), BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.failed, 3);
    for item in &result.results {
        assert!(item.error.as_deref().unwrap().contains("disk full"));
    }
}

#[tokio::test]
async fn test_panicking_parser_is_contained() {
    let repo = Arc::new(MemoryRepository::new());
    let supervisor = BatchSupervisor::new(Arc::new(PanickingParser), repo);

    let result = supervisor
        .run(batch(2), BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.processed, 2);
    assert_eq!(result.failed, 2);
    assert!(result.results[0].error.as_deref().unwrap().contains("aborted"));
}

#[test]
fn test_options_out_of_range_fall_back_to_defaults() {
    let defaults = BatchOptions::default();

    assert_eq!(BatchOptions::new(0, Duration::ZERO).sanitized(), defaults);
    assert_eq!(
        BatchOptions::new(101, Duration::from_secs(1)).sanitized().max_workers,
        defaults.max_workers
    );
    assert_eq!(
        BatchOptions::new(100, Duration::from_secs(1)).sanitized(),
        BatchOptions::new(100, Duration::from_secs(1))
    );
}

#[test]
fn test_batch_result_serializes_lowercase_status() {
    let result = tokio_test::block_on(
        supervisor(Arc::new(MemoryRepository::new())).run(batch(1), BatchOptions::default()),
    )
    .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["results"][0]["status"], "ok");
    assert!(json["results"][0].get("error").is_none());
}
