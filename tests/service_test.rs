use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mail_normalize::{
    BatchOptions, Config, EmailEntity, EmailRepository, EmailService, MemoryRepository,
    ParseError, RepoError,
};

fn raw(message_id: &str, body: &str) -> String {
    format!(
        "From: sender@example.com\r\n\
         To: inbox@example.com\r\n\
         Subject: Weekly sync\r\n\
         Message-ID: <{message_id}>\r\n\
         \r\n\
         {body}"
    )
}

fn service(repo: Arc<dyn EmailRepository>) -> EmailService {
    EmailService::from_config(&Config::default(), repo)
}

struct StalledRepository;

#[async_trait]
impl EmailRepository for StalledRepository {
    async fn save(&self, _email: &EmailEntity) -> Result<(), RepoError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<EmailEntity, RepoError> {
        Err(RepoError::NotFound(id.to_string()))
    }

    async fn list(&self, _limit: usize, _offset: usize) -> Result<Vec<EmailEntity>, RepoError> {
        Ok(Vec::new())
    }
}

/// Accepts writes but cannot read them back
struct WriteOnlyRepository;

#[async_trait]
impl EmailRepository for WriteOnlyRepository {
    async fn save(&self, _email: &EmailEntity) -> Result<(), RepoError> {
        Ok(())
    }

    async fn get_by_id(&self, _id: &str) -> Result<EmailEntity, RepoError> {
        Err(RepoError::Storage("replica lag".to_string()))
    }

    async fn list(&self, _limit: usize, _offset: usize) -> Result<Vec<EmailEntity>, RepoError> {
        Ok(Vec::new())
    }
}

#[test]
fn test_parse_one_does_not_persist() {
    let repo = Arc::new(MemoryRepository::new());
    let service = service(repo.clone());

    let email = service
        .parse_one(raw("one@example.com", "Agenda is attached.").as_bytes())
        .unwrap();

    assert_eq!(email.text, "Agenda is attached");
    assert!(tokio_test::block_on(repo.is_empty()));
}

#[tokio::test]
async fn test_parse_and_save_returns_stored_entity() {
    let repo = Arc::new(MemoryRepository::new());
    let service = service(repo.clone());

    let saved = service
        .parse_and_save(raw("save@example.com", "Notes from today.").as_bytes())
        .await
        .unwrap();

    assert_eq!(repo.len().await, 1);
    assert_eq!(service.get_by_id(&saved.id).await.unwrap(), saved);
}

#[tokio::test]
async fn test_parse_and_save_falls_back_to_parsed_entity() {
    let service = service(Arc::new(WriteOnlyRepository));

    let email = service
        .parse_and_save(raw("lag@example.com", "Notes from today.").as_bytes())
        .await
        .unwrap();

    assert_eq!(email.message_id.as_str(), "lag@example.com");
}

#[tokio::test]
async fn test_parse_and_save_times_out() {
    let config = Config {
        persist_timeout: Duration::from_millis(50),
        ..Config::default()
    };
    let service = EmailService::from_config(&config, Arc::new(StalledRepository));

    let err = service
        .parse_and_save(raw("stall@example.com", "Hello there.").as_bytes())
        .await
        .unwrap_err();

    assert!(matches!(err, ParseError::Timeout(d) if d == Duration::from_millis(50)));
}

#[tokio::test]
async fn test_parse_batch_and_list() {
    let service = service(Arc::new(MemoryRepository::new()));
    let raws = (0..4)
        .map(|i| raw(&format!("batch-{i}@example.com"), "Numbers look fine."))
        .collect();

    let result = service
        .parse_batch(raws, BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(result.succeeded, 4);

    assert_eq!(service.list(0, 0).await.unwrap().len(), 4);
    assert_eq!(service.list(2, 0).await.unwrap().len(), 2);
    assert_eq!(service.list(10, 3).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cached_service_reads_through() {
    let mut config = Config::default();
    config.cache.enabled = true;
    let service = EmailService::from_config(&config, Arc::new(MemoryRepository::new()));

    let saved = service
        .parse_and_save(raw("cache@example.com", "Hello there.").as_bytes())
        .await
        .unwrap();

    assert_eq!(service.get_by_id(&saved.id).await.unwrap().id, saved.id);
    assert!(matches!(
        service.get_by_id("unknown").await,
        Err(RepoError::NotFound(_))
    ));
}
