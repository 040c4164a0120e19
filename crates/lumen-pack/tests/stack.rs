mod support;

use std::sync::Arc;

use jiff::Timestamp;
use uuid::Uuid;

use lumen_core::ids::{IdGenerator, TimeGenerator};
use lumen_pack::store::MemStackStore;
use lumen_pack::{ErrorCode, PackError, Stack, StackStore};
use support::MockPlatform;

struct FixedId(Uuid);

impl IdGenerator for FixedId {
    fn id(&self) -> Uuid {
        self.0
    }
}

struct FixedTime(Timestamp);

impl TimeGenerator for FixedTime {
    fn now(&self) -> Timestamp {
        self.0
    }
}

fn user() -> Uuid {
    Uuid::from_u128(7)
}

#[tokio::test]
async fn init_stack_assigns_injected_id_and_timestamps() {
    let platform = MockPlatform::new();
    let org = platform.seed_org("acme");
    let store = Arc::new(MemStackStore::default());
    let now: Timestamp = "2026-08-02T00:00:00Z".parse().unwrap();

    let svc = platform
        .service()
        .with_id_generator(Arc::new(FixedId(Uuid::from_u128(42))))
        .with_time_generator(Arc::new(FixedTime(now)))
        .with_stack_store(Arc::clone(&store) as Arc<dyn StackStore>);

    let mut stack = Stack::new(org, "prod");
    stack.urls = vec!["https://packages.example.com/prod.json".to_string()];

    let created = svc.init_stack(user(), stack).await.unwrap();
    assert_eq!(created.id, Uuid::from_u128(42));
    assert_eq!(created.created_at, now);
    assert_eq!(created.updated_at, now);

    let read = store
        .read_stack(Uuid::from_u128(42))
        .await
        .unwrap()
        .expect("stack persisted");
    assert_eq!(read.name, "prod");
    assert_eq!(read.org_id, org);
}

#[tokio::test]
async fn init_stack_rejects_a_malformed_url() {
    let platform = MockPlatform::new();
    let org = platform.seed_org("acme");
    let svc = platform.service();

    let mut stack = Stack::new(org, "prod");
    stack.urls = vec!["not a url".to_string()];

    let err = svc.init_stack(user(), stack).await.unwrap_err();
    assert!(matches!(err, PackError::InvalidUrl(_)));
    assert_eq!(err.code(), ErrorCode::Invalid);
}

#[tokio::test]
async fn init_stack_requires_the_org_to_exist() {
    let platform = MockPlatform::new();
    let svc = platform.service();

    let missing_org = Uuid::from_u128(999);
    let err = svc
        .init_stack(user(), Stack::new(missing_org, "prod"))
        .await
        .unwrap_err();
    assert!(matches!(err, PackError::OrgNotFound(_)));
    assert_eq!(err.code(), ErrorCode::Conflict);
}
