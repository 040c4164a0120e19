use jiff::Timestamp;
use uuid::Uuid;

/// Issues platform IDs. Injected so stack and resource creation is
/// deterministic under test.
pub trait IdGenerator: Send + Sync {
    fn id(&self) -> Uuid;
}

/// Default generator: random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Issues timestamps for created/updated audit fields.
pub trait TimeGenerator: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Default generator: the wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl TimeGenerator for WallClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
