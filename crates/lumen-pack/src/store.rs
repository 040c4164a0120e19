//! In-memory stack store. The default for tests and single-node installs;
//! production deployments supply a durable implementation.

use std::collections::BTreeMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::ports::{BoxFuture, PortError};
use crate::stack::{Stack, StackStore};

#[derive(Debug, Default)]
pub struct MemStackStore {
    stacks: RwLock<BTreeMap<Uuid, Stack>>,
}

impl StackStore for MemStackStore {
    fn create_stack(&self, stack: Stack) -> BoxFuture<'_, Result<(), PortError>> {
        let result = {
            let mut stacks = self.stacks.write().unwrap();
            if stacks.contains_key(&stack.id) {
                Err(PortError::Failed(format!(
                    "stack {} already exists",
                    stack.id
                )))
            } else {
                stacks.insert(stack.id, stack);
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn read_stack(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Stack>, PortError>> {
        let result = Ok(self.stacks.read().unwrap().get(&id).cloned());
        Box::pin(async move { result })
    }

    fn update_stack(&self, stack: Stack) -> BoxFuture<'_, Result<(), PortError>> {
        let result = {
            let mut stacks = self.stacks.write().unwrap();
            match stacks.get_mut(&stack.id) {
                Some(slot) => {
                    *slot = stack;
                    Ok(())
                }
                None => Err(PortError::NotFound(format!("stack {}", stack.id))),
            }
        };
        Box::pin(async move { result })
    }

    fn delete_stack(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>> {
        let result = match self.stacks.write().unwrap().remove(&id) {
            Some(_) => Ok(()),
            None => Err(PortError::NotFound(format!("stack {id}"))),
        };
        Box::pin(async move { result })
    }
}
