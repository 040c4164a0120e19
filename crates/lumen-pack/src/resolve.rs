//! Binds symbolic endpoint references against the union of live and
//! in-package endpoints. Live entries win; package entries contribute the
//! ID recorded for them so far (live counterpart, or the ID assigned
//! during this apply).

use std::collections::BTreeMap;

use uuid::Uuid;

use lumen_core::models::{EndpointKind, NotificationEndpoint, ResourceType};

use crate::package::Pkg;

#[derive(Debug, Clone)]
pub(crate) struct ResolvedEndpoint {
    pub id: Option<Uuid>,
    pub kind: EndpointKind,
}

pub(crate) fn endpoint_index(
    live: &[NotificationEndpoint],
    pkg: &Pkg,
) -> BTreeMap<String, ResolvedEndpoint> {
    let mut index = BTreeMap::new();
    for endpoint in live {
        index.insert(
            endpoint.name.clone(),
            ResolvedEndpoint {
                id: Some(endpoint.id),
                kind: endpoint.kind,
            },
        );
    }

    let records = pkg.records();
    for decl in pkg.endpoints() {
        let Some(name) = decl.resolved_name() else {
            continue;
        };
        index.entry(name.to_string()).or_insert_with(|| ResolvedEndpoint {
            id: records.resource_id(ResourceType::NotificationEndpoint, name),
            kind: decl.spec.kind,
        });
    }

    index
}
