// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use blocktx_core::{
    BlockSnapshot, BlockState, CaptureConfig, CaptureSupplier, EntityId, EntitySnapshot,
    EventPayload, GameEvent, TxnId, UnitContext, WorldId,
};
use blocktx_dry_tests::{InMemoryWorld, ScriptedMutation};

pub const OVERWORLD: WorldId = WorldId(0);
pub const NETHER: WorldId = WorldId(1);

pub fn supplier() -> CaptureSupplier<InMemoryWorld> {
    supplier_with(CaptureConfig::default())
}

pub fn supplier_with(config: CaptureConfig) -> CaptureSupplier<InMemoryWorld> {
    blocktx_dry_tests::init_tracing();
    CaptureSupplier::new(UnitContext::new("test_tick").with_config(config))
}

pub fn snapshot(state: u32) -> BlockSnapshot {
    BlockSnapshot {
        state: BlockState(state),
        tile: None,
    }
}

pub fn zombie(id: u64) -> EntitySnapshot {
    EntitySnapshot {
        id: EntityId(id),
        world: OVERWORLD,
        kind: "zombie".into(),
        payload: bytes::Bytes::from_static(b"{health:0}"),
    }
}

/// Labels of a scripted event.
pub fn labels(event: &GameEvent) -> Vec<String> {
    match event.payload() {
        EventPayload::Custom { labels } => labels.clone(),
        other => panic!("expected a scripted event, got {other:?}"),
    }
}

/// Labels of every dispatched event, one entry per event.
pub fn batches(events: &[GameEvent]) -> Vec<Vec<String>> {
    events.iter().map(labels).collect()
}

pub fn scripted<'a>(
    supplier: &'a CaptureSupplier<InMemoryWorld>,
    id: TxnId,
) -> &'a ScriptedMutation {
    supplier
        .node(id)
        .and_then(|node| node.mutation().as_any().downcast_ref::<ScriptedMutation>())
        .expect("scripted node")
}
