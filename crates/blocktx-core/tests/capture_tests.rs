// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use blocktx_core::kinds::{BlockChange, ContainerInteraction, EntityDrops, TileAddition};
use blocktx_core::{
    AcceptSearch, BlockPos, BlockState, CaptureConfig, CaptureError, CaptureSupplier, CauseEntry,
    ChainOwner, ContextKey, CraftingGrid, EffectTag, EventPayload, ItemStack, Logged, PlayerId,
    RecipeId, TileEntity, TransactionKind, ENTITY_DROPS_EFFECT, PREPARE_BLOCK_DROPS_EFFECT,
};
use blocktx_dry_tests::{InMemoryWorld, Journal, RecordingDispatcher, ScriptedMutation};
use common::{scripted, snapshot, supplier, supplier_with, zombie, OVERWORLD};

const STEVE: PlayerId = PlayerId(1);

fn chest(pos: BlockPos) -> TileEntity {
    TileEntity::new(pos, "chest", &b"{}"[..])
}

#[test]
fn absorbed_transaction_does_not_grow_the_chain() {
    let journal = Journal::new();
    let mut supplier = supplier();
    let a = supplier
        .log_transaction(ScriptedMutation::new("a", &journal).absorbs(1))
        .unwrap();
    let absorbed = supplier.log_transaction(ScriptedMutation::new("b", &journal).absorbs(1));

    assert_eq!(absorbed, None);
    assert_eq!(supplier.top_level_len(), 1);
    assert_eq!(scripted(&supplier, a).absorbed(), ["b"]);
}

#[test]
fn absorption_scans_newest_first_within_the_limit() {
    let journal = Journal::new();
    let mut supplier = supplier_with(CaptureConfig {
        absorb_scan_limit: Some(1),
        ..CaptureConfig::default()
    });
    supplier.log_transaction(ScriptedMutation::new("a", &journal).absorbs(1));
    supplier.log_transaction(ScriptedMutation::new("b", &journal).absorbs(2));

    // `a` would absorb it, but only the tail is scanned.
    let appended = supplier.log_transaction(ScriptedMutation::new("c", &journal).absorbs(1));
    assert!(appended.is_some());
    assert_eq!(supplier.top_level_len(), 3);

    // The new tail `c` now takes it.
    let absorbed = supplier.log_transaction(ScriptedMutation::new("d", &journal).absorbs(1));
    assert_eq!(absorbed, None);
    assert_eq!(journal.entries(), vec!["absorb:c<-d"]);
}

#[test]
fn absorption_only_scans_the_active_chain() {
    let journal = Journal::new();
    let mut supplier = supplier();
    supplier.log_transaction(ScriptedMutation::new("a", &journal).absorbs(1));
    let mut frame = supplier.push_effect(EffectTag("step")).unwrap();
    let nested = frame.log_transaction(ScriptedMutation::new("b", &journal).absorbs(1));
    let effect = frame.frame();

    assert!(nested.is_some());
    let nested = nested.unwrap();
    assert_eq!(
        frame.node(nested).map(|node| node.owner()),
        Some(ChainOwner::Effect(effect))
    );
    assert!(journal.entries().is_empty());
}

#[test]
fn repeated_cell_changes_collapse_into_one_transition() {
    let pos = BlockPos::new(4, 64, 4);
    let mut supplier = supplier();
    supplier.log_transaction(BlockChange::new(OVERWORLD, pos, snapshot(1), BlockState(2)));
    supplier.log_transaction(BlockChange::new(OVERWORLD, pos, snapshot(2), BlockState(3)));
    assert_eq!(supplier.top_level_len(), 1);

    let mut dispatcher = RecordingDispatcher::new();
    supplier
        .process_transactions(&mut InMemoryWorld::new(), &mut dispatcher)
        .unwrap();

    assert_eq!(dispatcher.seen().len(), 1);
    let transition = dispatcher.seen()[0].block_transition(pos).unwrap();
    assert_eq!(transition.original, BlockState(1));
    assert_eq!(transition.replacement, BlockState(3));
    match dispatcher.seen()[0].payload() {
        EventPayload::ChangeBlock { transitions, .. } => assert_eq!(transitions.len(), 1),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn push_effect_without_a_parent_is_rejected() {
    let mut supplier = supplier();
    assert!(matches!(
        supplier.push_effect(EffectTag("orphan")),
        Err(CaptureError::NoParentTransaction)
    ));
    assert!(supplier.active_effect().is_none());
}

#[test]
fn nested_frame_parents_under_the_active_tail() {
    let journal = Journal::new();
    let mut supplier = supplier();
    let root = supplier
        .log_transaction(ScriptedMutation::new("root", &journal))
        .unwrap();

    let mut outer = supplier.push_effect(EffectTag("outer")).unwrap();
    let outer_id = outer.frame();
    {
        // Empty active chain: the new frame hangs under the frame's parent.
        let early = outer.push_effect(EffectTag("early")).unwrap();
        assert_eq!(early.side_effect(early.frame()).unwrap().parent, root);
    }
    let x = outer
        .log_transaction(ScriptedMutation::new("x", &journal))
        .unwrap();
    let inner = outer.push_effect(EffectTag("inner")).unwrap();
    let inner_id = inner.frame();
    assert_eq!(inner.side_effect(inner_id).unwrap().parent, x);
    drop(inner);
    assert_eq!(outer.active_effect(), Some(outer_id));
    drop(outer);
    assert_eq!(supplier.active_effect(), None);
    assert_eq!(supplier.node(x).unwrap().side_effects(), [inner_id]);
}

fn fail_inside_frames(supplier: &mut CaptureSupplier<InMemoryWorld>) -> Result<(), CaptureError> {
    let journal = Journal::new();
    let mut outer = supplier.push_effect(EffectTag("outer"))?;
    outer.log_transaction(ScriptedMutation::new("x", &journal));
    let _inner = outer.push_effect(EffectTag("inner"))?;
    Err(CaptureError::UnnestedCrafting)
}

#[test]
fn frames_are_released_on_early_return() {
    let journal = Journal::new();
    let mut supplier = supplier();
    supplier.log_transaction(ScriptedMutation::new("root", &journal));

    assert!(fail_inside_frames(&mut supplier).is_err());
    assert_eq!(supplier.active_effect(), None);

    let next = supplier
        .log_transaction(ScriptedMutation::new("after", &journal))
        .unwrap();
    assert_eq!(supplier.node(next).unwrap().owner(), ChainOwner::TopLevel);
}

#[test]
fn clearing_inside_a_frame_leaves_no_frame_behind() {
    let journal = Journal::new();
    let mut supplier = supplier();
    supplier.log_transaction(ScriptedMutation::new("root", &journal));
    {
        let mut frame = supplier.push_effect(EffectTag("step")).unwrap();
        frame.clear();
    }
    assert!(supplier.is_empty());
    assert_eq!(supplier.active_effect(), None);

    let head = supplier
        .log_transaction(ScriptedMutation::new("fresh", &journal))
        .unwrap();
    assert_eq!(supplier.top_level().head(), Some(head));
}

#[test]
fn iter_deep_visits_effects_after_their_parent() {
    let journal = Journal::new();
    let mut supplier = supplier();
    let a = supplier
        .log_transaction(ScriptedMutation::new("a", &journal))
        .unwrap();
    let nested = {
        let mut frame = supplier.push_effect(EffectTag("step")).unwrap();
        frame
            .log_transaction(ScriptedMutation::new("n", &journal))
            .unwrap()
    };
    let b = supplier
        .log_transaction(ScriptedMutation::new("b", &journal))
        .unwrap();

    assert_eq!(supplier.iter_deep(), vec![a, nested, b]);
    assert_eq!(supplier.iter_deep_rev(), vec![b, nested, a]);
    assert_eq!(supplier.top_level_ids(), vec![a, b]);
    assert_eq!(supplier.captured_len(), 3);
}

#[test]
fn tile_changes_attach_to_the_cell_change_at_the_same_position() {
    let pos = BlockPos::new(0, 70, 0);
    let mut supplier = supplier();
    supplier.log_transaction(BlockChange::new(OVERWORLD, pos, snapshot(0), BlockState(54)));

    assert!(supplier.log_tile_addition(OVERWORLD, chest(pos)));
    assert_eq!(supplier.top_level_len(), 1);

    // A different cell falls back to a standalone node.
    let elsewhere = pos.offset(1, 0, 0);
    assert!(supplier.log_tile_addition(OVERWORLD, chest(elsewhere)));
    assert_eq!(supplier.top_level_len(), 2);
    let tail = supplier.top_level().tail().unwrap();
    let node = supplier.node(tail).unwrap();
    assert_eq!(node.mutation().kind(), TransactionKind::TileAddition);
    let addition = node.mutation().as_any().downcast_ref::<TileAddition>().unwrap();
    assert_eq!(addition.tile().pos, elsewhere);
}

#[test]
fn missing_tiles_capture_nothing() {
    let mut supplier = supplier();
    assert!(!supplier.log_tile_removal(OVERWORLD, None));
    assert!(!supplier.log_tile_replacement(OVERWORLD, BlockPos::new(0, 0, 0), None, None));
    assert!(supplier.is_empty());
}

#[test]
fn container_set_and_crafting_fold_into_the_interaction() {
    let mut supplier = supplier();
    supplier.log_transaction(ContainerInteraction::new(STEVE).with_slot(
        0,
        Some(ItemStack::new("planks", 4)),
        None,
    ));

    assert!(supplier.log_container_set(STEVE));
    assert!(!supplier.log_container_set(PlayerId(2)));
    supplier
        .log_crafting(
            STEVE,
            Some(ItemStack::new("crafting_table", 1)),
            CraftingGrid::default(),
            Some(RecipeId("crafting_table".into())),
        )
        .unwrap();
    supplier
        .log_crafting_preview(STEVE, CraftingGrid::default(), None)
        .unwrap();
    assert_eq!(supplier.captured_len(), 1);

    let mut dispatcher = RecordingDispatcher::new();
    supplier
        .process_transactions(&mut InMemoryWorld::new(), &mut dispatcher)
        .unwrap();
    match dispatcher.seen()[0].payload() {
        EventPayload::ClickContainer {
            player,
            transitions,
            container_set,
            crafting,
            preview,
        } => {
            assert_eq!(*player, STEVE);
            assert_eq!(transitions.len(), 1);
            assert!(*container_set);
            assert_eq!(
                crafting.as_ref().and_then(|c| c.recipe.clone()),
                Some(RecipeId("crafting_table".into()))
            );
            assert!(preview.is_some());
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert_eq!(
        dispatcher.seen()[0].cause().root(),
        Some(&CauseEntry::Player(STEVE))
    );
}

#[test]
fn crafting_outside_an_interaction_is_a_contract_violation() {
    let journal = Journal::new();
    let mut supplier = supplier();
    let result = supplier.log_crafting(STEVE, None, CraftingGrid::default(), None);
    assert!(matches!(result, Err(CaptureError::UnnestedCrafting)));

    supplier.log_transaction(ScriptedMutation::new("unrelated", &journal));
    let result = supplier.log_crafting_preview(STEVE, CraftingGrid::default(), None);
    assert!(matches!(result, Err(CaptureError::UnnestedCraftingPreview)));
    assert_eq!(supplier.captured_len(), 1);
}

fn push_interaction_at_depth(supplier: &mut CaptureSupplier<InMemoryWorld>, depth: usize) {
    fn descend(supplier: &mut CaptureSupplier<InMemoryWorld>, remaining: usize) {
        let mut frame = supplier.push_effect(EffectTag("step")).unwrap();
        if remaining == 1 {
            frame.log_transaction(ContainerInteraction::new(STEVE));
        } else {
            let journal = Journal::new();
            frame.log_transaction(ScriptedMutation::new("relay", &journal));
            descend(&mut frame, remaining - 1);
        }
    }
    descend(supplier, depth);
}

#[test]
fn accept_search_depth_bounds_where_crafting_can_land() {
    let craft = |supplier: &mut CaptureSupplier<InMemoryWorld>| {
        supplier.log_crafting(STEVE, None, CraftingGrid::default(), None)
    };

    let mut tail_only = push_only(
        CaptureConfig {
            accept_search: AcceptSearch::TailOnly,
            ..CaptureConfig::default()
        },
        1,
    );
    assert!(matches!(craft(&mut tail_only), Err(CaptureError::UnnestedCrafting)));

    let mut one_level = push_only(CaptureConfig::default(), 1);
    assert!(craft(&mut one_level).is_ok());

    let mut too_deep = push_only(CaptureConfig::default(), 2);
    assert!(matches!(craft(&mut too_deep), Err(CaptureError::UnnestedCrafting)));

    let mut two_levels = push_only(
        CaptureConfig {
            accept_search: AcceptSearch::Nested { max_depth: 2 },
            ..CaptureConfig::default()
        },
        2,
    );
    assert!(craft(&mut two_levels).is_ok());
}

/// A cell change with a container interaction nested `depth` frames below it.
fn push_only(config: CaptureConfig, depth: usize) -> CaptureSupplier<InMemoryWorld> {
    let mut supplier = supplier_with(config);
    supplier.log_transaction(BlockChange::new(
        OVERWORLD,
        BlockPos::new(0, 0, 0),
        snapshot(0),
        BlockState(1),
    ));
    push_interaction_at_depth(&mut supplier, depth);
    supplier
}

#[test]
fn entity_drops_open_a_frame_under_the_drops_node() {
    let journal = Journal::new();
    let mut supplier = supplier();
    let entity = zombie(9);
    {
        let mut frame = supplier
            .log_entity_drops(entity.clone(), Some(CauseEntry::Player(STEVE)))
            .unwrap()
            .unwrap();
        let effect = frame.frame();
        assert_eq!(frame.side_effect(effect).unwrap().effect, ENTITY_DROPS_EFFECT);
        frame.log_transaction(ScriptedMutation::new("rotten_flesh", &journal));
    }
    let head = supplier.top_level().head().unwrap();
    let drops = supplier.node(head).unwrap();
    assert!(drops.mutation().as_any().downcast_ref::<EntityDrops>().is_some());
    assert_eq!(supplier.effect_ids(drops.side_effects()[0]).len(), 1);

    let mut world = InMemoryWorld::new();
    let mut dispatcher = RecordingDispatcher::new().cancel_kind(TransactionKind::EntityDrops);
    supplier
        .process_transactions(&mut world, &mut dispatcher)
        .unwrap();

    let event = &dispatcher.seen()[0];
    assert_eq!(event.cause().root(), Some(&CauseEntry::Entity(entity.id)));
    assert_eq!(
        event.cause().context(ContextKey::LastAttacker),
        Some(&CauseEntry::Player(STEVE))
    );
    // The drops were cancelled with their parent, never dispatched.
    assert_eq!(dispatcher.seen().len(), 1);
    assert_eq!(journal.with_prefix("restore:"), vec!["rotten_flesh"]);
    assert_eq!(world.entity(entity.id), Some(&entity));
}

#[test]
fn claimed_entity_drops_capture_nothing_new() {
    let journal = Journal::new();
    let mut supplier = supplier();
    let entity = zombie(3);
    supplier.log_transaction(ScriptedMutation::new("kill", &journal).claiming_drops_of(entity.id));

    assert!(supplier.log_entity_drops(entity, None).unwrap().is_none());
    assert_eq!(supplier.captured_len(), 1);
    assert_eq!(supplier.active_effect(), None);
}

#[test]
fn record_transaction_names_the_absorbing_node() {
    let journal = Journal::new();
    let mut supplier = supplier();
    let a = supplier.record_transaction(ScriptedMutation::new("a", &journal).absorbs(1));
    supplier.log_transaction(ScriptedMutation::new("b", &journal));
    let c = supplier.record_transaction(ScriptedMutation::new("c", &journal).absorbs(1));

    assert!(matches!(a, Logged::Appended(_)));
    assert_eq!(c, Logged::Absorbed(a.id()));
    assert_eq!(supplier.top_level_len(), 2);
}

#[test]
fn frames_pushed_under_an_older_node_hang_from_it() {
    let journal = Journal::new();
    let mut supplier = supplier();
    let first = supplier
        .log_transaction(ScriptedMutation::new("first", &journal))
        .unwrap();
    let second = supplier
        .log_transaction(ScriptedMutation::new("second", &journal))
        .unwrap();

    let nested = {
        let mut frame = supplier
            .push_effect_under(first, EffectTag("late"))
            .unwrap();
        let effect = frame.frame();
        assert_eq!(frame.side_effect(effect).unwrap().parent, first);
        frame
            .log_transaction(ScriptedMutation::new("nested", &journal))
            .unwrap()
    };
    assert_eq!(supplier.active_effect(), None);
    assert!(supplier.node(second).unwrap().side_effects().is_empty());
    let ChainOwner::Effect(effect) = supplier.node(nested).unwrap().owner() else {
        panic!("nested node should live in a side-effect chain");
    };
    assert_eq!(supplier.side_effect(effect).unwrap().parent, first);
}

#[test]
fn push_effect_under_an_unknown_node_is_rejected() {
    let journal = Journal::new();
    let mut other = supplier();
    other.log_transaction(ScriptedMutation::new("x", &journal));
    let foreign = other
        .log_transaction(ScriptedMutation::new("y", &journal))
        .unwrap();

    let mut supplier = supplier();
    supplier.log_transaction(ScriptedMutation::new("only", &journal));
    assert!(matches!(
        supplier.push_effect_under(foreign, EffectTag("stray")),
        Err(CaptureError::UnknownParent(id)) if id == foreign
    ));
    assert_eq!(supplier.active_effect(), None);
}

#[test]
fn accept_hooks_offer_the_tail_before_its_side_effects() {
    let mut supplier = supplier();
    let outer = supplier
        .log_transaction(ContainerInteraction::new(STEVE))
        .unwrap();
    {
        let mut frame = supplier.push_effect(EffectTag("reopen")).unwrap();
        frame.log_transaction(ContainerInteraction::new(STEVE));
    }
    assert_eq!(supplier.captured_len(), 2);

    let taken = supplier
        .log_crafting(STEVE, None, CraftingGrid::default(), None)
        .unwrap();
    assert_eq!(taken, outer);
}

#[test]
fn completing_block_drops_closes_only_a_drops_frame() {
    let journal = Journal::new();
    let mut supplier = supplier();
    let cell = supplier
        .log_transaction(BlockChange::new(
            OVERWORLD,
            BlockPos::new(2, 64, 2),
            snapshot(1),
            BlockState(0),
        ))
        .unwrap();

    let mut drops = supplier.prepare_block_drops().unwrap();
    assert_eq!(drops.active_effect_tag(), Some(PREPARE_BLOCK_DROPS_EFFECT));
    drops.log_transaction(ScriptedMutation::new("cobblestone", &journal));
    assert!(drops.complete_block_drops().is_none());
    assert_eq!(supplier.active_effect(), None);
    assert_eq!(supplier.node(cell).unwrap().side_effects().len(), 1);

    let other = supplier.push_effect(EffectTag("neighbor_update")).unwrap();
    let frame = other.frame();
    let other = other.complete_block_drops().expect("frame stays open");
    assert_eq!(other.active_effect(), Some(frame));
    drop(other);
    assert_eq!(supplier.active_effect(), None);
}
