//! End-to-end item and money scenarios driven through the `GuildBank` facade.

use guild_bank_runtime::{BankNotification, GuildBank, RankUpdate, SlotContent};
use guild_bank_storage::memory::InMemoryGuildStore;
use guild_bank_types::{
    BankConfig, BankEventPayload, BankEventType, BankLogId, BankTabRights, Character, GuildId,
    GuildRights, Item, MemberId, MoveEndpoint, MoveRequest, RankId, Rejection, Remaining, SlotId,
    TabId, TabRightsAndSlots, BACKPACK,
};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DEPOSITOR_RANK: RankId = RankId(2);

struct Guild {
    bank: GuildBank,
    leader: Character,
    depositor: Character,
}

impl Guild {
    async fn new(slots_per_tab: u16) -> Self {
        let mut config = BankConfig::default();
        config.bank.initial_tabs = 2;
        config.bank.slots_per_tab = slots_per_tab;
        config.logs.bank_log_capacity = 5;

        let store = Arc::new(InMemoryGuildStore::new());
        let leader = MemberId::new("leader");
        let mut bank = GuildBank::create(GuildId::new("scenarios"), leader.clone(), config, store)
            .await
            .unwrap();

        let depositor = MemberId::new("depositor");
        bank.add_member(depositor.clone(), Some(DEPOSITOR_RANK))
            .await
            .unwrap();
        bank.set_rank_info(
            &leader,
            DEPOSITOR_RANK,
            RankUpdate::default()
                .with_rights(GuildRights::chat() | GuildRights::WITHDRAW_GOLD)
                .with_money_per_day(100)
                .with_tab_rights(TabId(0), TabRightsAndSlots::new(BankTabRights::DEPOSIT_ITEM, 2))
                .with_tab_rights(TabId(1), TabRightsAndSlots::new(BankTabRights::DEPOSIT_ITEM, 2)),
        )
        .await
        .unwrap();

        Self {
            bank,
            leader: Character::new(leader).with_money(10_000),
            depositor: Character::new(depositor),
        }
    }

    /// Put `item` into the leader's backpack and deposit it at `slot` of `tab`.
    async fn stock(&mut self, tab: u8, slot: u8, item: Item) {
        self.leader
            .inventory
            .set(BACKPACK, SlotId(15), Some(item))
            .unwrap();
        self.bank
            .request_move(
                &mut self.leader,
                MoveRequest::new(
                    MoveEndpoint::inventory(BACKPACK, SlotId(15)),
                    MoveEndpoint::bank(TabId(tab), SlotId(slot)),
                ),
            )
            .await
            .unwrap();
    }

    fn bank_item(&self, tab: u8, slot: u8) -> Option<Item> {
        self.bank.storage().get_item(TabId(tab), SlotId(slot)).cloned()
    }

    fn tab_log_len(&self, tab: u8) -> usize {
        self.bank
            .logs()
            .bank_log(BankLogId::Tab(TabId(tab)))
            .map(|log| log.len())
            .unwrap_or(0)
    }
}

fn bank_to_bank(from: (u8, u8), to: (u8, u8)) -> MoveRequest {
    MoveRequest::new(
        MoveEndpoint::bank(TabId(from.0), SlotId(from.1)),
        MoveEndpoint::bank(TabId(to.0), SlotId(to.1)),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_move_into_empty_slot_keeps_identity() {
    let mut g = Guild::new(10).await;
    let item = Item::new(100, 7, 20);
    let id = item.id.clone();
    g.stock(0, 0, item).await;

    g.bank
        .request_move(&mut g.leader, bank_to_bank((0, 0), (1, 4)))
        .await
        .unwrap();

    assert!(g.bank_item(0, 0).is_none());
    let moved = g.bank_item(1, 4).unwrap();
    assert_eq!(moved.id, id);
    assert_eq!(moved.count, 7);
}

#[tokio::test]
async fn full_move_onto_same_entry_merges_counts() {
    let mut g = Guild::new(10).await;
    g.stock(0, 0, Item::new(100, 7, 20)).await;
    g.stock(0, 1, Item::new(100, 6, 20)).await;

    g.bank
        .request_move(&mut g.leader, bank_to_bank((0, 0), (0, 1)))
        .await
        .unwrap();

    assert!(g.bank_item(0, 0).is_none());
    assert_eq!(g.bank_item(0, 1).unwrap().count, 13);
}

#[tokio::test]
async fn cross_tab_move_notifies_each_touched_tab() {
    let mut g = Guild::new(10).await;
    let item = Item::new(100, 3, 20);
    g.stock(0, 0, item.clone()).await;
    let (_id, mut updates) = g.bank.notifier().subscribe(None).await;

    g.bank
        .request_move(&mut g.leader, bank_to_bank((0, 0), (1, 4)))
        .await
        .unwrap();

    let mut received = Vec::new();
    while let Ok(notification) = updates.try_recv() {
        received.push(notification);
    }
    assert_eq!(received.len(), 2);
    assert_eq!(
        received[0],
        BankNotification::TabContent {
            tab: TabId(0),
            slots: vec![SlotContent {
                slot: SlotId(0),
                item: None,
            }],
        }
    );
    match &received[1] {
        BankNotification::TabContent { tab, slots } => {
            assert_eq!(*tab, TabId(1));
            assert_eq!(slots.len(), 1);
            assert_eq!(slots[0].slot, SlotId(4));
            let moved = slots[0].item.as_ref().unwrap();
            assert_eq!((moved.id.clone(), moved.count), (item.id, 3));
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    // Rejected moves publish nothing.
    let err = g
        .bank
        .request_move(&mut g.leader, bank_to_bank((0, 0), (1, 5)))
        .await
        .unwrap_err();
    assert_eq!(err.rejection(), Some(Rejection::ItemNotFound));
    assert!(updates.try_recv().is_err());
}

#[tokio::test]
async fn split_leaves_remainder_and_creates_new_stack() {
    let mut g = Guild::new(10).await;
    let item = Item::new(100, 12, 20);
    let id = item.id.clone();
    g.stock(0, 0, item).await;

    let outcome = g
        .bank
        .request_move(&mut g.leader, bank_to_bank((0, 0), (0, 3)).with_split(5))
        .await
        .unwrap();

    assert!(outcome.split);
    let source = g.bank_item(0, 0).unwrap();
    assert_eq!(source.count, 7);
    assert_eq!(source.id, id);
    let split = g.bank_item(0, 3).unwrap();
    assert_eq!(split.count, 5);
    assert_ne!(split.id, id);
}

#[tokio::test]
async fn round_trip_restores_slot_exactly() {
    let mut g = Guild::new(10).await;
    g.stock(0, 0, Item::new(100, 9, 20)).await;
    let before = g.bank_item(0, 0).unwrap();

    g.bank
        .request_move(&mut g.leader, bank_to_bank((0, 0), (0, 5)))
        .await
        .unwrap();
    g.bank
        .request_move(&mut g.leader, bank_to_bank((0, 5), (0, 0)))
        .await
        .unwrap();

    assert_eq!(g.bank_item(0, 0), Some(before));
    assert!(g.bank_item(0, 5).is_none());
}

#[tokio::test]
async fn deposit_merges_into_existing_stack_without_new_slot() {
    let mut g = Guild::new(10).await;
    g.stock(0, 0, Item::new(100, 10, 20)).await;
    let logged_before = g.tab_log_len(0);

    g.depositor
        .inventory
        .set(BACKPACK, SlotId(0), Some(Item::new(100, 5, 20)))
        .unwrap();
    g.bank
        .request_move(
            &mut g.depositor,
            MoveRequest::new(
                MoveEndpoint::inventory(BACKPACK, SlotId(0)),
                MoveEndpoint::bank_any(TabId(0)),
            ),
        )
        .await
        .unwrap();

    assert_eq!(g.bank_item(0, 0).unwrap().count, 15);
    assert_eq!(g.bank.storage().tab(TabId(0)).unwrap().items().count(), 1);
    assert_eq!(g.tab_log_len(0), logged_before + 1);
    let entry = g
        .bank
        .logs()
        .bank_log(BankLogId::Tab(TabId(0)))
        .unwrap()
        .newest()
        .unwrap()
        .clone();
    assert_eq!(entry.event, BankEventType::DepositItem);
    assert_eq!(entry.actor, g.depositor.member);
    assert_eq!(entry.payload, BankEventPayload::Item { entry: 100, count: 5 });
}

#[tokio::test]
async fn full_tab_rejects_new_item_type() {
    let mut g = Guild::new(4).await;
    for slot in 0..4 {
        g.stock(0, slot, Item::new(200 + u32::from(slot), 1, 1)).await;
    }
    let before: Vec<_> = (0..4).map(|slot| g.bank_item(0, slot)).collect();
    let logged_before = g.tab_log_len(0);

    let newcomer = Item::new(300, 1, 1);
    g.depositor
        .inventory
        .set(BACKPACK, SlotId(0), Some(newcomer.clone()))
        .unwrap();
    let err = g
        .bank
        .request_move(
            &mut g.depositor,
            MoveRequest::new(
                MoveEndpoint::inventory(BACKPACK, SlotId(0)),
                MoveEndpoint::bank_any(TabId(0)),
            ),
        )
        .await
        .unwrap_err();

    assert_eq!(err.rejection(), Some(Rejection::BankFull));
    let after: Vec<_> = (0..4).map(|slot| g.bank_item(0, slot)).collect();
    assert_eq!(after, before);
    assert_eq!(g.tab_log_len(0), logged_before);
    assert_eq!(g.depositor.inventory.get(BACKPACK, SlotId(0)), Some(&newcomer));
}

#[tokio::test]
async fn soulbound_item_never_enters_the_bank() {
    let mut g = Guild::new(10).await;
    for character in [&mut g.leader, &mut g.depositor] {
        character
            .inventory
            .set(BACKPACK, SlotId(0), Some(Item::new(100, 1, 1).with_soulbound(true)))
            .unwrap();
    }
    for tab in 0..2 {
        for character in [&mut g.leader, &mut g.depositor] {
            let err = g
                .bank
                .request_move(
                    character,
                    MoveRequest::new(
                        MoveEndpoint::inventory(BACKPACK, SlotId(0)),
                        MoveEndpoint::bank_any(TabId(tab)),
                    ),
                )
                .await
                .unwrap_err();
            assert_eq!(err.rejection(), Some(Rejection::SoulboundItem));
        }
    }
    assert!(g.bank.storage().tabs().iter().all(|t| t.items().count() == 0));
}

#[tokio::test]
async fn withdrawals_stop_at_the_slot_quota() {
    let mut g = Guild::new(10).await;
    for slot in 0..3 {
        g.stock(0, slot, Item::new(100 + u32::from(slot), 1, 1)).await;
    }

    for (bag_slot, bank_slot) in [(0u8, 0u8), (1, 1)] {
        g.bank
            .request_move(
                &mut g.depositor,
                MoveRequest::new(
                    MoveEndpoint::bank(TabId(0), SlotId(bank_slot)),
                    MoveEndpoint::inventory(BACKPACK, SlotId(bag_slot)),
                ),
            )
            .await
            .unwrap();
    }
    assert_eq!(
        g.bank.remaining_slots(&g.depositor.member, TabId(0)).unwrap(),
        Remaining::Limited(0)
    );

    let err = g
        .bank
        .request_move(
            &mut g.depositor,
            MoveRequest::new(
                MoveEndpoint::bank(TabId(0), SlotId(2)),
                MoveEndpoint::inventory(BACKPACK, SlotId(2)),
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(err.rejection(), Some(Rejection::QuotaExceeded));
    assert!(g.bank_item(0, 2).is_some());
    assert_eq!(
        g.bank.quotas().usage(&g.depositor.member).slots_used(TabId(0)),
        2
    );
}

#[tokio::test]
async fn guild_master_stays_unlimited_whatever_the_configuration() {
    let mut g = Guild::new(10).await;
    let leader = g.leader.member.clone();
    g.bank
        .set_rank_info(
            &leader,
            RankId::GUILD_MASTER,
            RankUpdate::default()
                .with_rights(GuildRights::chat())
                .with_money_per_day(1)
                .with_tab_rights(TabId(0), TabRightsAndSlots::none()),
        )
        .await
        .unwrap();

    assert_eq!(g.bank.remaining_money(&leader).unwrap(), Remaining::Unlimited);
    for tab in 0..2 {
        assert_eq!(
            g.bank.remaining_slots(&leader, TabId(tab)).unwrap(),
            Remaining::Unlimited
        );
    }
}

#[tokio::test]
async fn money_withdrawal_over_quota_changes_nothing() {
    let mut g = Guild::new(10).await;
    g.bank.deposit_money(&mut g.leader, 5_000).await.unwrap();
    let logged_before = g.bank.logs().bank_log(BankLogId::Money).unwrap().len();

    let remaining = g.bank.remaining_money(&g.depositor.member).unwrap();
    assert_eq!(remaining, Remaining::Limited(100));

    let err = g
        .bank
        .withdraw_money(&mut g.depositor, 101, false)
        .await
        .unwrap_err();
    assert_eq!(err.rejection(), Some(Rejection::QuotaExceeded));
    assert_eq!(g.bank.money(), 5_000);
    assert_eq!(g.depositor.money, 0);
    assert!(g.bank.quotas().usage(&g.depositor.member).is_zero());
    assert_eq!(
        g.bank.logs().bank_log(BankLogId::Money).unwrap().len(),
        logged_before
    );
}

#[tokio::test]
async fn bank_log_keeps_only_the_newest_entries() {
    let mut g = Guild::new(10).await;
    // Capacity is 5; stock six stacks.
    for slot in 0..6 {
        g.stock(0, slot, Item::new(100 + u32::from(slot), 1, 1)).await;
    }

    let log = g.bank.logs().bank_log(BankLogId::Tab(TabId(0))).unwrap();
    assert_eq!(log.len(), 5);
    let entries: Vec<u32> = log
        .entries()
        .map(|e| match e.payload {
            BankEventPayload::Item { entry, .. } => entry,
            BankEventPayload::Money { .. } => 0,
        })
        .collect();
    assert_eq!(entries, vec![101, 102, 103, 104, 105]);
    assert_eq!(log.last_id(), Some(0));
}
