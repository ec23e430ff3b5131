//! Death subscriptions keyed by arena slot.

use horde_core::{EnemyId, SubscriptionTag};

/// Registry-side subscription of a live enemy to the death channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Subscription {
    pub(crate) tag: Option<SubscriptionTag>,
}

/// One optional subscription per arena slot.
///
/// An entry exists exactly while its enemy is between spawn and removal, so
/// taking it doubles as the guard against processing a death twice.
#[derive(Clone, Debug, Default)]
pub(crate) struct DeathListeners {
    entries: Vec<Option<Subscription>>,
}

impl DeathListeners {
    pub(crate) fn subscribe(&mut self, id: EnemyId, tag: Option<SubscriptionTag>) {
        let index = id.slot() as usize;
        if self.entries.len() <= index {
            self.entries.resize(index + 1, None);
        }
        debug_assert!(
            self.entries[index].is_none(),
            "slot {index} subscribed twice without release"
        );
        self.entries[index] = Some(Subscription { tag });
    }

    pub(crate) fn take(&mut self, id: EnemyId) -> Option<Subscription> {
        self.entries
            .get_mut(id.slot() as usize)
            .and_then(Option::take)
    }

    pub(crate) fn clear(&mut self, id: EnemyId) {
        if let Some(entry) = self.entries.get_mut(id.slot() as usize) {
            *entry = None;
        }
    }
}
