use cosmwasm_std::Storage;

use ics_core::{records::RedelegationRecord, Epoch, Timestamp};

use crate::StorageExt as _;

#[rustfmt::skip]
mod key {
    use crate::MapKey;

    pub const REDELEGATION: MapKey = MapKey::new("redelegations::record");
}

pub trait RedelegationsExt: Storage {
    fn redelegation(&self, source: &str, destination: &str, epoch: Epoch) -> Option<RedelegationRecord> {
        self.json_at(key::REDELEGATION.multi([&source, &destination, &epoch]))
    }

    fn set_redelegation(&mut self, record: &RedelegationRecord) {
        self.set_json(
            key::REDELEGATION.multi([&record.source, &record.destination, &record.epoch]),
            record,
        )
    }

    fn remove_redelegation(&mut self, source: &str, destination: &str, epoch: Epoch) {
        self.remove_key(key::REDELEGATION.multi([&source, &destination, &epoch]))
    }

    fn redelegations(&self) -> Vec<RedelegationRecord> {
        self.json_with_prefix(key::REDELEGATION.all())
    }
}

impl<T> RedelegationsExt for T where T: Storage + ?Sized {}

/// Drop completed or expired redelegation records, returns how many were removed
pub fn collect_garbage(storage: &mut dyn Storage, now: Timestamp, unbonding_period: u64) -> usize {
    let collectable: Vec<_> = storage
        .redelegations()
        .into_iter()
        .filter(|r| r.is_collectable(now, unbonding_period))
        .collect();

    for record in &collectable {
        storage.remove_redelegation(&record.source, &record.destination, record.epoch);
    }

    collectable.len()
}

#[cfg(test)]
mod test {
    use cosmwasm_std::testing::MockStorage;

    use super::*;

    fn record(source: &str, epoch: Epoch, completion_time: Option<Timestamp>) -> RedelegationRecord {
        RedelegationRecord {
            source: source.to_owned(),
            destination: "val_z".to_owned(),
            epoch,
            amount: 10,
            completion_time,
            created_at: 100,
        }
    }

    #[test]
    fn garbage_collection() {
        let mut storage = MockStorage::default();

        storage.set_redelegation(&record("val_a", 1, Some(150)));
        storage.set_redelegation(&record("val_b", 1, Some(500)));
        storage.set_redelegation(&record("val_c", 1, None));

        assert_eq!(collect_garbage(&mut storage, 200, 1_000), 1);
        assert_eq!(storage.redelegation("val_a", "val_z", 1), None);
        assert!(storage.redelegation("val_b", "val_z", 1).is_some());

        // created at 100, unbonding period of 1_000
        assert_eq!(collect_garbage(&mut storage, 1_101, 1_000), 2);
        assert!(storage.redelegations().is_empty());
    }
}
