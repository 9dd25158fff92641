use cosmwasm_std::Storage;

use ics_core::{records::UnbondingRecord, Epoch};

use crate::StorageExt as _;

#[rustfmt::skip]
mod key {
    use crate::MapKey;

    pub const UNBONDING: MapKey = MapKey::new("unbondings::record");
}

pub trait UnbondingsExt: Storage {
    fn unbonding(&self, validator: &str, epoch: Epoch) -> Option<UnbondingRecord> {
        self.json_at(key::UNBONDING.multi([&validator, &epoch]))
    }

    fn set_unbonding(&mut self, record: &UnbondingRecord) {
        self.set_json(key::UNBONDING.multi([&record.validator, &record.epoch]), record)
    }

    fn remove_unbonding(&mut self, validator: &str, epoch: Epoch) {
        self.remove_key(key::UNBONDING.multi([&validator, &epoch]))
    }

    fn unbondings(&self) -> Vec<UnbondingRecord> {
        self.json_with_prefix(key::UNBONDING.all())
    }
}

impl<T> UnbondingsExt for T where T: Storage + ?Sized {}

#[cfg(test)]
mod test {
    use cosmwasm_std::testing::MockStorage;

    use super::*;

    #[test]
    fn keyed_by_validator_and_epoch() {
        let mut storage = MockStorage::default();

        storage.set_unbonding(&UnbondingRecord::new("val_a", 1, 100, vec!["h1".to_owned()]));
        storage.set_unbonding(&UnbondingRecord::new("val_a", 2, 50, vec!["h2".to_owned()]));

        assert_eq!(storage.unbonding("val_a", 2).unwrap().amount, 50);
        assert_eq!(storage.unbondings().len(), 2);

        storage.remove_unbonding("val_a", 1);

        assert_eq!(storage.unbonding("val_a", 1), None);
        assert_eq!(storage.unbondings().len(), 1);
    }
}
