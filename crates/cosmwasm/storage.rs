use cosmwasm_std::{from_json, to_json_vec, Order, Storage};
use num::{Decimal, U256};
use serde::{de::DeserializeOwned, Serialize};

pub trait StorageExt: Storage {
    /// Returns true if there is something stored at the `key`
    fn has_key(&self, key: impl AsRef<str>) -> bool {
        self.get(key.as_ref().as_bytes()).is_some()
    }

    /// Fetch data stored at `key` (if any) as a UTF-8 string
    /// Panics if the stored bytes are invalid UTF-8
    fn string_at(&self, key: impl AsRef<str>) -> Option<String> {
        self.get(key.as_ref().as_bytes())
            .map(String::from_utf8)
            .transpose()
            .expect("valid utf-8 bytes if present")
    }

    /// Fetch data stored at `key` (if any) as a Decimal
    /// Panics if the stored bytes do not exactly constitute a U256
    fn decimal_at(&self, key: impl AsRef<str>) -> Option<Decimal> {
        self.get(key.as_ref().as_bytes())
            .map(TryFrom::try_from)
            .transpose()
            .expect("exactly 32 bytes if present")
            .map(|bytes: [u8; 32]| Decimal::raw(U256::from_big_endian(&bytes)))
    }

    /// Fetch data stored at `key` (if any) as a u128
    /// Panics if the stored bytes do not exactly constitute a u128
    fn u128_at(&self, key: impl AsRef<str>) -> Option<u128> {
        self.get(key.as_ref().as_bytes())
            .map(TryFrom::try_from)
            .transpose()
            .expect("exactly 16 bytes if present")
            .map(u128::from_be_bytes)
    }

    /// Fetch data stored at `key` (if any) as a u64
    /// Panics if the stored bytes do not exactly constitute a u64
    fn u64_at(&self, key: impl AsRef<str>) -> Option<u64> {
        self.get(key.as_ref().as_bytes())
            .map(TryFrom::try_from)
            .transpose()
            .expect("exactly 8 bytes if present")
            .map(u64::from_be_bytes)
    }

    /// Fetch data stored at `key` (if any) as a u32
    /// Panics if the stored bytes do not exactly constitute a u32
    fn u32_at(&self, key: impl AsRef<str>) -> Option<u32> {
        self.get(key.as_ref().as_bytes())
            .map(TryFrom::try_from)
            .transpose()
            .expect("exactly 4 bytes if present")
            .map(u32::from_be_bytes)
    }

    /// Fetch data stored at `key` (if any) as a boolean
    /// Panics if there is not only one byte stored, if any
    fn bool_at(&self, key: impl AsRef<str>) -> Option<bool> {
        self.get(key.as_ref().as_bytes())
            .map(TryFrom::try_from)
            .transpose()
            .expect("exactly 1 byte if present")
            .map(|[b]: [u8; 1]| b == 1)
    }

    /// Fetch the JSON encoded record stored at `key` (if any)
    /// Panics if the stored bytes do not decode into a `T`
    fn json_at<T: DeserializeOwned>(&self, key: impl AsRef<str>) -> Option<T> {
        self.get(key.as_ref().as_bytes())
            .map(|bytes| from_json(bytes))
            .transpose()
            .expect("valid json record if present")
    }

    /// Every JSON encoded record whose key starts with `prefix`, in key order
    fn json_with_prefix<T: DeserializeOwned>(&self, prefix: impl AsRef<str>) -> Vec<T> {
        let start = prefix.as_ref().as_bytes().to_vec();

        let end = prefix_end(&start);

        self.range(Some(&start), end.as_deref(), Order::Ascending)
            .map(|(_, bytes)| from_json(bytes).expect("valid json record"))
            .collect()
    }

    /// Set the data stored at `key` to the UTF-8 string `s`
    fn set_string(&mut self, key: impl AsRef<str>, s: &str) {
        self.set(key.as_ref().as_bytes(), s.as_bytes());
    }

    /// Set the data stored at `key` to the Decimal `x`
    fn set_decimal(&mut self, key: impl AsRef<str>, x: Decimal) {
        let mut bytes = [0u8; 32];

        x.into_raw().to_big_endian(&mut bytes);

        self.set(key.as_ref().as_bytes(), &bytes)
    }

    /// Set the data stored at `key` to the u128 `x`
    fn set_u128(&mut self, key: impl AsRef<str>, x: u128) {
        self.set(key.as_ref().as_bytes(), &x.to_be_bytes())
    }

    /// Set the data stored at `key` to the u64 `x`
    fn set_u64(&mut self, key: impl AsRef<str>, x: u64) {
        self.set(key.as_ref().as_bytes(), &x.to_be_bytes())
    }

    /// Set the data stored at `key` to the u32 `x`
    fn set_u32(&mut self, key: impl AsRef<str>, x: u32) {
        self.set(key.as_ref().as_bytes(), &x.to_be_bytes())
    }

    /// Set the data stored at `key` to the bool `b`
    fn set_bool(&mut self, key: impl AsRef<str>, b: bool) {
        self.set(key.as_ref().as_bytes(), &[b as u8])
    }

    /// Set the data stored at `key` to the JSON encoding of `value`
    fn set_json(&mut self, key: impl AsRef<str>, value: &impl Serialize) {
        let bytes = to_json_vec(value).expect("infallible serialization");

        self.set(key.as_ref().as_bytes(), &bytes)
    }

    fn remove_key(&mut self, key: impl AsRef<str>) {
        self.remove(key.as_ref().as_bytes())
    }
}

impl<T> StorageExt for T where T: Storage + ?Sized {}

/// The first key past every key starting with `prefix`
fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();

    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);

            return Some(end);
        }
    }

    None
}

pub struct MapKey(&'static str);

impl MapKey {
    pub const fn new(prefix: &'static str) -> Self {
        Self(prefix)
    }

    pub fn with(self, t: impl ToString) -> String {
        self.multi([&t])
    }

    pub fn multi<const N: usize>(self, ts: [&dyn ToString; N]) -> String {
        let mut s = String::with_capacity(256);

        s.push_str(self.0);

        for t in ts {
            s.push_str(&t.to_string());
            s.push(':');
        }

        s
    }

    /// The prefix shared by every key of this map
    pub fn all(self) -> String {
        self.0.to_owned()
    }
}

#[cfg(test)]
mod test {
    use cosmwasm_std::testing::MockStorage;

    use super::*;

    const RECORDS: MapKey = MapKey::new("test::records");

    #[test]
    fn composite_keys() {
        assert_eq!(RECORDS.with("a"), "test::recordsa:");
        assert_eq!(RECORDS.multi([&"queued", &"ABC"]), "test::recordsqueued:ABC:");
    }

    #[test]
    fn prefix_iteration_is_bounded() {
        let mut storage = MockStorage::default();

        storage.set_json(RECORDS.multi([&"queued", &"b"]), &2u32);
        storage.set_json(RECORDS.multi([&"queued", &"a"]), &1u32);
        storage.set_json(RECORDS.multi([&"queuedx", &"c"]), &3u32);
        storage.set_json(RECORDS.multi([&"send", &"d"]), &4u32);

        let queued: Vec<u32> = storage.json_with_prefix(RECORDS.multi([&"queued"]));

        assert_eq!(queued, vec![1, 2]);

        let all: Vec<u32> = storage.json_with_prefix(RECORDS.all());

        assert_eq!(all, vec![1, 2, 3, 4]);
    }

    #[test]
    fn decimals_round_trip() {
        let mut storage = MockStorage::default();

        let rate: Decimal = "1.2".parse().unwrap();

        storage.set_decimal("rate", rate);

        assert_eq!(storage.decimal_at("rate"), Some(rate));
        assert_eq!(storage.decimal_at("missing"), None);
    }

    #[test]
    fn prefix_end_carries() {
        assert_eq!(prefix_end(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_end(&[b'a', 0xFF]), Some(b"b".to_vec()));
        assert_eq!(prefix_end(&[0xFF]), None);
    }
}
