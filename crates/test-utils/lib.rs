use std::error::Error;

use cosmwasm_std::Event;
use ron::ser::{to_string_pretty, PrettyConfig};
use serde::Serialize;

pub trait ToExpectInput {
    fn to_expect_input(&self) -> String;
}

pub fn check(actual: impl ToExpectInput, expected: expect_test::Expect) {
    expected.assert_eq(actual.to_expect_input().as_str());
}

pub fn check_err(actual: impl Error, expected: expect_test::Expect) {
    expected.assert_eq(actual.to_string().as_str());
}

impl<T> ToExpectInput for T
where
    T: Serialize,
{
    fn to_expect_input(&self) -> String {
        to_string_pretty(
            self,
            PrettyConfig::new()
                .compact_arrays(false)
                .indentor("  ".to_owned()),
        )
        .unwrap()
    }
}

/// Values of the `kind` attribute of each event, in emission order
pub fn event_kinds(events: &[Event]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| {
            event
                .attributes
                .iter()
                .find(|attr| attr.key == "kind")
                .map(|attr| attr.value.as_str())
        })
        .collect()
}

pub mod prelude {
    pub use expect_test::expect;
    pub use rstest::*;

    pub use crate::{check, event_kinds, ToExpectInput};
}
