use anyhow::{anyhow, bail, Result};
use cosmwasm_schema::{cw_serde, serde::de::DeserializeOwned};
use cosmwasm_std::{from_json, DepsMut, Reply, Response};
use neutron_sdk::bindings::{msg::NeutronMsg, query::NeutronQuery};
use strum::IntoEnumIterator;

use ics_cw::{
    event,
    zone::{Icq, ZoneExt as _},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Kind {
    RegisterIcq = 0,
}

impl TryFrom<u8> for Kind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::RegisterIcq),
            _ => Err(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    pub kind: Kind,
    pub icq: Icq,
}

impl From<State> for u64 {
    fn from(value: State) -> Self {
        u64::from_be_bytes([value.kind as u8, value.icq as u8, 0, 0, 0, 0, 0, 0])
    }
}

impl TryFrom<u64> for State {
    type Error = anyhow::Error;

    fn try_from(value: u64) -> Result<Self> {
        let [kind_u8, icq_u8, ..] = value.to_be_bytes();

        let kind = Kind::try_from(kind_u8).map_err(|kind| anyhow!("unexpected reply kind: {kind}"))?;

        let Some(icq) = Icq::iter().nth(icq_u8.into()) else {
            bail!("unexpected icq: {icq_u8}");
        };

        Ok(Self { kind, icq })
    }
}

fn extract_reply_data<T: DeserializeOwned>(reply: Reply) -> Result<T> {
    let res = reply
        .result
        .into_result()
        .map_err(|err| anyhow!("submessage failed: {err}"))?;

    let Some(data) = res.data else {
        bail!("reply contains no data");
    };

    Ok(from_json(data)?)
}

fn parse_icq_registration_reply(reply: Reply) -> Result<u64> {
    #[cw_serde]
    struct MsgRegisterInterchainQueryResponse {
        id: u64,
    }

    let msg: MsgRegisterInterchainQueryResponse = extract_reply_data(reply)?;

    Ok(msg.id)
}

pub fn handle_register_icq(
    deps: DepsMut<NeutronQuery>,
    icq: Icq,
    reply: Reply,
) -> Result<Response<NeutronMsg>> {
    let query_id = parse_icq_registration_reply(reply)?;

    deps.storage.set_query_id(icq, query_id);

    Ok(Response::default().add_event(
        event("icq_registered")
            .add_attribute("icq", icq.id())
            .add_attribute("query_id", query_id.to_string()),
    ))
}
