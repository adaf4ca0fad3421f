//! Tap message interpreter (spec §4.C): decodes a dnstap envelope, keeps
//! only `CLIENT_RESPONSE` messages, and attributes the A/AAAA addresses in
//! the answer section back to the name the client originally queried,
//! walking through any CNAME indirection in between.

mod proto;

use std::collections::HashMap;
use std::net::IpAddr;

use hickory_proto::op::Message as DnsMessage;
use hickory_proto::rr::{RData, Record};
use prost::Message as _;
use thiserror::Error;

/// Bound on CNAME/PTR indirection hops per question, defending against a
/// cyclical answer section.
const LOOP_GUARD: usize = 64;

#[derive(Debug, Error)]
pub enum TapError {
    #[error("failed to decode dnstap envelope: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("failed to decode DNS wire message: {0}")]
    Dns(#[from] hickory_proto::error::ProtoError),
}

/// One IP→name fact extracted from a tap message, ready to feed to
/// [`crate::store::Store::add`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TapObservation {
    pub ip: IpAddr,
    pub name: String,
}

/// Decodes one raw dnstap envelope and returns the observations it yields.
///
/// The envelope is fully parsed before anything branches on `type` — the
/// bug where the zero-valued struct is inspected before `ParseFromString`
/// is not reproduced here, there is no way to observe a before-parse value
/// in a typed decode. Envelopes that aren't `MESSAGE`/`CLIENT_RESPONSE`
/// yield an empty list rather than an error; they are a normal, expected
/// shape of traffic on the tap socket, not a malformed message.
pub fn interpret(raw: &[u8]) -> Result<Vec<TapObservation>, TapError> {
    let envelope = proto::Dnstap::decode(raw)?;
    if envelope.r#type() != proto::dnstap::Type::Message {
        return Ok(Vec::new());
    }
    let Some(message) = envelope.message else {
        return Ok(Vec::new());
    };
    if message.r#type() != proto::message::Type::ClientResponse {
        return Ok(Vec::new());
    }
    let Some(wire) = message.response_message else {
        return Ok(Vec::new());
    };

    let dns = DnsMessage::from_vec(&wire)?;
    Ok(attribute(&dns))
}

/// Builds the name→records "linker" and walks each question's CNAME chain
/// to attribute terminal A/AAAA addresses to the name that was queried.
fn attribute(dns: &DnsMessage) -> Vec<TapObservation> {
    let mut linker: HashMap<String, Vec<&Record>> = HashMap::new();
    for rr in dns.answers() {
        linker.entry(rr.name().to_string()).or_default().push(rr);
    }

    let mut observations = Vec::new();
    for question in dns.queries() {
        let original_name = question.name().to_string();
        let mut worklist = vec![original_name.clone()];
        let mut pops = 0usize;

        while let Some(current) = worklist.pop() {
            pops += 1;
            if pops > LOOP_GUARD {
                tracing::warn!(
                    name = %original_name,
                    "loop guard tripped walking CNAME/PTR chain, abandoning question"
                );
                break;
            }

            let Some(records) = linker.get(&current) else {
                continue;
            };
            for rr in records {
                match rr.data() {
                    Some(RData::A(addr)) => observations.push(TapObservation {
                        ip: IpAddr::V4(addr.0),
                        name: original_name.clone(),
                    }),
                    Some(RData::AAAA(addr)) => observations.push(TapObservation {
                        ip: IpAddr::V6(addr.0),
                        name: original_name.clone(),
                    }),
                    Some(RData::CNAME(target)) => worklist.push(target.0.to_string()),
                    Some(RData::PTR(target)) => worklist.push(target.0.to_string()),
                    _ => {}
                }
            }
        }
    }
    observations
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Message as DnsMessage, MessageType, OpCode, Query};
    use hickory_proto::rr::rdata::{A, AAAA, CNAME};
    use hickory_proto::rr::{Name, RData, Record, RecordType};
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::str::FromStr;

    fn dns_bytes_with_cname_chain() -> Vec<u8> {
        let question = Name::from_str("www.example.com.").unwrap();
        let cname_target = Name::from_str("edge.cdn.example.net.").unwrap();

        let mut message = DnsMessage::new();
        message.set_message_type(MessageType::Response);
        message.set_op_code(OpCode::Query);
        message.add_query(Query::query(question.clone(), RecordType::A));

        let mut cname_rr = Record::with(question, RecordType::CNAME, 300);
        cname_rr.set_data(Some(RData::CNAME(CNAME(cname_target.clone()))));
        message.add_answer(cname_rr);

        let mut a_rr = Record::with(cname_target.clone(), RecordType::A, 300);
        a_rr.set_data(Some(RData::A(A(Ipv4Addr::new(93, 184, 216, 34)))));
        message.add_answer(a_rr);

        let mut aaaa_rr = Record::with(cname_target, RecordType::AAAA, 300);
        aaaa_rr.set_data(Some(RData::AAAA(AAAA(Ipv6Addr::new(
            0x2606, 0x2800, 0x220, 0x1, 0x248, 0x1893, 0x25c8, 0x1946,
        )))));
        message.add_answer(aaaa_rr);

        message.to_vec().unwrap()
    }

    #[test]
    fn attributes_through_cname_chain_to_original_question() {
        let dns = DnsMessage::from_vec(&dns_bytes_with_cname_chain()).unwrap();
        let observations = attribute(&dns);

        assert_eq!(observations.len(), 2);
        assert!(observations
            .iter()
            .all(|o| o.name == "www.example.com."));
        assert!(observations
            .iter()
            .any(|o| o.ip == IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))));
    }

    #[test]
    fn non_client_response_message_yields_nothing() {
        let mut envelope = proto::Dnstap::default();
        envelope.set_type(proto::dnstap::Type::Message);
        let mut message = proto::Message::default();
        message.set_type(proto::message::Type::ClientQuery);
        envelope.message = Some(message);

        let raw = envelope.encode_to_vec();
        let observations = interpret(&raw).unwrap();
        assert!(observations.is_empty());
    }

    #[test]
    fn loop_guard_bounds_cyclical_cname_chain() {
        let a = Name::from_str("a.example.com.").unwrap();
        let b = Name::from_str("b.example.com.").unwrap();

        let mut message = DnsMessage::new();
        message.set_message_type(MessageType::Response);
        message.add_query(Query::query(a.clone(), RecordType::A));

        let mut a_to_b = Record::with(a.clone(), RecordType::CNAME, 300);
        a_to_b.set_data(Some(RData::CNAME(CNAME(b.clone()))));
        message.add_answer(a_to_b);

        let mut b_to_a = Record::with(b, RecordType::CNAME, 300);
        b_to_a.set_data(Some(RData::CNAME(CNAME(a))));
        message.add_answer(b_to_a);

        // Must return rather than loop forever.
        let observations = attribute(&message);
        assert!(observations.is_empty());
    }
}
