//! Relay wire format.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`. A
//! missing or `null` payload decodes as an empty object, so events without
//! fields may omit it. Binary payloads travel as standard base64 strings.

use crate::error::RelayError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use indexmap::IndexMap;
use serde_json::Value;

/// Artifact bytes plus the identifiers the backend reports back.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElfPayload {
    pub folder_name: String,
    pub file_name: String,
    #[serde(with = "base64_bytes")]
    pub elf_data: Vec<u8>,
}

impl std::fmt::Debug for ElfPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElfPayload")
            .field("folder_name", &self.folder_name)
            .field("file_name", &self.file_name)
            .field("len", &self.elf_data.len())
            .finish()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInput {
    pub input: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    SendElf(ElfPayload),
    UserInput(UserInput),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Connected {
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElfReceived {
    pub file_name: Option<String>,
    pub bytes: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuOutput {
    pub output: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputRequest {
    pub prompt: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerError {
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Disconnect {
    pub reason: Option<String>,
}

/// Register values keyed by `x0`..`x31` or ABI name, in the order the peer
/// wrote them. Values are signed on the wire because the backend may send
/// negative numbers for high-bit words.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegisterUpdate(pub IndexMap<String, i64>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerEvent {
    Connected(Connected),
    ElfReceived(ElfReceived),
    ExecutionResult(CpuOutput),
    CpuOutput(CpuOutput),
    RegisterUpdate(RegisterUpdate),
    InputRequest(InputRequest),
    InputReceived,
    Error(PeerError),
    Disconnect(Disconnect),
    /// An event name outside the protocol; kept so it can be logged.
    Unknown { event: String },
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Serialize)]
struct OutFrame<'a, T: Serialize> {
    event: &'a str,
    data: &'a T,
}

fn payload<T: DeserializeOwned>(data: Value) -> Result<T, RelayError> {
    let data = if data.is_null() {
        Value::Object(Default::default())
    } else {
        data
    };
    Ok(serde_json::from_value(data)?)
}

fn frame<T: Serialize>(event: &str, data: &T) -> Result<String, RelayError> {
    Ok(serde_json::to_string(&OutFrame { event, data })?)
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SendElf(_) => "send_elf",
            ClientEvent::UserInput(_) => "user_input",
        }
    }

    pub fn encode(&self) -> Result<String, RelayError> {
        match self {
            ClientEvent::SendElf(p) => frame(self.name(), p),
            ClientEvent::UserInput(p) => frame(self.name(), p),
        }
    }

    pub fn decode(text: &str) -> Result<Self, RelayError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        match raw.event.as_str() {
            "send_elf" => Ok(ClientEvent::SendElf(payload(raw.data)?)),
            "user_input" => Ok(ClientEvent::UserInput(payload(raw.data)?)),
            other => Err(RelayError::Decode(serde::de::Error::custom(format!(
                "unknown client event '{other}'"
            )))),
        }
    }
}

impl PeerEvent {
    pub fn name(&self) -> &str {
        match self {
            PeerEvent::Connected(_) => "connect",
            PeerEvent::ElfReceived(_) => "elf_received",
            PeerEvent::ExecutionResult(_) => "execution_result",
            PeerEvent::CpuOutput(_) => "cpu_output",
            PeerEvent::RegisterUpdate(_) => "register_update",
            PeerEvent::InputRequest(_) => "input_request",
            PeerEvent::InputReceived => "input_received",
            PeerEvent::Error(_) => "error",
            PeerEvent::Disconnect(_) => "disconnect",
            PeerEvent::Unknown { event } => event.as_str(),
        }
    }

    pub fn encode(&self) -> Result<String, RelayError> {
        let name = self.name();
        match self {
            PeerEvent::Connected(p) => frame(name, p),
            PeerEvent::ElfReceived(p) => frame(name, p),
            PeerEvent::ExecutionResult(p) | PeerEvent::CpuOutput(p) => frame(name, p),
            PeerEvent::RegisterUpdate(p) => frame(name, p),
            PeerEvent::InputRequest(p) => frame(name, p),
            PeerEvent::InputReceived | PeerEvent::Unknown { .. } => frame(name, &Value::Null),
            PeerEvent::Error(p) => frame(name, p),
            PeerEvent::Disconnect(p) => frame(name, p),
        }
    }

    pub fn decode(text: &str) -> Result<Self, RelayError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        let event = match raw.event.as_str() {
            "connect" | "connected" => PeerEvent::Connected(payload(raw.data)?),
            "elf_received" => PeerEvent::ElfReceived(payload(raw.data)?),
            "execution_result" => PeerEvent::ExecutionResult(payload(raw.data)?),
            "cpu_output" => PeerEvent::CpuOutput(payload(raw.data)?),
            "register_update" => PeerEvent::RegisterUpdate(payload(raw.data)?),
            "input_request" => PeerEvent::InputRequest(payload(raw.data)?),
            "input_received" => PeerEvent::InputReceived,
            "error" => PeerEvent::Error(payload(raw.data)?),
            "disconnect" => PeerEvent::Disconnect(payload(raw.data)?),
            _ => PeerEvent::Unknown { event: raw.event },
        };
        Ok(event)
    }
}

mod base64_bytes {
    use base64::prelude::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(text)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_elf_is_binary_safe() {
        let elf_data: Vec<u8> = vec![0x7f, b'E', b'L', b'F', 0, 0xff, b'"', b'\\', 0x0a];
        let event = ClientEvent::SendElf(ElfPayload {
            folder_name: "folder-1-abcdef".into(),
            file_name: "program.elf".into(),
            elf_data: elf_data.clone(),
        });
        let text = event.encode().expect("encode");
        let json: Value = serde_json::from_str(&text).expect("json");
        assert_eq!(json["event"], "send_elf");
        assert_eq!(json["data"]["fileName"], "program.elf");
        assert_eq!(json["data"]["folderName"], "folder-1-abcdef");
        assert_eq!(json["data"]["elfData"], "f0VMRgD/IlwK");
        assert_eq!(ClientEvent::decode(&text).expect("decode"), event);
    }

    #[test]
    fn payloadless_peer_events_decode() {
        assert_eq!(
            PeerEvent::decode(r#"{"event":"input_received"}"#).expect("decode"),
            PeerEvent::InputReceived
        );
        assert_eq!(
            PeerEvent::decode(r#"{"event":"input_request","data":null}"#).expect("decode"),
            PeerEvent::InputRequest(InputRequest::default())
        );
        assert_eq!(
            PeerEvent::decode(r#"{"event":"elf_received","data":{}}"#).expect("decode"),
            PeerEvent::ElfReceived(ElfReceived::default())
        );
    }

    #[test]
    fn register_update_accepts_negative_words() {
        let event =
            PeerEvent::decode(r#"{"event":"register_update","data":{"x1":-1,"sp":4096}}"#)
                .expect("decode");
        let PeerEvent::RegisterUpdate(update) = event else {
            panic!("unexpected event {event:?}");
        };
        assert_eq!(update.0.get("x1"), Some(&-1));
        assert_eq!(update.0.get("sp"), Some(&4096));
    }

    #[test]
    fn register_update_keeps_peer_key_order() {
        let event =
            PeerEvent::decode(r#"{"event":"register_update","data":{"x10":2,"sp":8,"a0":1}}"#)
                .expect("decode");
        let PeerEvent::RegisterUpdate(update) = event else {
            panic!("unexpected event {event:?}");
        };
        let keys: Vec<_> = update.0.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["x10", "sp", "a0"]);
    }

    #[test]
    fn unknown_events_are_preserved_by_name() {
        let event = PeerEvent::decode(r#"{"event":"memory_dump","data":[1,2]}"#).expect("decode");
        assert_eq!(
            event,
            PeerEvent::Unknown {
                event: "memory_dump".into()
            }
        );
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(PeerEvent::decode("not json").is_err());
        assert!(PeerEvent::decode(r#"{"event":"cpu_output","data":{"output":7}}"#).is_err());
        assert!(ClientEvent::decode(r#"{"event":"reboot"}"#).is_err());
    }

    #[test]
    fn peer_frames_round_trip_through_text() {
        let events = [
            PeerEvent::ElfReceived(ElfReceived {
                file_name: Some("program.elf".into()),
                bytes: Some(37),
            }),
            PeerEvent::CpuOutput(CpuOutput {
                output: "Hello, RV32I CPU!\n".into(),
            }),
            PeerEvent::Error(PeerError {
                message: "illegal instruction".into(),
            }),
        ];
        for event in events {
            let text = event.encode().expect("encode");
            assert_eq!(PeerEvent::decode(&text).expect("decode"), event);
        }
    }
}
