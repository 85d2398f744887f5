use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A single command invocation sent to the browser over the wire.
///
/// `MethodCall` ids must be unique for the lifetime of the connection they
/// are sent over (a single Transport); the `Browser` is responsible for
/// handing out unique, monotonically increasing ids.
#[derive(Serialize, Debug, PartialEq)]
pub struct MethodCall {
    pub id: CallId,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub method: Cow<'static, str>,
    pub params: serde_json::Value,
}

/// A monotonically increasing identifier for an outbound command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallId(u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallId({})", self.0)
    }
}

impl CallId {
    pub fn new(id: u64) -> Self {
        CallId(id)
    }
}

/// A type that the generated CDP schema implements for every command
/// (`Foo.barParams`-style struct), tying its serialized params to the
/// response type the browser sends back.
pub trait Command: serde::ser::Serialize + Method {
    type Response: serde::de::DeserializeOwned + fmt::Debug;
}

/// A decoded, successful response to a [`Command`].
#[derive(Debug)]
pub struct CommandResponse<T>
where
    T: fmt::Debug,
{
    pub id: CallId,
    pub result: T,
    pub method: Cow<'static, str>,
}

pub type CommandResult<T> = Result<CommandResponse<T>, Error>;

impl<T: fmt::Debug> Deref for CommandResponse<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.result
    }
}

/// An event envelope as it arrives over the wire, decoded just enough to
/// read `method`/`sessionId`; the `params` payload is decoded lazily by
/// domain-specific event enums.
#[derive(Deserialize, Debug, Clone)]
pub struct CdpJsonEventMessage {
    pub method: Cow<'static, str>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    pub params: serde_json::Value,
}

impl Method for CdpJsonEventMessage {
    fn identifier(&self) -> Cow<'static, str> {
        self.method.clone()
    }
}

impl Event for CdpJsonEventMessage {
    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

/// Implemented by the tagged sum type the generated schema produces for
/// "any event this client understands". Unknown methods are tolerated by
/// the generated `Deserialize` impl (forward-compat, see spec §7).
pub trait Event: Method + DeserializeOwned {
    fn session_id(&self) -> Option<&str>;
}

pub trait Method {
    /// The whole string identifier for this method, e.g. `DOM.removeNode`.
    fn identifier(&self) -> Cow<'static, str>;

    /// The domain this method belongs to, e.g. `DOM`.
    fn domain_name(&self) -> Cow<'static, str> {
        self.split().0
    }

    /// The method name inside its domain, e.g. `removeNode`.
    fn method_name(&self) -> Cow<'static, str> {
        self.split().1
    }

    fn split(&self) -> (Cow<'static, str>, Cow<'static, str>) {
        match self.identifier() {
            Cow::Borrowed(id) => {
                let mut iter = id.split('.');
                (
                    iter.next().unwrap_or_default().into(),
                    iter.next().unwrap_or_default().into(),
                )
            }
            Cow::Owned(id) => {
                let mut iter = id.split('.');
                (
                    Cow::Owned(iter.next().unwrap_or_default().into()),
                    Cow::Owned(iter.next().unwrap_or_default().into()),
                )
            }
        }
    }
}

/// Type alias for a method id used purely for diagnostics (error messages,
/// tracing spans) once a command's concrete params have been consumed.
pub type MethodId = Cow<'static, str>;

/// A decoded command or event, as it arrives from the Transport.
///
/// Per spec §3: a message with nonzero `id` and either `result` or `error`
/// is a response; with zero id and a `method` it is an event.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
#[allow(clippy::large_enum_variant)]
pub enum Message<T = CdpJsonEventMessage> {
    Response(Response),
    Event(T),
}

/// The response envelope to a [`MethodCall`].
#[derive(Deserialize, Debug, Clone)]
pub struct Response {
    pub id: CallId,
    pub result: Option<serde_json::Value>,
    pub error: Option<Error>,
}

/// The wire-visible error shape the browser sends on command failure.
/// Per spec §6 the `code` is surfaced to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CDP error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

/// Represents a binary payload as defined in CDP (base64-encoded on the
/// wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binary(String);

impl AsRef<str> for Binary {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Binary> for String {
    fn from(b: Binary) -> Self {
        b.0
    }
}

impl From<String> for Binary {
    fn from(expr: String) -> Self {
        Self(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Dummy;

    impl Method for Dummy {
        fn identifier(&self) -> Cow<'static, str> {
            "DOM.removeNode".into()
        }
    }

    #[test]
    fn splits_domain_and_method() {
        let dummy = Dummy;
        assert_eq!(dummy.domain_name(), "DOM");
        assert_eq!(dummy.method_name(), "removeNode");
    }

    #[test]
    fn response_message_untags_correctly() {
        let raw = r#"{"id":1,"result":{"ok":true}}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        match msg {
            Message::Response(resp) => assert_eq!(resp.id, CallId::new(1)),
            Message::Event(_) => panic!("expected response"),
        }
    }

    #[test]
    fn event_message_untags_correctly() {
        let raw = r#"{"method":"Page.loadEventFired","sessionId":"S1","params":{}}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        match msg {
            Message::Event(ev) => {
                assert_eq!(ev.identifier(), "Page.loadEventFired");
                assert_eq!(ev.session_id(), Some("S1"));
            }
            Message::Response(_) => panic!("expected event"),
        }
    }
}
