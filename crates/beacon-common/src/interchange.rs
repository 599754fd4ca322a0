//! Wire envelopes exchanged with devices.
//!
//! Everything on the device stream is a length-prefixed, tagged-field binary
//! message (protocol buffers encoding via `prost`). The outer envelope in
//! both directions carries an authentication block naming the device and,
//! on outbound messages, the signed digest of the payload.

/// Discriminates the payload of a [`DeviceMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum DeviceMessageKind {
    Welcome = 0,
    Control = 1,
    Feedback = 2,
}

/// Discriminates the payload of a [`FeedbackMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum FeedbackKind {
    Report = 0,
    Error = 1,
}

/// Names the device a message concerns and, for hub-to-device traffic,
/// carries the hex-encoded signed digest of the serialized payload.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceMessageAuthentication {
    #[prost(string, tag = "1")]
    pub device_id: String,
    #[prost(string, tag = "2")]
    pub message_digest: String,
}

/// Outer envelope for every message the hub writes to a device.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceMessage {
    #[prost(enumeration = "DeviceMessageKind", tag = "1")]
    pub kind: i32,
    #[prost(message, optional, tag = "2")]
    pub authentication: Option<DeviceMessageAuthentication>,
    /// Serialized inner message: a [`WelcomeMessage`] for `WELCOME`, a
    /// [`ControlMessage`] for `CONTROL`.
    #[prost(bytes = "vec", tag = "3")]
    pub payload: Vec<u8>,
}

/// First message a device receives after its registration is filled.
#[derive(Clone, PartialEq, prost::Message)]
pub struct WelcomeMessage {
    #[prost(string, tag = "1")]
    pub device_id: String,
    #[prost(string, tag = "2")]
    pub body: String,
    /// Hex-encoded PKIX public key of the server.
    #[prost(string, tag = "3")]
    pub shared_secret: String,
}

/// An ordered batch of color frames for the device to apply.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ControlMessage {
    #[prost(message, repeated, tag = "1")]
    pub frames: Vec<ControlFrame>,
}

/// One RGB frame; channels range 0-255.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ControlFrame {
    #[prost(uint32, tag = "1")]
    pub red: u32,
    #[prost(uint32, tag = "2")]
    pub green: u32,
    #[prost(uint32, tag = "3")]
    pub blue: u32,
}

/// Device-reported state snapshot.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ReportMessage {
    #[prost(uint32, tag = "1")]
    pub red: u32,
    #[prost(uint32, tag = "2")]
    pub green: u32,
    #[prost(uint32, tag = "3")]
    pub blue: u32,
}

/// Telemetry a device emits back to the hub; persisted verbatim into the
/// bounded per-device history.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FeedbackMessage {
    #[prost(message, optional, tag = "1")]
    pub authentication: Option<DeviceMessageAuthentication>,
    #[prost(enumeration = "FeedbackKind", tag = "2")]
    pub kind: i32,
    /// Serialized [`ReportMessage`] for `REPORT`; opaque for `ERROR`.
    #[prost(bytes = "vec", tag = "3")]
    pub payload: Vec<u8>,
}
