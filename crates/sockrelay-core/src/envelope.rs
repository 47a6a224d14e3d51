//! Request envelope — the JSON body sent to every instance.
//!
//! On the wire the envelope is `{"url": <destination>, "data": <payload>}`.

use hyper::body::Bytes;
use serde::Serialize;

/// Destination plus payload, serialized once per dispatch call and reused
/// for every attempt.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T> {
    /// Logical destination the instance should forward to.
    #[serde(rename = "url")]
    pub destination: &'a str,

    /// Arbitrary caller payload.
    #[serde(rename = "data")]
    pub payload: &'a T,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn new(destination: &'a str, payload: &'a T) -> Self {
        Self {
            destination,
            payload,
        }
    }

    /// Encode the envelope as a JSON request body.
    pub fn to_bytes(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}
