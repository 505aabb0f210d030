//! Remote handshake service contract and its wire forms.
//!
//! [`RemoteExchange`] implements the contract by sending the JSON bodies
//! below over any [`ServiceTransport`].

use async_trait::async_trait;
use num_bigint::BigUint;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::crypto::{format_biguint, parse_biguint, DomainParams, Radix};
use crate::error::{Error, Result};

/// Progress of a handshake
///
/// Transitions only move forward: `NotStarted → Initiated → Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    /// No handshake recorded for the pair
    NotStarted,
    /// The initiator published its public value
    Initiated,
    /// Both public values are known
    Completed,
}

impl HandshakeState {
    /// Numeric status used by the remote service
    pub fn code(self) -> u8 {
        match self {
            HandshakeState::NotStarted => 0,
            HandshakeState::Initiated => 1,
            HandshakeState::Completed => 2,
        }
    }

    /// Decode a numeric status
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(HandshakeState::NotStarted),
            1 => Ok(HandshakeState::Initiated),
            2 => Ok(HandshakeState::Completed),
            other => Err(Error::RemoteServiceError(format!("unknown handshake status {}", other))),
        }
    }
}

/// What the remote service knows about a pair's handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStatus {
    /// Handshake progress
    pub state: HandshakeState,
    /// Domain parameters the initiator announced
    pub params: Option<DomainParams>,
    /// Initiator's public value
    pub initiator_public: Option<BigUint>,
    /// Responder's public value
    pub responder_public: Option<BigUint>,
}

impl RemoteStatus {
    /// Status for a pair with no recorded handshake
    pub fn not_started() -> Self {
        Self {
            state: HandshakeState::NotStarted,
            params: None,
            initiator_public: None,
            responder_public: None,
        }
    }
}

/// Remote procedure calls that carry public values between the two parties
///
/// The service authenticates the caller, so each call names only the peer.
#[async_trait]
pub trait KeyExchangeService: Send + Sync {
    /// Publish the initiator's public value and the domain parameters
    async fn initiate(
        &self,
        peer: &str,
        generator: &BigUint,
        prime: &BigUint,
        local_public: &BigUint,
    ) -> Result<bool>;

    /// Publish the responder's public value
    async fn complete(&self, peer: &str, local_public: &BigUint) -> Result<bool>;

    /// Current handshake record for the pair
    async fn query_status(&self, peer: &str) -> Result<RemoteStatus>;
}

// ============================================================================
// WIRE FORMS
// ============================================================================

/// `initiate` request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    /// Peer identity
    pub peer: String,
    /// Generator
    pub dh_generator: String,
    /// Prime
    pub dh_prime: String,
    /// Caller's public value
    pub public_value: String,
    /// Radix of every numeric field
    pub radix: Radix,
}

impl InitiateRequest {
    /// Build a request with numbers rendered in `radix`
    pub fn new(peer: &str, params: &DomainParams, local_public: &BigUint, radix: Radix) -> Self {
        Self {
            peer: peer.to_string(),
            dh_generator: format_biguint(params.generator(), radix),
            dh_prime: format_biguint(params.prime(), radix),
            public_value: format_biguint(local_public, radix),
            radix,
        }
    }
}

/// `complete` request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    /// Peer identity
    pub peer: String,
    /// Caller's public value
    pub public_value: String,
    /// Radix of `public_value`
    pub radix: Radix,
}

impl CompleteRequest {
    /// Build a request with the value rendered in `radix`
    pub fn new(peer: &str, local_public: &BigUint, radix: Radix) -> Self {
        Self {
            peer: peer.to_string(),
            public_value: format_biguint(local_public, radix),
            radix,
        }
    }
}

/// `queryStatus` request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    /// Peer identity
    pub peer: String,
    /// Radix the response should use
    pub radix: Radix,
}

/// Response to `initiate` and `complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedResponse {
    /// Whether the service recorded the value
    pub accepted: bool,
}

/// `queryStatus` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// 0 not started, 1 initiated, 2 completed
    pub status: u8,
    /// Prime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dh_prime: Option<String>,
    /// Generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dh_generator: Option<String>,
    /// Initiator's public value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_public: Option<String>,
    /// Responder's public value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder_public: Option<String>,
    /// Radix of every numeric field
    pub radix: Radix,
}

fn parse_opt(value: Option<&str>, radix: Radix) -> Result<Option<BigUint>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_biguint(v, radix))
        .transpose()
}

impl StatusResponse {
    /// Render a status for the wire
    pub fn from_status(status: &RemoteStatus, radix: Radix) -> Self {
        Self {
            status: status.state.code(),
            dh_prime: status.params.as_ref().map(|p| format_biguint(p.prime(), radix)),
            dh_generator: status.params.as_ref().map(|p| format_biguint(p.generator(), radix)),
            initiator_public: status.initiator_public.as_ref().map(|v| format_biguint(v, radix)),
            responder_public: status.responder_public.as_ref().map(|v| format_biguint(v, radix)),
            radix,
        }
    }

    /// Decode into typed values
    pub fn into_status(self) -> Result<RemoteStatus> {
        let state = HandshakeState::from_code(self.status)?;
        let params = match (self.dh_prime.as_deref(), self.dh_generator.as_deref()) {
            (Some(p), Some(g)) => Some(DomainParams::parse(p, g, self.radix)?),
            (None, None) => None,
            _ => {
                return Err(Error::RemoteServiceError(
                    "status carries only one domain parameter".into(),
                ))
            }
        };

        Ok(RemoteStatus {
            state,
            params,
            initiator_public: parse_opt(self.initiator_public.as_deref(), self.radix)?,
            responder_public: parse_opt(self.responder_public.as_deref(), self.radix)?,
        })
    }
}

// ============================================================================
// JSON CLIENT
// ============================================================================

/// Method names on the remote handshake service
pub mod methods {
    /// Publish the initiator's value
    pub const INITIATE: &str = "initiate";
    /// Publish the responder's value
    pub const COMPLETE: &str = "complete";
    /// Read the pair's record
    pub const QUERY_STATUS: &str = "queryStatus";
}

/// Carries one JSON request to the handshake service and returns its reply
#[async_trait]
pub trait ServiceTransport: Send + Sync {
    /// Invoke `method` with a JSON body
    async fn call(&self, method: &str, body: serde_json::Value) -> Result<serde_json::Value>;
}

/// [`KeyExchangeService`] that speaks the wire forms over a transport
#[derive(Debug, Clone)]
pub struct RemoteExchange<T> {
    transport: T,
    radix: Radix,
}

impl<T: ServiceTransport> RemoteExchange<T> {
    /// Client rendering numbers in `radix`
    pub fn new(transport: T, radix: Radix) -> Self {
        Self { transport, radix }
    }

    async fn invoke<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_value(request)?;
        let reply = self.transport.call(method, body).await?;
        serde_json::from_value(reply)
            .map_err(|e| Error::RemoteServiceError(format!("bad {} response: {}", method, e)))
    }
}

#[async_trait]
impl<T: ServiceTransport> KeyExchangeService for RemoteExchange<T> {
    async fn initiate(
        &self,
        peer: &str,
        generator: &BigUint,
        prime: &BigUint,
        local_public: &BigUint,
    ) -> Result<bool> {
        let params = DomainParams::new(prime.clone(), generator.clone())?;
        let request = InitiateRequest::new(peer, &params, local_public, self.radix);
        let response: AcceptedResponse = self.invoke(methods::INITIATE, &request).await?;
        Ok(response.accepted)
    }

    async fn complete(&self, peer: &str, local_public: &BigUint) -> Result<bool> {
        let request = CompleteRequest::new(peer, local_public, self.radix);
        let response: AcceptedResponse = self.invoke(methods::COMPLETE, &request).await?;
        Ok(response.accepted)
    }

    async fn query_status(&self, peer: &str) -> Result<RemoteStatus> {
        let request = StatusRequest {
            peer: peer.to_string(),
            radix: self.radix,
        };
        let response: StatusResponse = self.invoke(methods::QUERY_STATUS, &request).await?;
        response.into_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        for state in [
            HandshakeState::NotStarted,
            HandshakeState::Initiated,
            HandshakeState::Completed,
        ] {
            assert_eq!(HandshakeState::from_code(state.code()).unwrap(), state);
        }
        assert!(HandshakeState::from_code(7).is_err());
        assert!(HandshakeState::NotStarted < HandshakeState::Completed);
    }

    #[test]
    fn test_status_wire_decoding() {
        let json = r#"{
            "status": 1,
            "dhPrime": "17",
            "dhGenerator": "5",
            "initiatorPublic": "8",
            "radix": "hex"
        }"#;
        let resp: StatusResponse = serde_json::from_str(json).unwrap();
        let status = resp.into_status().unwrap();

        assert_eq!(status.state, HandshakeState::Initiated);
        let params = status.params.unwrap();
        assert_eq!(params.prime(), &BigUint::from(23u32));
        assert_eq!(status.initiator_public, Some(BigUint::from(8u32)));
        assert_eq!(status.responder_public, None);
    }

    #[test]
    fn test_status_decimal_radix() {
        let resp = StatusResponse {
            status: 2,
            dh_prime: Some("23".into()),
            dh_generator: Some("5".into()),
            initiator_public: Some("8".into()),
            responder_public: Some("19".into()),
            radix: Radix::Decimal,
        };
        let status = resp.into_status().unwrap();
        assert_eq!(status.responder_public, Some(BigUint::from(19u32)));
    }

    #[test]
    fn test_status_rejects_half_params() {
        let resp = StatusResponse {
            status: 1,
            dh_prime: Some("23".into()),
            dh_generator: None,
            initiator_public: None,
            responder_public: None,
            radix: Radix::Decimal,
        };
        assert!(matches!(resp.into_status(), Err(Error::RemoteServiceError(_))));
    }

    #[test]
    fn test_initiate_request_fields() {
        let params = DomainParams::new(BigUint::from(23u32), BigUint::from(5u32)).unwrap();
        let req = InitiateRequest::new("bob", &params, &BigUint::from(8u32), Radix::Decimal);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["dhPrime"], "23");
        assert_eq!(json["dhGenerator"], "5");
        assert_eq!(json["publicValue"], "8");
        assert_eq!(json["radix"], "decimal");
    }
}
