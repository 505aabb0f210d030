//! In-process handshake service.
//!
//! Plays the role of the remote directory for two or more local clients:
//! every [`LoopbackClient`] shares one record table keyed by user pair.
//! A client also answers the JSON wire forms as a [`ServiceTransport`], so
//! a [`RemoteExchange`](super::RemoteExchange) can be run against it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use parking_lot::Mutex;

use super::service::{
    methods, AcceptedResponse, CompleteRequest, HandshakeState, InitiateRequest,
    KeyExchangeService, RemoteStatus, ServiceTransport, StatusRequest, StatusResponse,
};
use crate::crypto::{parse_biguint, DomainParams};
use crate::error::{Error, Result};
use crate::storage::pair_key;

#[derive(Debug, Clone)]
struct Record {
    initiator: String,
    state: HandshakeState,
    params: DomainParams,
    initiator_public: BigUint,
    responder_public: Option<BigUint>,
}

/// Shared record table
#[derive(Debug, Clone, Default)]
pub struct LoopbackExchange {
    records: Arc<Mutex<HashMap<String, Record>>>,
}

impl LoopbackExchange {
    /// Create an empty exchange
    pub fn new() -> Self {
        Self::default()
    }

    /// A service handle acting as `identity`
    pub fn client(&self, identity: impl Into<String>) -> LoopbackClient {
        LoopbackClient {
            identity: identity.into(),
            records: Arc::clone(&self.records),
        }
    }

    /// Drop the record for a pair
    pub fn reset(&self, a: &str, b: &str) {
        self.records.lock().remove(&pair_key(a, b));
    }
}

/// One caller's view of a [`LoopbackExchange`]
#[derive(Debug, Clone)]
pub struct LoopbackClient {
    identity: String,
    records: Arc<Mutex<HashMap<String, Record>>>,
}

#[async_trait]
impl KeyExchangeService for LoopbackClient {
    async fn initiate(
        &self,
        peer: &str,
        generator: &BigUint,
        prime: &BigUint,
        local_public: &BigUint,
    ) -> Result<bool> {
        let params = DomainParams::new(prime.clone(), generator.clone())?;
        let mut records = self.records.lock();
        let key = pair_key(&self.identity, peer);

        // Only the original initiator may re-publish before completion
        if let Some(existing) = records.get(&key) {
            if existing.initiator != self.identity || existing.state == HandshakeState::Completed {
                return Ok(false);
            }
        }

        records.insert(
            key,
            Record {
                initiator: self.identity.clone(),
                state: HandshakeState::Initiated,
                params,
                initiator_public: local_public.clone(),
                responder_public: None,
            },
        );
        Ok(true)
    }

    async fn complete(&self, peer: &str, local_public: &BigUint) -> Result<bool> {
        let mut records = self.records.lock();
        match records.get_mut(&pair_key(&self.identity, peer)) {
            Some(record)
                if record.state == HandshakeState::Initiated && record.initiator != self.identity =>
            {
                record.responder_public = Some(local_public.clone());
                record.state = HandshakeState::Completed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn query_status(&self, peer: &str) -> Result<RemoteStatus> {
        let records = self.records.lock();
        Ok(match records.get(&pair_key(&self.identity, peer)) {
            Some(record) => RemoteStatus {
                state: record.state,
                params: Some(record.params.clone()),
                initiator_public: Some(record.initiator_public.clone()),
                responder_public: record.responder_public.clone(),
            },
            None => RemoteStatus::not_started(),
        })
    }
}

fn request<T: serde::de::DeserializeOwned>(method: &str, body: serde_json::Value) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|e| Error::RemoteServiceError(format!("bad {} request: {}", method, e)))
}

#[async_trait]
impl ServiceTransport for LoopbackClient {
    async fn call(&self, method: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        match method {
            methods::INITIATE => {
                let req: InitiateRequest = request(method, body)?;
                let accepted = self
                    .initiate(
                        &req.peer,
                        &parse_biguint(&req.dh_generator, req.radix)?,
                        &parse_biguint(&req.dh_prime, req.radix)?,
                        &parse_biguint(&req.public_value, req.radix)?,
                    )
                    .await?;
                Ok(serde_json::to_value(AcceptedResponse { accepted })?)
            }
            methods::COMPLETE => {
                let req: CompleteRequest = request(method, body)?;
                let accepted = self
                    .complete(&req.peer, &parse_biguint(&req.public_value, req.radix)?)
                    .await?;
                Ok(serde_json::to_value(AcceptedResponse { accepted })?)
            }
            methods::QUERY_STATUS => {
                let req: StatusRequest = request(method, body)?;
                let status = self.query_status(&req.peer).await?;
                Ok(serde_json::to_value(StatusResponse::from_status(&status, req.radix))?)
            }
            other => Err(Error::RemoteServiceError(format!("unknown method {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandshakeConfig;
    use crate::crypto::Radix;
    use crate::exchange::{KeyExchangeCoordinator, RemoteExchange};
    use crate::storage::SecretStore;
    use std::time::Duration;
    use tokio_test::{assert_ok, block_on};

    #[test]
    fn test_initiate_rejects_bad_params() {
        let exchange = LoopbackExchange::new();
        let alice = exchange.client("alice");

        // Generator outside the group
        let result = block_on(alice.initiate(
            "bob",
            &BigUint::from(30u32),
            &BigUint::from(23u32),
            &BigUint::from(8u32),
        ));
        assert!(result.is_err());

        let status = assert_ok!(block_on(alice.query_status("bob")));
        assert_eq!(status.state, HandshakeState::NotStarted);
    }

    #[tokio::test]
    async fn test_record_lifecycle() {
        let exchange = LoopbackExchange::new();
        let alice = exchange.client("alice");
        let bob = exchange.client("bob");
        let g = BigUint::from(5u32);
        let p = BigUint::from(23u32);

        assert_eq!(
            bob.query_status("alice").await.unwrap().state,
            HandshakeState::NotStarted
        );

        assert!(alice.initiate("bob", &g, &p, &BigUint::from(8u32)).await.unwrap());
        // Bob cannot hijack the initiator role
        assert!(!bob.initiate("alice", &g, &p, &BigUint::from(19u32)).await.unwrap());
        // Alice cannot answer her own handshake
        assert!(!alice.complete("bob", &BigUint::from(8u32)).await.unwrap());

        let status = bob.query_status("alice").await.unwrap();
        assert_eq!(status.state, HandshakeState::Initiated);
        assert_eq!(status.initiator_public, Some(BigUint::from(8u32)));

        assert!(bob.complete("alice", &BigUint::from(19u32)).await.unwrap());
        let status = alice.query_status("bob").await.unwrap();
        assert_eq!(status.state, HandshakeState::Completed);
        assert_eq!(status.responder_public, Some(BigUint::from(19u32)));

        exchange.reset("bob", "alice");
        assert_eq!(
            alice.query_status("bob").await.unwrap().state,
            HandshakeState::NotStarted
        );
    }

    #[test]
    fn test_json_wire_round_trip() {
        let exchange = LoopbackExchange::new();
        let alice = RemoteExchange::new(exchange.client("alice"), Radix::Hex);
        let bob = RemoteExchange::new(exchange.client("bob"), Radix::Decimal);
        let g = BigUint::from(5u32);
        let p = BigUint::from(23u32);

        assert!(assert_ok!(block_on(alice.initiate("bob", &g, &p, &BigUint::from(8u32)))));
        let status = assert_ok!(block_on(bob.query_status("alice")));
        assert_eq!(status.state, HandshakeState::Initiated);
        assert_eq!(status.params.map(|d| d.prime().clone()), Some(p));
        assert_eq!(status.initiator_public, Some(BigUint::from(8u32)));

        assert!(assert_ok!(block_on(bob.complete("alice", &BigUint::from(19u32)))));
        let status = assert_ok!(block_on(alice.query_status("bob")));
        assert_eq!(status.state, HandshakeState::Completed);
        assert_eq!(status.responder_public, Some(BigUint::from(19u32)));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let exchange = LoopbackExchange::new();
        let client = exchange.client("alice");
        assert!(matches!(
            block_on(client.call("rotate", serde_json::json!({}))),
            Err(Error::RemoteServiceError(_))
        ));
        assert!(matches!(
            block_on(client.call(methods::COMPLETE, serde_json::json!({"peer": 1}))),
            Err(Error::RemoteServiceError(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_coordinators_over_json_client() {
        let exchange = LoopbackExchange::new();
        let coordinator = |who: &str| {
            KeyExchangeCoordinator::with_params(
                who,
                DomainParams::standard(),
                Arc::new(RemoteExchange::new(exchange.client(who), Radix::Hex)),
                SecretStore::in_memory(),
                HandshakeConfig::default(),
            )
        };
        let alice = coordinator("alice");
        let bob = coordinator("bob");

        let (a, b) = tokio::join!(alice.try_establish("bob"), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            bob.try_establish("alice").await
        });
        assert_eq!(a.unwrap(), b.unwrap());
    }
}
