//! The request dispatch state machine.
//!
//! Four strictly sequential states, terminal on first failure:
//! parse, key resolution, dispatch, serialize. Independent requests run
//! concurrently with no shared per-request state; the [`KeyStore`] is the
//! only shared resource.

use std::sync::Arc;
use tracing::{debug, error};

use super::wire::{ErrorCode, Operation, Outcome, SigningRequest};
use crate::crypto;
use crate::store::KeyStore;

/// Entry point for one raw request body.
///
/// Holds only shared references. A decoded private key is scoped to a
/// single [`RequestHandler::handle`] call and is never retained or cached
/// beyond it.
pub struct RequestHandler {
    store: Arc<KeyStore>,
}

impl RequestHandler {
    /// Create a handler over the shared key store.
    #[must_use]
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self { store }
    }

    /// Run the dispatch states over a raw body and return the outcome.
    pub async fn handle(&self, body: &[u8]) -> Outcome {
        // State 1: parse. Failure stops before any store access.
        let request = match SigningRequest::parse(body) {
            Ok(request) => request,
            Err(code) => return Outcome::failure(code),
        };

        // State 2: key resolution. Absence covers both a genuine miss and a
        // disconnected store.
        let key_bytes = match self.store.get(&request.spki).await {
            Some(bytes) => bytes,
            None => {
                debug!(fingerprint = %request.spki, "No key provisioned for fingerprint");
                return Outcome::failure(ErrorCode::NotFound);
            }
        };
        let key = match crypto::load_private_key(&key_bytes) {
            Ok(key) => key,
            Err(e) => {
                error!(fingerprint = %request.spki, error = %e, "Stored bytes are not a usable private key");
                return Outcome::failure(ErrorCode::Unspecified);
            }
        };

        // State 3: dispatch. Unrecognized methods cannot reach this state;
        // parsing already filtered them.
        let result = match request.operation {
            Operation::Sign { digest } => {
                crypto::sign_transcript(&request.input, &key, digest)
            }
            Operation::Decrypt => crypto::decrypt_premaster(&request.input, &key),
        };

        // State 4: classify. The cause stays in the logs; the wire sees one
        // undifferentiated code.
        match result {
            Ok(data) => Outcome::Success { data },
            Err(e) => {
                error!(fingerprint = %request.spki, error = %e, "Crypto operation failed");
                Outcome::failure(ErrorCode::Unspecified)
            }
        }
    }

    /// Handle a body and serialize the response envelope.
    pub async fn handle_to_json(&self, body: &[u8]) -> String {
        self.handle(body).await.to_json()
    }
}
