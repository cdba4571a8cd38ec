#![allow(dead_code)]

use hmac::{Hmac, Mac};
use journal_core::crypto::{CryptoProvider, SymmetricKey};
use journal_core::error::{BoxError, CryptoError};
use journal_core::transport::{HttpBackend, HttpRequest, HttpResponse, Transport};
use journal_core::{JournalClient, JournalEntry, Url};
use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use sha2::Sha256;
use std::collections::VecDeque;
use std::sync::Arc;
use zeroize::Zeroizing;

pub const BASE: &str = "https://journal.example/";

pub fn key() -> SymmetricKey {
    SymmetricKey::from_bytes(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap()
}

pub fn hmac_hex(key: &SymmetricKey, data: &[u8]) -> String {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key.as_bytes()).unwrap();
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Identity "cipher" with a real HMAC, so chain ids can be checked by hand.
#[derive(Debug, Default)]
pub struct PlainProvider;

impl CryptoProvider for PlainProvider {
    fn encrypt(&self, _key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(
        &self,
        _key: &SymmetricKey,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        Ok(Zeroizing::new(ciphertext.to_vec()))
    }

    fn hmac(&self, key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> HttpResponse {
    HttpResponse::new(status, body)
}

fn last_param(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "last")
        .map(|(_, v)| v.into_owned())
}

#[derive(Default)]
struct ServerState {
    entries: Vec<JournalEntry>,
    requests: Vec<HttpRequest>,
    injected: VecDeque<HttpResponse>,
}

/// In-memory journal server. GET returns entries after `last`; POST appends,
/// rejecting with 409 when `last` is not the current tip and
/// `enforce_last` is set.
pub struct FakeJournalServer {
    state: Mutex<ServerState>,
    enforce_last: bool,
}

impl FakeJournalServer {
    pub fn new(enforce_last: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ServerState::default()),
            enforce_last,
        })
    }

    pub fn seed(&self, entries: Vec<JournalEntry>) {
        self.state.lock().entries.extend(entries);
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.state.lock().entries.clone()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    pub fn replace(&self, index: usize, entry: JournalEntry) {
        self.state.lock().entries[index] = entry;
    }

    /// Answer the next request with `response` instead of serving it.
    pub fn inject(&self, response: HttpResponse) {
        self.state.lock().injected.push_back(response);
    }
}

impl HttpBackend for FakeJournalServer {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        if let Some(response) = state.injected.pop_front() {
            return Ok(response);
        }

        let last = last_param(&request.url);
        if request.method == Method::GET {
            let start = match last {
                None => 0,
                Some(ref uid) => match state.entries.iter().position(|e| e.uid() == uid) {
                    Some(pos) => pos + 1,
                    None => return Ok(json_response(StatusCode::NOT_FOUND, b"{}".to_vec())),
                },
            };
            let body = serde_json::to_vec(&state.entries[start..])?;
            return Ok(json_response(StatusCode::OK, body));
        }

        if request.method == Method::POST {
            let incoming: Vec<JournalEntry> =
                serde_json::from_slice(request.body.as_deref().unwrap_or_default())?;
            let tip = state.entries.last().map(|e| e.uid().to_owned());
            if self.enforce_last && last != tip {
                return Ok(json_response(
                    StatusCode::CONFLICT,
                    br#"{"detail":"stale last"}"#.to_vec(),
                ));
            }
            state.entries.extend(incoming);
            return Ok(json_response(StatusCode::OK, b"{}".to_vec()));
        }

        Ok(json_response(StatusCode::METHOD_NOT_ALLOWED, Vec::new()))
    }
}

pub fn client_for(backend: Arc<dyn HttpBackend>, crypto: Arc<dyn CryptoProvider>) -> JournalClient {
    let transport = Transport::with_backend(backend, None).unwrap();
    JournalClient::new(transport, crypto, &Url::parse(BASE).unwrap(), "abc").unwrap()
}
