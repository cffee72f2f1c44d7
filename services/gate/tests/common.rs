use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy::{
    primitives::{hex, Address},
    signers::{local::PrivateKeySigner, SignerSync},
};
use async_trait::async_trait;
use onlystars_core::{GateMessage, GateMode, PostId};
use onlystars_gate::{
    spawn_gate, CreatorLedger, GateHandle, GateServices, GateSettings, KvStore, LedgerError,
    PersonalSignVerifier,
};
use reqwest::Client;

/// Scriptable ledger counting every read.
#[derive(Default)]
pub(crate) struct MockLedger {
    pub subscribed: AtomicBool,
    pub post_access: AtomicBool,
    pub failing: AtomicBool,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockLedger {
    pub fn set_subscribed(&self, value: bool) {
        self.subscribed.store(value, Ordering::SeqCst);
    }

    pub fn set_post_access(&self, value: bool) {
        self.post_access.store(value, Ordering::SeqCst);
    }

    pub fn set_failing(&self, value: bool) {
        self.failing.store(value, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn read(&self, flag: &AtomicBool) -> Result<bool, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Timeout(Duration::from_secs(8)));
        }
        Ok(flag.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl CreatorLedger for MockLedger {
    async fn is_subscription_active(
        &self,
        _user: Address,
        _creator: Address,
    ) -> Result<bool, LedgerError> {
        self.read(&self.subscribed)
    }

    async fn has_post_access(&self, _user: Address, _post_id: PostId) -> Result<bool, LedgerError> {
        self.read(&self.post_access)
    }
}

pub(crate) struct TestGate {
    pub client: Client,
    pub base_url: String,
    pub ledger: Arc<MockLedger>,
    pub handle: GateHandle,
}

/// Spawns a gate on an ephemeral port with in-memory storage and a mock ledger.
#[allow(dead_code)]
pub(crate) async fn spawn_test_gate(settings: GateSettings) -> TestGate {
    let ledger = Arc::new(MockLedger::default());
    let services = GateServices {
        kv: KvStore::in_memory(Duration::from_secs(2)),
        ledger: ledger.clone(),
        message_verifier: Arc::new(PersonalSignVerifier),
    };
    let listen_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    let handle = spawn_gate(listen_addr, &settings, services)
        .await
        .expect("spawn gate");

    let client = Client::builder().build().unwrap();
    let base_url = format!("http://{}", handle.listen_addr);
    wait_http_ready(&client, &base_url).await;

    TestGate {
        client,
        base_url,
        ledger,
        handle,
    }
}

/// Settings that never rate limit within a test.
#[allow(dead_code)]
pub(crate) fn relaxed_settings() -> GateSettings {
    GateSettings {
        rate_limit_max_requests: 1_000,
        ..GateSettings::default()
    }
}

#[allow(dead_code)]
pub(crate) async fn wait_http_ready(client: &Client, base: &str) {
    let deadline = std::time::Instant::now() + Duration::from_secs(30);
    loop {
        if let Ok(resp) = client.get(format!("{base}/health")).send().await {
            if resp.status().is_success() {
                break;
            }
        }
        if std::time::Instant::now() > deadline {
            panic!("gate not ready");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Signs the canonical message for the given request fields.
#[allow(dead_code)]
pub(crate) fn sign_challenge(
    signer: &PrivateKeySigner,
    mode: GateMode,
    nonce: &str,
    post_id: Option<&PostId>,
    creator: Option<Address>,
) -> (String, String) {
    let message = GateMessage {
        mode,
        account: signer.address(),
        nonce,
        post_id,
        creator,
    }
    .build();
    let sig = signer.sign_message_sync(message.as_bytes()).unwrap();
    (message, hex::encode_prefixed(sig.as_bytes()))
}
