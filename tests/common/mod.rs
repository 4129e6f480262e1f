//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{keccak256, Address, Bytes, B256};
use async_trait::async_trait;
use tokio::sync::Notify;

use fhe_refund_desk::domain::{
    BusinessData, CiphertextHandle, DecryptionResult, EncryptedInput, NewBusinessData, TxReceipt,
    VerifiedDecryption,
};
use fhe_refund_desk::infra::{
    FheClient, PendingTx, ProofSubmitter, ReadOnlyLedger, RefundError, Result, SignerLedger,
};
use fhe_refund_desk::{Dashboard, DashboardConfig, TaxCategory};

/// Test contract address
pub fn test_contract() -> Address {
    Address::repeat_byte(0xC0)
}

/// Account the fake wallet signs with
pub fn test_account() -> Address {
    Address::repeat_byte(0xA1)
}

/// Every collaborator call, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListIds,
    FetchRecord(String),
    FetchEncryptedValue(String),
    CheckAvailability,
    Encrypt(u64),
    CreateRecord(String),
    CreateConfirmed(String),
    Decrypt(Vec<CiphertextHandle>),
    Attest(String),
    AttestConfirmed(String),
}

struct StoredRecord {
    id: String,
    data: BusinessData,
    handle: CiphertextHandle,
}

#[derive(Default)]
struct WorldState {
    records: Vec<StoredRecord>,
    /// Plaintexts the fake FHE scheme can decrypt, keyed by handle
    vault: HashMap<CiphertextHandle, u64>,
    calls: Vec<Call>,
    next_nonce: u64,
    clock: u64,

    available: bool,
    fail_initialize: bool,
    fail_enumeration: bool,
    failing_fetches: HashSet<String>,
    reject_next_create: bool,
    revert_next_create: bool,
    fail_decrypt: bool,
    revert_attestation: bool,
    /// Attest, then resolve without any clear values
    drop_clear_values: bool,
    encrypted_for: Vec<Address>,
    /// Another verifier attests this record while our decryption runs
    race_on_decrypt: bool,
    confirmation_gate: Option<Arc<Notify>>,
}

/// Shared in-memory ledger and FHE scheme
#[derive(Clone)]
pub struct World {
    state: Arc<Mutex<WorldState>>,
    fhe_initialized: Arc<AtomicBool>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(WorldState {
                available: true,
                clock: 1_700_000_000,
                ..Default::default()
            })),
            fhe_initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut WorldState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn ledger(&self) -> Arc<FakeLedger> {
        Arc::new(FakeLedger {
            world: self.clone(),
        })
    }

    pub fn fhe(&self) -> Arc<FakeFhe> {
        Arc::new(FakeFhe {
            world: self.clone(),
        })
    }

    /// Dashboard wired to this world's fakes
    pub fn dashboard(&self) -> Dashboard {
        let ledger = self.ledger();
        Dashboard::new(
            ledger.clone(),
            ledger,
            self.fhe(),
            DashboardConfig::default(),
        )
    }

    /// Store a record directly on the ledger
    pub fn seed(&self, id: &str, name: &str, category: TaxCategory, amount: u64, verified: bool) {
        let handle = self.with(|s| {
            s.next_nonce += 1;
            handle_for(amount, s.next_nonce)
        });
        self.with(|s| {
            s.clock += 60;
            s.vault.insert(handle, amount);
            s.records.push(StoredRecord {
                id: id.to_string(),
                data: BusinessData {
                    name: name.to_string(),
                    public_value1: amount * 15 / 100,
                    public_value2: 0,
                    description: category.note(),
                    creator: test_account(),
                    timestamp: s.clock,
                    is_verified: verified,
                    decrypted_value: if verified { amount } else { 0 },
                },
                handle,
            });
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with(|s| s.calls.clear());
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    /// Position of the first call matching `pred`
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls().iter().position(pred)
    }

    pub fn record(&self, id: &str) -> Option<BusinessData> {
        self.with(|s| {
            s.records
                .iter()
                .find(|r| r.id == id)
                .map(|r| r.data.clone())
        })
    }

    pub fn record_ids(&self) -> Vec<String> {
        self.with(|s| s.records.iter().map(|r| r.id.clone()).collect())
    }

    pub fn set_available(&self, available: bool) {
        self.with(|s| s.available = available);
    }

    pub fn fail_initialize(&self) {
        self.with(|s| s.fail_initialize = true);
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.with(|s| s.fail_enumeration = fail);
    }

    pub fn fail_fetch(&self, id: &str) {
        self.with(|s| s.failing_fetches.insert(id.to_string()));
    }

    pub fn reject_next_create(&self) {
        self.with(|s| s.reject_next_create = true);
    }

    pub fn revert_next_create(&self) {
        self.with(|s| s.revert_next_create = true);
    }

    pub fn fail_decrypt(&self) {
        self.with(|s| s.fail_decrypt = true);
    }

    pub fn revert_attestation(&self) {
        self.with(|s| s.revert_attestation = true);
    }

    pub fn drop_clear_values(&self) {
        self.with(|s| s.drop_clear_values = true);
    }

    /// Accounts each input was encrypted for
    pub fn encrypted_for(&self) -> Vec<Address> {
        self.with(|s| s.encrypted_for.clone())
    }

    pub fn race_on_decrypt(&self) {
        self.with(|s| s.race_on_decrypt = true);
    }

    /// Hold creation confirmations until the returned gate is notified
    pub fn gate_confirmations(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.with(|s| s.confirmation_gate = Some(gate.clone()));
        gate
    }

    fn mark_verified(&self, id: &str, value: u64) -> Result<()> {
        self.with(|s| {
            let record = s
                .records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| RefundError::Ledger(format!("execution reverted: no record {id}")))?;
            if record.data.is_verified {
                return Err(RefundError::Ledger(
                    "execution reverted: Data already verified".into(),
                ));
            }
            record.data.is_verified = true;
            record.data.decrypted_value = value;
            Ok(())
        })
    }
}

fn handle_for(amount: u64, nonce: u64) -> CiphertextHandle {
    let mut seed = amount.to_be_bytes().to_vec();
    seed.extend_from_slice(&nonce.to_be_bytes());
    keccak256(seed)
}

fn tx_hash_for(label: &str) -> B256 {
    keccak256(label.as_bytes())
}

fn encode_clear_value(value: u64) -> Bytes {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    Bytes::from(word.to_vec())
}

fn decode_clear_value(bytes: &Bytes) -> Result<u64> {
    if bytes.len() != 32 {
        return Err(RefundError::Ledger("execution reverted: bad clear value".into()));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&bytes[24..]);
    Ok(u64::from_be_bytes(tail))
}

/// Ledger contract held in memory; serves as both the read-only and the
/// signer-bound handle.
pub struct FakeLedger {
    world: World,
}

#[async_trait]
impl ReadOnlyLedger for FakeLedger {
    fn contract_address(&self) -> Address {
        test_contract()
    }

    async fn get_all_business_ids(&self) -> Result<Vec<String>> {
        self.world.with(|s| {
            s.calls.push(Call::ListIds);
            if s.fail_enumeration {
                return Err(RefundError::Ledger("rpc timeout".into()));
            }
            Ok(s.records.iter().map(|r| r.id.clone()).collect())
        })
    }

    async fn get_business_data(&self, business_id: &str) -> Result<BusinessData> {
        self.world.with(|s| {
            s.calls.push(Call::FetchRecord(business_id.to_string()));
            if s.failing_fetches.contains(business_id) {
                return Err(RefundError::Ledger("execution reverted".into()));
            }
            s.records
                .iter()
                .find(|r| r.id == business_id)
                .map(|r| r.data.clone())
                .ok_or_else(|| RefundError::Ledger("execution reverted: unknown record".into()))
        })
    }

    async fn get_encrypted_value(&self, business_id: &str) -> Result<CiphertextHandle> {
        self.world.with(|s| {
            s.calls
                .push(Call::FetchEncryptedValue(business_id.to_string()));
            s.records
                .iter()
                .find(|r| r.id == business_id)
                .map(|r| r.handle)
                .ok_or_else(|| RefundError::Ledger("execution reverted: unknown record".into()))
        })
    }

    async fn is_available(&self) -> Result<bool> {
        self.world.with(|s| {
            s.calls.push(Call::CheckAvailability);
            Ok(s.available)
        })
    }
}

#[async_trait]
impl SignerLedger for FakeLedger {
    fn account(&self) -> Address {
        test_account()
    }

    async fn create_business_data(&self, request: NewBusinessData) -> Result<PendingTx> {
        let gate = self.world.with(|s| {
            s.calls.push(Call::CreateRecord(request.business_id.clone()));
            if s.reject_next_create {
                s.reject_next_create = false;
                return Err(RefundError::Ledger(
                    "user rejected transaction (code=ACTION_REJECTED)".into(),
                ));
            }
            if s.revert_next_create {
                s.revert_next_create = false;
                return Err(RefundError::Ledger("execution reverted: out of gas".into()));
            }
            Ok(s.confirmation_gate.clone())
        })?;

        let tx_hash = tx_hash_for(&format!("create:{}", request.business_id));
        let world = self.world.clone();
        Ok(PendingTx::new(tx_hash, async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            world.with(|s| {
                s.clock += 12;
                s.calls
                    .push(Call::CreateConfirmed(request.business_id.clone()));
                s.records.push(StoredRecord {
                    id: request.business_id,
                    data: BusinessData {
                        name: request.name,
                        public_value1: request.public_value1,
                        public_value2: request.public_value2,
                        description: request.description,
                        creator: test_account(),
                        timestamp: s.clock,
                        is_verified: false,
                        decrypted_value: 0,
                    },
                    handle: request.encrypted_value,
                });
            });
            Ok(TxReceipt {
                tx_hash,
                block_number: Some(1),
            })
        }))
    }

    async fn verify_decryption(
        &self,
        business_id: &str,
        abi_encoded_clear_values: Bytes,
        _decryption_proof: Bytes,
    ) -> Result<PendingTx> {
        self.world
            .with(|s| s.calls.push(Call::Attest(business_id.to_string())));
        if self.world.with(|s| s.revert_attestation) {
            return Err(RefundError::Ledger(
                "execution reverted: invalid decryption proof".into(),
            ));
        }
        let value = decode_clear_value(&abi_encoded_clear_values)?;
        if self
            .world
            .record(business_id)
            .is_some_and(|r| r.is_verified)
        {
            return Err(RefundError::Ledger(
                "execution reverted: Data already verified".into(),
            ));
        }

        let tx_hash = tx_hash_for(&format!("attest:{business_id}"));
        let world = self.world.clone();
        let id = business_id.to_string();
        Ok(PendingTx::new(tx_hash, async move {
            world.mark_verified(&id, value)?;
            world.with(|s| s.calls.push(Call::AttestConfirmed(id)));
            Ok(TxReceipt {
                tx_hash,
                block_number: Some(2),
            })
        }))
    }
}

/// FHE scheme that "encrypts" by remembering plaintexts under a hash.
pub struct FakeFhe {
    world: World,
}

#[async_trait]
impl FheClient for FakeFhe {
    async fn initialize(&self) -> Result<()> {
        if self.world.with(|s| s.fail_initialize) {
            return Err(RefundError::Fhe("relayer unreachable".into()));
        }
        self.world.fhe_initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.world.fhe_initialized.load(Ordering::SeqCst)
    }

    async fn encrypt(
        &self,
        _contract: Address,
        account: Address,
        value: u64,
    ) -> Result<EncryptedInput> {
        let handle = self.world.with(|s| {
            s.calls.push(Call::Encrypt(value));
            s.encrypted_for.push(account);
            s.next_nonce += 1;
            let handle = handle_for(value, s.next_nonce);
            s.vault.insert(handle, value);
            handle
        });
        Ok(EncryptedInput {
            handle,
            proof: Bytes::from_static(b"input-proof"),
        })
    }

    async fn verify_decryption(
        &self,
        handles: &[CiphertextHandle],
        _contract: Address,
        on_proof_ready: &dyn ProofSubmitter,
    ) -> Result<VerifiedDecryption> {
        let (clear_values, race) = self.world.with(|s| {
            s.calls.push(Call::Decrypt(handles.to_vec()));
            let values = handles
                .iter()
                .map(|h| {
                    s.vault
                        .get(h)
                        .map(|v| (*h, *v))
                        .ok_or_else(|| RefundError::Fhe(format!("unknown handle {h}")))
                })
                .collect::<Result<HashMap<_, _>>>();
            (values, s.race_on_decrypt)
        });
        if self.world.with(|s| s.fail_decrypt) {
            return Err(RefundError::Fhe("kms unreachable".into()));
        }
        let clear_values = clear_values?;

        let first = handles
            .first()
            .and_then(|h| clear_values.get(h).copied())
            .ok_or_else(|| RefundError::Fhe("nothing to decrypt".into()))?;

        if race {
            let id = self.world.with(|s| {
                s.records
                    .iter()
                    .find(|r| handles.contains(&r.handle))
                    .map(|r| r.id.clone())
            });
            if let Some(id) = id {
                self.world.mark_verified(&id, first)?;
            }
        }

        let pending = on_proof_ready
            .submit_proof(encode_clear_value(first), Bytes::from_static(b"kms-proof"))
            .await?;
        let attestation = pending.wait().await?;

        let clear_values = if self.world.with(|s| s.drop_clear_values) {
            HashMap::new()
        } else {
            clear_values
        };
        Ok(VerifiedDecryption {
            decryption_result: DecryptionResult { clear_values },
            attestation,
        })
    }
}
