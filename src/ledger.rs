//! On-chain refund ledger
//!
//! alloy-backed implementations of [`ReadOnlyLedger`] and [`SignerLedger`]
//! for the encrypted tax-record contract.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use tracing::info;

use crate::domain::{BusinessData, CiphertextHandle, NewBusinessData, TxReceipt};
use crate::infra::{PendingTx, ReadOnlyLedger, RefundError, Result, SignerLedger};

/// Default chain (Sepolia)
pub const DEFAULT_CHAIN_ID: u64 = 11_155_111;

// Generate contract bindings
sol! {
    #[sol(rpc)]
    interface ITaxRefundLedger {
        function createBusinessData(
            string calldata businessId,
            string calldata name,
            bytes32 encryptedValue,
            bytes calldata inputProof,
            uint256 publicValue1,
            uint256 publicValue2,
            string calldata description
        ) external;

        function verifyDecryption(
            string calldata businessId,
            bytes calldata abiEncodedClearValue,
            bytes calldata decryptionProof
        ) external;

        function getAllBusinessIds() external view returns (string[] memory);

        function getBusinessData(string calldata businessId) external view returns (
            string memory name,
            uint256 publicValue1,
            uint256 publicValue2,
            string memory description,
            address creator,
            uint256 timestamp,
            bool isVerified,
            uint32 decryptedValue
        );

        function getEncryptedValue(string calldata businessId) external view returns (bytes32);

        function isAvailable() external view returns (bool);
    }
}

/// Ledger connection configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Refund ledger contract address
    pub contract_address: Address,
    /// Private key of the signing account; read-only when absent
    pub private_key: Option<String>,
    /// Chain the signing endpoint must be on
    pub chain_id: u64,
}

impl LedgerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Option<Self> {
        let rpc_url = std::env::var("TAX_LEDGER_RPC_URL").ok()?;
        let contract_address = std::env::var("TAX_LEDGER_CONTRACT_ADDRESS")
            .ok()
            .and_then(|s| s.parse().ok())?;
        let private_key = std::env::var("TAX_LEDGER_PRIVATE_KEY").ok();
        let chain_id = std::env::var("TAX_LEDGER_CHAIN_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHAIN_ID);

        Some(Self {
            rpc_url,
            contract_address,
            private_key,
            chain_id,
        })
    }
}

fn rpc_error(context: &str, e: impl std::fmt::Display) -> RefundError {
    RefundError::Ledger(format!("{context}: {e}"))
}

/// Refuse to sign against a node on another chain
fn ensure_chain(expected: u64, actual: u64) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RefundError::Configuration(format!(
            "RPC endpoint is on chain {actual}, expected {expected}"
        )))
    }
}

fn to_u64(value: U256) -> u64 {
    value.saturating_to::<u64>()
}

/// Read-only contract handle
pub struct AlloyLedger {
    config: LedgerConfig,
}

impl AlloyLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }

    /// Signer-bound handle for the same contract.
    ///
    /// Fails when no private key is configured.
    pub fn signer(&self) -> Result<AlloySignerLedger> {
        let key = self.config.private_key.as_deref().ok_or_else(|| {
            RefundError::Configuration("TAX_LEDGER_PRIVATE_KEY is not set".into())
        })?;
        let signer: PrivateKeySigner = key
            .parse()
            .map_err(|e| RefundError::Configuration(format!("Invalid private key: {}", e)))?;
        Ok(AlloySignerLedger {
            config: self.config.clone(),
            signer,
        })
    }
}

#[async_trait]
impl ReadOnlyLedger for AlloyLedger {
    fn contract_address(&self) -> Address {
        self.config.contract_address
    }

    async fn get_all_business_ids(&self) -> Result<Vec<String>> {
        let provider = ProviderBuilder::new().on_http(
            self.config
                .rpc_url
                .parse()
                .map_err(|e| RefundError::Configuration(format!("Invalid RPC URL: {}", e)))?,
        );
        let contract = ITaxRefundLedger::new(self.config.contract_address, &provider);

        let ids = contract
            .getAllBusinessIds()
            .call()
            .await
            .map_err(|e| rpc_error("Contract call failed", e))?;

        Ok(ids._0)
    }

    async fn get_business_data(&self, business_id: &str) -> Result<BusinessData> {
        let provider = ProviderBuilder::new().on_http(
            self.config
                .rpc_url
                .parse()
                .map_err(|e| RefundError::Configuration(format!("Invalid RPC URL: {}", e)))?,
        );
        let contract = ITaxRefundLedger::new(self.config.contract_address, &provider);

        let data = contract
            .getBusinessData(business_id.to_string())
            .call()
            .await
            .map_err(|e| rpc_error("Contract call failed", e))?;

        Ok(BusinessData {
            name: data.name,
            public_value1: to_u64(data.publicValue1),
            public_value2: to_u64(data.publicValue2),
            description: data.description,
            creator: data.creator,
            timestamp: to_u64(data.timestamp),
            is_verified: data.isVerified,
            decrypted_value: u64::from(data.decryptedValue),
        })
    }

    async fn get_encrypted_value(&self, business_id: &str) -> Result<CiphertextHandle> {
        let provider = ProviderBuilder::new().on_http(
            self.config
                .rpc_url
                .parse()
                .map_err(|e| RefundError::Configuration(format!("Invalid RPC URL: {}", e)))?,
        );
        let contract = ITaxRefundLedger::new(self.config.contract_address, &provider);

        let handle = contract
            .getEncryptedValue(business_id.to_string())
            .call()
            .await
            .map_err(|e| rpc_error("Contract call failed", e))?;

        Ok(handle._0)
    }

    async fn is_available(&self) -> Result<bool> {
        let provider = ProviderBuilder::new().on_http(
            self.config
                .rpc_url
                .parse()
                .map_err(|e| RefundError::Configuration(format!("Invalid RPC URL: {}", e)))?,
        );
        let contract = ITaxRefundLedger::new(self.config.contract_address, &provider);

        let available = contract
            .isAvailable()
            .call()
            .await
            .map_err(|e| rpc_error("Contract call failed", e))?;

        Ok(available._0)
    }
}

/// Contract handle that signs with the configured key
pub struct AlloySignerLedger {
    config: LedgerConfig,
    signer: PrivateKeySigner,
}

#[async_trait]
impl SignerLedger for AlloySignerLedger {
    fn account(&self) -> Address {
        self.signer.address()
    }

    async fn create_business_data(&self, request: NewBusinessData) -> Result<PendingTx> {
        info!(
            record_id = %request.business_id,
            account = %self.account(),
            "Submitting encrypted tax record"
        );

        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(self.signer.clone()))
            .on_http(
                self.config
                    .rpc_url
                    .parse()
                    .map_err(|e| RefundError::Configuration(format!("Invalid RPC URL: {}", e)))?,
            );
        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| rpc_error("Failed to read chain id", e))?;
        ensure_chain(self.config.chain_id, chain_id)?;
        let contract = ITaxRefundLedger::new(self.config.contract_address, &provider);

        let tx = contract.createBusinessData(
            request.business_id,
            request.name,
            request.encrypted_value,
            request.input_proof,
            U256::from(request.public_value1),
            U256::from(request.public_value2),
            request.description,
        );

        let pending = tx
            .send()
            .await
            .map_err(|e| rpc_error("Failed to send transaction", e))?;

        info!("Transaction sent: {:?}", pending.tx_hash());

        let tx_hash = *pending.tx_hash();
        Ok(PendingTx::new(tx_hash, async move {
            let receipt = pending
                .get_receipt()
                .await
                .map_err(|e| rpc_error("Failed to get receipt", e))?;
            Ok(TxReceipt {
                tx_hash: receipt.transaction_hash,
                block_number: receipt.block_number,
            })
        }))
    }

    async fn verify_decryption(
        &self,
        business_id: &str,
        abi_encoded_clear_values: Bytes,
        decryption_proof: Bytes,
    ) -> Result<PendingTx> {
        info!(record_id = %business_id, "Submitting decryption attestation");

        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(self.signer.clone()))
            .on_http(
                self.config
                    .rpc_url
                    .parse()
                    .map_err(|e| RefundError::Configuration(format!("Invalid RPC URL: {}", e)))?,
            );
        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| rpc_error("Failed to read chain id", e))?;
        ensure_chain(self.config.chain_id, chain_id)?;
        let contract = ITaxRefundLedger::new(self.config.contract_address, &provider);

        let pending = contract
            .verifyDecryption(
                business_id.to_string(),
                abi_encoded_clear_values,
                decryption_proof,
            )
            .send()
            .await
            .map_err(|e| rpc_error("Failed to send transaction", e))?;

        info!("Transaction sent: {:?}", pending.tx_hash());

        let tx_hash = *pending.tx_hash();
        Ok(PendingTx::new(tx_hash, async move {
            let receipt = pending
                .get_receipt()
                .await
                .map_err(|e| rpc_error("Failed to get receipt", e))?;
            Ok(TxReceipt {
                tx_hash: receipt.transaction_hash,
                block_number: receipt.block_number,
            })
        }))
    }
}
