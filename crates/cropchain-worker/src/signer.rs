//! Local transaction signing.

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxKind, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::{LocalSignerError, PrivateKeySigner};

use crate::error::ChainError;
use crate::types::Transaction;

/// Everything needed to sign one contract call.
#[derive(Debug, Clone)]
pub struct TxParams {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub input: Bytes,
}

/// Holds the worker's signing key. `Debug` shows the address only.
#[derive(Clone)]
pub struct TransactionSigner {
    inner: PrivateKeySigner,
}

impl TransactionSigner {
    /// Parse a hex private key, with or without `0x`.
    pub fn from_hex(key: &str) -> Result<Self, LocalSignerError> {
        Ok(Self {
            inner: key.trim().parse()?,
        })
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Sign a legacy EIP-155 call and return the raw payload with its hash.
    pub fn sign_call(&self, params: TxParams) -> Result<Transaction, ChainError> {
        let tx = TxLegacy {
            chain_id: Some(params.chain_id),
            nonce: params.nonce,
            gas_price: params.gas_price,
            gas_limit: params.gas_limit,
            to: TxKind::Call(params.to),
            value: U256::ZERO,
            input: params.input,
        };

        let signature = self
            .inner
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        let payload = TxEnvelope::from(signed).encoded_2718();

        Ok(Transaction {
            nonce: params.nonce,
            signed_payload: payload.into(),
            hash,
        })
    }
}

impl std::fmt::Debug for TransactionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
