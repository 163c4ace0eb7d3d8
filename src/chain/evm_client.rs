//! alloy-backed JSON-RPC client for one EVM chain

use super::{ChainError, ChainReader, ChainResult, ContractCall, ContractWriter, SubmitRequest};
use crate::config::ChainConfig;
use crate::metrics::{metrics, Timer};
use crate::types::{ChainId, FeePair, TxHash};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::BlockNumberOrTag;
use alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, RootProvider};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use tracing::debug;

alloy::sol! {
    interface IScoreManager {
        function storeScore(address player, uint256 sessionIndex) external;
        function updateHighScore(address player) external;
    }

    interface ILeaderboard {
        function updatePlayerData(address player, uint256 scoreAmount, uint256 transactionAmount) external;
    }
}

/// Read/write client for one chain
#[derive(Debug, Clone)]
pub struct EvmClient {
    chain_id: ChainId,
    provider: DynProvider<Ethereum>,
    score_manager: Address,
    leaderboard: Option<Address>,
    base_fee_multiplier_percent: u128,
}

impl EvmClient {
    pub fn new(
        chain_id: ChainId,
        rpc_url: &str,
        score_manager: Address,
        leaderboard: Option<Address>,
    ) -> ChainResult<Self> {
        let url: Url = rpc_url.parse().map_err(|e| ChainError::Rpc {
            chain_id,
            message: format!("invalid RPC url: {}", e),
            code: None,
        })?;
        let provider = DynProvider::new(RootProvider::<Ethereum>::new_http(url));

        Ok(Self {
            chain_id,
            provider,
            score_manager,
            leaderboard,
            base_fee_multiplier_percent: 120,
        })
    }

    /// Build from a chain section, honoring the backend RPC override
    pub fn from_config(chain: &ChainConfig) -> ChainResult<Self> {
        Self::new(
            chain.chain_id,
            chain.effective_rpc_url(),
            chain.score_manager,
            chain.leaderboard,
        )
    }

    /// Headroom applied to the next block's base fee when computing `max_fee_per_gas`
    pub fn with_base_fee_multiplier(mut self, percent: u64) -> Self {
        self.base_fee_multiplier_percent = u128::from(percent);
        self
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn rpc_err(&self, err: alloy::transports::RpcError<alloy::transports::TransportErrorKind>) -> ChainError {
        ChainError::from_rpc_error(err, self.chain_id)
    }

    /// Resolve target contract and calldata for a call
    fn encode(&self, call: ContractCall) -> ChainResult<(Address, Vec<u8>)> {
        match call {
            ContractCall::UpdateHighScore { player } => Ok((
                self.score_manager,
                IScoreManager::updateHighScoreCall { player }.abi_encode(),
            )),
            ContractCall::StoreScore { player, session_id } => Ok((
                self.score_manager,
                IScoreManager::storeScoreCall {
                    player,
                    sessionIndex: U256::from(session_id),
                }
                .abi_encode(),
            )),
            ContractCall::UpdatePlayerData {
                player,
                score_amount,
                transaction_amount,
            } => {
                let leaderboard = self.leaderboard.ok_or(ChainError::MissingContract {
                    chain_id: self.chain_id,
                    contract: "Leaderboard",
                })?;
                Ok((
                    leaderboard,
                    ILeaderboard::updatePlayerDataCall {
                        player,
                        scoreAmount: U256::from(score_amount),
                        transactionAmount: U256::from(transaction_amount),
                    }
                    .abi_encode(),
                ))
            }
        }
    }
}

#[async_trait]
impl ChainReader for EvmClient {
    async fn transaction_count(&self, address: Address) -> ChainResult<u64> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| self.rpc_err(e))
    }

    async fn max_priority_fee_per_gas(&self) -> ChainResult<u128> {
        self.provider
            .get_max_priority_fee_per_gas()
            .await
            .map_err(|e| self.rpc_err(e))
    }

    async fn fee_estimate(&self) -> ChainResult<FeePair> {
        let priority = self.max_priority_fee_per_gas().await?;
        let history = self
            .provider
            .get_fee_history(1, BlockNumberOrTag::Latest, &[])
            .await
            .map_err(|e| self.rpc_err(e))?;

        let base_fee = match history.next_block_base_fee() {
            Some(base_fee) => base_fee,
            None => self.provider.get_gas_price().await.map_err(|e| self.rpc_err(e))?,
        };

        Ok(FeePair {
            max_priority_fee_per_gas: priority,
            max_fee_per_gas: base_fee * self.base_fee_multiplier_percent / 100 + priority,
        })
    }
}

#[async_trait]
impl ContractWriter for EvmClient {
    async fn submit(&self, request: SubmitRequest<'_>) -> ChainResult<TxHash> {
        let (to, input) = self.encode(request.call)?;
        let from = request.signer.address();

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(input)
            .with_chain_id(self.chain_id)
            .with_nonce(request.nonce)
            .with_max_priority_fee_per_gas(request.fees.max_priority_fee_per_gas)
            .with_max_fee_per_gas(request.fees.max_fee_per_gas);

        let gas_limit = self
            .provider
            .estimate_gas(tx.clone())
            .await
            .map_err(|e| self.rpc_err(e))?;
        let tx = tx.with_gas_limit(gas_limit);

        let wallet = EthereumWallet::from(request.signer.clone());
        let envelope = tx
            .build(&wallet)
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))?;

        let timer = Timer::new();
        let pending = self
            .provider
            .send_raw_transaction(&envelope.encoded_2718())
            .await
            .map_err(|e| self.rpc_err(e))?;
        timer.observe_duration(&metrics().chain_submit);

        let tx_hash = *pending.tx_hash();
        debug!(
            chain_id = self.chain_id,
            call = request.call.name(),
            relayer = %from,
            nonce = request.nonce,
            gas_limit = gas_limit,
            tx_hash = %tx_hash,
            "Transaction submitted"
        );
        Ok(tx_hash)
    }
}
