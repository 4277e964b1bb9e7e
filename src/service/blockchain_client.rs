// 区块链RPC调度 - 多端点顺序故障转移
// 每条链一组有序端点：逐个尝试，单次请求受超时限制，第一个成功即返回
// 广播被节点拒绝时立即返回，不换端点重放

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use ethers::{
    abi::{self, ParamType, Token},
    types::{Address, U256},
    utils::format_units,
};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    domain::{
        chain_config::{ChainConfig, ChainRegistry},
        errors::{CustodyError, CustodyResult, RpcError},
    },
    infrastructure::{
        log_redact::redact_url,
        rpc_transport::RpcTransport,
        rpc_validator::{extract_result, parse_nonce, parse_quantity, validate_tx_hash},
    },
    service::gas_estimator::FeeSuggestion,
    utils::AddressValidator,
};

pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 8_000;

const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];
const DEFAULT_TOKEN_DECIMALS: u8 = 18;
const UNKNOWN_TOKEN_SYMBOL: &str = "???";

/// 节点返回 JSON-RPC error 时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeErrorPolicy {
    /// 读请求：换下一个端点
    TryNext,
    /// 广播：节点的拒绝是确定结果，直接返回
    Reject,
}

#[derive(Clone, Debug, Serialize)]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub gas_used: Option<String>,
    /// 1 = success, 0 = failed
    pub status: Option<u8>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == Some(1)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TokenBalance {
    pub token_address: String,
    pub symbol: String,
    pub decimals: u8,
    /// 最小单位余额（十进制字符串）
    pub balance: String,
    pub formatted: String,
}

/// 批量查询中的单条结果；失败只影响本条
#[derive(Clone, Debug, Serialize)]
pub struct TokenBalanceEntry {
    pub token_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<TokenBalance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RpcDispatcher {
    registry: Arc<ChainRegistry>,
    transport: Arc<dyn RpcTransport>,
    attempt_timeout: Duration,
    next_request_id: AtomicU64,
}

impl RpcDispatcher {
    pub fn new(
        registry: Arc<ChainRegistry>,
        transport: Arc<dyn RpcTransport>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            attempt_timeout,
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<ChainRegistry> {
        &self.registry
    }

    /// 原生币余额（wei）
    pub async fn get_balance(&self, chain_id: u64, address: &str) -> CustodyResult<U256> {
        let chain = self.registry.resolve(chain_id)?;
        let address = AddressValidator::parse_evm_address(address)?;

        let balance = self
            .call_with_fallback(
                &chain,
                "eth_getBalance",
                json!([encode_address(&address), "latest"]),
                NodeErrorPolicy::TryNext,
                parse_quantity,
            )
            .await?;
        Ok(balance)
    }

    /// 费用建议：最新区块有 baseFeePerGas 走 EIP-1559，否则使用 eth_gasPrice
    pub async fn get_fee_suggestion(&self, chain_id: u64) -> CustodyResult<FeeSuggestion> {
        let chain = self.registry.resolve(chain_id)?;

        let base_fee = self
            .call_with_fallback(
                &chain,
                "eth_getBlockByNumber",
                json!(["latest", false]),
                NodeErrorPolicy::TryNext,
                |block| match block.get("baseFeePerGas") {
                    Some(fee) if !fee.is_null() => parse_quantity(fee).map(Some),
                    _ if block.is_object() => Ok(None),
                    _ => Err(RpcError::InvalidResponse(
                        "latest block is not an object".to_string(),
                    )),
                },
            )
            .await?;

        if let Some(base_fee) = base_fee {
            return Ok(FeeSuggestion::from_base_fee(base_fee));
        }

        let gas_price = self
            .call_with_fallback(
                &chain,
                "eth_gasPrice",
                json!([]),
                NodeErrorPolicy::TryNext,
                parse_quantity,
            )
            .await?;
        Ok(FeeSuggestion::from_gas_price(gas_price))
    }

    /// 广播已签名交易，返回交易哈希
    pub async fn broadcast_raw(&self, chain_id: u64, signed_tx: &[u8]) -> CustodyResult<String> {
        let chain = self.registry.resolve(chain_id)?;
        if signed_tx.is_empty() {
            return Err(CustodyError::validation("signed transaction is empty"));
        }

        let raw = format!("0x{}", hex::encode(signed_tx));
        let tx_hash = self
            .call_with_fallback(
                &chain,
                "eth_sendRawTransaction",
                json!([raw]),
                NodeErrorPolicy::Reject,
                validate_tx_hash,
            )
            .await?;
        Ok(tx_hash)
    }

    /// eth_estimateGas；执行会回滚时节点的错误是确定结果，不换端点
    pub async fn estimate_gas(
        &self,
        chain_id: u64,
        from: &Address,
        to: &Address,
        data: &[u8],
    ) -> CustodyResult<u64> {
        let chain = self.registry.resolve(chain_id)?;

        let gas = self
            .call_with_fallback(
                &chain,
                "eth_estimateGas",
                json!([{
                    "from": encode_address(from),
                    "to": encode_address(to),
                    "data": format!("0x{}", hex::encode(data)),
                }]),
                NodeErrorPolicy::Reject,
                |value| {
                    let gas = parse_quantity(value)?;
                    if gas > U256::from(u64::MAX) {
                        return Err(RpcError::InvalidResponse(format!(
                            "gas estimate out of range: {}",
                            gas
                        )));
                    }
                    Ok(gas.as_u64())
                },
            )
            .await?;
        Ok(gas)
    }

    /// 透传原始 JSON-RPC 请求到主端点，响应原样返回
    pub async fn proxy(&self, chain_id: u64, payload: Value) -> CustodyResult<Value> {
        let chain = self.registry.resolve(chain_id)?;
        let endpoint = chain.primary_endpoint();

        let response = self.call_once(endpoint, &payload).await.map_err(|e| {
            warn!(
                chain_id = chain_id,
                endpoint = %redact_url(endpoint),
                error = %e,
                "RPC proxy request failed"
            );
            e
        })?;
        Ok(response)
    }

    /// 包含 pending 交易的 nonce
    pub async fn get_transaction_count(&self, chain_id: u64, address: &str) -> CustodyResult<u64> {
        let chain = self.registry.resolve(chain_id)?;
        let address = AddressValidator::parse_evm_address(address)?;

        let nonce = self
            .call_with_fallback(
                &chain,
                "eth_getTransactionCount",
                json!([encode_address(&address), "pending"]),
                NodeErrorPolicy::TryNext,
                parse_nonce,
            )
            .await?;
        Ok(nonce)
    }

    /// 交易回执；尚未打包时返回 None
    pub async fn get_transaction_receipt(
        &self,
        chain_id: u64,
        tx_hash: &str,
    ) -> CustodyResult<Option<TransactionReceipt>> {
        let chain = self.registry.resolve(chain_id)?;
        let tx_hash = validate_tx_hash(&Value::String(tx_hash.to_string()))
            .map_err(|_| CustodyError::validation("invalid transaction hash"))?;

        let receipt = self
            .call_with_fallback(
                &chain,
                "eth_getTransactionReceipt",
                json!([tx_hash.clone()]),
                NodeErrorPolicy::TryNext,
                |value| parse_receipt(&tx_hash, value),
            )
            .await?;
        Ok(receipt)
    }

    /// ERC-20 余额；decimals/symbol 读取失败时回落到 18 / "???"
    pub async fn get_erc20_balance(
        &self,
        chain_id: u64,
        token_address: &str,
        owner: &str,
    ) -> CustodyResult<TokenBalance> {
        let chain = self.registry.resolve(chain_id)?;
        let token = AddressValidator::parse_evm_address(token_address)?;
        let owner = AddressValidator::parse_evm_address(owner)?;

        let mut balance_call = BALANCE_OF_SELECTOR.to_vec();
        balance_call.extend_from_slice(&[0u8; 12]);
        balance_call.extend_from_slice(owner.as_bytes());

        let (balance, decimals, symbol) = tokio::join!(
            self.eth_call(&chain, &token, &balance_call),
            self.eth_call(&chain, &token, &DECIMALS_SELECTOR),
            self.eth_call(&chain, &token, &SYMBOL_SELECTOR),
        );

        let balance = balance.and_then(|word| decode_uint(&word))?;
        let decimals = decimals
            .ok()
            .and_then(|word| decode_uint(&word).ok())
            .filter(|d| *d <= U256::from(u8::MAX))
            .map(|d| d.as_u32() as u8)
            .unwrap_or(DEFAULT_TOKEN_DECIMALS);
        let symbol = symbol
            .ok()
            .and_then(|data| decode_symbol(&data))
            .unwrap_or_else(|| UNKNOWN_TOKEN_SYMBOL.to_string());

        let formatted =
            format_units(balance, decimals as u32).unwrap_or_else(|_| balance.to_string());

        Ok(TokenBalance {
            token_address: encode_address(&token),
            symbol,
            decimals,
            balance: balance.to_string(),
            formatted,
        })
    }

    /// 并发查询多个代币余额，单个失败记录在对应条目中
    pub async fn get_erc20_balances(
        &self,
        chain_id: u64,
        owner: &str,
        token_addresses: &[String],
    ) -> CustodyResult<Vec<TokenBalanceEntry>> {
        self.registry.resolve(chain_id)?;
        AddressValidator::parse_evm_address(owner)?;

        let lookups = token_addresses.iter().map(|token| async move {
            match self.get_erc20_balance(chain_id, token, owner).await {
                Ok(balance) => TokenBalanceEntry {
                    token_address: token.clone(),
                    balance: Some(balance),
                    error: None,
                },
                Err(e) => TokenBalanceEntry {
                    token_address: token.clone(),
                    balance: None,
                    error: Some(e.to_string()),
                },
            }
        });

        Ok(join_all(lookups).await)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 内部实现
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn eth_call(
        &self,
        chain: &ChainConfig,
        to: &Address,
        data: &[u8],
    ) -> Result<Vec<u8>, RpcError> {
        self.call_with_fallback(
            chain,
            "eth_call",
            json!([
                { "to": encode_address(to), "data": format!("0x{}", hex::encode(data)) },
                "latest"
            ]),
            NodeErrorPolicy::TryNext,
            decode_hex_bytes,
        )
        .await
    }

    /// 单次请求，受 attempt_timeout 限制
    async fn call_once(&self, endpoint: &str, payload: &Value) -> Result<Value, RpcError> {
        match timeout(self.attempt_timeout, self.transport.send(endpoint, payload)).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Timeout {
                endpoint: redact_url(endpoint),
                timeout_ms: self.attempt_timeout.as_millis() as u64,
            }),
        }
    }

    /// 按顺序尝试链上所有端点
    async fn call_with_fallback<T, F>(
        &self,
        chain: &ChainConfig,
        method: &str,
        params: Value,
        policy: NodeErrorPolicy,
        parse: F,
    ) -> Result<T, RpcError>
    where
        F: Fn(&Value) -> Result<T, RpcError>,
    {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_request_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let endpoints = &chain.rpc_endpoints;
        let mut last_error: Option<RpcError> = None;

        for (index, endpoint) in endpoints.iter().enumerate() {
            let attempt = index + 1;
            let outcome = self
                .call_once(endpoint, &payload)
                .await
                .and_then(|response| extract_result(&response).and_then(&parse));

            match outcome {
                Ok(value) => {
                    debug!(
                        chain_id = chain.chain_id,
                        method = method,
                        attempt = attempt,
                        endpoint = %redact_url(endpoint),
                        "RPC request succeeded"
                    );
                    return Ok(value);
                }
                Err(RpcError::NodeError { code, message }) if policy == NodeErrorPolicy::Reject => {
                    warn!(
                        chain_id = chain.chain_id,
                        method = method,
                        code = code,
                        endpoint = %redact_url(endpoint),
                        "Node rejected request: {}",
                        message
                    );
                    return Err(RpcError::RejectedByNode(message));
                }
                Err(e) => {
                    warn!(
                        chain_id = chain.chain_id,
                        method = method,
                        attempt = attempt,
                        endpoint = %redact_url(endpoint),
                        error = %e,
                        "RPC endpoint failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| {
            RpcError::InvalidResponse(format!("no rpc endpoints for chain {}", chain.chain_id))
        });

        if endpoints.len() <= 1 {
            return Err(last_error);
        }

        Err(RpcError::AllProvidersExhausted {
            chain_id: chain.chain_id,
            attempts: endpoints.len(),
            last_error: last_error.to_string(),
        })
    }
}

fn encode_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

fn decode_hex_bytes(value: &Value) -> Result<Vec<u8>, RpcError> {
    let data = value
        .as_str()
        .and_then(|s| s.strip_prefix("0x"))
        .ok_or_else(|| RpcError::InvalidResponse("expected 0x-prefixed call data".to_string()))?;
    hex::decode(data).map_err(|e| RpcError::InvalidResponse(format!("invalid call data: {}", e)))
}

fn decode_uint(word: &[u8]) -> Result<U256, RpcError> {
    if word.is_empty() || word.len() > 32 {
        return Err(RpcError::InvalidResponse(format!(
            "expected a 32-byte word, got {} bytes",
            word.len()
        )));
    }
    Ok(U256::from_big_endian(word))
}

/// symbol() 通常返回 ABI string，少数老合约返回 bytes32
fn decode_symbol(data: &[u8]) -> Option<String> {
    if let Ok(tokens) = abi::decode(&[ParamType::String], data) {
        if let Some(Token::String(symbol)) = tokens.into_iter().next() {
            if !symbol.is_empty() {
                return Some(symbol);
            }
        }
    }

    if data.len() == 32 {
        let trimmed: Vec<u8> = data.iter().copied().take_while(|b| *b != 0).collect();
        if let Ok(symbol) = String::from_utf8(trimmed) {
            if !symbol.is_empty() {
                return Some(symbol);
            }
        }
    }

    None
}

fn parse_receipt(tx_hash: &str, value: &Value) -> Result<Option<TransactionReceipt>, RpcError> {
    if value.is_null() {
        return Ok(None);
    }
    if !value.is_object() {
        return Err(RpcError::InvalidResponse(
            "receipt is not an object".to_string(),
        ));
    }

    let quantity = |field: &str| -> Result<Option<U256>, RpcError> {
        match value.get(field) {
            Some(v) if !v.is_null() => parse_quantity(v).map(Some),
            _ => Ok(None),
        }
    };

    let block_number = quantity("blockNumber")?
        .filter(|n| *n <= U256::from(u64::MAX))
        .map(|n| n.as_u64());
    let gas_used = quantity("gasUsed")?.map(|g| g.to_string());
    let status = quantity("status")?.map(|s| if s.is_zero() { 0 } else { 1 });

    Ok(Some(TransactionReceipt {
        tx_hash: tx_hash.to_string(),
        block_number,
        gas_used,
        status,
    }))
}
