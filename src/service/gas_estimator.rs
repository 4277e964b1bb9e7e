// Gas 费建议 - EIP-1559 与 legacy 两种模式
// 最新区块带 baseFeePerGas 时给出 EIP-1559 参数，否则退回 eth_gasPrice

use ethers::types::U256;

/// 固定优先费：1 gwei
pub const PRIORITY_FEE_WEI: u64 = 1_000_000_000;

/// 原生币转账的固定 gas limit
pub const NATIVE_TRANSFER_GAS_LIMIT: u64 = 21_000;

/// eth_estimateGas 结果上浮的百分比
pub const GAS_ESTIMATE_BUFFER_PERCENT: u64 = 20;

/// 估算值加上余量，作为合约调用的 gas limit
pub fn buffered_gas_limit(estimate: u64) -> u64 {
    estimate.saturating_mul(100 + GAS_ESTIMATE_BUFFER_PERCENT) / 100
}

/// 费用建议
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSuggestion {
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
    Legacy {
        gas_price: U256,
    },
}

impl FeeSuggestion {
    /// maxFee = baseFee × 2，priority = 1 gwei
    ///
    /// base fee 极低的链（L2）上 baseFee × 2 可能低于 1 gwei，
    /// 此时把 priority 压到 maxFee，保证 priority ≤ maxFee
    pub fn from_base_fee(base_fee: U256) -> Self {
        let max_fee_per_gas = base_fee.saturating_mul(U256::from(2u8));
        let max_priority_fee_per_gas = U256::from(PRIORITY_FEE_WEI).min(max_fee_per_gas);

        FeeSuggestion::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }
    }

    pub fn from_gas_price(gas_price: U256) -> Self {
        FeeSuggestion::Legacy { gas_price }
    }

    /// 每单位 gas 的最高价格
    pub fn max_price_per_gas(&self) -> U256 {
        match self {
            FeeSuggestion::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
            FeeSuggestion::Legacy { gas_price } => *gas_price,
        }
    }

    /// 给定 gas limit 下的最高手续费
    pub fn max_fee_for(&self, gas_limit: u64) -> U256 {
        self.max_price_per_gas()
            .saturating_mul(U256::from(gas_limit))
    }

    pub fn is_eip1559(&self) -> bool {
        matches!(self, FeeSuggestion::Eip1559 { .. })
    }
}
