use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::constants;
use crate::error::SwapError;
use crate::oracle::GasOracle;
use crate::provider::ProviderPool;
use crate::types::{
    ApprovalCheck, GasFee, GasPrices, SwapQuote, Token, TokenApproval, TxnData, TxnStatus, TxnType,
};

// Function selectors
const SELECTOR_APPROVE: &str = "0x095ea7b3";
const SELECTOR_DEPOSIT: &str = "0xd0e30db0"; // WETH deposit()
const SELECTOR_WITHDRAW: &str = "0x2e1a7d4d"; // WETH withdraw(uint256)

const APPROVAL_GAS_ESTIMATE: u64 = 55_000;
const WRAP_GAS_ESTIMATE: u64 = 50_000;

/// Turns a quote into the ordered transaction sequence: optional ERC-20
/// approval, then the upstream-built swap or bridge calls, each chained on
/// its predecessor.
pub struct TransactionBuilder {
    providers: Arc<ProviderPool>,
    gas: Arc<GasOracle>,
}

impl TransactionBuilder {
    pub fn new(providers: Arc<ProviderPool>, gas: Arc<GasOracle>) -> Self {
        Self { providers, gas }
    }

    /// Compare the current allowance against the required amount. Native
    /// input never needs approval.
    pub async fn check_approval(
        &self,
        token: &Token,
        owner: Address,
        amount: U256,
        spender: Address,
    ) -> Result<ApprovalCheck, SwapError> {
        if token.is_native() {
            return Ok(ApprovalCheck {
                needs_approval: false,
                current_allowance: U256::MAX,
                required_allowance: amount,
            });
        }
        let provider = self.providers.get(token.chain_id).await?;
        let current_allowance = provider.get_allowance(token.address, owner, spender).await?;
        Ok(ApprovalCheck {
            needs_approval: current_allowance < amount,
            current_allowance,
            required_allowance: amount,
        })
    }

    pub async fn build_transactions(
        &self,
        quote: &SwapQuote,
        user: Address,
    ) -> Result<Vec<TxnData>, SwapError> {
        let chain_id = quote.input_token.chain_id;
        let calls = quote.tx_data.as_deref().filter(|c| !c.is_empty()).ok_or_else(|| {
            SwapError::invalid_params(format!(
                "quote from {} carries no executable transaction data",
                quote.aggregator
            ))
        })?;

        let gas_prices = self.gas.gas_prices(chain_id).await?;
        let fee = standard_fee(&gas_prices);

        let mut transactions = Vec::new();
        let mut order: u32 = 0;

        // Approval first, when the input is an ERC-20 short on allowance for
        // the upstream spender.
        if !quote.input_token.is_native() {
            let spender = calls[0].to;
            let check = self
                .check_approval(&quote.input_token, user, quote.input_amount, spender)
                .await?;
            if check.needs_approval {
                debug!(
                    "approval needed: allowance {} < {} for {}",
                    check.current_allowance, quote.input_amount, spender
                );
                transactions.push(self.approval_txn(quote, user, spender, fee.clone(), order));
                order += 1;
            }
        }

        let cross_chain = quote.route.is_cross_chain;
        for call in calls {
            let previous_id = transactions.last().map(|t: &TxnData| t.id.clone());
            // gas safety buffer over the upstream's own estimate
            let gas_limit = call.gas.unwrap_or(quote.estimated_gas) * 120 / 100;
            transactions.push(TxnData {
                id: Uuid::new_v4().to_string(),
                txn_type: if cross_chain { TxnType::Bridge } else { TxnType::Swap },
                chain_id,
                to: call.to,
                from: user,
                data: call.data.clone(),
                value: if quote.input_token.is_native() && call.value.is_zero() {
                    quote.input_amount
                } else {
                    call.value
                },
                gas_limit,
                gas_fee: fee.clone(),
                nonce: None,
                description: format!(
                    "{} {} -> {} via {}",
                    if cross_chain { "Bridge" } else { "Swap" },
                    quote.input_token.symbol,
                    quote.output_token.symbol,
                    quote.aggregator
                ),
                estimated_gas: call.gas.unwrap_or(quote.estimated_gas),
                token_approval: None,
                order,
                depends_on: previous_id,
                status: TxnStatus::Created,
                tx_hash: None,
                confirmations: 0,
                error: None,
            });
            order += 1;
        }

        Ok(transactions)
    }

    fn approval_txn(
        &self,
        quote: &SwapQuote,
        user: Address,
        spender: Address,
        fee: GasFee,
        order: u32,
    ) -> TxnData {
        TxnData {
            id: Uuid::new_v4().to_string(),
            txn_type: TxnType::Approval,
            chain_id: quote.input_token.chain_id,
            to: quote.input_token.address,
            from: user,
            data: encode_approve(spender, U256::MAX),
            value: U256::ZERO,
            gas_limit: APPROVAL_GAS_ESTIMATE * 120 / 100,
            gas_fee: fee,
            nonce: None,
            description: format!("Approve {} for {}", quote.input_token.symbol, quote.aggregator),
            estimated_gas: APPROVAL_GAS_ESTIMATE,
            token_approval: Some(TokenApproval {
                token: quote.input_token.clone(),
                spender,
                // infinite approval by default
                amount: U256::MAX,
            }),
            order,
            depends_on: None,
            status: TxnStatus::Created,
            tx_hash: None,
            confirmations: 0,
            error: None,
        }
    }

    /// Wrap native currency into its canonical WETH-equivalent.
    pub async fn build_wrap(
        &self,
        chain_id: u64,
        amount: U256,
        user: Address,
    ) -> Result<TxnData, SwapError> {
        let wrapped = constants::wrapped_native_address(chain_id)
            .ok_or(SwapError::UnsupportedChain(chain_id))?;
        let gas_prices = self.gas.gas_prices(chain_id).await?;
        Ok(wrap_txn(chain_id, wrapped, user, amount, standard_fee(&gas_prices), true))
    }

    /// Unwrap the canonical WETH-equivalent back to native currency.
    pub async fn build_unwrap(
        &self,
        chain_id: u64,
        amount: U256,
        user: Address,
    ) -> Result<TxnData, SwapError> {
        let wrapped = constants::wrapped_native_address(chain_id)
            .ok_or(SwapError::UnsupportedChain(chain_id))?;
        let gas_prices = self.gas.gas_prices(chain_id).await?;
        Ok(wrap_txn(chain_id, wrapped, user, amount, standard_fee(&gas_prices), false))
    }
}

fn wrap_txn(chain_id: u64, wrapped: Address, user: Address, amount: U256, fee: GasFee, wrap: bool) -> TxnData {
    let (data, value, txn_type, verb) = if wrap {
        // deposit() is payable; the amount travels as value
        (SELECTOR_DEPOSIT.to_string(), amount, TxnType::Wrap, "Wrap")
    } else {
        (
            format!("{SELECTOR_WITHDRAW}{}", encode_u256(amount)),
            U256::ZERO,
            TxnType::Unwrap,
            "Unwrap",
        )
    };
    TxnData {
        id: Uuid::new_v4().to_string(),
        txn_type,
        chain_id,
        to: wrapped,
        from: user,
        data,
        value,
        gas_limit: WRAP_GAS_ESTIMATE * 120 / 100,
        gas_fee: fee,
        nonce: None,
        description: format!("{verb} native currency on chain {chain_id}"),
        estimated_gas: WRAP_GAS_ESTIMATE,
        token_approval: None,
        order: 0,
        depends_on: None,
        status: TxnStatus::Created,
        tx_hash: None,
        confirmations: 0,
        error: None,
    }
}

/// Gas fields for a transaction: the standard tier, with EIP-1559 fields only
/// when the chain supports them.
pub fn standard_fee(gas_prices: &GasPrices) -> GasFee {
    match (
        gas_prices.standard.max_fee_per_gas,
        gas_prices.standard.max_priority_fee_per_gas,
    ) {
        (Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) => GasFee::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        },
        _ => GasFee::Legacy {
            gas_price: gas_prices.standard.gas_price,
        },
    }
}

pub fn encode_approve(spender: Address, amount: U256) -> String {
    format!("{SELECTOR_APPROVE}{}{}", encode_address(spender), encode_u256(amount))
}

fn encode_address(address: Address) -> String {
    format!("{:0>64}", hex::encode(address.as_slice()))
}

fn encode_u256(value: U256) -> String {
    format!("{value:064x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_approve_layout() {
        let spender: Address = "0xDef1C0ded9bec7F1a1670819833240f027b25EfF".parse().unwrap();
        let data = encode_approve(spender, U256::MAX);
        // 4-byte selector + two 32-byte words
        assert_eq!(data.len(), 2 + 8 + 64 + 64);
        assert!(data.starts_with(SELECTOR_APPROVE));
        assert!(data[10..74].ends_with("def1c0ded9bec7f1a1670819833240f027b25eff"));
        assert_eq!(&data[74..], "f".repeat(64));
    }

    #[test]
    fn test_encode_u256_padding() {
        assert_eq!(encode_u256(U256::from(1u64)), format!("{:0>64}", "1"));
        assert_eq!(encode_u256(U256::ZERO).len(), 64);
    }

    #[test]
    fn test_wrap_and_unwrap_payloads() {
        let user = Address::ZERO;
        let wrapped: Address = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".parse().unwrap();
        let fee = GasFee::Legacy { gas_price: U256::from(1_000_000_000u64) };
        let amount = U256::from(5u64);

        let wrap = wrap_txn(1, wrapped, user, amount, fee.clone(), true);
        assert_eq!(wrap.txn_type, TxnType::Wrap);
        assert_eq!(wrap.data, SELECTOR_DEPOSIT);
        assert_eq!(wrap.value, amount);

        let unwrap = wrap_txn(1, wrapped, user, amount, fee, false);
        assert_eq!(unwrap.txn_type, TxnType::Unwrap);
        assert!(unwrap.data.starts_with(SELECTOR_WITHDRAW));
        assert!(unwrap.data.ends_with(&encode_u256(amount)));
        assert_eq!(unwrap.value, U256::ZERO);
    }
}
