// src/testing.rs
//! In-memory [`ChainClient`] used by the unit tests.

use crate::client::ChainClient;
use anyhow::{Result, anyhow, bail};
use ethers::abi::Token;
use ethers::types::{Address, H256, TxHash, U256};
use ethers::utils::get_contract_address;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Deploy {
        contract: String,
        args: Vec<Token>,
        address: Address,
    },
    Transact {
        contract: String,
        at: Address,
        method: String,
        args: Vec<Token>,
    },
}

/// Records every request and derives addresses the way CREATE does, from
/// the deployer and its nonce, so repeated runs never reuse an address.
pub struct MockChain {
    deployer: Address,
    nonce: Cell<u64>,
    calls: RefCell<Vec<Call>>,
    failing_contracts: HashSet<String>,
    failing_methods: HashSet<String>,
    native_balance: U256,
    decimals: U256,
    // amounts credited by `distSupply`, positionally per recipient
    allocations: Vec<U256>,
    token_balances: RefCell<HashMap<(Address, Address), U256>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            deployer: Address::from_low_u64_be(0xdead),
            nonce: Cell::new(0),
            calls: RefCell::new(Vec::new()),
            failing_contracts: HashSet::new(),
            failing_methods: HashSet::new(),
            native_balance: U256::exp10(18) * 10u64,
            decimals: U256::from(18u64),
            allocations: Vec::new(),
            token_balances: RefCell::new(HashMap::new()),
        }
    }

    pub fn failing_deploy(mut self, contract: &str) -> Self {
        self.failing_contracts.insert(contract.to_string());
        self
    }

    pub fn failing_method(mut self, method: &str) -> Self {
        self.failing_methods.insert(method.to_string());
        self
    }

    pub fn with_token(mut self, decimals: u8, allocations: Vec<U256>) -> Self {
        self.decimals = U256::from(decimals);
        self.allocations = allocations;
        self
    }

    /// Makes `decimals()` return an arbitrary word.
    pub fn with_decimals_output(mut self, decimals: U256) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn deploys(&self) -> Vec<(String, Vec<Token>)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Deploy { contract, args, .. } => Some((contract.clone(), args.clone())),
                Call::Transact { .. } => None,
            })
            .collect()
    }

    pub fn transactions(&self) -> Vec<(Address, String, Vec<Token>)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Transact { at, method, args, .. } => Some((*at, method.clone(), args.clone())),
                Call::Deploy { .. } => None,
            })
            .collect()
    }

    fn next_nonce(&self) -> u64 {
        let nonce = self.nonce.get();
        self.nonce.set(nonce + 1);
        nonce
    }
}

impl ChainClient for MockChain {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn balance(&self, _account: Address) -> Result<U256> {
        Ok(self.native_balance)
    }

    async fn deploy(&self, contract: &str, args: Vec<Token>) -> Result<Address> {
        if self.failing_contracts.contains(contract) {
            bail!("execution reverted: {contract} constructor");
        }
        let address = get_contract_address(self.deployer, self.next_nonce());
        self.calls.borrow_mut().push(Call::Deploy {
            contract: contract.to_string(),
            args,
            address,
        });
        Ok(address)
    }

    async fn transact(&self, contract: &str, at: Address, method: &str, args: Vec<Token>) -> Result<TxHash> {
        if self.failing_methods.contains(method) {
            bail!("execution reverted: {method}");
        }
        if method == "distSupply" {
            let mut balances = self.token_balances.borrow_mut();
            for (arg, amount) in args.iter().zip(&self.allocations) {
                let recipient = arg.clone().into_address().ok_or_else(|| anyhow!("recipient is not an address"))?;
                *balances.entry((at, recipient)).or_default() += *amount;
            }
        }
        let nonce = self.next_nonce();
        self.calls.borrow_mut().push(Call::Transact {
            contract: contract.to_string(),
            at,
            method: method.to_string(),
            args,
        });
        Ok(H256::from_low_u64_be(nonce))
    }

    async fn call(&self, _contract: &str, at: Address, method: &str, args: Vec<Token>) -> Result<Vec<Token>> {
        match (method, args.as_slice()) {
            ("decimals", []) => Ok(vec![Token::Uint(self.decimals)]),
            ("balanceOf", [Token::Address(holder)]) => {
                let balance = self
                    .token_balances
                    .borrow()
                    .get(&(at, *holder))
                    .copied()
                    .unwrap_or_default();
                Ok(vec![Token::Uint(balance)])
            }
            _ => bail!("unsupported call {method}"),
        }
    }
}
