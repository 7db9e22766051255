// src/client.rs
use crate::artifacts::ArtifactStore;
use anyhow::{Context, Result, bail};
use ethers::abi::{Function, Token};
use ethers::contract::ContractFactory;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, TxHash, U64, U256};
use std::sync::Arc;
use tracing::debug;

/// The chain capabilities a deployment run needs.
///
/// Contracts are addressed by their compiled artifact name so the
/// implementation can find the ABI (Hardhat's `getContractFactory(name)`).
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// Account that signs and pays for every transaction.
    fn deployer(&self) -> Address;

    /// Native currency balance of `account`, in wei.
    async fn balance(&self, account: Address) -> Result<U256>;

    /// Deploys `contract` and waits until it is mined.
    async fn deploy(&self, contract: &str, args: Vec<Token>) -> Result<Address>;

    /// Sends a state-changing call and waits for a successful receipt.
    async fn transact(&self, contract: &str, at: Address, method: &str, args: Vec<Token>) -> Result<TxHash>;

    /// Performs a read-only call and decodes its outputs.
    async fn call(&self, contract: &str, at: Address, method: &str, args: Vec<Token>) -> Result<Vec<Token>>;
}

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// [`ChainClient`] over any ethers middleware stack; [`connect`](EthersClient::connect)
/// builds the usual HTTP provider plus local wallet.
pub struct EthersClient<M = SignerClient> {
    client: Arc<M>,
    deployer: Address,
    artifacts: ArtifactStore,
    confirmations: usize,
}

impl EthersClient {
    /// Connects to `rpc_url` and binds `private_key` to the endpoint's chain id.
    pub async fn connect(
        rpc_url: &str,
        private_key: &str,
        artifacts: ArtifactStore,
        confirmations: usize,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .with_context(|| format!("Invalid RPC URL {rpc_url}"))?;
        let chain_id = provider
            .get_chainid()
            .await
            .context("Failed to fetch chain id")?
            .as_u64();
        let wallet = private_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .context("PRIVATE_KEY is not a valid secp256k1 key")?
            .with_chain_id(chain_id);
        let deployer = wallet.address();
        debug!(chain_id, ?deployer, "connected");

        Ok(Self::new(
            Arc::new(SignerMiddleware::new(provider, wallet)),
            deployer,
            artifacts,
            confirmations,
        ))
    }
}

impl<M: Middleware + 'static> EthersClient<M> {
    /// Wraps a middleware whose transactions are sent from `deployer`.
    pub fn new(client: Arc<M>, deployer: Address, artifacts: ArtifactStore, confirmations: usize) -> Self {
        Self {
            client,
            deployer,
            artifacts,
            confirmations,
        }
    }

    fn function(&self, contract: &str, method: &str) -> Result<Function> {
        let abi = self.artifacts.load(contract)?.abi;
        let function = abi
            .function(method)
            .with_context(|| format!("`{contract}` has no method `{method}`"))?;
        Ok(function.clone())
    }
}

impl<M: Middleware + 'static> ChainClient for EthersClient<M> {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn balance(&self, account: Address) -> Result<U256> {
        Ok(self.client.get_balance(account, None).await?)
    }

    async fn deploy(&self, contract: &str, args: Vec<Token>) -> Result<Address> {
        let artifact = self.artifacts.load_deployable(contract)?;
        let factory = ContractFactory::new(artifact.abi, artifact.bytecode, self.client.clone());
        let instance = factory
            .deploy_tokens(args)
            .with_context(|| format!("Failed to encode `{contract}` constructor"))?
            .confirmations(self.confirmations)
            .send()
            .await?;
        Ok(instance.address())
    }

    async fn transact(&self, contract: &str, at: Address, method: &str, args: Vec<Token>) -> Result<TxHash> {
        let function = self.function(contract, method)?;
        let data = function
            .encode_input(&args)
            .with_context(|| format!("Failed to encode `{contract}.{method}` arguments"))?;
        let tx: TypedTransaction = TransactionRequest::new().to(at).data(data).into();

        let pending = self.client.send_transaction(tx, None).await?;
        let hash = *pending;
        debug!(?hash, contract, method, "transaction sent");

        let receipt = pending
            .confirmations(self.confirmations)
            .await?
            .with_context(|| format!("transaction {hash:?} was dropped from the mempool"))?;
        if receipt.status != Some(U64::from(1)) {
            bail!("transaction {hash:?} reverted");
        }
        Ok(hash)
    }

    async fn call(&self, contract: &str, at: Address, method: &str, args: Vec<Token>) -> Result<Vec<Token>> {
        let function = self.function(contract, method)?;
        let data = function
            .encode_input(&args)
            .with_context(|| format!("Failed to encode `{contract}.{method}` arguments"))?;
        let tx: TypedTransaction = TransactionRequest::new().to(at).data(data).into();

        let output = self.client.call(&tx, None).await?;
        function
            .decode_output(&output)
            .with_context(|| format!("Failed to decode `{contract}.{method}` output"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::encode;
    use ethers::providers::MockProvider;
    use ethers::types::{Bytes, H256, Transaction, TransactionReceipt};
    use std::time::Duration;

    const SCOD_ARTIFACT: &str = r#"{
        "contractName": "sCOD",
        "abi": [
            {"inputs": [{"internalType": "address", "name": "vault", "type": "address"}],
             "name": "setVault", "outputs": [], "stateMutability": "nonpayable", "type": "function"},
            {"inputs": [], "name": "decimals",
             "outputs": [{"internalType": "uint8", "name": "", "type": "uint8"}],
             "stateMutability": "view", "type": "function"}
        ],
        "bytecode": "0x6080604052"
    }"#;

    fn mocked_client() -> (EthersClient<Provider<MockProvider>>, MockProvider, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts/sCOD.sol/sCOD.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, SCOD_ARTIFACT).unwrap();

        let (provider, mock) = Provider::mocked();
        let provider = provider.interval(Duration::from_millis(5));
        let client = EthersClient::new(
            Arc::new(provider),
            Address::from_low_u64_be(0xdead),
            ArtifactStore::new(dir.path()),
            1,
        );
        (client, mock, dir)
    }

    // Responses are served last-in first-out, so they are pushed in reverse.
    fn push_mined(mock: &MockProvider, hash: H256, status: u64) {
        let receipt = TransactionReceipt {
            transaction_hash: hash,
            block_number: Some(1u64.into()),
            status: Some(status.into()),
            ..Default::default()
        };
        let mined = Transaction {
            hash,
            block_number: Some(1u64.into()),
            ..Default::default()
        };
        mock.push(Some(receipt)).unwrap();
        mock.push(Some(mined)).unwrap();
        push_send(mock, hash);
    }

    fn push_send(mock: &MockProvider, hash: H256) {
        mock.push(hash).unwrap();
        // eth_estimateGas and eth_gasPrice
        mock.push(U256::from(100_000u64)).unwrap();
        mock.push(U256::from(100_000u64)).unwrap();
    }

    #[tokio::test]
    async fn successful_receipt_returns_hash() {
        let (client, mock, _dir) = mocked_client();
        let hash = H256::from_low_u64_be(1);
        push_mined(&mock, hash, 1);

        let sent = client
            .transact("sCOD", Address::from_low_u64_be(2), "setVault", vec![Token::Address(Address::from_low_u64_be(3))])
            .await
            .unwrap();
        assert_eq!(sent, hash);
    }

    #[tokio::test]
    async fn reverted_receipt_is_an_error() {
        let (client, mock, _dir) = mocked_client();
        push_mined(&mock, H256::from_low_u64_be(1), 0);

        let err = client
            .transact("sCOD", Address::from_low_u64_be(2), "setVault", vec![Token::Address(Address::from_low_u64_be(3))])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reverted"));
    }

    #[tokio::test]
    async fn dropped_transaction_is_an_error() {
        let (client, mock, _dir) = mocked_client();
        // the initial lookup plus every retry finds nothing
        for _ in 0..4 {
            mock.push::<Option<Transaction>, _>(None).unwrap();
        }
        push_send(&mock, H256::from_low_u64_be(1));

        let err = client
            .transact("sCOD", Address::from_low_u64_be(2), "setVault", vec![Token::Address(Address::from_low_u64_be(3))])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dropped"));
    }

    #[tokio::test]
    async fn unknown_method_sends_nothing() {
        let (client, mock, _dir) = mocked_client();
        let err = client
            .transact("sCOD", Address::from_low_u64_be(2), "setTreasury", Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("`sCOD` has no method `setTreasury`"));
        assert!(mock.assert_request("eth_gasPrice", ()).is_err());
    }

    #[tokio::test]
    async fn call_decodes_outputs() {
        let (client, mock, _dir) = mocked_client();
        mock.push::<Bytes, Bytes>(Bytes::from(encode(&[Token::Uint(U256::from(9u64))]))).unwrap();

        let output = client
            .call("sCOD", Address::from_low_u64_be(2), "decimals", Vec::new())
            .await
            .unwrap();
        assert_eq!(output, vec![Token::Uint(U256::from(9u64))]);
        assert_eq!(client.deployer(), Address::from_low_u64_be(0xdead));
    }
}
