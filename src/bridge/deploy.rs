//! Connector deployment: installs the oracle connector and its address
//! resolver on the ledger and wires them together.

use ethers::types::{Address, Bytes, U256};
use tracing::info;

use crate::abi::{abi_pack, abi_word_address};
use crate::core::errors::BridgeError;
use crate::ledger::{Ledger, TransactionOutcome, TransactionRequest};

/// Selector of the connector's callback-address setter.
pub const SET_CALLBACK_SELECTOR: [u8; 4] = [0x9b, 0xb5, 0x14, 0x87];
/// Selector of `setAddr(address)` on the resolver.
pub const SET_ADDR_SELECTOR: [u8; 4] = [0xd1, 0xd8, 0x0f, 0xdf];

/// Addresses of a deployed connector pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorDeployment {
    /// The connector contract whose logs the bridge decodes.
    pub connector: Address,
    /// The resolver that contracts consult to find the connector.
    pub resolver: Address,
}

/// Deploy the connector and resolver, point the connector's callbacks at
/// `operator`, and register the connector with the resolver.
pub async fn deploy_connector(
    ledger: &dyn Ledger,
    operator: Address,
    connector_bytecode: Bytes,
    resolver_bytecode: Bytes,
    gas: U256,
) -> Result<ConnectorDeployment, BridgeError> {
    info!("deploying oracle connector with account {:?}", operator);
    let connector = create_contract(ledger, operator, connector_bytecode, gas).await?;
    info!("generated connector: {:?}", connector);

    let set_callback = abi_pack(SET_CALLBACK_SELECTOR, &[abi_word_address(operator)]);
    call(ledger, operator, connector, set_callback.into(), gas).await?;

    let resolver = create_contract(ledger, operator, resolver_bytecode, gas).await?;
    info!("generated resolver: {:?}", resolver);

    let set_addr = abi_pack(SET_ADDR_SELECTOR, &[abi_word_address(connector)]);
    call(ledger, operator, resolver, set_addr.into(), gas).await?;

    Ok(ConnectorDeployment { connector, resolver })
}

async fn create_contract(
    ledger: &dyn Ledger,
    from: Address,
    bytecode: Bytes,
    gas: U256,
) -> Result<Address, BridgeError> {
    let outcome = ledger
        .submit_transaction(TransactionRequest {
            from,
            to: None,
            gas,
            value: U256::zero(),
            data: bytecode,
        })
        .await?;
    ensure_clean(&outcome)?;
    outcome
        .created_address
        .ok_or_else(|| BridgeError::Ledger("deployment reported no created address".to_string()))
}

async fn call(
    ledger: &dyn Ledger,
    from: Address,
    to: Address,
    data: Bytes,
    gas: U256,
) -> Result<(), BridgeError> {
    let outcome = ledger
        .submit_transaction(TransactionRequest { from, to: Some(to), gas, value: U256::zero(), data })
        .await?;
    ensure_clean(&outcome)
}

fn ensure_clean(outcome: &TransactionOutcome) -> Result<(), BridgeError> {
    match &outcome.exception {
        Some(exception) => Err(BridgeError::Execution(exception.clone())),
        None => Ok(()),
    }
}
