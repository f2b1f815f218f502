pub mod bridge_status;
pub mod builder;
pub mod executor;

pub use bridge_status::{BridgePollOutcome, BridgeStatusPoller};
pub use builder::TransactionBuilder;
pub use executor::{
    BridgeWatcher, PendingTransaction, TransactionExecutor, TransactionSigner, TxReceipt,
};
