//! Block driver and consensus-facing surface.
//!
//! The [`App`] sits between an external BFT consensus engine and the
//! application state: it consumes the ordered transaction stream through
//! the begin/check/deliver/commit lifecycle, answers info and query
//! requests from the last committed view, and returns the main root as
//! the application hash after every block. Signature verification and
//! signer authorization happen here, before any mutation reaches the
//! state layer.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod abci;
pub use abci::{
    RequestBeginBlock, RequestCheckTx, RequestCommit, RequestDeliverTx, RequestInfo,
    RequestInitChain, RequestQuery, ResponseBeginBlock, ResponseCheckTx, ResponseCommit,
    ResponseDeliverTx, ResponseInfo, ResponseInitChain, ResponseQuery,
};

mod app;
pub use app::App;

mod error;
pub use error::AppError;

mod genesis;
pub use genesis::{GenesisAppState, GenesisValidator};

mod query;
pub use query::QueryData;

mod tx;
