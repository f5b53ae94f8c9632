pub mod cli;
pub mod constants;
pub mod error;
pub mod kraken;
pub mod logging;
pub mod lookup;
pub mod protocol;
pub mod server;
pub mod ticker;
pub mod transport;
