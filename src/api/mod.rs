pub mod broker;

pub use broker::{BrokerClient, GatewayError, OrderTicket};
