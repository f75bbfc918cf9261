//! Prelude for the navigator crate.

pub use crate::graph::{ConversionGraph, Edge, BRIDGE_EXCHANGE};
pub use crate::path::Path;
pub use crate::service::{GraphSource, Navigator};
pub use crate::{NavigatorConfig, NavigatorError, Opportunity};

pub use common::types::{Asset, ExchangeId, ExchangeSnapshot, PairListing, PairStatus, Quantity, Ticker};
pub use exchange_adapter_trait::ExchangeAdapter;
pub use rust_decimal::Decimal;
pub use std::sync::Arc;
