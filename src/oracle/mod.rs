pub mod gas;
pub mod price;

pub use gas::{gas_cost_usd, GasOracle};
pub use price::{PriceOracle, UsdcProbe};
