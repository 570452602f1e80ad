mod balance;
mod order;
mod order_status;
mod order_type;
mod position;
mod side;
mod time_in_force;

pub use balance::AssetBalance;
pub use order::{OrderRequest, ValidationError};
pub use order_status::OrderStatus;
pub use order_type::OrderType;
pub use position::PositionSnapshot;
pub use side::Side;
pub use time_in_force::TimeInForce;
