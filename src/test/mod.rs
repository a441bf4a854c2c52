mod block_days;
pub mod utils;
