//! Free-text field grammars
//!
//! Each grammar is a small ordered set of alternatives with its own
//! precedence and unit conversion, kept separate so they can be tested in
//! isolation.

pub mod date;
pub mod duration;
pub mod money;

pub use date::{parse_date, DateForm};
pub use duration::parse_runtime;
pub use money::{parse_budget, parse_money};
