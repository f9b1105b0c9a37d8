//! Derived inventory figures: stock balances and plan completion.

pub mod completion;
pub mod reconcile;

pub use completion::{percentage, PlanProgress, RealVsPlanned};
pub use reconcile::{EntryChange, StockDrift};
