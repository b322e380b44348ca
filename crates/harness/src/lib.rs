pub mod battery;
pub mod report;

pub use battery::{battery, NamedQuery};
pub use report::{summary_table, BatteryReport, QueryRecord};
