mod coach;
mod credits;
mod entry;
mod fields;
mod ledger;
mod student;

pub use coach::*;
pub use credits::*;
pub use entry::*;
pub use fields::*;
pub use ledger::*;
pub use student::*;
