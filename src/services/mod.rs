mod logbook;
mod storage;
mod user;

pub use logbook::*;
pub use storage::*;
pub use user::*;
