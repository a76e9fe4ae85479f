mod logbook;
mod user;

pub use logbook::*;
pub use user::*;
