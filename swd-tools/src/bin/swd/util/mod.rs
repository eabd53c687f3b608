pub mod hexdump;
pub mod logging;
pub mod parse;
