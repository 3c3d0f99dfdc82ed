pub mod client;
pub mod public;
pub mod stylist;
