mod availability;
mod common;
mod roster;
