//! Authoritative game server: owns the world simulation, runs the tick
//! loop and fans state out to every connected TCP session.

pub mod game;
pub mod network;
pub mod session;
