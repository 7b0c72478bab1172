pub mod adjudicator;
pub mod game_service;
pub mod persistence;
pub mod phase;
pub mod resolver;
pub mod session;
pub mod session_manager;
