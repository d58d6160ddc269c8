//! Round tracker for a Big/Small draw game: polls the venue once a
//! second, predicts the next draw when a round closes, and keeps a
//! scored history of every guess.

pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod predictor;
pub mod present;
pub mod scheduler;
pub mod state;
pub mod storage;
