pub mod checklist;
pub mod inference;
pub mod normalizer;
pub mod orchestrator;
pub mod poller;
pub mod rate_limit;
pub mod storage;
