//! Stream candidate extraction from captured page state

pub mod candidates;

pub use candidates::{
    extract_candidates, CandidateSource, CdnProfile, EventPhase, NetworkEvent, StreamCandidate,
    StreamKind,
};
