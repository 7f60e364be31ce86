//! Session hooks: the context block printed at session start and the
//! per-session state consulted by later hooks.

pub mod context;
pub mod keywords;
pub mod state;

pub use context::{
    build_session_context, SectionFailures, SessionContext, SessionContextOptions, CONTEXT_END,
    CONTEXT_START,
};
pub use keywords::{extract_keywords, issue_number_from_branch};
pub use state::{SessionState, SessionTracker, SESSION_ID_ENV};
