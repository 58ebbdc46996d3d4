//! Client session for the content aggregation server.
//!
//! The aggregation server answers paginated content queries much faster
//! than querying relays event by event, but it is optional infrastructure
//! and may be down. [`AggregationSession`] tracks whether the server may be
//! used right now, probes its health, backs off exponentially while it is
//! unreachable, and multiplexes requests so that at most one request per
//! caller-chosen key is in flight.
//!
//! Consumers check [`AggregationSession::is_active`] (or
//! [`AggregationSession::is_relay_fallback_active`]) and fall back to direct
//! relay queries when the server is unavailable.

pub mod api;
pub mod config;
pub mod error;
pub mod registry;
pub mod session;
pub mod state;
pub mod transport;

pub use api::{
    EventFilter, HealthResponse, ModerationMode, ModerationOptions, PageRequest, Pagination,
    PaginatedEventsRequest, PaginatedEventsResponse, SortOrder,
};
pub use config::{normalize_server_url, SessionConfig};
pub use error::{SessionError, TransportError};
pub use registry::{InFlight, InFlightRegistry};
pub use session::AggregationSession;
pub use state::{ServerState, SessionEvent, SessionStatus, Transition};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
