//! # Request trace records.
//!
//! Every record kind has one fixed descriptor (`id`, `name`, `level`,
//! `message`) in a `static` table built at compile time and never mutated.
//! The gate hands typed [`TraceRecord`]s to a [`TraceSink`]; emission is
//! fire-and-forget and must not block the request.
//!
//! | id | name                            | level |
//! |----|---------------------------------|-------|
//! | 1  | ResponseStarted                 | DEBUG |
//! | 2  | UnhandledHostError              | ERROR |
//! | 3  | InitiatingHostAvailabilityCheck | TRACE |
//! | 4  | HostUnavailableAfterCheck       | WARN  |
//! | 5  | HostAvailabilityCheckSucceeded  | TRACE |
//! | 6  | RequestStarted                  | INFO  |
//! | 7  | RequestCompleted                | INFO  |
//! | 8  | DuplicateHeadersRemoved         | DEBUG |

use std::fmt;

use tracing::Level;

/// Kind of a trace record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    ResponseStarted,
    UnhandledHostError,
    InitiatingHostAvailabilityCheck,
    HostUnavailableAfterCheck,
    HostAvailabilityCheckSucceeded,
    RequestStarted,
    RequestCompleted,
    DuplicateHeadersRemoved,
}

/// Fixed metadata of one [`TraceKind`].
#[derive(Debug)]
pub struct TraceDescriptor {
    pub id: u16,
    pub name: &'static str,
    pub level: Level,
    pub message: &'static str,
}

static DESCRIPTORS: [TraceDescriptor; 8] = [
    TraceDescriptor {
        id: 1,
        name: "ResponseStarted",
        level: Level::DEBUG,
        message: "The response has already started, the status code will not be modified.",
    },
    TraceDescriptor {
        id: 2,
        name: "UnhandledHostError",
        level: Level::ERROR,
        message: "An unhandled host error has occurred.",
    },
    TraceDescriptor {
        id: 3,
        name: "InitiatingHostAvailabilityCheck",
        level: Level::TRACE,
        message: "Initiating host availability check.",
    },
    TraceDescriptor {
        id: 4,
        name: "HostUnavailableAfterCheck",
        level: Level::WARN,
        message: "Host unavailable after check. Returning error.",
    },
    TraceDescriptor {
        id: 5,
        name: "HostAvailabilityCheckSucceeded",
        level: Level::TRACE,
        message: "Host availability check succeeded.",
    },
    TraceDescriptor {
        id: 6,
        name: "RequestStarted",
        level: Level::INFO,
        message: "Executing HTTP request.",
    },
    TraceDescriptor {
        id: 7,
        name: "RequestCompleted",
        level: Level::INFO,
        message: "Executed HTTP request.",
    },
    TraceDescriptor {
        id: 8,
        name: "DuplicateHeadersRemoved",
        level: Level::DEBUG,
        message: "Duplicate HTTP header from function invocation removed.",
    },
];

impl TraceKind {
    /// Descriptor of this kind from the static table.
    pub fn descriptor(self) -> &'static TraceDescriptor {
        let idx = match self {
            TraceKind::ResponseStarted => 0,
            TraceKind::UnhandledHostError => 1,
            TraceKind::InitiatingHostAvailabilityCheck => 2,
            TraceKind::HostUnavailableAfterCheck => 3,
            TraceKind::HostAvailabilityCheckSucceeded => 4,
            TraceKind::RequestStarted => 5,
            TraceKind::RequestCompleted => 6,
            TraceKind::DuplicateHeadersRemoved => 7,
        };
        &DESCRIPTORS[idx]
    }
}

/// A structured record produced by the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceRecord {
    RequestStarted {
        request_id: String,
        method: String,
        path: String,
        user_agent: String,
    },
    RequestCompleted {
        request_id: String,
        identities: String,
        status: u16,
        duration_ms: u64,
    },
    UnhandledHostError {
        request_id: String,
        label: &'static str,
        error: String,
    },
    ResponseStarted {
        request_id: String,
    },
    InitiatingHostAvailabilityCheck {
        request_id: String,
    },
    HostUnavailableAfterCheck {
        request_id: String,
    },
    HostAvailabilityCheckSucceeded {
        request_id: String,
    },
    DuplicateHeadersRemoved {
        request_id: String,
        keys: String,
    },
}

impl TraceRecord {
    pub fn kind(&self) -> TraceKind {
        match self {
            TraceRecord::RequestStarted { .. } => TraceKind::RequestStarted,
            TraceRecord::RequestCompleted { .. } => TraceKind::RequestCompleted,
            TraceRecord::UnhandledHostError { .. } => TraceKind::UnhandledHostError,
            TraceRecord::ResponseStarted { .. } => TraceKind::ResponseStarted,
            TraceRecord::InitiatingHostAvailabilityCheck { .. } => {
                TraceKind::InitiatingHostAvailabilityCheck
            }
            TraceRecord::HostUnavailableAfterCheck { .. } => TraceKind::HostUnavailableAfterCheck,
            TraceRecord::HostAvailabilityCheckSucceeded { .. } => {
                TraceKind::HostAvailabilityCheckSucceeded
            }
            TraceRecord::DuplicateHeadersRemoved { .. } => TraceKind::DuplicateHeadersRemoved,
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            TraceRecord::RequestStarted { request_id, .. }
            | TraceRecord::RequestCompleted { request_id, .. }
            | TraceRecord::UnhandledHostError { request_id, .. }
            | TraceRecord::ResponseStarted { request_id }
            | TraceRecord::InitiatingHostAvailabilityCheck { request_id }
            | TraceRecord::HostUnavailableAfterCheck { request_id }
            | TraceRecord::HostAvailabilityCheckSucceeded { request_id }
            | TraceRecord::DuplicateHeadersRemoved { request_id, .. } => request_id,
        }
    }
}

/// Renders the record-specific fields as `key=value` pairs.
impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceRecord::RequestStarted {
                method,
                path,
                user_agent,
                ..
            } => write!(f, "method={method} path={path} user_agent={user_agent:?}"),
            TraceRecord::RequestCompleted {
                identities,
                status,
                duration_ms,
                ..
            } => write!(
                f,
                "identities={identities:?} status={status} duration_ms={duration_ms}"
            ),
            TraceRecord::UnhandledHostError { label, error, .. } => {
                write!(f, "label={label} error={error:?}")
            }
            TraceRecord::DuplicateHeadersRemoved { keys, .. } => write!(f, "keys={keys:?}"),
            _ => Ok(()),
        }
    }
}

/// Consumer of gate trace records (the external log sink).
///
/// `emit` is called inline on the request path and must not block.
pub trait TraceSink: Send + Sync + 'static {
    fn emit(&self, record: TraceRecord);
}

/// Default sink: forwards records to `tracing` at their descriptor level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

macro_rules! emit_at {
    ($level:expr, $($rest:tt)+) => {
        if $level == Level::ERROR {
            tracing::event!(Level::ERROR, $($rest)+)
        } else if $level == Level::WARN {
            tracing::event!(Level::WARN, $($rest)+)
        } else if $level == Level::INFO {
            tracing::event!(Level::INFO, $($rest)+)
        } else if $level == Level::DEBUG {
            tracing::event!(Level::DEBUG, $($rest)+)
        } else {
            tracing::event!(Level::TRACE, $($rest)+)
        }
    };
}

impl TraceSink for TracingSink {
    fn emit(&self, record: TraceRecord) {
        let d = record.kind().descriptor();
        emit_at!(
            d.level,
            event_id = d.id,
            event_name = d.name,
            request_id = record.request_id(),
            "{} {}",
            d.message,
            record
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_table_matches_kinds() {
        let kinds = [
            TraceKind::ResponseStarted,
            TraceKind::UnhandledHostError,
            TraceKind::InitiatingHostAvailabilityCheck,
            TraceKind::HostUnavailableAfterCheck,
            TraceKind::HostAvailabilityCheckSucceeded,
            TraceKind::RequestStarted,
            TraceKind::RequestCompleted,
            TraceKind::DuplicateHeadersRemoved,
        ];
        for (i, kind) in kinds.iter().enumerate() {
            let d = kind.descriptor();
            assert_eq!(d.id as usize, i + 1);
            assert_eq!(d.name, format!("{kind:?}"));
        }
        assert_eq!(TraceKind::UnhandledHostError.descriptor().level, Level::ERROR);
        assert_eq!(
            TraceKind::ResponseStarted.descriptor().message,
            "The response has already started, the status code will not be modified."
        );
    }

    #[test]
    fn test_record_display_lists_fields() {
        let r = TraceRecord::RequestCompleted {
            request_id: "r1".into(),
            identities: "(A:admin)".into(),
            status: 503,
            duration_ms: 12,
        };
        assert_eq!(r.request_id(), "r1");
        assert_eq!(
            r.to_string(),
            "identities=\"(A:admin)\" status=503 duration_ms=12"
        );
    }
}
