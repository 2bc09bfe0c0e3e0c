//! Caller-facing transaction identity
//!
//! A transaction is the caller's unit of work requesting profiling
//! coverage. The coordinator only needs its identity; all timing is
//! captured internally at the moment of the start/finish call.

/// Identity of a unit of work to be covered by a recording session.
///
/// The `id` is an opaque unique token (typically an event identifier)
/// supplied by the caller; the coordinator never fabricates identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionHandle {
    id: String,
    name: String,
}

impl TransactionHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        TransactionHandle {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_accessors() {
        let tx = TransactionHandle::new("abc-123", "GET /checkout");
        assert_eq!(tx.id(), "abc-123");
        assert_eq!(tx.name(), "GET /checkout");
    }

    #[test]
    fn test_handle_equality_is_by_value() {
        let a = TransactionHandle::new("id", "n");
        let b = TransactionHandle::new("id", "n");
        assert_eq!(a, b);
    }
}
