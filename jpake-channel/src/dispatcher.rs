use std::collections::HashMap;

use crate::proto::{RequestKind, RESULT_OK};
use crate::result::RequestError;

/// Called exactly once with the reply body of a request, or the reason it failed.
pub type Completion = Box<dyn FnOnce(Result<Vec<u8>, RequestError>)>;

struct PendingRequest {
    kind: RequestKind,
    completion: Completion,
}

/// Request id allocation and reply correlation.
///
/// At most one request of each kind may be outstanding at a time.
pub struct Dispatcher {
    next_req_id: u16,
    pending: HashMap<u16, PendingRequest>,
}

impl Dispatcher {
    pub fn new(first_req_id: u16) -> Self {
        Self { next_req_id: first_req_id, pending: HashMap::new() }
    }

    /// Whether a request of `kind` is waiting for its reply.
    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.pending.values().any(|p| p.kind == kind)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Register `completion` for a new request of `kind` and return the id to send it under.
    ///
    /// Fails with `AlreadyInProgress` if a request of the same kind is outstanding, in which case
    /// `completion` is dropped without being called.
    pub fn issue(&mut self, kind: RequestKind, completion: Completion) -> Result<u16, RequestError> {
        if self.is_pending(kind) {
            return Err(RequestError::AlreadyInProgress);
        }
        let req_id = self.next_req_id;
        self.next_req_id = self.next_req_id.wrapping_add(1);
        self.pending.insert(req_id, PendingRequest { kind, completion });
        Ok(req_id)
    }

    /// Forget a request that could not be sent. Its completion is dropped without being called.
    pub fn cancel(&mut self, req_id: u16) -> bool {
        self.pending.remove(&req_id).is_some()
    }

    /// Deliver a reply to the request it answers.
    ///
    /// A non-zero `result` is delivered as `RequestError::Rejected`. Returns the kind of the
    /// completed request, or `None` if `req_id` matches nothing pending.
    pub fn complete(&mut self, req_id: u16, result: i32, body: Vec<u8>) -> Option<RequestKind> {
        let PendingRequest { kind, completion } = self.pending.remove(&req_id)?;
        if result == RESULT_OK {
            completion(Ok(body));
        } else {
            completion(Err(RequestError::Rejected { kind, result }));
        }
        Some(kind)
    }

    /// Fail every pending request with `SessionClosed`. Returns how many there were.
    pub fn sweep(&mut self) -> usize {
        let swept = self.pending.len();
        for (_, p) in self.pending.drain() {
            (p.completion)(Err(RequestError::SessionClosed));
        }
        swept
    }
}
