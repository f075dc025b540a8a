//! Mock interception point for unit testing.
//!
//! Allows tests to push scancode bytes through whatever rewriter is attached
//! and observe the forwarded result, without requiring a scancode device or
//! elevated privileges.

use std::sync::{Arc, Mutex};

use super::{InterceptError, InterceptPoint, ScancodeRewriter};

/// A mock implementation of [`InterceptPoint`] that lets tests feed bytes.
pub struct MockInterceptPoint {
    rewriter: Mutex<Option<Arc<dyn ScancodeRewriter>>>,
    attach_point: Mutex<Option<String>>,
    fail_next_attach: Mutex<bool>,
    detach_count: Mutex<u32>,
}

impl MockInterceptPoint {
    /// Creates a new, unattached mock.
    pub fn new() -> Self {
        Self {
            rewriter: Mutex::new(None),
            attach_point: Mutex::new(None),
            fail_next_attach: Mutex::new(false),
            detach_count: Mutex::new(0),
        }
    }

    /// Makes the next `attach` call fail as if the attach point did not exist.
    pub fn fail_next_attach(&self) {
        *self.fail_next_attach.lock().expect("lock poisoned") = true;
    }

    /// Feeds one byte through the attached rewriter, as if it had arrived
    /// from hardware, and returns the byte that would be forwarded.
    ///
    /// Panics if `attach()` has not been called or `detach()` has been called.
    pub fn feed(&self, byte: u8) -> u8 {
        let guard = self.rewriter.lock().expect("lock poisoned");
        let rewriter = guard
            .as_ref()
            .expect("MockInterceptPoint::feed called before attach()");
        let mut byte = byte;
        rewriter.rewrite(&mut byte);
        byte
    }

    /// Feeds a whole stream and returns the forwarded bytes.
    pub fn feed_stream(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.iter().map(|&b| self.feed(b)).collect()
    }

    /// Returns the attach point passed to the most recent `attach` call.
    pub fn attached_to(&self) -> Option<String> {
        self.attach_point.lock().expect("lock poisoned").clone()
    }

    /// Returns `true` while a rewriter is registered.
    pub fn is_attached(&self) -> bool {
        self.rewriter.lock().expect("lock poisoned").is_some()
    }

    /// Returns the number of times `detach` was called.
    pub fn detach_count(&self) -> u32 {
        *self.detach_count.lock().expect("lock poisoned")
    }
}

impl Default for MockInterceptPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl InterceptPoint for MockInterceptPoint {
    fn attach(
        &self,
        attach_point: &str,
        rewriter: Arc<dyn ScancodeRewriter>,
    ) -> Result<(), InterceptError> {
        if std::mem::take(&mut *self.fail_next_attach.lock().expect("lock poisoned")) {
            return Err(InterceptError::Attach {
                attach_point: attach_point.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "injected attach failure"),
            });
        }

        let mut guard = self.rewriter.lock().expect("lock poisoned");
        if guard.is_some() {
            return Err(InterceptError::AlreadyAttached);
        }
        *guard = Some(rewriter);
        *self.attach_point.lock().expect("lock poisoned") = Some(attach_point.to_string());
        Ok(())
    }

    fn detach(&self) {
        *self.rewriter.lock().expect("lock poisoned") = None;
        *self.detach_count.lock().expect("lock poisoned") += 1;
    }
}
