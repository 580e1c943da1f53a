//! Shared fixtures for host integration tests.

use std::cell::Cell;
use std::rc::Rc;

use viewer_lock_core::Configuration;
use viewer_lock_host::{Host, SharedHost, WindowControl};

/// Window double that records queued close requests.
pub struct RecordingWindow {
    pub close_requests: Rc<Cell<u32>>,
}

impl WindowControl for RecordingWindow {
    fn request_close(&mut self) {
        self.close_requests.set(self.close_requests.get() + 1);
    }
}

/// Creates a shared host with the reference secrets and an open window.
#[allow(dead_code)]
pub fn fixture_host() -> (SharedHost<RecordingWindow>, Rc<Cell<u32>>) {
    let close_requests = Rc::new(Cell::new(0));
    let config = Configuration::new("secret42", 30, 3, ["alice", "bob"]);
    let mut host = Host::new(config, "fixture-user");
    let window = RecordingWindow {
        close_requests: Rc::clone(&close_requests),
    };
    host.create_window(|_| Ok(window))
        .expect("fixture window should be created");
    (host.into_shared(), close_requests)
}
