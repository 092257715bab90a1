//! Host process integration
//!
//! `HostHooks` is the thin adapter between the host's load/unload
//! notifications and the controller. It calls exactly the API a manual
//! caller would use; the controller itself has no load-time side effects.

pub mod location;

use tracing::subscriber::NoSubscriber;
use tracing::{debug, error, info};

use crate::controller::LifecycleController;
use crate::errors::Result;
use crate::runtime::EmbeddedRuntime;

/// Lifecycle notifications a host delivers to a loaded module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The module was loaded into the process
    Attach,
    /// The module is being unloaded
    Detach,
    ThreadAttach,
    ThreadDetach,
}

pub struct HostHooks<R: EmbeddedRuntime> {
    controller: LifecycleController<R>,
}

impl<R: EmbeddedRuntime> HostHooks<R> {
    pub fn new(controller: LifecycleController<R>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &LifecycleController<R> {
        &self.controller
    }

    /// Start the interpreter. An error means the host should abort the load.
    pub fn attach(&self) -> Result<()> {
        info!("module attached");
        self.controller.start()
    }

    /// Stop the interpreter, blocking until the worker has joined
    pub fn detach(&self) {
        info!("module detaching");
        self.controller.stop();
    }

    /// Detach from a thread whose thread-locals may already be destroyed,
    /// such as an ELF destructor running inside `exit()`. Events the calling
    /// thread would emit are discarded; the worker still logs on its own
    /// thread.
    pub fn unload(&self) {
        tracing::subscriber::with_default(NoSubscriber::default(), || self.detach());
    }

    /// Dispatch a host event. Returns false only when an attach failed.
    pub fn handle(&self, event: HostEvent) -> bool {
        match event {
            HostEvent::Attach => match self.attach() {
                Ok(()) => true,
                Err(e) => {
                    error!(error = %e, "attach failed, refusing load");
                    false
                }
            },
            HostEvent::Detach => {
                self.detach();
                true
            }
            HostEvent::ThreadAttach | HostEvent::ThreadDetach => {
                debug!(?event, "ignoring thread notification");
                true
            }
        }
    }
}
