use tokio::sync::watch;

/// One-shot signal that the first diff batch has been processed.
#[derive(Debug)]
pub(crate) struct InitialItemsGate {
    opened: watch::Sender<bool>,
}

impl InitialItemsGate {
    pub(crate) fn new() -> Self {
        let (opened, _) = watch::channel(false);
        Self { opened }
    }

    /// Must be called at most once.
    pub(crate) fn open(&self) {
        let was_open = self.opened.send_replace(true);
        debug_assert!(!was_open, "initial items gate opened twice");
    }

    pub(crate) fn is_open(&self) -> bool {
        *self.opened.borrow()
    }

    pub(crate) async fn wait(&self) {
        let mut receiver = self.opened.subscribe();
        // The sender lives as long as `self`, so this can't observe a closed channel.
        let _ = receiver.wait_for(|opened| *opened).await;
    }
}
