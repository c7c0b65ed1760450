use std::sync::mpsc::Sender;

use tracing::{debug, info};

/// Outbound "this item changed, repaint it" signal. Implementations forward
/// the native-separator path to whatever asks the shell to re-query.
pub trait ChangeNotifier: Send + Sync {
    fn item_changed(&self, native_path: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl ChangeNotifier for TracingNotifier {
    fn item_changed(&self, native_path: &str) {
        info!(path = native_path, "item changed");
    }
}

#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<String>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<String>) -> Self {
        Self { tx }
    }
}

impl ChangeNotifier for ChannelNotifier {
    fn item_changed(&self, native_path: &str) {
        if self.tx.send(native_path.to_string()).is_err() {
            debug!(path = native_path, "change receiver is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn channel_notifier_forwards_path() {
        let (tx, rx) = mpsc::channel();
        let notifier = ChannelNotifier::new(tx);
        notifier.item_changed(r"C:\Cloud\a.txt");
        assert_eq!(rx.recv().unwrap(), r"C:\Cloud\a.txt");
    }

    #[test]
    fn channel_notifier_survives_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        ChannelNotifier::new(tx).item_changed("/Cloud/a.txt");
    }
}
