//! User-visible error notice with identity, so a delayed auto-clear only
//! removes the notice it was scheduled for.

/// A message shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub message: String,
}

/// Holder of the current notice.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
    next_id: u64,
}

impl NoticeBoard {
    /// Replace the current notice and return the new notice's id.
    pub fn post(&mut self, message: impl Into<String>) -> u64 {
        self.next_id += 1;
        self.current = Some(Notice {
            id: self.next_id,
            message: message.into(),
        });
        self.next_id
    }

    /// Remove the notice if it is still `id`. Returns whether it was removed.
    pub fn expire(&mut self, id: u64) -> bool {
        if self.current.as_ref().is_some_and(|n| n.id == id) {
            self.current = None;
            return true;
        }
        false
    }

    /// Remove whatever notice is showing.
    pub fn dismiss(&mut self) {
        self.current = None;
    }

    /// The notice currently showing.
    #[must_use]
    pub const fn current(&self) -> Option<&Notice> {
        self.current.as_ref()
    }
}
