use crate::types::VoiceMessage;

type Hook = Box<dyn Fn() + Send + Sync>;
type ErrorHook = Box<dyn Fn(&str) + Send + Sync>;
type MessageHook = Box<dyn Fn(VoiceMessage) + Send + Sync>;

/// Optional caller hooks. None of them fire once `disconnect` has returned.
#[derive(Default)]
pub struct SessionCallbacks {
    on_stream_start: Option<Hook>,
    on_stream_end: Option<Hook>,
    on_error: Option<ErrorHook>,
    on_message_received: Option<MessageHook>,
}

impl SessionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_stream_start<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_stream_start = Some(Box::new(f));
        self
    }

    pub fn on_stream_end<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_stream_end = Some(Box::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn on_message_received<F>(mut self, f: F) -> Self
    where
        F: Fn(VoiceMessage) + Send + Sync + 'static,
    {
        self.on_message_received = Some(Box::new(f));
        self
    }

    pub(crate) fn stream_started(&self) {
        if let Some(f) = &self.on_stream_start {
            f();
        }
    }

    pub(crate) fn stream_ended(&self) {
        if let Some(f) = &self.on_stream_end {
            f();
        }
    }

    pub(crate) fn error(&self, message: &str) {
        if let Some(f) = &self.on_error {
            f(message);
        }
    }

    pub(crate) fn message_received(&self, message: VoiceMessage) {
        if let Some(f) = &self.on_message_received {
            f(message);
        }
    }
}

impl std::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("on_stream_start", &self.on_stream_start.is_some())
            .field("on_stream_end", &self.on_stream_end.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_message_received", &self.on_message_received.is_some())
            .finish()
    }
}
