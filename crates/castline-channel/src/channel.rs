use castline_core::EventFanout;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One line said on a channel by `author`.
pub struct ChannelMessage {
    pub author: String,
    pub text: String,
}

impl ChannelMessage {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }
}

/// Trait contract for pub/sub channels the relay speaks to.
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Sends `text` as `author`; multi-line text becomes one line per send.
    fn send(&self, author: &str, text: &str);

    /// Messages said on the channel by participants.
    fn inbound(&self) -> &EventFanout<ChannelMessage>;
}

/// Prefixes `#` unless the name already carries it.
pub fn normalize_channel_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.starts_with('#') {
        trimmed.to_string()
    } else {
        format!("#{trimmed}")
    }
}

/// Splits outbound text on CR, LF, or CRLF, dropping empty lines.
pub fn split_outbound_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == '\r' || c == '\n').filter(|line| !line.is_empty())
}

/// In-process channel used by the console front end and tests.
#[derive(Debug)]
pub struct LocalChannel {
    name: String,
    inbound: EventFanout<ChannelMessage>,
    outbound: EventFanout<ChannelMessage>,
}

impl LocalChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_channel_name(name),
            inbound: EventFanout::new(),
            outbound: EventFanout::new(),
        }
    }

    /// Simulates a participant saying `text`.
    pub fn inject(&self, author: &str, text: &str) {
        self.inbound.emit(&ChannelMessage::new(author, text));
    }

    /// Lines sent to the channel, one event per line.
    pub fn outbound(&self) -> &EventFanout<ChannelMessage> {
        &self.outbound
    }
}

impl Channel for LocalChannel {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn send(&self, author: &str, text: &str) {
        for line in split_outbound_lines(text) {
            self.outbound.emit(&ChannelMessage::new(author, line));
        }
    }

    fn inbound(&self) -> &EventFanout<ChannelMessage> {
        &self.inbound
    }
}
