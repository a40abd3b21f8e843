//! Message Classification Patterns
//!
//! Compiles the connect, subscribe and disconnect patterns of a sampler
//! into matchers and classifies inbound messages against them.
//!
//! An empty or malformed pattern never aborts a sample: it degrades to an
//! absent matcher and leaves a diagnostic line behind. Absent connect and
//! subscribe matchers accept every message; an absent disconnect matcher
//! accepts none.

use regex::Regex;

/// Which gate an inbound message satisfies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Matched the connect pattern (or no connect pattern is set)
    Connected,
    /// Matched the subscribe pattern (or no subscribe pattern is set)
    Subscribed,
    /// Matched the disconnect pattern
    Disconnect,
    /// Matched nothing
    Unmatched,
}

impl Classification {
    /// Diagnostic suffix appended after the received message
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Connected => "matched connected pattern",
            Self::Subscribed => "matched subscribe pattern",
            Self::Disconnect => "matched connection close pattern",
            Self::Unmatched => "didn't match any pattern",
        }
    }
}

/// Compiled connect/subscribe/disconnect matchers
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    connect: Option<Regex>,
    subscribe: Option<Regex>,
    disconnect: Option<Regex>,
    diagnostics: Vec<String>,
}

impl PatternSet {
    /// Compile the three pattern strings; never fails
    #[must_use]
    pub fn compile(connect: &str, subscribe: &str, disconnect: &str) -> Self {
        let mut diagnostics = Vec::new();
        let connect = compile_one("connect message", connect, &mut diagnostics);
        let subscribe = compile_one("response message", subscribe, &mut diagnostics);
        let disconnect = compile_one("disconnect", disconnect, &mut diagnostics);
        Self {
            connect,
            subscribe,
            disconnect,
            diagnostics,
        }
    }

    /// Classify a message; first match wins in connect, subscribe, disconnect order
    #[must_use]
    pub fn classify(&self, message: &str) -> Classification {
        if self.connect.as_ref().map_or(true, |re| re.is_match(message)) {
            Classification::Connected
        } else if self.subscribe.as_ref().map_or(true, |re| re.is_match(message)) {
            Classification::Subscribed
        } else if self
            .disconnect
            .as_ref()
            .is_some_and(|re| re.is_match(message))
        {
            Classification::Disconnect
        } else {
            Classification::Unmatched
        }
    }

    /// Whether a usable connect pattern is set
    #[must_use]
    pub const fn has_connect(&self) -> bool {
        self.connect.is_some()
    }

    /// Whether a usable subscribe pattern is set
    #[must_use]
    pub const fn has_subscribe(&self) -> bool {
        self.subscribe.is_some()
    }

    /// Whether a usable disconnect pattern is set
    #[must_use]
    pub const fn has_disconnect(&self) -> bool {
        self.disconnect.is_some()
    }

    /// Diagnostic lines recorded while compiling
    #[must_use]
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }
}

fn compile_one(kind: &str, pattern: &str, diagnostics: &mut Vec<String>) -> Option<Regex> {
    diagnostics.push(format!(" - Using {kind} pattern \"{pattern}\""));
    if pattern.is_empty() {
        return None;
    }
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(kind, pattern, error = %e, "invalid regular expression pattern");
            diagnostics.push(format!(
                " - Invalid {kind} regular expression pattern: {e}"
            ));
            None
        }
    }
}
