//! Parser for HTCondor job event logs (the classic text user log format)
//!
//! ```text
//! 000 (1234.000.000) 2024-03-01 10:00:00 Job submitted from host: <10.0.0.1:9618>
//!     DAG Node: generation
//! ...
//! 005 (1234.000.000) 2024-03-01 11:00:00 Job terminated.
//!     (1) Normal termination (return value 0)
//! ...
//! ```

use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Submit,
    Execute,
    JobEvicted,
    JobTerminated,
    JobAborted,
    JobHeld,
    JobReleased,
    Other(u16),
}

impl EventKind {
    fn from_code(code: u16) -> EventKind {
        match code {
            0 => EventKind::Submit,
            1 => EventKind::Execute,
            4 => EventKind::JobEvicted,
            5 => EventKind::JobTerminated,
            9 => EventKind::JobAborted,
            12 => EventKind::JobHeld,
            13 => EventKind::JobReleased,
            other => EventKind::Other(other),
        }
    }
}

/// How a terminated job ended
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    Normal { return_value: i32 },
    Abnormal { signal: i32 },
}

impl Termination {
    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Normal { return_value: 0 })
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Termination::Normal { return_value } => {
                write!(f, "exited with return value {return_value}")
            }
            Termination::Abnormal { signal } => write!(f, "was killed by signal {signal}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub cluster: i64,
    /// DAG node name from the submit event's log notes
    pub node: Option<String>,
    pub termination: Option<Termination>,
}

/// Parse every complete event in a log. Malformed events are skipped.
pub fn parse_events(log: &str) -> Vec<Event> {
    let mut events = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    for line in log.lines() {
        if line.trim() == "..." {
            if let Some(event) = parse_event(&lines) {
                events.push(event);
            }
            lines.clear();
        } else {
            lines.push(line);
        }
    }
    events
}

fn parse_event(lines: &[&str]) -> Option<Event> {
    let (header, body) = lines.split_first()?;
    let (code, rest) = header.trim().split_once(' ')?;
    let code: u16 = code.parse().ok()?;

    // "(1234.000.000) ..."
    let id = rest.trim_start().strip_prefix('(')?.split(')').next()?;
    let cluster: i64 = id.split('.').next()?.parse().ok()?;

    let mut node = None;
    let mut termination = None;
    for line in body.iter().map(|line| line.trim()) {
        if let Some(name) = line.strip_prefix("DAG Node:") {
            node = Some(name.trim().to_string());
        } else if termination.is_none() {
            termination = parse_termination(line);
        }
    }

    Some(Event { kind: EventKind::from_code(code), cluster, node, termination })
}

fn parse_termination(line: &str) -> Option<Termination> {
    if let Some(rest) = line.strip_prefix("(1) Normal termination (return value ") {
        let return_value = rest.strip_suffix(')')?.trim().parse().ok()?;
        Some(Termination::Normal { return_value })
    } else if let Some(rest) = line.strip_prefix("(0) Abnormal termination (signal ") {
        let signal = rest.strip_suffix(')')?.trim().parse().ok()?;
        Some(Termination::Abnormal { signal })
    } else {
        None
    }
}
