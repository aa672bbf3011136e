//! Control tokens carried by the command and acknowledgement channels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload-free control message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlToken {
    /// Controller -> reader: finish the current iteration and drain
    Stop,
    /// Reader -> controller: cleanup complete, the run is over
    Ack,
}

impl fmt::Display for ControlToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => f.write_str("stop"),
            Self::Ack => f.write_str("ack"),
        }
    }
}
