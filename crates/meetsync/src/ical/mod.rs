pub mod normalize;
pub mod parser;

pub use normalize::{PropertyError, normalize_event};
pub use parser::{Block, MalformedBlockError, MalformedKind, Node, parse_calendar, parse_export};
