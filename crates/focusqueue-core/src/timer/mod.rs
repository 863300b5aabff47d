mod countdown;

pub use countdown::{CountdownEngine, CountdownSnapshot};
