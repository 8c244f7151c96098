//! Card commands.

mod issue;

pub use issue::IssueCardCommand;
