pub mod codec;
pub mod discover;
pub mod members;

pub use codec::TextEncoding;
pub use discover::{list_zip_archives, year_label};
pub use members::{is_eligible_member, MemberArchive};
