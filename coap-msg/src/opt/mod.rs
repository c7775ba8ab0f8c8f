//! CoAP options: per-option header codec, number classification, and the
//! ordered collection that backs a message's option section.

pub mod header;
pub mod list;
pub mod number;

pub use header::{OptError, OptHeader};
pub use list::{is_request_key_option, OptListError, OptionCursor, OptionList, OptionsIter};
pub use number::{criticality, repeatable, Criticality, OptNumber, Repeatable};
