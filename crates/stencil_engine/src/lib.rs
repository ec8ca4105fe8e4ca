//! Generic instantiation by GC shape and dictionary.
//!
//! Every generic declaration is compiled once per tuple of type-argument shapes. The exact type
//! arguments travel at run time in a dictionary passed as a hidden first parameter.

pub mod analyze;
mod closure;
pub mod dictionary;
mod driver;
mod dump;
pub mod instantiate;
pub mod naming;
pub mod report;
pub mod session;
mod shape;

pub use analyze::{BodyInfo, SiteKind, SubDictSite};
pub use dictionary::{DictEntry, DictKey, DictWord, Dictionary, DictionaryId};
pub use instantiate::{InstId, InstKey, Instantiation, SlotRead, SlotSource};
pub use report::StencilReport;
pub use session::{BodySource, DictContext, EngineResult, Session, SummaryStore};
