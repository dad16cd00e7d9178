//! Table-level source model: identities, offsets, schemas, parsed changes.

pub mod event;
pub mod offset;
pub mod parser;
pub mod schema;
pub mod table;


pub use event::{ChangeEvent, Operation, SourceRecord};
pub use offset::Offset;
pub use parser::{parse_redo, ParsedChange};
pub use schema::{Column, ColumnType, FieldValue, RowImage, RowSchema, SchemaCache};
pub use table::{TableFilter, TableId};
