//! Query language front end and execution (C7-C11, §4). Parsing and
//! validation happen before any index is touched; execution and table
//! assembly are the only stages that read the corpus.

pub mod ast;
pub mod cache;
pub mod conditions;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod table;

pub use ast::Query;
pub use cache::{QueryCache, QueryCacheKey, QueryCacheStats};
pub use executor::{execute, ExecutedQuery, ExecutionContext, JoinedMatch, QueryResult};
pub use parser::parse;
pub use table::{assemble, AssembleContext, CellValue, ResultTable};
