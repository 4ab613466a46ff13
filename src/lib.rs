pub mod binding;
pub mod definitions;
pub mod expr;
pub mod format;
pub mod parsing;
pub mod position;
pub mod proof;
pub mod utils;

pub use binding::{match_template, Formula, MatchResult};
pub use definitions::{Definitions, SymbolTables, TableError};
pub use expr::{EditError, Expression, ExpressionKind, TypeExpression, VariableNaming};
pub use parsing::{parse, tokenize, ParseError};
pub use position::{TreePath, TreePathBuf};
pub use proof::{ProofStep, StepError, StepKind};
