//! DDL (Data Definition Language) support.
//!
//! Types and builders for the statements a rollup build emits:
//! `CREATE TABLE [AS SELECT]`, constraints, indexes, and the trigger DDL
//! that keeps a rollup table in sync with its fact table.
//!
//! # Examples
//!
//! ```ignore
//! use rolap::sql::ddl::{CreateTable, ColumnDef, DataType};
//! use rolap::sql::dialect::Dialect;
//!
//! let table = CreateTable::new("stores")
//!     .column(ColumnDef::new("store_id", DataType::Int64).primary_key())
//!     .column(ColumnDef::new("name", DataType::Text));
//!
//! println!("{}", table.to_sql(Dialect::Sqlite));
//! ```

use super::dialect::{Dialect, SqlDialect};
use super::dml::{Insert, SelectInto, Update};
use super::query::Query;
use super::token::{Token, TokenStream};

// Re-export DataType from sql::types for DDL generation
pub use super::types::DataType;

/// DDL statement types.
#[derive(Debug, Clone, PartialEq)]
pub enum DdlStatement {
    CreateTable(CreateTable),
    AlterTable(AlterTable),
    CreateIndex(CreateIndex),
    CreateFunction(CreateFunction),
    CreateTrigger(CreateTrigger),
}

impl DdlStatement {
    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        match self {
            DdlStatement::CreateTable(ct) => ct.to_tokens(dialect),
            DdlStatement::AlterTable(at) => at.to_tokens(dialect),
            DdlStatement::CreateIndex(ci) => ci.to_tokens(),
            DdlStatement::CreateFunction(cf) => cf.to_tokens(dialect),
            DdlStatement::CreateTrigger(ct) => ct.to_tokens(dialect),
        }
    }
}

// ============================================================================
// CREATE TABLE
// ============================================================================

/// CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
    pub as_query: Option<Box<Query>>,
}

impl CreateTable {
    /// Create a new CREATE TABLE statement.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
            as_query: None,
        }
    }

    /// Add a column definition.
    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    /// Add a table constraint.
    pub fn constraint(mut self, constraint: TableConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Create table from a SELECT query (CREATE TABLE AS SELECT).
    pub fn as_select(mut self, query: Query) -> Self {
        self.as_query = Some(Box::new(query));
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Create)
            .space()
            .push(Token::Table)
            .space()
            .ident(&self.name);

        if let Some(ref query) = self.as_query {
            ts.space()
                .push(Token::As)
                .newline()
                .append(&query.to_tokens_for_dialect(dialect));
        } else {
            ts.space().lparen();

            let mut first = true;
            for col in &self.columns {
                if !first {
                    ts.comma().space();
                }
                first = false;
                ts.append(&col.to_tokens(dialect));
            }

            for constraint in &self.constraints {
                if !first {
                    ts.comma().space();
                }
                first = false;
                ts.append(&constraint.to_tokens());
            }

            ts.rparen();
        }

        ts
    }
}

// ============================================================================
// Column Definition
// ============================================================================

/// Column definition for CREATE TABLE.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
}

impl ColumnDef {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
        }
    }

    /// Add PRIMARY KEY constraint.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.ident(&self.name)
            .space()
            .push(Token::Raw(dialect.emit_data_type(&self.data_type)));

        if self.primary_key {
            ts.space().push(Token::Primary).space().push(Token::Key);
        }

        ts
    }
}

// ============================================================================
// Table Constraints
// ============================================================================

/// Table-level constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraint {
    PrimaryKey {
        name: Option<String>,
        columns: Vec<String>,
    },
    ForeignKey {
        name: Option<String>,
        columns: Vec<String>,
        references_table: String,
        references_columns: Vec<String>,
    },
}

impl TableConstraint {
    /// Create a PRIMARY KEY constraint.
    pub fn primary_key(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TableConstraint::PrimaryKey {
            name: None,
            columns: columns.into_iter().map(|c| c.into()).collect(),
        }
    }

    /// Create a FOREIGN KEY constraint.
    pub fn foreign_key(
        columns: impl IntoIterator<Item = impl Into<String>>,
        references_table: impl Into<String>,
        references_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        TableConstraint::ForeignKey {
            name: None,
            columns: columns.into_iter().map(|c| c.into()).collect(),
            references_table: references_table.into(),
            references_columns: references_columns.into_iter().map(|c| c.into()).collect(),
        }
    }

    /// Attach a constraint name.
    pub fn named(mut self, constraint_name: impl Into<String>) -> Self {
        match &mut self {
            TableConstraint::PrimaryKey { name, .. } | TableConstraint::ForeignKey { name, .. } => {
                *name = Some(constraint_name.into())
            }
        }
        self
    }

    /// Convert to token stream.
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();

        let name = match self {
            TableConstraint::PrimaryKey { name, .. } | TableConstraint::ForeignKey { name, .. } => {
                name
            }
        };
        if let Some(name) = name {
            ts.push(Token::Constraint).space().ident(name).space();
        }

        match self {
            TableConstraint::PrimaryKey { columns, .. } => {
                ts.push(Token::Primary)
                    .space()
                    .push(Token::Key)
                    .space()
                    .ident_list(columns);
            }
            TableConstraint::ForeignKey {
                columns,
                references_table,
                references_columns,
                ..
            } => {
                ts.push(Token::Foreign)
                    .space()
                    .push(Token::Key)
                    .space()
                    .ident_list(columns)
                    .space()
                    .push(Token::References)
                    .space()
                    .ident(references_table)
                    .space()
                    .ident_list(references_columns);
            }
        }

        ts
    }
}

// ============================================================================
// ALTER TABLE
// ============================================================================

/// `ALTER TABLE ... ADD CONSTRAINT ...`
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct AlterTable {
    pub name: String,
    pub constraint: TableConstraint,
}

impl AlterTable {
    pub fn add_constraint(name: impl Into<String>, constraint: TableConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
        }
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    ///
    /// Dialects without `ADD CONSTRAINT` get an empty stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        if !dialect.supports_add_constraint() {
            return ts;
        }
        ts.push(Token::Alter)
            .space()
            .push(Token::Table)
            .space()
            .ident(&self.name)
            .space()
            .push(Token::Add)
            .space()
            .append(&self.constraint.to_tokens());
        ts
    }
}

// ============================================================================
// CREATE INDEX
// ============================================================================

/// CREATE INDEX statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateIndex {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
}

impl CreateIndex {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, col: impl Into<String>) -> Self {
        self.columns.push(col.into());
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens().serialize(dialect)
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Create)
            .space()
            .push(Token::Index)
            .space()
            .ident(&self.name)
            .space()
            .push(Token::On)
            .space()
            .ident(&self.table)
            .space()
            .ident_list(&self.columns);
        ts
    }
}

// ============================================================================
// Procedural statements
// ============================================================================

/// A statement inside a trigger body.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcStatement {
    SelectInto(SelectInto),
    Update(Update),
    Insert(Insert),
    /// `IF NOT FOUND THEN ... END IF` (PL/pgSQL)
    IfNotFound(Vec<ProcStatement>),
    /// `RETURN NEW` (PL/pgSQL)
    ReturnNew,
}

impl ProcStatement {
    /// Tokens for the statement including its terminating `;`.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            ProcStatement::SelectInto(s) => {
                ts.append(&s.to_tokens(dialect));
            }
            ProcStatement::Update(u) => {
                ts.append(&u.to_tokens(dialect));
            }
            ProcStatement::Insert(i) => {
                ts.append(&i.to_tokens(dialect));
            }
            ProcStatement::IfNotFound(body) => {
                ts.push(Token::If)
                    .space()
                    .push(Token::Not)
                    .space()
                    .push(Token::Raw("FOUND".into()))
                    .space()
                    .push(Token::Then)
                    .newline();
                for stmt in body {
                    ts.append(&stmt.to_tokens(dialect)).newline();
                }
                ts.push(Token::End).space().push(Token::If);
            }
            ProcStatement::ReturnNew => {
                ts.push(Token::Return)
                    .space()
                    .push(Token::Raw("NEW".into()));
            }
        }
        ts.push(Token::Semicolon);
        ts
    }
}

// ============================================================================
// CREATE FUNCTION (trigger function)
// ============================================================================

/// A PL/pgSQL trigger function.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateFunction {
    pub name: String,
    /// `(variable, row type table)` pairs declared as `var table%ROWTYPE`.
    pub declarations: Vec<(String, String)>,
    pub body: Vec<ProcStatement>,
}

impl CreateFunction {
    pub fn trigger(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declarations: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn declare_row(mut self, variable: impl Into<String>, table: impl Into<String>) -> Self {
        self.declarations.push((variable.into(), table.into()));
        self
    }

    pub fn statement(mut self, stmt: ProcStatement) -> Self {
        self.body.push(stmt);
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Create)
            .space()
            .push(Token::Or)
            .space()
            .push(Token::Raw("REPLACE".into()))
            .space()
            .push(Token::Function)
            .space()
            .ident(&self.name)
            .lparen()
            .rparen()
            .space()
            .push(Token::Returns)
            .space()
            .push(Token::Trigger)
            .space()
            .push(Token::As)
            .space()
            .push(Token::Raw("$$".into()))
            .newline();

        if !self.declarations.is_empty() {
            ts.push(Token::Declare).newline();
            for (var, table) in &self.declarations {
                ts.indent(1)
                    .ident(var)
                    .space()
                    .ident(table)
                    .push(Token::Raw("%ROWTYPE".into()))
                    .push(Token::Semicolon)
                    .newline();
            }
        }

        ts.push(Token::Begin).newline();
        for stmt in &self.body {
            ts.append(&stmt.to_tokens(dialect)).newline();
        }
        ts.push(Token::End)
            .push(Token::Semicolon)
            .newline()
            .push(Token::Raw("$$".into()))
            .space()
            .push(Token::Language)
            .space()
            .push(Token::Raw("plpgsql".into()));
        ts
    }
}

// ============================================================================
// CREATE TRIGGER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Update,
}

/// What a trigger runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerAction {
    /// `EXECUTE PROCEDURE fn()`
    Execute(String),
    /// `BEGIN stmt; ... END`
    Inline(Vec<ProcStatement>),
}

/// Row-level CREATE TRIGGER statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTrigger {
    pub name: String,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    pub table: String,
    pub action: TriggerAction,
}

impl CreateTrigger {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Create)
            .space()
            .push(Token::Trigger)
            .space()
            .ident(&self.name)
            .space()
            .push(match self.timing {
                TriggerTiming::Before => Token::Before,
                TriggerTiming::After => Token::After,
            })
            .space()
            .push(match self.event {
                TriggerEvent::Insert => Token::Insert,
                TriggerEvent::Update => Token::Update,
            })
            .space()
            .push(Token::On)
            .space()
            .ident(&self.table)
            .space()
            .push(Token::For)
            .space()
            .push(Token::Each)
            .space()
            .push(Token::Row);

        match &self.action {
            TriggerAction::Execute(function) => {
                ts.space()
                    .push(Token::Execute)
                    .space()
                    .push(Token::Procedure)
                    .space()
                    .ident(function)
                    .lparen()
                    .rparen();
            }
            TriggerAction::Inline(body) => {
                ts.newline().push(Token::Begin).newline();
                for stmt in body {
                    ts.append(&stmt.to_tokens(dialect)).newline();
                }
                ts.push(Token::End);
            }
        }
        ts
    }
}

// ============================================================================
// Tests
// ============================================================================
