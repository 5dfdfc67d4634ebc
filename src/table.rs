//! In-memory payloads moved through the data access layer.
//!
//! Tables hold string cells: every engine renders its native values to text
//! on read and the layer performs no schema enforcement.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

use crate::error::DalError;

/// A tabular payload: a header of column names and rows in order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Column names, in order.
    pub columns: Vec<String>,

    /// Rows, each holding one cell per column.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row.
    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Check that every row has exactly one cell per column.
    ///
    /// `path` is only used to label the error.
    pub fn check_shape(&self, path: &Path) -> Result<(), DalError> {
        let expected = self.columns.len();
        match self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != expected)
        {
            Some((index, row)) => Err(DalError::RowShape {
                path: path.to_path_buf(),
                row: index + 1,
                expected,
                found: row.len(),
            }),
            None => Ok(()),
        }
    }

    /// Project the table onto the named columns, in the order given.
    pub fn select(self, names: &[String], path: &Path) -> Result<Table, DalError> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| DalError::UnknownColumn {
                        path: path.to_path_buf(),
                        column: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows = self
            .rows
            .into_iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Table {
            columns: names.to_vec(),
            rows,
        })
    }
}

/// Anything the data access layer can store: a table or a document.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Table(Table),
    Document(Mapping),
}

impl Payload {
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Payload::Table(table) => Some(table),
            Payload::Document(_) => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            Payload::Table(table) => Some(table),
            Payload::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&Mapping> {
        match self {
            Payload::Document(document) => Some(document),
            Payload::Table(_) => None,
        }
    }
}

impl From<Table> for Payload {
    fn from(table: Table) -> Self {
        Payload::Table(table)
    }
}

impl From<Mapping> for Payload {
    fn from(document: Mapping) -> Self {
        Payload::Document(document)
    }
}
