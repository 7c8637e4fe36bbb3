//! Decoder plans: building them from a header, and applying them to rows.

use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use log::{debug, trace};
use thiserror::Error;

use crate::{BoxError, avec::Record};

use super::{
    bind::{BindError, Routine, bind},
    field::{FieldMetadata, Location, extract},
    header::HeaderMap,
    row::Row,
};

/// An error building a decoder plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A required field has no column in the header.
    #[error("Required field `{field}` is missing from the header (column `{column}`).")]
    MissingRequired { field: String, column: String },
    /// A field's custom decoder could not be bound.
    #[error("Failed to bind the decoder of field `{field}`: {source}")]
    Bind {
        field: String,
        #[source]
        source: BindError,
    },
}

/// An error decoding a row.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The row does not reach the last column read by the plan.
    #[error("Row has {found} columns, but column {last_column} is required.")]
    RowTooShort { found: usize, last_column: usize },
    /// A field failed to decode.
    #[error("Failed to decode field `{field}` from column {column} (`{column_name}`): {source}")]
    Field {
        field: String,
        column_name: String,
        column: usize,
        #[source]
        source: BoxError,
    },
    /// The record has no field at a location named by the plan.
    #[error("Record has no field at location {location} (`{field}`).")]
    Location { field: String, location: Location },
}

/// One step of a decoder plan: a column, the field it is written to, and the
/// routine converting it.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub column: usize,
    pub column_name: String,
    pub location: Location,
    pub field: String,
    pub routine: Routine,
}

/// A precomputed binding of header columns to the fields of a record type.
///
/// A plan is immutable once built, and may decode any number of rows, from
/// any number of threads.
pub struct DecoderPlan<R> {
    entries: Vec<PlanEntry>,
    last_column: usize,
    _phantom: PhantomData<fn() -> R>,
}

impl<R> Clone for DecoderPlan<R> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            last_column: self.last_column,
            _phantom: PhantomData,
        }
    }
}

impl<R> fmt::Debug for DecoderPlan<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderPlan")
            .field("record", &type_name::<R>())
            .field("entries", &self.entries)
            .field("last_column", &self.last_column)
            .finish()
    }
}

impl<R: Record> DecoderPlan<R> {
    /// Build a plan for a header from the fields of the record type.
    pub fn build(headers: &HeaderMap) -> Result<Self, PlanError> {
        Self::from_metadata(&extract::<R>(), headers)
    }

    /// Build a plan for a header from previously extracted field metadata.
    ///
    /// Fields are visited in declaration order. A field whose column is
    /// missing from the header is skipped if optional, and fails the build if
    /// required. The remaining fields have their decode routine bound.
    pub fn from_metadata(
        fields: &[FieldMetadata],
        headers: &HeaderMap,
    ) -> Result<Self, PlanError> {
        let mut entries = Vec::with_capacity(fields.len());
        let mut last_column = 0;

        for field in fields {
            let Some(column) = headers.get(&field.column) else {
                if field.required {
                    Err(PlanError::MissingRequired {
                        field: field.path.clone(),
                        column: field.column.clone(),
                    })?;
                }

                debug!("Skipping optional field `{}` without a column.", field.path);
                continue;
            };

            let routine = bind(field).map_err(|source| PlanError::Bind {
                field: field.path.clone(),
                source,
            })?;

            trace!("Binding column {column} to field `{}` with {routine:?}.", field.path);

            last_column = last_column.max(column);

            entries.push(PlanEntry {
                column,
                column_name: field.column.clone(),
                location: field.location.clone(),
                field: field.path.clone(),
                routine,
            });
        }

        debug!(
            "Built a decoder plan for `{}` with {} entries, reading up to column {last_column}.",
            type_name::<R>(),
            entries.len(),
        );

        Ok(Self {
            entries,
            last_column,
            _phantom: PhantomData,
        })
    }

    /// Decode a row into a destination record.
    ///
    /// The row must reach the last column read by the plan. Fields are written
    /// in declaration order, stopping at the first that fails; earlier fields
    /// remain written.
    pub fn decode(&self, o: &mut R, row: &(impl Row + ?Sized)) -> Result<(), DecodeError> {
        if row.len() <= self.last_column {
            Err(DecodeError::RowTooShort {
                found: row.len(),
                last_column: self.last_column,
            })?;
        }

        for entry in &self.entries {
            let raw = row.get(entry.column).ok_or(DecodeError::RowTooShort {
                found: row.len(),
                last_column: self.last_column,
            })?;

            let Some(field) = o.field_mut(&entry.location.0) else {
                Err(DecodeError::Location {
                    field: entry.field.clone(),
                    location: entry.location.clone(),
                })?
            };

            entry
                .routine
                .call(field, raw)
                .map_err(|source| DecodeError::Field {
                    field: entry.field.clone(),
                    column_name: entry.column_name.clone(),
                    column: entry.column,
                    source,
                })?;
        }

        Ok(())
    }

    /// Decode a row into a new record, starting from its default value.
    pub fn decode_new(&self, row: &(impl Row + ?Sized)) -> Result<R, DecodeError> {
        let mut record = R::default();
        self.decode(&mut record, row)?;
        Ok(record)
    }
}

impl<R> DecoderPlan<R> {
    /// The plan's entries, in field declaration order.
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// The highest column index read by the plan.
    ///
    /// Rows must have more columns than this index.
    pub fn last_column(&self) -> usize {
        self.last_column
    }
}

/// A cache of field metadata per record type, and of decoder plans per record
/// type and header.
#[derive(Default)]
pub struct PlanCache {
    metadata: HashMap<TypeId, Arc<[FieldMetadata]>>,
    plans: HashMap<(TypeId, Vec<String>), Arc<dyn Any + Send + Sync>>,
}

impl PlanCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The field metadata of a record type, extracted on first use.
    pub fn metadata<R: Record>(&mut self) -> Arc<[FieldMetadata]> {
        self.metadata
            .entry(TypeId::of::<R>())
            .or_insert_with(|| extract::<R>().into())
            .clone()
    }

    /// The decoder plan of a record type for a header, built on first use.
    ///
    /// Failed builds are not cached.
    pub fn plan<R: Record>(
        &mut self,
        headers: &HeaderMap,
    ) -> Result<Arc<DecoderPlan<R>>, PlanError> {
        let key = (TypeId::of::<R>(), headers.names().to_vec());

        if let Some(plan) = self.plans.get(&key) {
            if let Ok(plan) = Arc::clone(plan).downcast::<DecoderPlan<R>>() {
                return Ok(plan);
            }
        }

        let metadata = self.metadata::<R>();
        let plan = Arc::new(DecoderPlan::<R>::from_metadata(&metadata, headers)?);
        self.plans.insert(key, plan.clone());

        Ok(plan)
    }

    /// The number of cached plans.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Whether no plan is cached.
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
