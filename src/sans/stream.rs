//! States decoding a stream of rows.

use std::sync::Arc;

use either::Either::{self, Left, Right};
use log::debug;

use crate::avec::Record;

use super::{
    header::{HeaderError, HeaderMap},
    plan::{DecodeError, DecoderPlan, PlanCache, PlanError},
    row::{Row, RowSource},
};

/// State token to resolve the header of a stream.
#[derive(Debug, Default)]
pub struct Init;

impl Init {
    /// Transition to another state by resolving the header, either from an
    /// explicit list of column names or from the first row of the source.
    ///
    /// Returns a successor state token.
    pub fn advance<S: RowSource>(
        self,
        explicit: Option<&[String]>,
        rows: &mut S,
    ) -> Result<HeaderResolved, HeaderError<S::Error>> {
        let headers = HeaderMap::resolve(explicit, rows)?;
        Ok(HeaderResolved {
            headers: Arc::new(headers),
        })
    }
}

/// State token to build a decoder plan for a resolved header.
///
/// This token may be cloned to decode the same stream position into several
/// record types.
#[derive(Debug, Clone)]
pub struct HeaderResolved {
    headers: Arc<HeaderMap>,
}

impl HeaderResolved {
    /// The resolved header.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Transition to another state by building a decoder plan for record type
    /// `R`.
    ///
    /// Returns a successor state token.
    pub fn advance<R: Record>(self) -> Result<PlanBuilt<R>, PlanError> {
        let plan = DecoderPlan::build(&self.headers)?;
        Ok(PlanBuilt::new(Arc::new(plan)))
    }

    /// Transition to another state by retrieving a decoder plan for record
    /// type `R` from a cache, building it if absent.
    ///
    /// Returns a successor state token.
    pub fn advance_cached<R: Record>(
        self,
        cache: &mut PlanCache,
    ) -> Result<PlanBuilt<R>, PlanError> {
        let plan = cache.plan::<R>(&self.headers)?;
        Ok(PlanBuilt::new(plan))
    }
}

/// State token to decode the next row of a stream into a record `R`.
#[derive(Debug)]
pub struct PlanBuilt<R> {
    plan: Arc<DecoderPlan<R>>,
    decoded: usize,
}

impl<R: Record> PlanBuilt<R> {
    fn new(plan: Arc<DecoderPlan<R>>) -> Self {
        Self { plan, decoded: 0 }
    }

    /// The plan applied to each row.
    pub fn plan(&self) -> &DecoderPlan<R> {
        &self.plan
    }

    /// Transition to another state by decoding the next row, or by ending the
    /// stream if there is none.
    ///
    /// Returns the decoded record and a successor state token, or the final
    /// state token.
    pub fn advance(
        self,
        row: Option<&(impl Row + ?Sized)>,
    ) -> Result<Either<(R, Self), Done>, DecodeError> {
        let Some(row) = row else {
            debug!("Decoded {} records.", self.decoded);
            return Ok(Right(Done {
                decoded: self.decoded,
            }));
        };

        let record = self.plan.decode_new(row)?;

        let successor = Self {
            plan: self.plan,
            decoded: self.decoded + 1,
        };

        Ok(Left((record, successor)))
    }
}

/// State token marking the end of a stream.
#[derive(Debug)]
pub struct Done {
    decoded: usize,
}

impl Done {
    /// The number of records decoded from the stream.
    pub fn decoded(&self) -> usize {
        self.decoded
    }
}
